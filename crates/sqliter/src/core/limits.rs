use super::types::Limits;

/// Page size used when the client does not ask for one.
pub const DEFAULT_PAGE_SIZE: usize = 100;

pub fn effective_limit(requested: Option<usize>, max_rows: usize) -> Limits {
    let max_rows = requested
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .min(max_rows.max(1));
    Limits { max_rows }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_not_requested() {
        assert_eq!(effective_limit(None, 1000).max_rows, DEFAULT_PAGE_SIZE);
        assert_eq!(effective_limit(None, 10).max_rows, 10);
    }

    #[test]
    fn clamps_to_ceiling() {
        assert_eq!(effective_limit(Some(5000), 1000).max_rows, 1000);
        assert_eq!(effective_limit(Some(25), 1000).max_rows, 25);
    }

    #[test]
    fn zero_is_allowed() {
        assert_eq!(effective_limit(Some(0), 1000).max_rows, 0);
    }
}
