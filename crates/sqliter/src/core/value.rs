use rusqlite::types::{Value, ValueRef};

/// Binds a JSON value as an SQLite parameter. Booleans become 0/1, nested
/// arrays and objects are stored as their JSON text.
pub fn json_to_sql(v: &serde_json::Value) -> Value {
    match v {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Integer(i64::from(*b)),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Integer(i),
            None => Value::Real(n.as_f64().unwrap_or_default()),
        },
        serde_json::Value::String(s) => Value::Text(s.clone()),
        other => Value::Text(other.to_string()),
    }
}

/// Blobs are surfaced as lowercase hex text.
pub fn sql_to_json(v: ValueRef<'_>) -> serde_json::Value {
    match v {
        ValueRef::Null => serde_json::Value::Null,
        ValueRef::Integer(x) => serde_json::Value::from(x),
        ValueRef::Real(x) => serde_json::Value::from(x),
        ValueRef::Text(t) => serde_json::Value::from(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => serde_json::Value::from(hex::encode(b)),
    }
}

/// CSV field rendering: NULL is an empty field.
pub fn sql_to_field(v: ValueRef<'_>) -> String {
    match v {
        ValueRef::Null => String::new(),
        ValueRef::Integer(x) => x.to_string(),
        ValueRef::Real(x) => x.to_string(),
        ValueRef::Text(t) => String::from_utf8_lossy(t).into_owned(),
        ValueRef::Blob(b) => hex::encode(b),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn binds_json_scalars() {
        assert_eq!(json_to_sql(&json!(null)), Value::Null);
        assert_eq!(json_to_sql(&json!(true)), Value::Integer(1));
        assert_eq!(json_to_sql(&json!(42)), Value::Integer(42));
        assert_eq!(json_to_sql(&json!(1.5)), Value::Real(1.5));
        assert_eq!(json_to_sql(&json!("x")), Value::Text("x".into()));
        assert_eq!(json_to_sql(&json!([1, 2])), Value::Text("[1,2]".into()));
    }

    #[test]
    fn blobs_render_as_hex() {
        let bytes = [0xde, 0xad, 0xbe, 0xef];
        assert_eq!(sql_to_json(ValueRef::Blob(&bytes)), json!("deadbeef"));
        assert_eq!(sql_to_field(ValueRef::Blob(&bytes)), "deadbeef");
        assert_eq!(sql_to_field(ValueRef::Null), "");
        assert_eq!(sql_to_json(ValueRef::Real(2.5)), json!(2.5));
    }
}
