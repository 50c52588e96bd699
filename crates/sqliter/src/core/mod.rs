pub mod connection;
pub mod constraint;
pub mod filter;
pub mod limits;
pub mod mutate;
pub mod query;
pub mod schema;
pub mod types;
pub mod value;
