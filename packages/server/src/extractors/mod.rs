pub mod query;

pub use query::AppQuery;
