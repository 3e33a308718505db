pub mod ddl;
pub mod dml;
pub mod query;

pub use ddl::CreateTableExecutor;
pub use dml::InsertExecutor;
pub use query::QueryExecutor;
