use async_trait::async_trait;

use pgslice_core::{Result, Table, Value};

/// Read-only access to catalog metadata.
#[async_trait]
pub trait SchemaSource: Send + Sync {
    /// Columns, keys, foreign keys and unique constraints of one table.
    async fn get_table_metadata(&self, schema: &str, table: &str) -> Result<Table>;

    /// Sorted names of the base tables in `schema`.
    async fn get_all_tables(&self, schema: &str) -> Result<Vec<String>>;
}

/// Parametrized row queries against the source database.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Run `sql` with positional parameters (`$1`, `$2`, ...).
    ///
    /// Each row comes back as values in select-list order.
    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Vec<Value>>>;
}
