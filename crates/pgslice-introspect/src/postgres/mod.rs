use async_trait::async_trait;
use sqlx::PgPool;

use pgslice_core::{validate_identifier, Error, Result, Table, Value};

use crate::adapter::{QueryExecutor, SchemaSource};

mod mapper;
mod queries;
mod rows;

use queries::FkDirection;

/// Adapter for PostgreSQL databases.
#[derive(Debug, Clone)]
pub struct PostgresAdapter {
    pool: PgPool,
}

impl PostgresAdapter {
    /// Create a new adapter using a pre-configured pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn database_name(&self) -> Result<String> {
        queries::fetch_database_name(&self.pool).await
    }
}

#[async_trait]
impl SchemaSource for PostgresAdapter {
    async fn get_table_metadata(&self, schema: &str, table: &str) -> Result<Table> {
        introspect_table(&self.pool, schema, table).await
    }

    async fn get_all_tables(&self, schema: &str) -> Result<Vec<String>> {
        validate_identifier(schema)?;
        queries::list_tables_in_schema(&self.pool, schema).await
    }
}

#[async_trait]
impl QueryExecutor for PostgresAdapter {
    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Vec<Value>>> {
        let mut query = sqlx::query(sql);
        for param in params {
            query = rows::bind_value(query, param)?;
        }

        let fetched = query
            .fetch_all(&self.pool)
            .await
            .map_err(|err| Error::Schema(format!("query failed: {err}")))?;
        fetched.iter().map(rows::decode_row).collect()
    }
}

/// Assemble the metadata of one table from separate catalog queries.
pub async fn introspect_table(pool: &PgPool, schema: &str, table: &str) -> Result<Table> {
    validate_identifier(schema)?;
    validate_identifier(table)?;

    let raw_columns = queries::list_columns(pool, schema, table).await?;
    if raw_columns.is_empty() {
        return Err(Error::Schema(format!(
            "Table {schema}.{table} not found or has no columns"
        )));
    }

    let primary_keys = queries::get_primary_key(pool, schema, table).await?;
    let columns = mapper::map_columns(raw_columns, &primary_keys);
    let outgoing = mapper::map_foreign_keys(
        queries::list_foreign_keys(pool, schema, table, FkDirection::Outgoing).await?,
    );
    let incoming = mapper::map_foreign_keys(
        queries::list_foreign_keys(pool, schema, table, FkDirection::Incoming).await?,
    );
    let uniques =
        mapper::map_unique_constraints(queries::list_unique_constraints(pool, schema, table).await?);

    tracing::debug!(
        schema = %schema,
        table = %table,
        columns = columns.len(),
        primary_keys = primary_keys.len(),
        outgoing = outgoing.len(),
        incoming = incoming.len(),
        "table introspected"
    );

    Ok(mapper::build_table(
        schema,
        table,
        columns,
        primary_keys,
        outgoing,
        incoming,
        uniques,
    ))
}

pub(crate) use queries::session_is_read_only;
