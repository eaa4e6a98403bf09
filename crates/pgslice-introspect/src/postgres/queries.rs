use sqlx::PgPool;

use pgslice_core::{Error, Result};

fn introspection_error(schema: &str, table: &str, err: sqlx::Error) -> Error {
    Error::Schema(format!("Failed to introspect {schema}.{table}: {err}"))
}

pub async fn fetch_database_name(pool: &PgPool) -> Result<String> {
    let name = sqlx::query_scalar::<_, String>("select current_database()::text")
        .fetch_one(pool)
        .await
        .map_err(|err| Error::Schema(format!("Failed to read database name: {err}")))?;
    Ok(name)
}

pub async fn list_tables_in_schema(pool: &PgPool, schema: &str) -> Result<Vec<String>> {
    sqlx::query_scalar::<_, String>(
        r#"
        select table_name::text
        from information_schema.tables
        where table_schema = $1
          and table_type = 'BASE TABLE'
        order by table_name
        "#,
    )
    .bind(schema)
    .fetch_all(pool)
    .await
    .map_err(|err| Error::Schema(format!("Failed to list tables in schema {schema}: {err}")))
}

#[derive(Debug, sqlx::FromRow)]
pub struct RawColumn {
    pub name: String,
    pub data_type: String,
    pub udt_name: String,
    pub nullable: bool,
    pub column_default: Option<String>,
    pub is_identity: bool,
    pub has_sequence: bool,
}

pub async fn list_columns(pool: &PgPool, schema: &str, table: &str) -> Result<Vec<RawColumn>> {
    sqlx::query_as::<_, RawColumn>(
        r#"
        select
          c.column_name::text as name,
          c.data_type::text as data_type,
          c.udt_name::text as udt_name,
          (c.is_nullable = 'YES') as nullable,
          c.column_default::text as column_default,
          (c.is_identity = 'YES') as is_identity,
          (pg_get_serial_sequence(
             quote_ident(c.table_schema) || '.' || quote_ident(c.table_name),
             c.column_name
           ) is not null) as has_sequence
        from information_schema.columns c
        where c.table_schema = $1
          and c.table_name = $2
        order by c.ordinal_position
        "#,
    )
    .bind(schema)
    .bind(table)
    .fetch_all(pool)
    .await
    .map_err(|err| introspection_error(schema, table, err))
}

pub async fn get_primary_key(pool: &PgPool, schema: &str, table: &str) -> Result<Vec<String>> {
    let columns = sqlx::query_scalar::<_, Vec<String>>(
        r#"
        select array_agg(att.attname::text order by ord.ordinality)
        from pg_constraint con
        join pg_class rel on rel.oid = con.conrelid
        join pg_namespace nsp on nsp.oid = rel.relnamespace
        join unnest(con.conkey) with ordinality as ord(attnum, ordinality) on true
        join pg_attribute att on att.attrelid = rel.oid and att.attnum = ord.attnum
        where nsp.nspname = $1
          and rel.relname = $2
          and con.contype = 'p'
        group by con.conname
        "#,
    )
    .bind(schema)
    .bind(table)
    .fetch_optional(pool)
    .await
    .map_err(|err| introspection_error(schema, table, err))?;

    Ok(columns.unwrap_or_default())
}

#[derive(Debug, sqlx::FromRow)]
pub struct RawUniqueConstraint {
    pub name: String,
    pub columns: Vec<String>,
}

pub async fn list_unique_constraints(
    pool: &PgPool,
    schema: &str,
    table: &str,
) -> Result<Vec<RawUniqueConstraint>> {
    sqlx::query_as::<_, RawUniqueConstraint>(
        r#"
        select
          con.conname::text as name,
          array_agg(att.attname::text order by ord.ordinality) as columns
        from pg_constraint con
        join pg_class rel on rel.oid = con.conrelid
        join pg_namespace nsp on nsp.oid = rel.relnamespace
        join unnest(con.conkey) with ordinality as ord(attnum, ordinality) on true
        join pg_attribute att on att.attrelid = rel.oid and att.attnum = ord.attnum
        where nsp.nspname = $1
          and rel.relname = $2
          and con.contype = 'u'
        group by con.conname
        order by con.conname
        "#,
    )
    .bind(schema)
    .bind(table)
    .fetch_all(pool)
    .await
    .map_err(|err| introspection_error(schema, table, err))
}

/// One column pair of a foreign-key constraint.
#[derive(Debug, sqlx::FromRow)]
pub struct RawForeignKey {
    pub constraint_name: String,
    pub source_schema: String,
    pub source_table: String,
    pub source_column: String,
    pub target_schema: String,
    pub target_table: String,
    pub target_column: String,
    pub on_delete_code: String,
}

/// Which end of the constraint the requested table sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FkDirection {
    Outgoing,
    Incoming,
}

pub async fn list_foreign_keys(
    pool: &PgPool,
    schema: &str,
    table: &str,
    direction: FkDirection,
) -> Result<Vec<RawForeignKey>> {
    let filter = match direction {
        FkDirection::Outgoing => "src_nsp.nspname = $1 and src_rel.relname = $2",
        FkDirection::Incoming => "ref_nsp.nspname = $1 and ref_rel.relname = $2",
    };
    let sql = format!(
        r#"
        select
          con.conname::text as constraint_name,
          src_nsp.nspname::text as source_schema,
          src_rel.relname::text as source_table,
          src_att.attname::text as source_column,
          ref_nsp.nspname::text as target_schema,
          ref_rel.relname::text as target_table,
          ref_att.attname::text as target_column,
          con.confdeltype::text as on_delete_code
        from pg_constraint con
        join pg_class src_rel on src_rel.oid = con.conrelid
        join pg_namespace src_nsp on src_nsp.oid = src_rel.relnamespace
        join pg_class ref_rel on ref_rel.oid = con.confrelid
        join pg_namespace ref_nsp on ref_nsp.oid = ref_rel.relnamespace
        join unnest(con.conkey, con.confkey) with ordinality
          as cols(src_attnum, ref_attnum, ordinality) on true
        join pg_attribute src_att
          on src_att.attrelid = src_rel.oid and src_att.attnum = cols.src_attnum
        join pg_attribute ref_att
          on ref_att.attrelid = ref_rel.oid and ref_att.attnum = cols.ref_attnum
        where con.contype = 'f'
          and {filter}
        order by con.conname, cols.ordinality
        "#
    );

    sqlx::query_as::<_, RawForeignKey>(&sql)
        .bind(schema)
        .bind(table)
        .fetch_all(pool)
        .await
        .map_err(|err| introspection_error(schema, table, err))
}

/// Whether the current session refuses writes.
pub async fn session_is_read_only(pool: &PgPool) -> Result<bool> {
    let setting = sqlx::query_scalar::<_, String>("select current_setting('transaction_read_only')")
        .fetch_one(pool)
        .await
        .map_err(|err| Error::ReadOnlyEnforcement(err.to_string()))?;
    Ok(setting == "on")
}
