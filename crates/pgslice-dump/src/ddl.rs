use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use tracing::debug;

use pgslice_core::{order_tables, quote_ident, quote_qualified, Column, FkAction, Result, Table};
use pgslice_introspect::{MetadataCache, SchemaSource};

/// Emits CREATE statements for the tables of a dump.
///
/// `CREATE DATABASE` is written as a comment since it cannot run inside the
/// script's transaction, and auto-generated integer keys become
/// `GENERATED BY DEFAULT AS IDENTITY` so remapped inserts get fresh ids.
pub struct DdlGenerator<'a> {
    schema: &'a dyn SchemaSource,
    cache: MetadataCache,
}

impl<'a> DdlGenerator<'a> {
    pub fn new(schema: &'a dyn SchemaSource) -> Self {
        Self {
            schema,
            cache: MetadataCache::new(),
        }
    }

    /// Database note, schemas, tables in dependency order, then foreign keys.
    ///
    /// `default_schema` is created alongside the schemas of `tables`. Returns
    /// an empty string when there are no tables.
    pub async fn generate_ddl(
        &mut self,
        database_name: &str,
        default_schema: &str,
        tables: &[(String, String)],
    ) -> Result<String> {
        if tables.is_empty() {
            return Ok(String::new());
        }

        let mut metas: Vec<Arc<Table>> = Vec::with_capacity(tables.len());
        for (schema, table) in tables {
            if metas
                .iter()
                .any(|meta| meta.schema_name == *schema && meta.table_name == *table)
            {
                continue;
            }
            metas.push(self.cache.get(self.schema, schema, table).await?);
        }
        let metas = sort_tables(metas);

        let mut ddl = String::from("-- Schema\n");
        // PostgreSQL has no CREATE DATABASE IF NOT EXISTS and cannot create one
        // inside a transaction, so the statement is left for the operator.
        ddl.push_str(&format!(
            "-- CREATE DATABASE IF NOT EXISTS {};\n\n",
            quote_ident(database_name)
        ));

        let schemas: BTreeSet<&str> = std::iter::once(default_schema)
            .chain(metas.iter().map(|meta| meta.schema_name.as_str()))
            .collect();
        for schema in schemas {
            ddl.push_str(&format!("CREATE SCHEMA IF NOT EXISTS {};\n", quote_ident(schema)));
        }
        ddl.push('\n');

        for meta in &metas {
            ddl.push_str(&create_table(meta));
            ddl.push_str("\n\n");
        }

        let present: BTreeSet<(&str, &str)> = metas
            .iter()
            .map(|meta| (meta.schema_name.as_str(), meta.table_name.as_str()))
            .collect();
        for meta in &metas {
            let statements = foreign_key_statements(meta, &present);
            if !statements.is_empty() {
                ddl.push_str(&statements);
                ddl.push('\n');
            }
        }

        debug!(tables = metas.len(), bytes = ddl.len(), "DDL generated");
        Ok(ddl)
    }
}

/// Referenced tables first; tables in a cycle keep their input order at the end.
fn sort_tables(metas: Vec<Arc<Table>>) -> Vec<Arc<Table>> {
    let rank: HashMap<String, usize> = metas
        .iter()
        .enumerate()
        .map(|(index, meta)| (meta.full_name(), index))
        .collect();

    let mut graph: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for meta in &metas {
        graph.entry(meta.full_name()).or_default();
        for fk in &meta.foreign_keys_outgoing {
            let (schema, table) = fk.target();
            let target = format!("{schema}.{table}");
            if rank.contains_key(&target) && target != meta.full_name() {
                graph.entry(target).or_default().insert(meta.full_name());
            }
        }
    }

    let order = order_tables(&graph, |table| rank.get(table).copied().unwrap_or(usize::MAX));
    let mut by_name: HashMap<String, Arc<Table>> = metas
        .into_iter()
        .map(|meta| (meta.full_name(), meta))
        .collect();
    order
        .into_full_order()
        .into_iter()
        .filter_map(|name| by_name.remove(&name))
        .collect()
}

fn create_table(meta: &Table) -> String {
    let mut lines: Vec<String> = meta.columns.iter().map(column_definition).collect();
    if !meta.primary_keys.is_empty() {
        lines.push(format!("PRIMARY KEY ({})", quoted_list(&meta.primary_keys)));
    }
    for (name, columns) in &meta.unique_constraints {
        lines.push(format!(
            "CONSTRAINT {} UNIQUE ({})",
            quote_ident(name),
            quoted_list(columns)
        ));
    }
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n);",
        meta.quoted_name(),
        lines.join(",\n    ")
    )
}

/// `"name" TYPE [NOT NULL] [GENERATED BY DEFAULT AS IDENTITY | DEFAULT expr]`
pub(crate) fn column_definition(column: &Column) -> String {
    let sql_type = map_type(&column.data_type, &column.udt_name);
    let mut definition = format!("{} {sql_type}", quote_ident(&column.name));
    if !column.nullable {
        definition.push_str(" NOT NULL");
    }
    if column.is_auto_generated {
        // Rows inserted without a key still get one; a sequence named in the
        // source default would not exist here.
        if matches!(sql_type.as_str(), "SMALLINT" | "INTEGER" | "BIGINT") {
            definition.push_str(" GENERATED BY DEFAULT AS IDENTITY");
        }
    } else if let Some(default) = column
        .default
        .as_deref()
        .filter(|default| !default.contains("nextval("))
    {
        definition.push_str(&format!(" DEFAULT {default}"));
    }
    definition
}

/// Canonical DDL spelling of a catalog type.
pub fn map_type(data_type: &str, udt_name: &str) -> String {
    match data_type {
        "ARRAY" => {
            let element = udt_name.strip_prefix('_').unwrap_or(udt_name);
            format!("{}[]", canonical_udt(element))
        }
        "USER-DEFINED" => user_type(udt_name),
        other => canonical_data_type(other)
            .map(str::to_string)
            .unwrap_or_else(|| other.to_uppercase()),
    }
}

fn canonical_data_type(data_type: &str) -> Option<&'static str> {
    let mapped = match data_type.to_ascii_lowercase().as_str() {
        "character varying" | "varchar" | "character" | "char" | "text" => "TEXT",
        "smallint" => "SMALLINT",
        "integer" => "INTEGER",
        "bigint" => "BIGINT",
        "numeric" | "decimal" => "NUMERIC",
        "real" => "REAL",
        "double precision" => "DOUBLE PRECISION",
        "boolean" => "BOOLEAN",
        "date" => "DATE",
        "timestamp without time zone" => "TIMESTAMP",
        "timestamp with time zone" => "TIMESTAMPTZ",
        "time without time zone" => "TIME",
        "time with time zone" => "TIMETZ",
        "interval" => "INTERVAL",
        "json" => "JSON",
        "jsonb" => "JSONB",
        "uuid" => "UUID",
        "bytea" => "BYTEA",
        _ => return None,
    };
    Some(mapped)
}

fn canonical_udt(udt_name: &str) -> String {
    let mapped = match udt_name {
        "varchar" | "bpchar" | "text" => "TEXT",
        "int2" => "SMALLINT",
        "int4" => "INTEGER",
        "int8" => "BIGINT",
        "numeric" => "NUMERIC",
        "float4" => "REAL",
        "float8" => "DOUBLE PRECISION",
        "bool" => "BOOLEAN",
        "date" => "DATE",
        "timestamp" => "TIMESTAMP",
        "timestamptz" => "TIMESTAMPTZ",
        "time" => "TIME",
        "timetz" => "TIMETZ",
        "interval" => "INTERVAL",
        "json" => "JSON",
        "jsonb" => "JSONB",
        "uuid" => "UUID",
        "bytea" => "BYTEA",
        other => return user_type(other),
    };
    mapped.to_string()
}

/// Enum and domain names pass through, quoted only when they need it.
fn user_type(name: &str) -> String {
    let plain = name
        .chars()
        .next()
        .is_some_and(|first| first.is_ascii_lowercase() || first == '_')
        && name
            .chars()
            .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_');
    if plain {
        name.to_string()
    } else {
        quote_ident(name)
    }
}

/// One guarded `ALTER TABLE ... ADD CONSTRAINT` per outgoing constraint whose
/// target is part of the dump.
fn foreign_key_statements(meta: &Table, present: &BTreeSet<(&str, &str)>) -> String {
    let mut constraints: BTreeMap<&str, (Vec<String>, Vec<String>, String, FkAction)> =
        BTreeMap::new();
    for fk in &meta.foreign_keys_outgoing {
        let (schema, table) = fk.target();
        if !present.contains(&(schema, table)) {
            continue;
        }
        let entry = constraints
            .entry(fk.constraint_name.as_str())
            .or_insert_with(|| (Vec::new(), Vec::new(), quote_qualified(schema, table), fk.on_delete));
        entry.0.push(fk.source_column.clone());
        entry.1.push(fk.target_column.clone());
    }

    constraints
        .into_iter()
        .map(|(name, (source, target, referenced, on_delete))| {
            let on_delete = match on_delete {
                FkAction::NoAction => String::new(),
                action => format!("\n        ON DELETE {}", action.as_sql()),
            };
            format!(
                "DO $$ BEGIN\n    ALTER TABLE {}\n        ADD CONSTRAINT {}\n        FOREIGN KEY ({})\n        REFERENCES {referenced}({}){on_delete};\nEXCEPTION WHEN duplicate_object THEN NULL;\nEND $$;\n",
                meta.quoted_name(),
                quote_ident(name),
                quoted_list(&source),
                quoted_list(&target),
            )
        })
        .collect()
}

fn quoted_list(columns: &[String]) -> String {
    columns
        .iter()
        .map(|column| quote_ident(column))
        .collect::<Vec<_>>()
        .join(", ")
}
