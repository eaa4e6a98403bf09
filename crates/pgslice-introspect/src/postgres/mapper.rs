use std::collections::BTreeMap;

use pgslice_core::{Column, FkAction, ForeignKey, Table};

use super::queries::{RawColumn, RawForeignKey, RawUniqueConstraint};

/// Any one signal marks a key column as generated by the database.
pub fn is_auto_generated(has_sequence: bool, is_identity: bool, default: Option<&str>) -> bool {
    has_sequence || is_identity || default.is_some_and(|expr| expr.contains("nextval("))
}

pub fn map_columns(raw: Vec<RawColumn>, primary_keys: &[String]) -> Vec<Column> {
    raw.into_iter()
        .map(|column| {
            let is_primary_key = primary_keys.contains(&column.name);
            let is_auto_generated = is_primary_key
                && is_auto_generated(
                    column.has_sequence,
                    column.is_identity,
                    column.column_default.as_deref(),
                );
            Column {
                name: column.name,
                data_type: column.data_type,
                udt_name: column.udt_name,
                nullable: column.nullable,
                default: column.column_default,
                is_primary_key,
                is_auto_generated,
            }
        })
        .collect()
}

pub fn map_foreign_keys(raw: Vec<RawForeignKey>) -> Vec<ForeignKey> {
    raw.into_iter()
        .map(|fk| ForeignKey {
            constraint_name: fk.constraint_name,
            source_table: format!("{}.{}", fk.source_schema, fk.source_table),
            source_column: fk.source_column,
            target_table: format!("{}.{}", fk.target_schema, fk.target_table),
            target_column: fk.target_column,
            on_delete: fk_action_from_code(&fk.on_delete_code),
        })
        .collect()
}

pub fn map_unique_constraints(raw: Vec<RawUniqueConstraint>) -> BTreeMap<String, Vec<String>> {
    raw.into_iter()
        .map(|constraint| (constraint.name, constraint.columns))
        .collect()
}

pub fn build_table(
    schema: &str,
    table: &str,
    columns: Vec<Column>,
    primary_keys: Vec<String>,
    outgoing: Vec<ForeignKey>,
    incoming: Vec<ForeignKey>,
    unique_constraints: BTreeMap<String, Vec<String>>,
) -> Table {
    Table {
        schema_name: schema.to_string(),
        table_name: table.to_string(),
        columns,
        primary_keys,
        foreign_keys_outgoing: outgoing,
        foreign_keys_incoming: incoming,
        unique_constraints,
    }
}

fn fk_action_from_code(code: &str) -> FkAction {
    match code {
        "r" => FkAction::Restrict,
        "c" => FkAction::Cascade,
        "n" => FkAction::SetNull,
        "d" => FkAction::SetDefault,
        _ => FkAction::NoAction,
    }
}
