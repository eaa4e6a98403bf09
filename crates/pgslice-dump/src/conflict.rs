use std::collections::BTreeMap;

use tracing::warn;

use pgslice_core::{quote_ident, validate_identifier, Error, Result, Table};

/// How an INSERT into one table is made safe to re-run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictStrategy {
    /// Append this `ON CONFLICT ... DO UPDATE` clause.
    OnConflict(String),
    /// Skip rows whose natural-key columns already match an existing row.
    NaturalKey(Vec<String>),
    /// Nothing identifies a row; insert as is.
    Plain,
}

/// Natural keys supplied by the user, keyed by `schema.table` or `table`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NaturalKeyOverrides {
    entries: BTreeMap<String, Vec<String>>,
}

impl NaturalKeyOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `table=col1,col2` entries (`schema.table` allowed).
    pub fn parse<S: AsRef<str>>(specs: &[S]) -> Result<Self> {
        let mut overrides = Self::new();
        for spec in specs {
            let spec = spec.as_ref();
            let invalid = || {
                Error::Configuration(format!(
                    "Invalid natural key specification {spec:?} (expected table=col1,col2)"
                ))
            };

            let (table, columns) = spec.split_once('=').ok_or_else(invalid)?;
            let table = table.trim();
            if table.is_empty() {
                return Err(invalid());
            }
            for part in table.split('.') {
                validate_identifier(part)?;
            }

            let columns: Vec<String> = columns
                .split(',')
                .map(|column| column.trim().to_string())
                .collect();
            if columns.iter().any(String::is_empty) {
                return Err(invalid());
            }
            for column in &columns {
                validate_identifier(column)?;
            }
            overrides.insert(table, columns);
        }
        Ok(overrides)
    }

    pub fn insert(&mut self, table: impl Into<String>, columns: Vec<String>) {
        self.entries.insert(table.into(), columns);
    }

    /// Columns for `schema.table`, falling back to the bare table name.
    pub fn lookup(&self, schema: &str, table: &str) -> Option<&[String]> {
        self.entries
            .get(&format!("{schema}.{table}"))
            .or_else(|| self.entries.get(table))
            .map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

const NATURAL_KEY_NAMES: &[&str] = &["name", "code", "slug", "key"];

/// Columns that identify a row of `table` besides its primary key.
///
/// A user override wins. Otherwise non-null text columns are scanned for
/// conventional names, then `*_code` / `*_key` columns, and finally a narrow
/// lookup table's single text column is taken.
pub fn detect_natural_keys(table: &Table, overrides: &NaturalKeyOverrides) -> Option<Vec<String>> {
    if let Some(columns) = overrides.lookup(&table.schema_name, &table.table_name) {
        return Some(columns.to_vec());
    }

    let candidates: Vec<&str> = table
        .columns
        .iter()
        .filter(|column| !column.is_primary_key && !column.nullable && column.is_textual())
        .map(|column| column.name.as_str())
        .collect();

    if let Some(name) = NATURAL_KEY_NAMES
        .iter()
        .find(|name| candidates.contains(*name))
    {
        return Some(vec![name.to_string()]);
    }

    if let Some(name) = candidates
        .iter()
        .find(|name| name.ends_with("_code") || name.ends_with("_key"))
    {
        return Some(vec![name.to_string()]);
    }

    match candidates.as_slice() {
        [only] if (2..=3).contains(&table.columns.len()) => Some(vec![only.to_string()]),
        _ => None,
    }
}

/// `ON CONFLICT ("a", "b") DO UPDATE SET "a" = EXCLUDED."a", ...`
fn on_conflict_clause(columns: &[String]) -> String {
    let target: Vec<String> = columns.iter().map(|column| quote_ident(column)).collect();
    let updates: Vec<String> = target
        .iter()
        .map(|quoted| format!("{quoted} = EXCLUDED.{quoted}"))
        .collect();
    format!(
        "ON CONFLICT ({}) DO UPDATE SET {}",
        target.join(", "),
        updates.join(", ")
    )
}

/// Pick the idempotency strategy for an INSERT of `insert_columns`.
///
/// `auto_gen_pk_columns` are the key columns left out of the INSERT so the
/// target generates them. In order of preference: the remaining primary key,
/// a unique constraint covered by the inserted columns, then natural keys.
/// A table with a generated key and no way to recognise existing rows is an
/// error, since re-running would duplicate them.
pub fn build_on_conflict(
    table: &Table,
    insert_columns: &[String],
    auto_gen_pk_columns: &[String],
    overrides: &NaturalKeyOverrides,
) -> Result<ConflictStrategy> {
    let explicit_pks: Vec<String> = table
        .primary_keys
        .iter()
        .filter(|pk| !auto_gen_pk_columns.contains(pk))
        .cloned()
        .collect();
    if !explicit_pks.is_empty() && explicit_pks.iter().all(|pk| insert_columns.contains(pk)) {
        return Ok(ConflictStrategy::OnConflict(on_conflict_clause(
            &explicit_pks,
        )));
    }

    if let Some(columns) = table
        .unique_constraints
        .values()
        .find(|columns| !columns.is_empty() && columns.iter().all(|c| insert_columns.contains(c)))
    {
        return Ok(ConflictStrategy::OnConflict(on_conflict_clause(columns)));
    }

    if let Some(columns) = detect_natural_keys(table, overrides) {
        if let Some(missing) = columns.iter().find(|column| table.column(column).is_none()) {
            return Err(Error::Schema(format!(
                "natural key column {missing} not found on table {}",
                table.full_name()
            )));
        }
        return Ok(ConflictStrategy::NaturalKey(columns));
    }

    if table.primary_keys.is_empty() {
        warn!(
            table = %table.full_name(),
            "no primary key, unique constraint or natural key; inserts are not idempotent"
        );
        return Ok(ConflictStrategy::Plain);
    }

    Err(Error::Schema(format!(
        "Cannot generate idempotent SQL for table {}.{}: its primary key is auto-generated \
         and no unique constraint or natural key was found. \
         Pass --natural-keys \"{}=col1,col2\" to name the columns that identify a row.",
        table.schema_name, table.table_name, table.table_name
    )))
}
