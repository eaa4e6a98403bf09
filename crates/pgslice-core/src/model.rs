use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::identifier::{quote_ident, split_qualified};

/// Column metadata as reported by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    /// Declared type (`integer`, `character varying`, `ARRAY`, `USER-DEFINED`).
    pub data_type: String,
    /// Underlying type tag (`int4`, `_text`, enum name).
    pub udt_name: String,
    pub nullable: bool,
    pub default: Option<String>,
    pub is_primary_key: bool,
    /// SERIAL, IDENTITY or a `nextval(...)` default.
    pub is_auto_generated: bool,
}

impl Column {
    /// Type usable in a `::cast` expression.
    pub fn sql_type(&self) -> String {
        match self.data_type.as_str() {
            "ARRAY" => format!("{}[]", array_element_type(&self.udt_name)),
            "USER-DEFINED" => quote_ident(&self.udt_name),
            other => other.to_string(),
        }
    }

    pub fn is_array(&self) -> bool {
        is_array_type(&self.data_type)
    }

    /// Text and varchar family.
    pub fn is_textual(&self) -> bool {
        matches!(
            self.data_type.to_ascii_lowercase().as_str(),
            "text" | "character varying" | "varchar" | "character" | "char"
        ) || matches!(self.udt_name.as_str(), "text" | "varchar" | "bpchar")
    }
}

/// `ARRAY`, in any case.
pub fn is_array_type(data_type: &str) -> bool {
    data_type.eq_ignore_ascii_case("array")
}

/// Element type of an array column derived from its `_elem` type tag.
pub fn array_element_type(udt_name: &str) -> String {
    let element = udt_name.strip_prefix('_').unwrap_or(udt_name);
    match element {
        "int2" => "smallint",
        "int4" => "integer",
        "int8" => "bigint",
        "float4" => "real",
        "float8" => "double precision",
        "bool" => "boolean",
        "bpchar" => "character",
        "timestamptz" => "timestamp with time zone",
        "timestamp" => "timestamp without time zone",
        "timetz" => "time with time zone",
        other => other,
    }
    .to_string()
}

/// Referential action taken when the referenced row is deleted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FkAction {
    #[default]
    NoAction,
    Restrict,
    Cascade,
    SetNull,
    SetDefault,
}

impl FkAction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            FkAction::NoAction => "NO ACTION",
            FkAction::Restrict => "RESTRICT",
            FkAction::Cascade => "CASCADE",
            FkAction::SetNull => "SET NULL",
            FkAction::SetDefault => "SET DEFAULT",
        }
    }
}

/// One column pair of a foreign-key constraint.
///
/// Multi-column constraints are represented as several entries sharing the
/// same `constraint_name`. Table names are qualified (`schema.table`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignKey {
    pub constraint_name: String,
    pub source_table: String,
    pub source_column: String,
    pub target_table: String,
    pub target_column: String,
    pub on_delete: FkAction,
}

impl ForeignKey {
    pub fn source(&self) -> (&str, &str) {
        split_qualified(&self.source_table, crate::identifier::DEFAULT_SCHEMA)
    }

    pub fn target(&self) -> (&str, &str) {
        split_qualified(&self.target_table, crate::identifier::DEFAULT_SCHEMA)
    }

    pub fn is_self_referencing(&self) -> bool {
        self.source_table == self.target_table
    }

    fn identity(&self) -> (&str, &str, &str, &str, &str) {
        (
            &self.constraint_name,
            &self.source_table,
            &self.source_column,
            &self.target_table,
            &self.target_column,
        )
    }
}

impl PartialEq for ForeignKey {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for ForeignKey {}

impl Hash for ForeignKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

/// Table metadata assembled by the introspector.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Table {
    pub schema_name: String,
    pub table_name: String,
    pub columns: Vec<Column>,
    /// Declared key order.
    pub primary_keys: Vec<String>,
    pub foreign_keys_outgoing: Vec<ForeignKey>,
    pub foreign_keys_incoming: Vec<ForeignKey>,
    /// Constraint name to ordered column list.
    pub unique_constraints: BTreeMap<String, Vec<String>>,
}

impl Table {
    pub fn new(schema_name: impl Into<String>, table_name: impl Into<String>) -> Self {
        Self {
            schema_name: schema_name.into(),
            table_name: table_name.into(),
            ..Self::default()
        }
    }

    /// `schema.table`
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.schema_name, self.table_name)
    }

    /// `"schema"."table"`
    pub fn quoted_name(&self) -> String {
        crate::identifier::quote_qualified(&self.schema_name, &self.table_name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn primary_key_columns(&self) -> impl Iterator<Item = &Column> {
        self.primary_keys
            .iter()
            .filter_map(|name| self.column(name))
    }

    /// Primary-key columns flagged as auto-generated.
    pub fn auto_generated_primary_keys(&self) -> Vec<String> {
        self.primary_key_columns()
            .filter(|column| column.is_auto_generated)
            .map(|column| column.name.clone())
            .collect()
    }
}
