//! Identifier validation and quoting.
//!
//! Every schema, table and column name coming from the user passes through
//! [`validate_identifier`] before it is placed in a catalog or data query.
//! Names coming back from the catalog are still quoted with [`quote_ident`]
//! when SQL is emitted.

use crate::error::{Error, Result};

/// Schema used when a table name carries no qualifier.
pub const DEFAULT_SCHEMA: &str = "public";

/// Accept only `[A-Za-z_][A-Za-z0-9_$]*`.
pub fn validate_identifier(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '$')
        }
        _ => false,
    };

    if valid {
        Ok(())
    } else {
        Err(Error::Security(format!("Invalid SQL identifier: {name:?}")))
    }
}

/// Double-quote an identifier, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// `"schema"."table"`
pub fn quote_qualified(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(table))
}

/// Split `schema.table` into its parts, falling back to `default_schema`.
pub fn split_qualified<'a>(name: &'a str, default_schema: &'a str) -> (&'a str, &'a str) {
    match name.split_once('.') {
        Some((schema, table)) => (schema, table),
        None => (default_schema, name),
    }
}
