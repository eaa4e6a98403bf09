use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use pgslice_core::{validate_identifier, Error, Result, Table, Value};

use crate::adapter::{QueryExecutor, SchemaSource};

/// Schema source backed by a fixed set of tables.
///
/// Incoming foreign keys are derived from the outgoing ones when the source
/// is built, the way the catalog would report them.
#[derive(Debug, Default)]
pub struct InMemorySchema {
    tables: BTreeMap<(String, String), Table>,
    metadata_calls: AtomicUsize,
}

impl InMemorySchema {
    pub fn from_tables(tables: impl IntoIterator<Item = Table>) -> Self {
        let mut by_key: BTreeMap<(String, String), Table> = tables
            .into_iter()
            .map(|mut table| {
                table.foreign_keys_incoming.clear();
                ((table.schema_name.clone(), table.table_name.clone()), table)
            })
            .collect();

        let outgoing: Vec<_> = by_key
            .values()
            .flat_map(|table| table.foreign_keys_outgoing.iter().cloned())
            .collect();
        for fk in outgoing {
            let (schema, table) = fk.target();
            if let Some(target) = by_key.get_mut(&(schema.to_string(), table.to_string())) {
                target.foreign_keys_incoming.push(fk);
            }
        }

        Self {
            tables: by_key,
            metadata_calls: AtomicUsize::new(0),
        }
    }

    /// Number of `get_table_metadata` calls served so far.
    pub fn metadata_calls(&self) -> usize {
        self.metadata_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SchemaSource for InMemorySchema {
    async fn get_table_metadata(&self, schema: &str, table: &str) -> Result<Table> {
        validate_identifier(schema)?;
        validate_identifier(table)?;
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);

        self.tables
            .get(&(schema.to_string(), table.to_string()))
            .cloned()
            .ok_or_else(|| {
                Error::Schema(format!(
                    "Table {schema}.{table} not found or has no columns"
                ))
            })
    }

    async fn get_all_tables(&self, schema: &str) -> Result<Vec<String>> {
        validate_identifier(schema)?;
        Ok(self
            .tables
            .keys()
            .filter(|(table_schema, _)| table_schema == schema)
            .map(|(_, table)| table.clone())
            .collect())
    }
}

struct ScriptedQuery {
    fragment: String,
    params: Option<Vec<Value>>,
    rows: Vec<Vec<Value>>,
}

/// Query executor answering from canned rows.
///
/// A query is answered by the first rule whose fragment occurs in the SQL and
/// whose parameters (when given) are equal; anything else returns no rows.
/// Every call is recorded.
#[derive(Default)]
pub struct ScriptedExecutor {
    rules: Vec<ScriptedQuery>,
    calls: Mutex<Vec<(String, Vec<Value>)>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, fragment: &str, params: Vec<Value>, rows: Vec<Vec<Value>>) -> Self {
        self.rules.push(ScriptedQuery {
            fragment: fragment.to_string(),
            params: Some(params),
            rows,
        });
        self
    }

    /// Answer regardless of parameters.
    pub fn on_any(mut self, fragment: &str, rows: Vec<Vec<Value>>) -> Self {
        self.rules.push(ScriptedQuery {
            fragment: fragment.to_string(),
            params: None,
            rows,
        });
        self
    }

    pub fn calls(&self) -> Vec<(String, Vec<Value>)> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of calls whose SQL contains `fragment`.
    pub fn count_calls(&self, fragment: &str) -> usize {
        self.calls()
            .iter()
            .filter(|(sql, _)| sql.contains(fragment))
            .count()
    }
}

#[async_trait]
impl QueryExecutor for ScriptedExecutor {
    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Vec<Value>>> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((sql.to_string(), params.to_vec()));

        let rows = self
            .rules
            .iter()
            .find(|rule| {
                sql.contains(&rule.fragment)
                    && rule
                        .params
                        .as_ref()
                        .is_none_or(|expected| expected.as_slice() == params)
            })
            .map(|rule| rule.rows.clone())
            .unwrap_or_default();
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgslice_core::{FkAction, ForeignKey};

    #[tokio::test]
    async fn derives_incoming_foreign_keys() {
        let mut orders = Table::new("public", "orders");
        orders.foreign_keys_outgoing.push(ForeignKey {
            constraint_name: "orders_user_id_fkey".to_string(),
            source_table: "public.orders".to_string(),
            source_column: "user_id".to_string(),
            target_table: "public.users".to_string(),
            target_column: "id".to_string(),
            on_delete: FkAction::Cascade,
        });
        let source = InMemorySchema::from_tables([orders, Table::new("public", "users")]);

        let users = source.get_table_metadata("public", "users").await.unwrap();
        assert_eq!(users.foreign_keys_incoming.len(), 1);
        assert_eq!(
            source.get_all_tables("public").await.unwrap(),
            vec!["orders", "users"]
        );
    }

    #[tokio::test]
    async fn rejects_unsafe_names_before_lookup() {
        let source = InMemorySchema::default();
        let err = source
            .get_table_metadata("public", "users; drop table users")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Security(_)));
        assert_eq!(source.metadata_calls(), 0);
    }

    #[tokio::test]
    async fn scripted_executor_matches_fragment_and_params() {
        let executor = ScriptedExecutor::new()
            .on(
                r#"FROM "public"."users""#,
                vec![Value::from("1")],
                vec![vec![Value::Int(1)]],
            )
            .on_any("pg_catalog", vec![vec![Value::from("x")]]);

        let hit = executor
            .query(r#"SELECT "id" FROM "public"."users" WHERE "id" = $1"#, &[Value::from("1")])
            .await
            .unwrap();
        assert_eq!(hit, vec![vec![Value::Int(1)]]);

        let miss = executor
            .query(r#"SELECT "id" FROM "public"."users" WHERE "id" = $1"#, &[Value::from("2")])
            .await
            .unwrap();
        assert!(miss.is_empty());
        assert_eq!(executor.count_calls("users"), 2);
    }
}
