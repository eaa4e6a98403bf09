use std::collections::HashMap;
use std::sync::Arc;

use pgslice_core::{Result, Table};

use crate::adapter::SchemaSource;

/// Table metadata memoized for the lifetime of one traverser or generator.
#[derive(Debug, Default)]
pub struct MetadataCache {
    tables: HashMap<(String, String), Arc<Table>>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return cached metadata, asking `source` on first use only.
    pub async fn get<S>(&mut self, source: &S, schema: &str, table: &str) -> Result<Arc<Table>>
    where
        S: SchemaSource + ?Sized,
    {
        let key = (schema.to_string(), table.to_string());
        if let Some(found) = self.tables.get(&key) {
            return Ok(Arc::clone(found));
        }

        let loaded = Arc::new(source.get_table_metadata(schema, table).await?);
        tracing::debug!(
            schema = %schema,
            table = %table,
            columns = loaded.columns.len(),
            "table metadata loaded"
        );
        self.tables.insert(key, Arc::clone(&loaded));
        Ok(loaded)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn clear(&mut self) {
        self.tables.clear();
    }
}
