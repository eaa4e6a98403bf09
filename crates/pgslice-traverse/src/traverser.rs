use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use tracing::{debug, info, warn};

use pgslice_core::{
    split_qualified, validate_identifier, Error, ForeignKey, RecordData, RecordIdentifier,
    RecordSet, Result, Table, TimeframeFilter, Value, VisitedTracker,
};
use pgslice_introspect::{MetadataCache, QueryExecutor, SchemaSource};

use crate::query;

/// Invoked with the running record count after every record added.
pub type ProgressCallback<'a> = Box<dyn FnMut(usize) + Send + 'a>;

/// Breadth-first walk over the foreign-key graph around seed records.
///
/// Strict mode (the default) follows outgoing references only, which pulls in
/// every row the seeds need to exist, including ancestor chains of
/// self-referencing tables. Wide mode also follows incoming references and
/// collects every row that points at a collected row.
///
/// One traverser keeps its [`VisitedTracker`] across calls, so rows reached
/// from several seeds are fetched once.
pub struct RelationshipTraverser<'a> {
    schema: &'a dyn SchemaSource,
    executor: &'a dyn QueryExecutor,
    cache: MetadataCache,
    visited: VisitedTracker,
    wide_mode: bool,
    timeframe_filters: Vec<TimeframeFilter>,
    progress: Option<ProgressCallback<'a>>,
}

impl<'a> RelationshipTraverser<'a> {
    pub fn new(schema: &'a dyn SchemaSource, executor: &'a dyn QueryExecutor) -> Self {
        Self {
            schema,
            executor,
            cache: MetadataCache::new(),
            visited: VisitedTracker::new(),
            wide_mode: false,
            timeframe_filters: Vec::new(),
            progress: None,
        }
    }

    pub fn wide_mode(mut self, wide_mode: bool) -> Self {
        self.wide_mode = wide_mode;
        self
    }

    /// Windows applied when searching rows that reference a collected row.
    pub fn with_timeframe_filters(mut self, filters: Vec<TimeframeFilter>) -> Self {
        self.timeframe_filters = filters;
        self
    }

    pub fn with_progress(mut self, callback: ProgressCallback<'a>) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Start from an existing visited set; rows in it are never fetched again.
    pub fn with_visited(mut self, visited: VisitedTracker) -> Self {
        self.visited = visited;
        self
    }

    pub fn visited(&self) -> &VisitedTracker {
        &self.visited
    }

    /// Collect the closure of one seed. `table` may be `schema.table`.
    ///
    /// `max_depth` bounds the number of hops from the seed; `None` is unbounded.
    pub async fn traverse(
        &mut self,
        table: &str,
        pk_value: &str,
        schema: &str,
        max_depth: Option<usize>,
    ) -> Result<RecordSet> {
        let (schema, table) = split_qualified(table, schema);
        let seed = RecordIdentifier::new(schema, table, [pk_value]);
        self.traverse_identifiers(vec![seed], max_depth).await
    }

    /// Collect the union of the closures of several seeds of one table.
    pub async fn traverse_multiple<S: AsRef<str>>(
        &mut self,
        table: &str,
        pk_values: &[S],
        schema: &str,
        max_depth: Option<usize>,
    ) -> Result<RecordSet> {
        let (schema, table) = split_qualified(table, schema);
        let seeds = pk_values
            .iter()
            .map(|pk| RecordIdentifier::new(schema, table, [pk.as_ref()]))
            .collect();
        self.traverse_identifiers(seeds, max_depth).await
    }

    /// Same as [`Self::traverse_multiple`] for fully formed (possibly composite) keys.
    pub async fn traverse_identifiers(
        &mut self,
        seeds: Vec<RecordIdentifier>,
        max_depth: Option<usize>,
    ) -> Result<RecordSet> {
        let mut results = RecordSet::new();
        for seed in seeds {
            self.walk_from(seed, max_depth, &mut results).await?;
        }
        info!(
            records = results.len(),
            visited = self.visited.get_visited_count(),
            wide = self.wide_mode,
            "traversal finished"
        );
        Ok(results)
    }

    /// Keys of every row of `table` inside the window, in key order.
    pub async fn find_records_in_timeframe(
        &mut self,
        table: &str,
        schema: &str,
        filter: &TimeframeFilter,
    ) -> Result<Vec<RecordIdentifier>> {
        let (schema, table) = split_qualified(table, schema);
        validate_identifier(&filter.column_name)?;
        let meta = self.metadata(schema, table).await?;
        require_primary_key(&meta)?;

        let sql = query::keys_in_timeframe(&meta, filter)?;
        let rows = self
            .executor
            .query(&sql, &query::timeframe_params(filter))
            .await?;
        debug!(table = %meta.full_name(), filter = %filter, rows = rows.len(), "timeframe seeds");
        Ok(rows
            .into_iter()
            .map(|row| identifier_from_key_row(&meta, row))
            .collect())
    }

    async fn walk_from(
        &mut self,
        seed: RecordIdentifier,
        max_depth: Option<usize>,
        results: &mut RecordSet,
    ) -> Result<()> {
        if self.visited.is_visited(&seed) {
            debug!(record = %seed, "seed already visited");
            return Ok(());
        }

        let record = match self.fetch_record(&seed).await {
            Ok(record) => record,
            Err(Error::RecordNotFound(reason)) => {
                warn!(record = %seed, reason = %reason, "seed record not found, skipping");
                return Ok(());
            }
            Err(err) => return Err(err),
        };
        self.visited.mark_visited(seed);

        let mut queue = VecDeque::new();
        queue.push_back((record.identifier.clone(), 0_usize));
        self.add_record(record, results);

        while let Some((current, depth)) = queue.pop_front() {
            if max_depth.is_some_and(|max| depth >= max) {
                continue;
            }

            for next in self.follow_outgoing(&current, results).await? {
                queue.push_back((next, depth + 1));
            }
            if self.wide_mode {
                for next in self.follow_incoming(&current, results).await? {
                    queue.push_back((next, depth + 1));
                }
            }
        }

        Ok(())
    }

    /// Rows the current record references; it depends on each of them.
    async fn follow_outgoing(
        &mut self,
        current: &RecordIdentifier,
        results: &mut RecordSet,
    ) -> Result<Vec<RecordIdentifier>> {
        let meta = self
            .metadata(&current.schema_name, &current.table_name)
            .await?;
        let Some(values) = results.get(current).map(|record| record.data.clone()) else {
            return Ok(Vec::new());
        };

        let mut discovered = Vec::new();
        for group in group_by_constraint(&meta.foreign_keys_outgoing) {
            let Some(key) = column_values(&values, group.iter().map(|fk| &fk.source_column))
            else {
                continue;
            };
            let (target_schema, target_table) = group[0].target();

            let target = match self
                .resolve_target(target_schema, target_table, &group, key)
                .await
            {
                Ok(Some(target)) => target,
                Ok(None) => {
                    warn!(
                        record = %current,
                        constraint = %group[0].constraint_name,
                        "referenced row not found, skipping"
                    );
                    continue;
                }
                Err(err) if err.is_recoverable_during_traversal() => {
                    warn!(record = %current, error = %err, "cannot resolve reference, skipping");
                    continue;
                }
                Err(err) => return Err(err),
            };

            if target != *current {
                if let Some(record) = results.get_mut(current) {
                    record.dependencies.insert(target.clone());
                }
            }
            if let Some(found) = self.visit(target, None, results).await? {
                discovered.push(found);
            }
        }
        Ok(discovered)
    }

    /// Rows referencing the current record; each of them depends on it.
    async fn follow_incoming(
        &mut self,
        current: &RecordIdentifier,
        results: &mut RecordSet,
    ) -> Result<Vec<RecordIdentifier>> {
        let meta = self
            .metadata(&current.schema_name, &current.table_name)
            .await?;
        let Some(values) = results.get(current).map(|record| record.data.clone()) else {
            return Ok(Vec::new());
        };

        let mut discovered = Vec::new();
        for group in group_by_constraint(&meta.foreign_keys_incoming) {
            let Some(key) = column_values(&values, group.iter().map(|fk| &fk.target_column))
            else {
                continue;
            };
            let (source_schema, source_table) = group[0].source();

            let referencing = match self
                .find_referencing(source_schema, source_table, &group, key)
                .await
            {
                Ok(found) => found,
                Err(err) if err.is_recoverable_during_traversal() => {
                    warn!(record = %current, error = %err, "cannot search references, skipping");
                    continue;
                }
                Err(err) => return Err(err),
            };

            for source in referencing {
                if source == *current {
                    continue;
                }
                if let Some(record) = results.get_mut(&source) {
                    record.dependencies.insert(current.clone());
                }
                if let Some(found) = self.visit(source, Some(current), results).await? {
                    discovered.push(found);
                }
            }
        }
        Ok(discovered)
    }

    /// Fetch and collect an unvisited record, returning its identifier.
    async fn visit(
        &mut self,
        identifier: RecordIdentifier,
        depends_on: Option<&RecordIdentifier>,
        results: &mut RecordSet,
    ) -> Result<Option<RecordIdentifier>> {
        if self.visited.is_visited(&identifier) {
            return Ok(None);
        }

        let record = match self.fetch_record(&identifier).await {
            Ok(record) => record,
            Err(err) if err.is_recoverable_during_traversal() => {
                warn!(record = %identifier, error = %err, "skipping related record");
                self.visited.mark_visited(identifier);
                return Ok(None);
            }
            Err(err) => return Err(err),
        };
        self.visited.mark_visited(identifier);

        let record = match depends_on {
            Some(parent) => record.with_dependency(parent.clone()),
            None => record,
        };
        let found = record.identifier.clone();
        self.add_record(record, results);
        Ok(Some(found))
    }

    async fn fetch_record(&mut self, identifier: &RecordIdentifier) -> Result<RecordData> {
        let meta = self
            .metadata(&identifier.schema_name, &identifier.table_name)
            .await?;
        require_primary_key(&meta)?;
        if identifier.pk_values.len() != meta.primary_keys.len() {
            return Err(Error::Schema(format!(
                "{} expects {} key values, got {}",
                meta.full_name(),
                meta.primary_keys.len(),
                identifier.pk_values.len()
            )));
        }

        let sql = query::fetch_by_key(&meta)?;
        let params: Vec<Value> = identifier
            .pk_values
            .iter()
            .map(|value| Value::Text(value.clone()))
            .collect();
        let row = self
            .executor
            .query(&sql, &params)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::RecordNotFound(identifier.to_string()))?;

        let data = query::row_to_map(&meta, row);
        let canonical = RecordIdentifier::from_values(
            &meta.schema_name,
            &meta.table_name,
            meta.primary_keys.iter().filter_map(|pk| data.get(pk)),
        );
        if canonical != *identifier {
            self.visited.mark_visited(canonical.clone());
        }
        debug!(record = %canonical, "record fetched");
        Ok(RecordData::new(canonical, data))
    }

    /// Identifier of the row an outgoing reference points at.
    async fn resolve_target(
        &mut self,
        schema: &str,
        table: &str,
        group: &[&ForeignKey],
        key: Vec<Value>,
    ) -> Result<Option<RecordIdentifier>> {
        let meta = self.metadata(schema, table).await?;
        require_primary_key(&meta)?;

        // A reference onto the full primary key names the row directly.
        let by_column: BTreeMap<&str, &Value> = group
            .iter()
            .map(|fk| fk.target_column.as_str())
            .zip(key.iter())
            .collect();
        if by_column.len() == meta.primary_keys.len()
            && meta
                .primary_keys
                .iter()
                .all(|pk| by_column.contains_key(pk.as_str()))
        {
            let values = meta.primary_keys.iter().map(|pk| by_column[pk.as_str()]);
            return Ok(Some(RecordIdentifier::from_values(
                &meta.schema_name,
                &meta.table_name,
                values,
            )));
        }

        let columns: Vec<String> = group.iter().map(|fk| fk.target_column.clone()).collect();
        let sql = query::keys_matching(&meta, &columns, None)?;
        let params = key_params(&key);
        let rows = self.executor.query(&sql, &params).await?;
        Ok(rows
            .into_iter()
            .next()
            .map(|row| identifier_from_key_row(&meta, row)))
    }

    async fn find_referencing(
        &mut self,
        schema: &str,
        table: &str,
        group: &[&ForeignKey],
        key: Vec<Value>,
    ) -> Result<Vec<RecordIdentifier>> {
        let meta = self.metadata(schema, table).await?;
        if meta.primary_keys.is_empty() {
            warn!(table = %meta.full_name(), "referencing table has no primary key, skipping");
            return Ok(Vec::new());
        }

        let filter = self
            .timeframe_filters
            .iter()
            .find(|filter| filter.applies_to(&meta.schema_name, &meta.table_name))
            .cloned();
        if let Some(filter) = &filter {
            validate_identifier(&filter.column_name)?;
        }

        let columns: Vec<String> = group.iter().map(|fk| fk.source_column.clone()).collect();
        let sql = query::keys_matching(&meta, &columns, filter.as_ref())?;
        let mut params = key_params(&key);
        if let Some(filter) = &filter {
            params.extend(query::timeframe_params(filter));
        }

        let rows = self.executor.query(&sql, &params).await?;
        debug!(
            table = %meta.full_name(),
            rows = rows.len(),
            filtered = filter.is_some(),
            "referencing rows found"
        );
        Ok(rows
            .into_iter()
            .map(|row| identifier_from_key_row(&meta, row))
            .collect())
    }

    async fn metadata(&mut self, schema: &str, table: &str) -> Result<Arc<Table>> {
        self.cache.get(self.schema, schema, table).await
    }

    fn add_record(&mut self, record: RecordData, results: &mut RecordSet) {
        results.insert(record);
        if let Some(progress) = self.progress.as_mut() {
            progress(results.len());
        }
    }
}

fn require_primary_key(meta: &Table) -> Result<()> {
    if meta.primary_keys.is_empty() {
        return Err(Error::RecordNotFound(format!(
            "no primary key on table {}",
            meta.full_name()
        )));
    }
    Ok(())
}

/// Foreign-key column pairs grouped per constraint, in declaration order.
fn group_by_constraint(fks: &[ForeignKey]) -> Vec<Vec<&ForeignKey>> {
    let mut groups: Vec<Vec<&ForeignKey>> = Vec::new();
    for fk in fks {
        match groups.iter_mut().find(|group| {
            group[0].constraint_name == fk.constraint_name
                && group[0].source_table == fk.source_table
        }) {
            Some(group) => group.push(fk),
            None => groups.push(vec![fk]),
        }
    }
    groups
}

/// Values of `columns`, or `None` when any of them is NULL or missing.
fn column_values<'c>(
    data: &BTreeMap<String, Value>,
    columns: impl Iterator<Item = &'c String>,
) -> Option<Vec<Value>> {
    columns
        .map(|column| data.get(column).filter(|value| !value.is_null()).cloned())
        .collect()
}

fn key_params(key: &[Value]) -> Vec<Value> {
    key.iter().map(|value| Value::Text(value.key_text())).collect()
}

fn identifier_from_key_row(meta: &Table, row: Vec<Value>) -> RecordIdentifier {
    let values: Vec<Value> = meta
        .primary_key_columns()
        .zip(row)
        .map(|(column, value)| query::restore_value(column, value))
        .collect();
    RecordIdentifier::from_values(&meta.schema_name, &meta.table_name, values.iter())
}
