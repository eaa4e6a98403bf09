use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use tracing::{debug, info};

use pgslice_core::{
    order_tables, quote_ident, quote_qualified, RecordData, RecordIdentifier, RecordSet, Result,
    Table, Value, DEFAULT_SCHEMA,
};
use pgslice_introspect::{MetadataCache, SchemaSource};

use crate::conflict::{build_on_conflict, ConflictStrategy, NaturalKeyOverrides};
use crate::ddl::DdlGenerator;
use crate::format::{format_value, quote_literal, serialize_pk_value};

/// Batch size used when none (or a non-positive one) is configured.
pub const UNLIMITED_BATCH_SIZE: usize = 999_999;

/// Temporary table pairing old and new keys of remapped rows.
const ID_MAP: &str = "_pgslice_id_map";

/// Knobs of [`SqlGenerator::generate_batch`].
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Insert primary keys as they are instead of letting the target generate them.
    pub keep_pks: bool,
    /// Prepend DDL; needs `database_name`.
    pub create_schema: bool,
    pub database_name: Option<String>,
    pub schema_name: String,
    /// Wrap the script in `BEGIN;` / `COMMIT;`.
    pub include_transaction: bool,
    pub natural_keys: NaturalKeyOverrides,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            keep_pks: false,
            create_schema: false,
            database_name: None,
            schema_name: DEFAULT_SCHEMA.to_string(),
            include_transaction: true,
            natural_keys: NaturalKeyOverrides::new(),
        }
    }
}

type TableKey = (String, String);

/// Everything needed to write INSERTs for one table.
struct TablePlan {
    meta: Arc<Table>,
    /// Inserted columns, sorted.
    columns: Vec<String>,
    /// Generated key column whose new values are recorded in the id map.
    remapped_pk: Option<String>,
    /// Column to the table whose id map entry replaces its value.
    fk_remap: BTreeMap<String, TableKey>,
    strategy: ConflictStrategy,
}

impl TablePlan {
    fn self_referencing_remap(&self) -> bool {
        self.fk_remap
            .values()
            .any(|(schema, table)| *schema == self.meta.schema_name && *table == self.meta.table_name)
    }
}

/// FROM-clause pieces for the INSERT ... SELECT forms.
struct SelectSource {
    /// One cast expression per inserted column.
    exprs: Vec<String>,
    /// `FROM (VALUES ...) AS data(...)` plus id-map joins.
    from: String,
}

/// Writes dependency-ordered records as an idempotent SQL script.
pub struct SqlGenerator<'a> {
    schema: &'a dyn SchemaSource,
    cache: MetadataCache,
    batch_size: usize,
}

impl<'a> SqlGenerator<'a> {
    /// `batch_size <= 0` means one statement per table.
    pub fn new(schema: &'a dyn SchemaSource, batch_size: i64) -> Self {
        let batch_size = usize::try_from(batch_size)
            .ok()
            .filter(|size| *size > 0)
            .unwrap_or(UNLIMITED_BATCH_SIZE);
        Self {
            schema,
            cache: MetadataCache::new(),
            batch_size,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Full script for `records`, which must already be in dependency order.
    pub async fn generate_batch(
        &mut self,
        records: &[RecordData],
        options: &BatchOptions,
    ) -> Result<String> {
        let records: Vec<RecordData> = records.iter().cloned().collect::<RecordSet>().into_iter().collect();
        let groups = table_groups(&records);
        let plans = self.plan_tables(&groups, options).await?;

        let body = if options.keep_pks {
            self.plain_body(&groups, &plans)
        } else {
            self.remap_body(&groups, &plans)
        };

        let mut script = self.header(records.len());
        if options.create_schema {
            if let Some(database) = &options.database_name {
                let tables: Vec<TableKey> = unique_tables(&groups);
                let ddl = DdlGenerator::new(self.schema)
                    .generate_ddl(database, &options.schema_name, &tables)
                    .await?;
                script.push_str(&ddl);
                script.push('\n');
            }
        }
        if options.include_transaction {
            script.push_str("BEGIN;\n\n");
        }
        script.push_str(&body);
        if options.include_transaction {
            script.push_str("COMMIT;\n");
        }

        info!(
            records = records.len(),
            tables = plans.len(),
            bytes = script.len(),
            keep_pks = options.keep_pks,
            "SQL generated"
        );
        Ok(script)
    }

    /// One unbatched INSERT per table, each preceded by a comment.
    pub async fn generate_bulk_insert(&mut self, records: &[RecordData]) -> Result<String> {
        if records.is_empty() {
            return Ok(String::new());
        }

        let records: Vec<RecordData> = records.iter().cloned().collect::<RecordSet>().into_iter().collect();
        let groups = consecutive_runs(&records);
        let options = BatchOptions {
            keep_pks: true,
            ..BatchOptions::default()
        };
        let plans = self.plan_tables(&groups, &options).await?;

        let statements: Vec<String> = groups
            .iter()
            .filter_map(|(key, rows)| {
                plans.get(key).map(|plan| {
                    format!(
                        "-- Table: {} ({} records)\n{}",
                        plan.meta.quoted_name(),
                        rows.len(),
                        plain_statement(plan, rows)
                    )
                })
            })
            .collect();
        Ok(statements.join("\n\n"))
    }

    async fn plan_tables(
        &mut self,
        groups: &[(TableKey, Vec<&RecordData>)],
        options: &BatchOptions,
    ) -> Result<HashMap<TableKey, TablePlan>> {
        let mut metas: BTreeMap<TableKey, Arc<Table>> = BTreeMap::new();
        for (key, _) in groups {
            if !metas.contains_key(key) {
                let meta = self.cache.get(self.schema, &key.0, &key.1).await?;
                metas.insert(key.clone(), meta);
            }
        }

        let remapped: BTreeMap<TableKey, String> = if options.keep_pks {
            BTreeMap::new()
        } else {
            metas
                .iter()
                .filter_map(|(key, meta)| remapped_key_column(meta).map(|pk| (key.clone(), pk)))
                .collect()
        };

        let mut plans = HashMap::new();
        for (key, meta) in metas {
            let rows: Vec<&RecordData> = groups
                .iter()
                .filter(|(group_key, _)| *group_key == key)
                .flat_map(|(_, rows)| rows.iter().copied())
                .collect();
            let excluded = if options.keep_pks {
                Vec::new()
            } else {
                meta.auto_generated_primary_keys()
            };
            let columns: Vec<String> = {
                let mut present: Vec<String> = meta
                    .columns
                    .iter()
                    .map(|column| column.name.clone())
                    .filter(|name| !excluded.contains(name))
                    .filter(|name| rows.iter().any(|row| row.data.contains_key(name)))
                    .collect();
                present.sort();
                present
            };
            let strategy = build_on_conflict(&meta, &columns, &excluded, &options.natural_keys)?;
            let fk_remap = fk_columns_to_remap(&meta, &remapped)
                .into_iter()
                .filter(|(column, _)| columns.contains(column))
                .collect();
            debug!(table = %meta.full_name(), strategy = ?strategy, "table planned");

            plans.insert(
                key.clone(),
                TablePlan {
                    remapped_pk: remapped.get(&key).cloned(),
                    meta,
                    columns,
                    fk_remap,
                    strategy,
                },
            );
        }
        Ok(plans)
    }

    fn header(&self, record_count: usize) -> String {
        let batch = if self.batch_size == UNLIMITED_BATCH_SIZE {
            "unlimited".to_string()
        } else {
            self.batch_size.to_string()
        };
        format!(
            "-- Generated by pgslice\n-- Date: {}\n-- Records: {record_count}\n-- Batch size: {batch}\n\n",
            Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
        )
    }

    fn chunks<'r>(&self, plan: &TablePlan, rows: &'r [&'r RecordData]) -> Vec<&'r [&'r RecordData]> {
        // Rows pointing at earlier rows of the same table need those ids mapped first.
        let size = if plan.remapped_pk.is_some() && plan.self_referencing_remap() {
            1
        } else {
            self.batch_size
        };
        rows.chunks(size).collect()
    }

    fn plain_body(
        &self,
        groups: &[(TableKey, Vec<&RecordData>)],
        plans: &HashMap<TableKey, TablePlan>,
    ) -> String {
        let mut body = String::new();
        for (key, rows) in groups {
            let Some(plan) = plans.get(key) else { continue };
            for chunk in rows.chunks(self.batch_size) {
                body.push_str(&chunk_comment(plan, chunk.len()));
                body.push_str(&plain_statement(plan, chunk));
                body.push_str("\n\n");
            }
        }
        body
    }

    fn remap_body(
        &self,
        groups: &[(TableKey, Vec<&RecordData>)],
        plans: &HashMap<TableKey, TablePlan>,
    ) -> String {
        let mut block = RemapBlock::default();
        for (key, rows) in groups {
            let Some(plan) = plans.get(key) else { continue };
            for chunk in self.chunks(plan, rows) {
                let statement = match (&plan.strategy, &plan.remapped_pk) {
                    (ConflictStrategy::NaturalKey(keys), Some(pk)) => {
                        block.natural_key_remap(plan, chunk, keys, pk)
                    }
                    (_, Some(pk)) if chunk.len() == 1 => block.returning_single(plan, chunk, pk),
                    (_, Some(pk)) => block.returning_multi(plan, chunk, pk),
                    (_, None) => plain_statement(plan, chunk),
                };
                block.push(format!("{}{statement}", chunk_comment(plan, chunk.len())));
            }
        }
        block.finish()
    }
}

/// Declarations and statements of the anonymous block used when remapping.
#[derive(Default)]
struct RemapBlock {
    declarations: Vec<String>,
    statements: Vec<String>,
    suffixes: HashSet<String>,
}

impl RemapBlock {
    fn push(&mut self, statement: String) {
        self.statements.push(statement);
    }

    /// Variable suffix for one chunk, unique within the block.
    fn suffix(&mut self, table: &str) -> String {
        let base: String = table
            .chars()
            .map(|ch| {
                if ch.is_ascii_alphanumeric() {
                    ch.to_ascii_lowercase()
                } else {
                    '_'
                }
            })
            .collect();
        let mut candidate = base.clone();
        let mut counter = 1;
        while !self.suffixes.insert(candidate.clone()) {
            counter += 1;
            candidate = format!("{base}_{counter}");
        }
        candidate
    }

    fn returning_single(&mut self, plan: &TablePlan, rows: &[&RecordData], pk: &str) -> String {
        let suffix = self.suffix(&plan.meta.table_name);
        let var = format!("v_new_id_{suffix}");
        self.declarations
            .push(format!("{var} {};", key_type(plan, pk)));

        let old_id = rows
            .first()
            .map(|row| old_id_literal(&row.identifier))
            .unwrap_or_else(|| "NULL".to_string());
        format!(
            "{}\nRETURNING {} INTO {var};\n{}",
            insert_body(plan, rows),
            quote_ident(pk),
            map_insert(&plan.meta, &old_id, &format!("{var}::text")),
        )
    }

    fn returning_multi(&mut self, plan: &TablePlan, rows: &[&RecordData], pk: &str) -> String {
        let suffix = self.suffix(&plan.meta.table_name);
        let new_ids = format!("v_new_ids_{suffix}");
        let old_ids = format!("v_old_ids_{suffix}");
        self.declarations
            .push(format!("{new_ids} {}[];", key_type(plan, pk)));
        self.declarations.push(format!("{old_ids} TEXT[];"));

        let source = select_source(plan, rows, false);
        let old_values: Vec<String> = rows
            .iter()
            .map(|row| old_id_literal(&row.identifier))
            .collect();
        let quoted_pk = quote_ident(pk);
        format!(
            "WITH inserted AS (\n{}\nSELECT {}\n{}\nORDER BY data.pgslice_ord{}\nRETURNING {quoted_pk}\n)\n\
             SELECT array_agg({quoted_pk}) INTO {new_ids} FROM inserted;\n\
             {old_ids} := ARRAY[{}];\n{}",
            insert_head(plan),
            source.exprs.join(", "),
            source.from,
            conflict_suffix(plan),
            old_values.join(", "),
            map_loop(&plan.meta, &new_ids, &old_ids),
        )
    }

    fn natural_key_remap(
        &mut self,
        plan: &TablePlan,
        rows: &[&RecordData],
        keys: &[String],
        pk: &str,
    ) -> String {
        let suffix = self.suffix(&plan.meta.table_name);
        let new_ids = format!("v_new_ids_{suffix}");
        let old_ids = format!("v_old_ids_{suffix}");
        self.declarations
            .push(format!("{new_ids} {}[];", key_type(plan, pk)));
        self.declarations.push(format!("{old_ids} TEXT[];"));

        let source = select_source(plan, rows, true);
        let selected: Vec<String> = plan
            .columns
            .iter()
            .zip(&source.exprs)
            .map(|(column, expr)| format!("{expr} AS {}", quote_ident(column)))
            .collect();
        let table = plan.meta.quoted_name();
        let quoted_pk = quote_ident(pk);
        let matches = |left: &str, right: &str| {
            keys.iter()
                .map(|key| {
                    let key = quote_ident(key);
                    format!("{left}.{key} IS NOT DISTINCT FROM {right}.{key}")
                })
                .collect::<Vec<_>>()
                .join(" AND ")
        };
        let inserted_columns: Vec<String> = plan
            .columns
            .iter()
            .map(|column| format!("ti.{}", quote_ident(column)))
            .collect();
        let returned: Vec<String> = std::iter::once(quoted_pk.clone())
            .chain(keys.iter().map(|key| quote_ident(key)))
            .collect();

        format!(
            "WITH to_insert AS (\n\
             SELECT data.pgslice_ord, data.pgslice_old_id, {selected}\n\
             {from}\n\
             ),\n\
             existing AS (\n\
             SELECT DISTINCT ON (ti.pgslice_old_id) ti.pgslice_old_id AS old_id, t.{quoted_pk} AS new_id\n\
             FROM to_insert ti\n\
             JOIN {table} t ON {existing_match}\n\
             ORDER BY ti.pgslice_old_id, t.{quoted_pk}\n\
             ),\n\
             inserted AS (\n\
             {head}\n\
             SELECT {inserted_columns}\n\
             FROM to_insert ti\n\
             WHERE NOT EXISTS (SELECT 1 FROM existing e WHERE e.old_id = ti.pgslice_old_id)\n\
             ORDER BY ti.pgslice_ord\n\
             RETURNING {returned}\n\
             ),\n\
             all_ids AS (\n\
             SELECT old_id, new_id FROM existing\n\
             UNION ALL\n\
             SELECT ti.pgslice_old_id AS old_id, ins.{quoted_pk} AS new_id\n\
             FROM inserted ins\n\
             JOIN to_insert ti ON {inserted_match}\n\
             WHERE NOT EXISTS (SELECT 1 FROM existing e WHERE e.old_id = ti.pgslice_old_id)\n\
             )\n\
             SELECT array_agg(new_id ORDER BY old_id), array_agg(old_id ORDER BY old_id)\n\
             INTO {new_ids}, {old_ids}\n\
             FROM all_ids;\n\
             {map_loop}",
            selected = selected.join(", "),
            from = source.from,
            existing_match = matches("t", "ti"),
            head = insert_head(plan),
            inserted_columns = inserted_columns.join(", "),
            returned = returned.join(", "),
            inserted_match = matches("ins", "ti"),
            map_loop = map_loop(&plan.meta, &new_ids, &old_ids),
        )
    }

    fn finish(self) -> String {
        let body = self.statements.join("\n\n");
        let tag = if body.contains("$$") { "$pgslice$" } else { "$$" };

        let mut block = format!("DO {tag}\n");
        if !self.declarations.is_empty() {
            block.push_str("DECLARE\n");
            for declaration in &self.declarations {
                block.push_str(&format!("    {declaration}\n"));
            }
        }
        block.push_str(&format!(
            "BEGIN\n\
             CREATE TEMP TABLE IF NOT EXISTS {ID_MAP} (\n    \
             table_name TEXT NOT NULL,\n    \
             old_id TEXT NOT NULL,\n    \
             new_id TEXT NOT NULL,\n    \
             PRIMARY KEY (table_name, old_id)\n\
             );\n\n"
        ));
        if !body.is_empty() {
            block.push_str(&body);
            block.push_str("\n\n");
        }
        block.push_str(&format!("DROP TABLE IF EXISTS {ID_MAP};\nEND {tag};\n\n"));
        block
    }
}

/// Single-column auto-generated key of a table, when it has one.
fn remapped_key_column(meta: &Table) -> Option<String> {
    match meta.primary_keys.as_slice() {
        [pk] if meta.column(pk).is_some_and(|column| column.is_auto_generated) => Some(pk.clone()),
        _ => None,
    }
}

/// Foreign-key columns of `meta` that point at the remapped key of another table.
pub(crate) fn fk_columns_to_remap(
    meta: &Table,
    remapped: &BTreeMap<TableKey, String>,
) -> BTreeMap<String, TableKey> {
    meta.foreign_keys_outgoing
        .iter()
        .filter_map(|fk| {
            let (schema, table) = fk.target();
            let target = (schema.to_string(), table.to_string());
            remapped
                .get(&target)
                .filter(|pk| **pk == fk.target_column)
                .map(|_| (fk.source_column.clone(), target))
        })
        .collect()
}

fn key_type(plan: &TablePlan, pk: &str) -> String {
    plan.meta
        .column(pk)
        .map(|column| column.sql_type())
        .unwrap_or_else(|| "bigint".to_string())
}

fn chunk_comment(plan: &TablePlan, rows: usize) -> String {
    format!("-- {} ({rows} records)\n", plan.meta.quoted_name())
}

fn old_id_literal(identifier: &RecordIdentifier) -> String {
    quote_literal(&serialize_pk_value(&identifier.pk_values))
}

fn map_insert(meta: &Table, old_id: &str, new_id: &str) -> String {
    format!(
        "INSERT INTO {ID_MAP} VALUES ({}, {old_id}, {new_id}) ON CONFLICT DO NOTHING;",
        quote_literal(&meta.quoted_name())
    )
}

fn map_loop(meta: &Table, new_ids: &str, old_ids: &str) -> String {
    format!(
        "FOR i IN 1..array_length({new_ids}, 1) LOOP\n    {}\nEND LOOP;",
        map_insert(meta, &format!("{old_ids}[i]"), &format!("{new_ids}[i]::text"))
    )
}

fn insert_head(plan: &TablePlan) -> String {
    let columns: Vec<String> = plan.columns.iter().map(|column| quote_ident(column)).collect();
    format!(
        "INSERT INTO {} ({})",
        plan.meta.quoted_name(),
        columns.join(", ")
    )
}

fn conflict_suffix(plan: &TablePlan) -> String {
    match &plan.strategy {
        ConflictStrategy::OnConflict(clause) => format!("\n{clause}"),
        _ => String::new(),
    }
}

fn row_value<'r>(row: &'r RecordData, column: &str) -> &'r Value {
    row.data.get(column).unwrap_or(&Value::Null)
}

/// `INSERT ... VALUES` or, when ids must be looked up, `INSERT ... SELECT`,
/// followed by the conflict clause but no terminator.
fn insert_body(plan: &TablePlan, rows: &[&RecordData]) -> String {
    if plan.fk_remap.is_empty() {
        let values: Vec<String> = rows
            .iter()
            .map(|row| {
                let literals: Vec<String> = plan
                    .columns
                    .iter()
                    .map(|column| format_value(row_value(row, column), plan.meta.column(column)))
                    .collect();
                format!("({})", literals.join(", "))
            })
            .collect();
        format!(
            "{}\nVALUES\n    {}{}",
            insert_head(plan),
            values.join(",\n    "),
            conflict_suffix(plan)
        )
    } else {
        let source = select_source(plan, rows, false);
        format!(
            "{}\nSELECT {}\n{}\nORDER BY data.pgslice_ord{}",
            insert_head(plan),
            source.exprs.join(", "),
            source.from,
            conflict_suffix(plan)
        )
    }
}

/// Complete statement for a table whose keys are not remapped.
fn plain_statement(plan: &TablePlan, rows: &[&RecordData]) -> String {
    match &plan.strategy {
        ConflictStrategy::NaturalKey(keys) => natural_key_insert(plan, rows, keys),
        _ => format!("{};", insert_body(plan, rows)),
    }
}

/// `INSERT ... SELECT ... WHERE NOT EXISTS` matching on the natural key.
fn natural_key_insert(plan: &TablePlan, rows: &[&RecordData], keys: &[String]) -> String {
    let source = select_source(plan, rows, false);
    let matches: Vec<String> = keys
        .iter()
        .map(|key| {
            let expr = plan
                .columns
                .iter()
                .position(|column| column == key)
                .and_then(|index| source.exprs.get(index))
                .map(String::as_str)
                .unwrap_or("NULL");
            format!("existing.{} IS NOT DISTINCT FROM {expr}", quote_ident(key))
        })
        .collect();
    format!(
        "{}\nSELECT {}\n{}\nWHERE NOT EXISTS (\n    SELECT 1 FROM {} existing WHERE {}\n)\nORDER BY data.pgslice_ord;",
        insert_head(plan),
        source.exprs.join(", "),
        source.from,
        plan.meta.quoted_name(),
        matches.join(" AND ")
    )
}

/// Rows as a typed `VALUES` list, with remapped references resolved through the id map.
fn select_source(plan: &TablePlan, rows: &[&RecordData], with_old_id: bool) -> SelectSource {
    let mut aliases = vec!["pgslice_ord".to_string()];
    if with_old_id {
        aliases.push("pgslice_old_id".to_string());
    }

    let mut exprs = Vec::with_capacity(plan.columns.len());
    let mut joins = Vec::new();
    for column in &plan.columns {
        let sql_type = plan
            .meta
            .column(column)
            .map(|meta| meta.sql_type())
            .unwrap_or_else(|| "text".to_string());
        match plan.fk_remap.get(column) {
            Some((schema, table)) => {
                let alias = quote_ident(&format!("old_{column}"));
                let map = format!("map{}", joins.len());
                joins.push(format!(
                    "LEFT JOIN {ID_MAP} {map} ON {map}.table_name = {} AND {map}.old_id = data.{alias}::text",
                    quote_literal(&quote_qualified(schema, table))
                ));
                exprs.push(format!(
                    "COALESCE({map}.new_id, data.{alias}::text)::{sql_type}"
                ));
                aliases.push(alias);
            }
            None => {
                let alias = quote_ident(column);
                exprs.push(format!("data.{alias}::{sql_type}"));
                aliases.push(alias);
            }
        }
    }

    let values: Vec<String> = rows
        .iter()
        .enumerate()
        .map(|(index, row)| {
            let mut literals = vec![(index + 1).to_string()];
            if with_old_id {
                literals.push(old_id_literal(&row.identifier));
            }
            literals.extend(
                plan.columns
                    .iter()
                    .map(|column| format_value(row_value(row, column), plan.meta.column(column))),
            );
            format!("({})", literals.join(", "))
        })
        .collect();

    let mut from = format!(
        "FROM (VALUES\n    {}\n) AS data({})",
        values.join(",\n    "),
        aliases.join(", ")
    );
    for join in joins {
        from.push('\n');
        from.push_str(&join);
    }
    SelectSource { exprs, from }
}

/// Group sorted records per table in an order that keeps every table after
/// the tables its rows depend on; falls back to consecutive runs when the
/// tables depend on each other.
fn table_groups(records: &[RecordData]) -> Vec<(TableKey, Vec<&RecordData>)> {
    let present: HashSet<&RecordIdentifier> = records.iter().map(|record| &record.identifier).collect();
    let mut rank: HashMap<String, usize> = HashMap::new();
    let mut graph: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for record in records {
        let table = record.identifier.table_key();
        let next = rank.len();
        rank.entry(table.clone()).or_insert(next);
        graph.entry(table.clone()).or_default();
        for dependency in &record.dependencies {
            if present.contains(dependency) && !dependency.same_table(&record.identifier) {
                graph
                    .entry(dependency.table_key())
                    .or_default()
                    .insert(table.clone());
            }
        }
    }

    let order = order_tables(&graph, |table| rank.get(table).copied().unwrap_or(usize::MAX));
    if !order.is_acyclic() {
        debug!(cycle = ?order.cycle, "tables depend on each other, keeping record order");
        return consecutive_runs(records);
    }

    let mut by_table: HashMap<String, (TableKey, Vec<&RecordData>)> = HashMap::new();
    for record in records {
        by_table
            .entry(record.identifier.table_key())
            .or_insert_with(|| {
                (
                    (
                        record.identifier.schema_name.clone(),
                        record.identifier.table_name.clone(),
                    ),
                    Vec::new(),
                )
            })
            .1
            .push(record);
    }
    order
        .order
        .into_iter()
        .filter_map(|table| by_table.remove(&table))
        .collect()
}

fn consecutive_runs(records: &[RecordData]) -> Vec<(TableKey, Vec<&RecordData>)> {
    let mut groups: Vec<(TableKey, Vec<&RecordData>)> = Vec::new();
    for record in records {
        let key = (
            record.identifier.schema_name.clone(),
            record.identifier.table_name.clone(),
        );
        match groups.last_mut() {
            Some((last, rows)) if *last == key => rows.push(record),
            _ => groups.push((key, vec![record])),
        }
    }
    groups
}

fn unique_tables(groups: &[(TableKey, Vec<&RecordData>)]) -> Vec<TableKey> {
    let mut seen = HashSet::new();
    groups
        .iter()
        .filter(|(key, _)| seen.insert(key.clone()))
        .map(|(key, _)| key.clone())
        .collect()
}
