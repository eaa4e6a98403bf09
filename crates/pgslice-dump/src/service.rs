use std::collections::BTreeSet;
use std::io::Write as _;

use tracing::{debug, info};

use pgslice_core::{
    split_qualified, DependencySorter, Error, RecordIdentifier, TimeframeFilter, DEFAULT_SCHEMA,
};
use pgslice_introspect::{QueryExecutor, SchemaSource};
use pgslice_traverse::{ProgressCallback, RelationshipTraverser};

use crate::conflict::NaturalKeyOverrides;
use crate::errors::DumpError;
use crate::graph::TableGraph;
use crate::sql::{BatchOptions, SqlGenerator};

/// Which rows of the main table start the walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedSelection {
    /// Explicit primary-key values.
    Pks(Vec<String>),
    /// Every row whose column lies inside the window.
    Timeframe(TimeframeFilter),
}

/// One dump run.
#[derive(Debug, Clone)]
pub struct DumpRequest {
    pub table: String,
    pub schema: String,
    pub seeds: SeedSelection,
    pub wide: bool,
    pub keep_pks: bool,
    pub create_schema: bool,
    /// Target database named in the DDL section.
    pub database_name: Option<String>,
    /// Windows applied to rows reached through incoming references.
    pub timeframe_filters: Vec<TimeframeFilter>,
    pub max_depth: Option<usize>,
    pub batch_size: i64,
    pub include_transaction: bool,
    pub natural_keys: NaturalKeyOverrides,
    /// Report the running record count while traversing.
    pub show_progress: bool,
}

impl DumpRequest {
    pub fn new(table: impl Into<String>, seeds: SeedSelection) -> Self {
        Self {
            table: table.into(),
            schema: DEFAULT_SCHEMA.to_string(),
            seeds,
            wide: false,
            keep_pks: false,
            create_schema: false,
            database_name: None,
            timeframe_filters: Vec::new(),
            max_depth: None,
            batch_size: 100,
            include_transaction: true,
            natural_keys: NaturalKeyOverrides::new(),
            show_progress: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpResult {
    pub sql: String,
    pub record_count: usize,
    /// `schema.table`, sorted.
    pub tables_involved: Vec<String>,
    /// Rows per table and the references between tables.
    pub graph: TableGraph,
}

impl DumpResult {
    fn empty() -> Self {
        Self {
            sql: String::new(),
            record_count: 0,
            tables_involved: Vec::new(),
            graph: TableGraph::default(),
        }
    }

    /// True when a timeframe selected no seed rows.
    pub fn is_empty(&self) -> bool {
        self.record_count == 0
    }
}

/// Seeds, traversal, ordering and SQL generation for one request.
pub struct DumpService<'a> {
    schema: &'a dyn SchemaSource,
    executor: &'a dyn QueryExecutor,
    progress: Option<ProgressCallback<'a>>,
}

impl<'a> DumpService<'a> {
    pub fn new(schema: &'a dyn SchemaSource, executor: &'a dyn QueryExecutor) -> Self {
        Self {
            schema,
            executor,
            progress: None,
        }
    }

    /// Receiver for progress when the request asks for it; stderr otherwise.
    pub fn with_progress(mut self, callback: ProgressCallback<'a>) -> Self {
        self.progress = Some(callback);
        self
    }

    pub async fn dump(&mut self, request: &DumpRequest) -> Result<DumpResult, DumpError> {
        let mut traverser = RelationshipTraverser::new(self.schema, self.executor)
            .wide_mode(request.wide)
            .with_timeframe_filters(request.timeframe_filters.clone());
        let mut progress_on_stderr = false;
        if request.show_progress {
            let callback: ProgressCallback<'a> = match self.progress.take() {
                Some(callback) => callback,
                None => {
                    progress_on_stderr = true;
                    stderr_progress()
                }
            };
            traverser = traverser.with_progress(callback);
        }

        let seeds: Vec<RecordIdentifier> = match &request.seeds {
            SeedSelection::Pks(pks) => {
                let (schema, table) = split_qualified(&request.table, &request.schema);
                pks.iter()
                    .map(|pk| RecordIdentifier::new(schema, table, [pk.as_str()]))
                    .collect()
            }
            SeedSelection::Timeframe(filter) => {
                let seeds = traverser
                    .find_records_in_timeframe(&request.table, &request.schema, filter)
                    .await?;
                if seeds.is_empty() {
                    info!(table = %request.table, filter = %filter, "no rows inside the timeframe");
                    return Ok(DumpResult::empty());
                }
                seeds
            }
        };
        let seed_count = seeds.len();

        let records = traverser
            .traverse_identifiers(seeds, request.max_depth)
            .await;
        if progress_on_stderr {
            eprintln!();
        }
        let records = records?;
        if records.is_empty() {
            return Err(Error::RecordNotFound(format!(
                "none of the {seed_count} requested rows of {} exist",
                request.table
            ))
            .into());
        }

        let sorter = DependencySorter::new();
        let stats = sorter.analyze_dependencies(&records);
        debug!(
            records = stats.total_records,
            with_dependencies = stats.records_with_deps,
            max_dependencies = stats.max_dependencies,
            "dependency summary"
        );
        let sorted = sorter.sort(&records)?;
        info!(records = sorted.len(), "records sorted by dependency");

        let tables_involved: Vec<String> = sorted
            .iter()
            .map(|record| record.identifier.table_key())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let options = BatchOptions {
            keep_pks: request.keep_pks,
            create_schema: request.create_schema,
            database_name: request.database_name.clone(),
            schema_name: request.schema.clone(),
            include_transaction: request.include_transaction,
            natural_keys: request.natural_keys.clone(),
        };
        let (schema, table) = split_qualified(&request.table, &request.schema);
        let graph = TableGraph::build(&sorted, table, schema);

        let sql = SqlGenerator::new(self.schema, request.batch_size)
            .generate_batch(&sorted, &options)
            .await?;

        Ok(DumpResult {
            sql,
            record_count: sorted.len(),
            tables_involved,
            graph,
        })
    }
}

fn stderr_progress() -> ProgressCallback<'static> {
    Box::new(|count| {
        let mut stderr = std::io::stderr().lock();
        let _ = write!(stderr, "\rTraversing relationships: {count} records");
        let _ = stderr.flush();
    })
}
