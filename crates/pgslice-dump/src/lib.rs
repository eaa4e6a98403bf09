//! SQL synthesis for pgslice.
//!
//! Turns a dependency-ordered list of records into a re-runnable SQL script:
//! value literals, per-table idempotency strategy, optional primary-key
//! remapping through a temporary id map, optional DDL, and the orchestration
//! that ties traversal, sorting and generation together.

pub mod conflict;
pub mod ddl;
pub mod errors;
pub mod format;
pub mod graph;
pub mod service;
pub mod sql;
pub mod writer;

pub use conflict::{build_on_conflict, detect_natural_keys, ConflictStrategy, NaturalKeyOverrides};
pub use ddl::DdlGenerator;
pub use errors::DumpError;
pub use format::{format_value, serialize_pk_value};
pub use graph::{TableEdge, TableGraph, TableNode};
pub use service::{DumpRequest, DumpResult, DumpService, SeedSelection};
pub use sql::{BatchOptions, SqlGenerator, UNLIMITED_BATCH_SIZE};
pub use writer::{write_to_file, write_to_stdout};
