//! Core contracts and helpers for pgslice.
//!
//! This crate defines the record and schema model, the error type, the
//! visited-set and dependency-sorting primitives shared by the traverser, the
//! SQL generator and the CLI.

pub mod error;
pub mod graph;
pub mod identifier;
pub mod model;
pub mod record;
pub mod timeframe;
pub mod value;
pub mod visited;

pub use error::{Error, Result};
pub use graph::{order_tables, DependencySorter, DependencyStats, TableOrder};
pub use identifier::{
    quote_ident, quote_qualified, split_qualified, validate_identifier, DEFAULT_SCHEMA,
};
pub use model::{array_element_type, is_array_type, Column, FkAction, ForeignKey, Table};
pub use record::{RecordData, RecordIdentifier, RecordSet};
pub use timeframe::{parse_related_filters, TimeframeFilter, DEFAULT_TIMEFRAME_COLUMN};
pub use value::Value;
pub use visited::VisitedTracker;
