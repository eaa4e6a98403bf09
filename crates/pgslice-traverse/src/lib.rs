//! Foreign-key graph traversal for pgslice.
//!
//! Starting from one or more seed rows, [`RelationshipTraverser`] walks
//! outgoing foreign keys (and, in wide mode, incoming ones) and collects every
//! reachable row together with the rows it must be inserted after.

mod query;
pub mod traverser;

pub use traverser::{ProgressCallback, RelationshipTraverser};
