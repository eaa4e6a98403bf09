//! Schema introspection and database access for pgslice.

pub mod adapter;
pub mod cache;
pub mod connection;
pub mod memory;
pub mod postgres;

pub use adapter::{QueryExecutor, SchemaSource};
pub use cache::MetadataCache;
pub use connection::{ConnectionManager, ConnectionParams};
pub use memory::{InMemorySchema, ScriptedExecutor};
pub use postgres::{introspect_table, PostgresAdapter};
