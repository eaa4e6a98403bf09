use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};

use indexmap::IndexMap;
use indexmap::map::Entry;

use crate::value::Value;

/// Graph-node key: `(schema, table, primary-key tuple)`.
///
/// Key values are stored in their normalized text form so an integer key and
/// its string spelling identify the same row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordIdentifier {
    pub schema_name: String,
    pub table_name: String,
    pub pk_values: Vec<String>,
}

impl RecordIdentifier {
    pub fn new<I, V>(schema_name: impl Into<String>, table_name: impl Into<String>, pk_values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        Self {
            schema_name: schema_name.into(),
            table_name: table_name.into(),
            pk_values: pk_values.into_iter().map(Into::into).collect(),
        }
    }

    /// Build an identifier from runtime key values.
    pub fn from_values<'a>(
        schema_name: impl Into<String>,
        table_name: impl Into<String>,
        values: impl IntoIterator<Item = &'a Value>,
    ) -> Self {
        Self::new(schema_name, table_name, values.into_iter().map(Value::key_text))
    }

    /// `schema.table`
    pub fn table_key(&self) -> String {
        format!("{}.{}", self.schema_name, self.table_name)
    }

    pub fn same_table(&self, other: &RecordIdentifier) -> bool {
        self.schema_name == other.schema_name && self.table_name == other.table_name
    }
}

impl fmt::Display for RecordIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}({})",
            self.schema_name,
            self.table_name,
            self.pk_values.join(", ")
        )
    }
}

/// A fetched row plus the records it must follow on insert.
///
/// Equality and hashing only look at the identifier.
#[derive(Debug, Clone)]
pub struct RecordData {
    pub identifier: RecordIdentifier,
    pub data: BTreeMap<String, Value>,
    pub dependencies: BTreeSet<RecordIdentifier>,
}

impl RecordData {
    pub fn new(identifier: RecordIdentifier, data: BTreeMap<String, Value>) -> Self {
        Self {
            identifier,
            data,
            dependencies: BTreeSet::new(),
        }
    }

    pub fn with_dependency(mut self, dependency: RecordIdentifier) -> Self {
        self.dependencies.insert(dependency);
        self
    }

    pub fn value(&self, column: &str) -> Option<&Value> {
        self.data.get(column)
    }
}

impl PartialEq for RecordData {
    fn eq(&self, other: &Self) -> bool {
        self.identifier == other.identifier
    }
}

impl Eq for RecordData {}

impl Hash for RecordData {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identifier.hash(state);
    }
}

/// Insertion-ordered set of records keyed by identifier.
///
/// Inserting an identifier that is already present replaces its payload in
/// place (last write wins) and keeps the original position.
#[derive(Debug, Clone, Default)]
pub struct RecordSet {
    records: IndexMap<RecordIdentifier, RecordData>,
}

impl RecordSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: RecordData) {
        self.records.insert(record.identifier.clone(), record);
    }

    /// Union with another set; dependencies of shared records are merged.
    pub fn merge(&mut self, other: RecordSet) {
        for (identifier, record) in other.records {
            match self.records.entry(identifier) {
                Entry::Occupied(mut slot) => {
                    let existing = slot.get_mut();
                    existing.data = record.data;
                    existing.dependencies.extend(record.dependencies);
                }
                Entry::Vacant(slot) => {
                    slot.insert(record);
                }
            }
        }
    }

    pub fn get(&self, identifier: &RecordIdentifier) -> Option<&RecordData> {
        self.records.get(identifier)
    }

    pub fn get_mut(&mut self, identifier: &RecordIdentifier) -> Option<&mut RecordData> {
        self.records.get_mut(identifier)
    }

    pub fn contains(&self, identifier: &RecordIdentifier) -> bool {
        self.records.contains_key(identifier)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RecordData> {
        self.records.values()
    }

    /// Position of an identifier in insertion order.
    pub fn position(&self, identifier: &RecordIdentifier) -> Option<usize> {
        self.records.get_index_of(identifier)
    }
}

impl FromIterator<RecordData> for RecordSet {
    fn from_iter<T: IntoIterator<Item = RecordData>>(iter: T) -> Self {
        let mut set = RecordSet::new();
        for record in iter {
            set.insert(record);
        }
        set
    }
}

impl IntoIterator for RecordSet {
    type Item = RecordData;
    type IntoIter = indexmap::map::IntoValues<RecordIdentifier, RecordData>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_values()
    }
}
