use std::collections::{BTreeMap, BTreeSet};

use pgslice_core::RecordData;

/// One table of a dump with the number of rows collected from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNode {
    pub schema_name: String,
    pub table_name: String,
    pub record_count: usize,
    /// The table the seed rows came from.
    pub is_root: bool,
}

impl TableNode {
    /// `schema.table`
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.schema_name, self.table_name)
    }
}

/// Rows of `source_table` that reference rows of `target_table`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableEdge {
    pub source_table: String,
    pub target_table: String,
    pub record_count: usize,
}

/// Table-level summary of the record dependencies of a dump.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableGraph {
    pub nodes: Vec<TableNode>,
    pub edges: Vec<TableEdge>,
}

impl TableGraph {
    /// Collapse record dependencies onto tables. Nodes and edges come out
    /// sorted by table name; references of a table onto itself are left out.
    pub fn build<'r>(
        records: impl IntoIterator<Item = &'r RecordData>,
        root_table: &str,
        root_schema: &str,
    ) -> Self {
        let mut counts: BTreeMap<(String, String), usize> = BTreeMap::new();
        let mut edges: BTreeMap<(String, String), usize> = BTreeMap::new();

        for record in records {
            let identifier = &record.identifier;
            *counts
                .entry((identifier.schema_name.clone(), identifier.table_name.clone()))
                .or_default() += 1;

            let source = identifier.table_key();
            let targets: BTreeSet<String> = record
                .dependencies
                .iter()
                .filter(|dependency| !dependency.same_table(identifier))
                .map(|dependency| dependency.table_key())
                .collect();
            for target in targets {
                *edges.entry((source.clone(), target)).or_default() += 1;
            }
        }

        let nodes = counts
            .into_iter()
            .map(|((schema_name, table_name), record_count)| TableNode {
                is_root: schema_name == root_schema && table_name == root_table,
                schema_name,
                table_name,
                record_count,
            })
            .collect();
        let edges = edges
            .into_iter()
            .map(|((source_table, target_table), record_count)| TableEdge {
                source_table,
                target_table,
                record_count,
            })
            .collect();
        Self { nodes, edges }
    }

    /// Draw the graph as a tree under the root tables, each table followed by
    /// the tables that reference it. A table reached a second time is marked
    /// `[shown above]` instead of being expanded again.
    pub fn render(&self) -> String {
        if self.nodes.is_empty() {
            return "(No records found)".to_string();
        }

        let by_name: BTreeMap<String, &TableNode> = self
            .nodes
            .iter()
            .map(|node| (node.full_name(), node))
            .collect();
        let mut referenced_by: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for edge in &self.edges {
            if by_name.contains_key(&edge.source_table) && edge.source_table != edge.target_table {
                referenced_by
                    .entry(edge.target_table.as_str())
                    .or_default()
                    .push(edge.source_table.as_str());
            }
        }

        let mut renderer = TreeRenderer {
            by_name: &by_name,
            referenced_by: &referenced_by,
            shown: BTreeSet::new(),
            lines: Vec::new(),
        };

        let mut tops: Vec<&TableNode> = self.nodes.iter().filter(|node| node.is_root).collect();
        if tops.is_empty() {
            let sources: BTreeSet<&str> =
                self.edges.iter().map(|edge| edge.source_table.as_str()).collect();
            tops = self
                .nodes
                .iter()
                .filter(|node| !sources.contains(node.full_name().as_str()))
                .collect();
        }
        for node in tops {
            renderer.top(node);
        }
        // Whatever the roots do not reach, e.g. tables the seeds depend on.
        for node in &self.nodes {
            if !renderer.shown.contains(&node.full_name()) {
                renderer.top(node);
            }
        }

        if self.nodes.len() == 1 && self.edges.is_empty() {
            renderer.lines.push("    (No related tables)".to_string());
        }
        renderer.lines.join("\n")
    }
}

struct TreeRenderer<'g> {
    by_name: &'g BTreeMap<String, &'g TableNode>,
    referenced_by: &'g BTreeMap<&'g str, Vec<&'g str>>,
    shown: BTreeSet<String>,
    lines: Vec<String>,
}

impl TreeRenderer<'_> {
    fn top(&mut self, node: &TableNode) {
        let name = node.full_name();
        if self.shown.contains(&name) {
            return;
        }
        self.lines.push(label(node));
        self.shown.insert(name.clone());
        self.children(&name, "");
    }

    fn children(&mut self, name: &str, prefix: &str) {
        let referenced_by = self.referenced_by;
        let Some(sources) = referenced_by.get(name) else {
            return;
        };
        let count = sources.len();
        for (index, source) in sources.iter().enumerate() {
            let last = index + 1 == count;
            let connector = if last { "└── " } else { "├── " };
            let by_name = self.by_name;
            let Some(node) = by_name.get(*source) else {
                continue;
            };
            if self.shown.contains(*source) {
                self.lines
                    .push(format!("{prefix}{connector}{} [shown above]", label(node)));
                continue;
            }
            self.lines.push(format!("{prefix}{connector}{}", label(node)));
            self.shown.insert(source.to_string());
            let nested = format!("{prefix}{}", if last { "    " } else { "│   " });
            self.children(source, &nested);
        }
    }
}

fn label(node: &TableNode) -> String {
    format!("{} ({} records)", node.full_name(), node.record_count)
}
