use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::record::{RecordData, RecordSet};

/// Diagnostic counts over the dependency sets of a record set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyStats {
    pub total_records: usize,
    pub records_with_deps: usize,
    pub max_dependencies: usize,
    pub avg_dependencies: f64,
}

/// Orders records so that every record follows the records it depends on.
#[derive(Debug, Clone, Copy, Default)]
pub struct DependencySorter;

impl DependencySorter {
    pub fn new() -> Self {
        Self
    }

    /// Kahn's algorithm over the induced subgraph of `records`.
    ///
    /// Dependencies outside the set are ignored. Records without a relative
    /// constraint keep their input order. Any cycle, including a record that
    /// depends on itself, is an error.
    pub fn sort(&self, records: &RecordSet) -> Result<Vec<RecordData>> {
        let count = records.len();
        let mut indegree = vec![0usize; count];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); count];

        for (index, record) in records.iter().enumerate() {
            for dependency in &record.dependencies {
                if dependency == &record.identifier {
                    return Err(Error::CircularDependency(vec![record.identifier.to_string()]));
                }
                if let Some(dep_index) = records.position(dependency) {
                    dependents[dep_index].push(index);
                    indegree[index] += 1;
                }
            }
        }

        let mut ready: BTreeSet<usize> = indegree
            .iter()
            .enumerate()
            .filter_map(|(index, degree)| (*degree == 0).then_some(index))
            .collect();
        let mut order = Vec::with_capacity(count);

        while let Some(index) = ready.pop_first() {
            order.push(index);
            for &dependent in &dependents[index] {
                indegree[dependent] = indegree[dependent].saturating_sub(1);
                if indegree[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        let all: Vec<&RecordData> = records.iter().collect();
        if order.len() < count {
            let mut cycle: Vec<String> = indegree
                .iter()
                .enumerate()
                .filter(|(_, degree)| **degree > 0)
                .map(|(index, _)| all[index].identifier.to_string())
                .collect();
            cycle.sort();
            return Err(Error::CircularDependency(cycle));
        }

        Ok(order.into_iter().map(|index| all[index].clone()).collect())
    }

    pub fn analyze_dependencies(&self, records: &RecordSet) -> DependencyStats {
        let counts: Vec<usize> = records
            .iter()
            .map(|record| record.dependencies.len())
            .collect();
        let total_records = counts.len();
        let total_dependencies: usize = counts.iter().sum();

        DependencyStats {
            total_records,
            records_with_deps: counts.iter().filter(|count| **count > 0).count(),
            max_dependencies: counts.iter().copied().max().unwrap_or(0),
            avg_dependencies: if total_records == 0 {
                0.0
            } else {
                total_dependencies as f64 / total_records as f64
            },
        }
    }
}

/// Table-level ordering; `cycle` lists the tables that could not be ordered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableOrder {
    pub order: Vec<String>,
    pub cycle: Vec<String>,
}

impl TableOrder {
    pub fn is_acyclic(&self) -> bool {
        self.cycle.is_empty()
    }

    /// Ordered tables followed by the cyclic remainder.
    pub fn into_full_order(self) -> Vec<String> {
        let mut order = self.order;
        order.extend(self.cycle);
        order
    }
}

/// Order tables given `referenced -> referencing` edges.
///
/// Self edges are ignored. Ties are broken by `rank`, then by name.
pub fn order_tables(
    graph: &BTreeMap<String, BTreeSet<String>>,
    rank: impl Fn(&str) -> usize,
) -> TableOrder {
    let mut indegree: BTreeMap<&str, usize> = BTreeMap::new();

    for (node, targets) in graph {
        indegree.entry(node.as_str()).or_insert(0);
        for target in targets {
            if target != node {
                *indegree.entry(target.as_str()).or_insert(0) += 1;
            }
        }
    }

    let mut ready: BTreeSet<(usize, &str)> = indegree
        .iter()
        .filter_map(|(node, count)| (*count == 0).then(|| (rank(node), *node)))
        .collect();

    let mut order = Vec::with_capacity(indegree.len());

    while let Some((_, node)) = ready.pop_first() {
        order.push(node.to_string());

        if let Some(targets) = graph.get(node) {
            for target in targets {
                if target == node {
                    continue;
                }
                if let Some(count) = indegree.get_mut(target.as_str()) {
                    *count = count.saturating_sub(1);
                    if *count == 0 {
                        ready.insert((rank(target), target.as_str()));
                    }
                }
            }
        }
    }

    let cycle = indegree
        .into_iter()
        .filter_map(|(node, count)| (count > 0).then(|| node.to_string()))
        .collect();

    TableOrder { order, cycle }
}
