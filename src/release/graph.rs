//! Processing order for local packages
//!
//! Builds a directed graph of manually declared dependencies between local
//! packages. A package is processed only after every local package it depends
//! on, so that its descriptor can reference their resolved versions.

use crate::core::error::{ConfigError, ConsistencyError, PublishError, PublishResult};
use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap};
use std::fmt;
use std::str::FromStr;

/// `dependent:dependency`, declared on the command line or in publish.toml
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct DependencyEdge {
    pub dependent: String,
    pub dependency: String,
}

impl FromStr for DependencyEdge {
    type Err = PublishError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || {
            PublishError::Config(ConfigError::InvalidValue {
                field: "add_package_as_dependency_to_package".to_string(),
                value: s.to_string(),
            })
        };

        let (dependent, dependency) = s.split_once(':').ok_or_else(invalid)?;
        let (dependent, dependency) = (dependent.trim(), dependency.trim());
        if dependent.is_empty() || dependency.is_empty() || dependency.contains(':') || dependent == dependency {
            return Err(invalid());
        }

        Ok(DependencyEdge {
            dependent: dependent.to_string(),
            dependency: dependency.to_string(),
        })
    }
}

impl fmt::Display for DependencyEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.dependent, self.dependency)
    }
}

/// Dependency graph over local packages
pub struct PackageGraph {
    graph: DiGraph<String, ()>,
    node_map: HashMap<String, NodeIndex>,
}

impl PackageGraph {
    /// Build the graph from packages in discovery order
    ///
    /// Edges point dependent -> dependency. Edges with an end that is not a
    /// local package are ignored.
    pub fn new(packages: &[String], edges: &[DependencyEdge]) -> Self {
        let mut graph = DiGraph::new();
        let mut node_map = HashMap::new();

        for name in packages {
            let idx = graph.add_node(name.clone());
            node_map.insert(name.clone(), idx);
        }

        for edge in edges {
            if let (Some(&from), Some(&to)) = (node_map.get(&edge.dependent), node_map.get(&edge.dependency)) {
                graph.update_edge(from, to, ());
            }
        }

        Self { graph, node_map }
    }

    /// Order in which packages are processed
    ///
    /// Among the packages whose dependencies are all processed, packages not
    /// in `deferred` go first, then discovery order.
    pub fn processing_order(&self, deferred: &BTreeSet<String>) -> PublishResult<Vec<String>> {
        if let Err(cycle) = toposort(&self.graph, None) {
            return Err(PublishError::Consistency(ConsistencyError::DependencyCycle {
                package: self.graph[cycle.node_id()].clone(),
            }));
        }

        // Outgoing edges are unprocessed dependencies
        let mut pending: Vec<usize> = self
            .graph
            .node_indices()
            .map(|idx| self.graph.neighbors_directed(idx, Direction::Outgoing).count())
            .collect();

        let priority = |idx: NodeIndex| Reverse((deferred.contains(&self.graph[idx]), idx.index()));

        let mut ready: BinaryHeap<_> = self
            .graph
            .node_indices()
            .filter(|idx| pending[idx.index()] == 0)
            .map(priority)
            .collect();

        let mut order = Vec::with_capacity(self.graph.node_count());
        while let Some(Reverse((_, index))) = ready.pop() {
            let idx = NodeIndex::new(index);
            order.push(self.graph[idx].clone());

            for dependent in self.graph.neighbors_directed(idx, Direction::Incoming) {
                pending[dependent.index()] -= 1;
                if pending[dependent.index()] == 0 {
                    ready.push(priority(dependent));
                }
            }
        }

        Ok(order)
    }

    /// Local packages `name` depends on
    pub fn dependencies_of(&self, name: &str) -> Vec<String> {
        let Some(&idx) = self.node_map.get(name) else {
            return Vec::new();
        };
        self.graph
            .neighbors_directed(idx, Direction::Outgoing)
            .map(|dep| self.graph[dep].clone())
            .collect()
    }
}
