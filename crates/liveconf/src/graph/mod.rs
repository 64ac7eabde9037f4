//! Dependency graph over the live resources of a workspace.
//!
//! Edges run from a dependency to its dependents, so a topological order
//! lists every resource after the resources it references.

pub mod inspector;

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::path::PathBuf;

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::Serialize;

use crate::error::GraphError;
use crate::resource::{ResourceIdentifier, ResourceState, ResourceStatus};

pub use inspector::{render, render_graph, write_dependency_graph, GraphDump, TEXT_PLAIN};

/// Strength of a dependency edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    Hard,
    Soft,
}

/// Read-only view of one resource and its edges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceNode {
    pub identifier: ResourceIdentifier,
    pub status: ResourceStatus,
    pub config_location: PathBuf,
    pub dependencies: Vec<ResourceIdentifier>,
    pub soft_dependencies: Vec<ResourceIdentifier>,
    /// Resources referencing this one, sorted by string form.
    pub dependents: Vec<ResourceIdentifier>,
}

/// Graph of resource states built from a workspace.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    graph: DiGraph<ResourceState, DependencyKind>,
    node_map: HashMap<ResourceIdentifier, NodeIndex>,
}

impl DependencyGraph {
    /// Builds the graph from resource states.
    ///
    /// References to resources that are not in `states` produce no edge; the
    /// referencing resource still declares them and is therefore not a root.
    pub fn from_states(states: impl IntoIterator<Item = ResourceState>) -> Self {
        let mut graph = DiGraph::new();
        let mut node_map = HashMap::new();

        for state in states {
            if node_map.contains_key(&state.identifier) {
                log::warn!("Duplicate resource {} ignored in graph", state.identifier);
                continue;
            }
            let identifier = state.identifier.clone();
            let idx = graph.add_node(state);
            node_map.insert(identifier, idx);
        }

        let mut edges = Vec::new();
        for idx in graph.node_indices() {
            let state = &graph[idx];
            let declared = state
                .dependencies
                .iter()
                .map(|d| (d, DependencyKind::Hard))
                .chain(
                    state
                        .soft_dependencies
                        .iter()
                        .map(|d| (d, DependencyKind::Soft)),
                );
            for (dependency, kind) in declared {
                match node_map.get(dependency) {
                    Some(&dep_idx) => edges.push((dep_idx, idx, kind)),
                    None => log::debug!(
                        "{} references missing resource {}",
                        state.identifier,
                        dependency
                    ),
                }
            }
        }
        for (from, to, kind) in edges {
            graph.add_edge(from, to, kind);
        }

        Self { graph, node_map }
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn contains(&self, identifier: &ResourceIdentifier) -> bool {
        self.node_map.contains_key(identifier)
    }

    /// All identifiers, sorted by string form.
    pub fn identifiers(&self) -> Vec<ResourceIdentifier> {
        let mut ids: Vec<ResourceIdentifier> = self.node_map.keys().cloned().collect();
        sort_identifiers(&mut ids);
        ids
    }

    pub fn state(&self, identifier: &ResourceIdentifier) -> Option<&ResourceState> {
        self.node_map.get(identifier).map(|&idx| &self.graph[idx])
    }

    pub fn node(&self, identifier: &ResourceIdentifier) -> Option<ResourceNode> {
        let &idx = self.node_map.get(identifier)?;
        let state = &self.graph[idx];
        Some(ResourceNode {
            identifier: state.identifier.clone(),
            status: state.status.clone(),
            config_location: state.config_location.clone(),
            dependencies: state.dependencies.clone(),
            soft_dependencies: state.soft_dependencies.clone(),
            dependents: self.dependents_of(idx),
        })
    }

    /// Direct dependents of `identifier`, sorted by string form.
    pub fn dependents(&self, identifier: &ResourceIdentifier) -> Vec<ResourceIdentifier> {
        self.node_map
            .get(identifier)
            .map(|&idx| self.dependents_of(idx))
            .unwrap_or_default()
    }

    fn dependents_of(&self, idx: NodeIndex) -> Vec<ResourceIdentifier> {
        let mut dependents: Vec<ResourceIdentifier> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| self.graph[e.target()].identifier.clone())
            .collect();
        sort_identifiers(&mut dependents);
        dependents.dedup();
        dependents
    }

    /// Resources declaring no hard and no soft dependency, sorted by string form.
    pub fn roots(&self) -> Vec<ResourceIdentifier> {
        let mut roots: Vec<ResourceIdentifier> = self
            .graph
            .node_weights()
            .filter(|s| s.dependencies.is_empty() && s.soft_dependencies.is_empty())
            .map(|s| s.identifier.clone())
            .collect();
        sort_identifiers(&mut roots);
        roots
    }

    /// Resources in dependency order, ties broken by string form.
    pub fn to_sorted_list(&self) -> Result<Vec<ResourceState>, GraphError> {
        let mut in_degree: HashMap<NodeIndex, usize> = self
            .graph
            .node_indices()
            .map(|idx| {
                (
                    idx,
                    self.graph.edges_directed(idx, Direction::Incoming).count(),
                )
            })
            .collect();

        let mut ready: BinaryHeap<Reverse<(String, NodeIndex)>> = in_degree
            .iter()
            .filter(|(_, &degree)| degree == 0)
            .map(|(&idx, _)| Reverse((self.graph[idx].identifier.to_string(), idx)))
            .collect();

        let mut sorted = Vec::with_capacity(self.graph.node_count());
        while let Some(Reverse((_, idx))) = ready.pop() {
            sorted.push(self.graph[idx].clone());
            for edge in self.graph.edges_directed(idx, Direction::Outgoing) {
                let target = edge.target();
                if let Some(degree) = in_degree.get_mut(&target) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push(Reverse((
                            self.graph[target].identifier.to_string(),
                            target,
                        )));
                    }
                }
            }
        }

        if sorted.len() < self.graph.node_count() {
            return Err(GraphError::Cycle {
                members: self.cycle_members(),
            });
        }
        Ok(sorted)
    }

    /// Identifiers of every resource on a dependency cycle, sorted.
    pub fn cycle_members(&self) -> Vec<ResourceIdentifier> {
        let mut members: Vec<ResourceIdentifier> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1
                    || component
                        .first()
                        .map(|&idx| self.graph.contains_edge(idx, idx))
                        .unwrap_or(false)
            })
            .flatten()
            .map(|idx| self.graph[idx].identifier.clone())
            .collect();
        sort_identifiers(&mut members);
        members
    }
}

/// Sorts identifiers by their `kind/id` string form.
pub(crate) fn sort_identifiers(ids: &mut [ResourceIdentifier]) {
    ids.sort_by_cached_key(|id| id.to_string());
}
