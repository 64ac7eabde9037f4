//! Text dump of the resource dependency graph.
//!
//! Each root (a resource with no hard or soft dependency) starts a block;
//! its dependents follow depth-first, indented two spaces per level:
//!
//! ```text
//! jdbc/conn1 [initialized]
//!   feature/roads [initialized]
//!     layer/roads [error]
//!
//! style/default [deactivated]
//!
//! ```

use std::collections::HashSet;
use std::fmt::Write as _;
use std::io;

use serde::Serialize;

use crate::resource::ResourceIdentifier;
use crate::workspace::Workspace;

use super::DependencyGraph;

/// Content type of the rendered dump.
pub const TEXT_PLAIN: &str = "text/plain";

const INDENT: &str = "  ";

/// Rendered dump plus the structural problems found while rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphDump {
    pub text: String,
    /// Resources on a dependency cycle; traversal does not re-enter them.
    pub cycles: Vec<ResourceIdentifier>,
    /// Resources not reachable from any root.
    pub unreachable: Vec<ResourceIdentifier>,
}

impl GraphDump {
    pub fn content_type(&self) -> &'static str {
        TEXT_PLAIN
    }

    pub fn has_problems(&self) -> bool {
        !self.cycles.is_empty() || !self.unreachable.is_empty()
    }
}

/// Renders the live graph of `workspace`.
///
/// Reads manager states without coordinating with a running cycle.
pub fn render(workspace: &Workspace) -> GraphDump {
    render_graph(&workspace.dependency_graph())
}

pub fn render_graph(graph: &DependencyGraph) -> GraphDump {
    let mut text = String::new();
    let mut visited = HashSet::new();
    let mut path = HashSet::new();

    for root in graph.roots() {
        render_node(graph, &root, 0, &mut text, &mut path, &mut visited);
        text.push('\n');
    }

    let cycles = graph.cycle_members();
    if !cycles.is_empty() {
        log::warn!(
            "Dependency cycle among {} resources: {}",
            cycles.len(),
            join(&cycles)
        );
    }

    let unreachable: Vec<ResourceIdentifier> = graph
        .identifiers()
        .into_iter()
        .filter(|id| !visited.contains(id))
        .collect();
    if !unreachable.is_empty() {
        log::debug!("Not reachable from any root: {}", join(&unreachable));
    }

    GraphDump {
        text,
        cycles,
        unreachable,
    }
}

fn render_node(
    graph: &DependencyGraph,
    identifier: &ResourceIdentifier,
    depth: usize,
    out: &mut String,
    path: &mut HashSet<ResourceIdentifier>,
    visited: &mut HashSet<ResourceIdentifier>,
) {
    let status = graph
        .state(identifier)
        .map(|s| s.status.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let _ = writeln!(out, "{}{} [{}]", INDENT.repeat(depth), identifier, status);

    visited.insert(identifier.clone());
    path.insert(identifier.clone());
    for dependent in graph.dependents(identifier) {
        if path.contains(&dependent) {
            log::warn!(
                "Skipping {} below {}: dependency cycle",
                dependent,
                identifier
            );
            continue;
        }
        render_node(graph, &dependent, depth + 1, out, path, visited);
    }
    path.remove(identifier);
}

/// Writes the dump of `workspace` to `sink` as plain text.
pub fn write_dependency_graph<W: io::Write>(
    workspace: &Workspace,
    sink: &mut W,
) -> io::Result<GraphDump> {
    let dump = render(workspace);
    sink.write_all(dump.text.as_bytes())?;
    sink.flush()?;
    Ok(dump)
}

fn join(ids: &[ResourceIdentifier]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{ResourceState, ResourceStatus};

    fn state(kind: &str, id: &str, deps: &[&str], status: ResourceStatus) -> ResourceState {
        let mut state = ResourceState::new(
            ResourceIdentifier::new(kind, id),
            format!("/ws/{}.xml", id),
            status,
        );
        state.dependencies = deps
            .iter()
            .map(|d| d.parse().unwrap())
            .collect();
        state
    }

    #[test]
    fn test_roots_with_dependents() {
        let graph = DependencyGraph::from_states(vec![
            state("r", "Y", &[], ResourceStatus::Initialized),
            state("r", "Z", &["r/X"], ResourceStatus::Initialized),
            state("r", "X", &[], ResourceStatus::Initialized),
        ]);

        let dump = render_graph(&graph);

        assert_eq!(
            dump.text,
            "r/X [initialized]\n  r/Z [initialized]\n\nr/Y [initialized]\n\n"
        );
        assert!(!dump.has_problems());
    }

    #[test]
    fn test_nested_indentation_and_status() {
        let graph = DependencyGraph::from_states(vec![
            state("jdbc", "conn1", &[], ResourceStatus::Initialized),
            state("feature", "roads", &["jdbc/conn1"], ResourceStatus::Initialized),
            state(
                "layer",
                "roads",
                &["feature/roads"],
                ResourceStatus::Error("bad style".into()),
            ),
            state("style", "default", &[], ResourceStatus::Deactivated),
        ]);

        let dump = render_graph(&graph);

        assert_eq!(
            dump.text,
            "jdbc/conn1 [initialized]\n  feature/roads [initialized]\n    layer/roads [error]\n\nstyle/default [deactivated]\n\n"
        );
    }

    #[test]
    fn test_empty_graph() {
        let dump = render_graph(&DependencyGraph::default());
        assert!(dump.text.is_empty());
        assert_eq!(dump.content_type(), TEXT_PLAIN);
    }

    #[test]
    fn test_cycle_terminates_and_is_reported() {
        // a and b reference each other; a also references root r.
        let graph = DependencyGraph::from_states(vec![
            state("k", "r", &[], ResourceStatus::Initialized),
            state("k", "a", &["k/r", "k/b"], ResourceStatus::Initialized),
            state("k", "b", &["k/a"], ResourceStatus::Initialized),
        ]);

        let dump = render_graph(&graph);

        assert_eq!(
            dump.text,
            "k/r [initialized]\n  k/a [initialized]\n    k/b [initialized]\n\n"
        );
        assert_eq!(
            dump.cycles,
            vec![ResourceIdentifier::new("k", "a"), ResourceIdentifier::new("k", "b")]
        );
        assert!(dump.unreachable.is_empty());
    }

    #[test]
    fn test_unreachable_resources_reported() {
        let graph = DependencyGraph::from_states(vec![state(
            "feature",
            "roads",
            &["jdbc/missing"],
            ResourceStatus::Initialized,
        )]);

        let dump = render_graph(&graph);

        assert!(dump.text.is_empty());
        assert_eq!(
            dump.unreachable,
            vec![ResourceIdentifier::new("feature", "roads")]
        );
    }
}
