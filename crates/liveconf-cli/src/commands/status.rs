use anyhow::{bail, Context, Result};

use liveconf::{DependencyGraph, GraphError, ResourceState};

use super::LoadedWorkspace;
use crate::cli::{GlobalArgs, StatusArgs};

pub fn execute(args: &StatusArgs, global: &GlobalArgs) -> Result<()> {
    let loaded = LoadedWorkspace::open(global)?;
    let report = loaded.load_all()?;

    if args.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
        println!("{}", json);
    } else {
        for state in ordered_states(&loaded.workspace.dependency_graph()) {
            println!("{:<48} {}", state.identifier.to_string(), state.status);
        }
        println!();
        print!("{}", report.audit());
    }

    if !report.is_clean() {
        bail!(
            "{} files and {} pools were not reconciled",
            report.unreconciled().len(),
            report.failed_pools().len()
        );
    }
    Ok(())
}

/// Dependencies first; on a cycle, falls back to identifier order.
fn ordered_states(graph: &DependencyGraph) -> Vec<ResourceState> {
    match graph.to_sorted_list() {
        Ok(states) => states,
        Err(GraphError::Cycle { members }) => {
            log::warn!(
                "Dependency cycle among {} resources, listing by identifier",
                members.len()
            );
            graph
                .identifiers()
                .iter()
                .filter_map(|id| graph.state(id).cloned())
                .collect()
        }
    }
}
