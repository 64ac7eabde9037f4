use std::io;

use anyhow::{Context, Result};

use liveconf::graph::write_dependency_graph;

use super::LoadedWorkspace;
use crate::cli::GlobalArgs;

pub fn execute(global: &GlobalArgs) -> Result<()> {
    let loaded = LoadedWorkspace::open(global)?;
    loaded.load_all()?;

    let stdout = io::stdout();
    let dump = write_dependency_graph(&loaded.workspace, &mut stdout.lock())
        .context("Failed to write dependency graph")?;

    if !dump.cycles.is_empty() {
        eprintln!("Dependency cycle: {}", join(&dump.cycles));
    }
    if !dump.unreachable.is_empty() {
        eprintln!("Not reachable from any root: {}", join(&dump.unreachable));
    }
    Ok(())
}

fn join(ids: &[liveconf::ResourceIdentifier]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
