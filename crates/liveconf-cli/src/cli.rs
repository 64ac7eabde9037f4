//! CLI argument definitions using clap derive API

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Keeps running resources in step with a directory of configuration files
#[derive(Parser, Debug)]
#[command(name = "liveconf")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Arguments available to all commands
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Settings file (default: <config dir>/liveconf/settings.yaml)
    #[arg(short, long, global = true, env = "LIVECONF_SETTINGS")]
    pub settings: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl GlobalArgs {
    /// The settings file to load.
    pub fn settings_path(&self) -> Option<PathBuf> {
        self.settings.clone().or_else(default_settings_path)
    }
}

/// Default settings location under the platform config directory.
pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("liveconf").join("settings.yaml"))
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load all resources, then reconcile on file changes until interrupted
    Watch(WatchArgs),

    /// Load all resources and print them in dependency order
    Status(StatusArgs),

    /// Load all resources and print the dependency graph
    Graph,
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Override the periodic cycle interval in seconds (0 disables it)
    #[arg(long)]
    pub poll_interval: Option<u64>,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Print the load report as JSON
    #[arg(long)]
    pub json: bool,
}
