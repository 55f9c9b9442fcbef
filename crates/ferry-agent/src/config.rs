use anyhow::{ensure, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::render::OutputFormat;

#[derive(clap::ValueEnum, Clone, Debug)]
pub enum LogFormat {
    Auto,
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(
    name = "ferry-agent",
    version,
    about = "Ferries a bundle of desired-state objects from a source cluster onto a target cluster"
)]
pub struct Cli {
    /// Kubeconfig for the source cluster (ambient config when omitted)
    #[arg(long, env = "FERRY_SOURCE_KUBECONFIG")]
    pub source_kubeconfig: Option<PathBuf>,
    /// Kubeconfig context for the source cluster
    #[arg(long, env = "FERRY_SOURCE_CONTEXT")]
    pub source_context: Option<String>,
    /// Kubeconfig for the target cluster (ambient config when omitted)
    #[arg(long, env = "FERRY_TARGET_KUBECONFIG")]
    pub target_kubeconfig: Option<PathBuf>,
    /// Kubeconfig context for the target cluster
    #[arg(long, env = "FERRY_TARGET_CONTEXT")]
    pub target_context: Option<String>,
    /// Namespace on the source cluster holding the bundle Secret
    #[arg(long, env = "FERRY_BUNDLE_NAMESPACE", default_value = "ferry-system")]
    pub bundle_namespace: String,
    /// Name of the bundle Secret
    #[arg(long, env = "FERRY_BUNDLE_NAME")]
    pub bundle_name: String,
    /// Seconds between reconcile cycles
    #[arg(long, env = "FERRY_INTERVAL_SECS", default_value_t = 60)]
    pub interval_secs: u64,
    /// Create the target namespace if it does not exist
    #[arg(long, env = "FERRY_CREATE_NAMESPACE", default_value_t = false)]
    pub create_namespace: bool,
    /// Fallback namespace on the target cluster for namespaced objects without one
    #[arg(long, env = "FERRY_TARGET_NAMESPACE", default_value = "default")]
    pub target_namespace: String,
    /// Log planned actions without writing to the target cluster
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
    /// Render the bundle to stdout instead of syncing (implies --dry-run)
    #[arg(long, short = 'o', value_enum)]
    pub output: Option<OutputFormat>,
    /// Log level: trace|debug|info|warn|error
    #[arg(long, default_value = "info")]
    pub log_level: String,
    /// Log format: auto|text|json
    #[arg(long, default_value = "auto", value_enum)]
    pub log_format: LogFormat,
}

/// Immutable-after-init sync configuration. Built once at startup from the
/// CLI surface and passed by reference into the engine; tests construct
/// their own instances directly.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub bundle_namespace: String,
    pub bundle_name: String,
    pub interval: Duration,
    pub create_namespace: bool,
    pub target_namespace: String,
    pub dry_run: bool,
    pub output: Option<OutputFormat>,
}

impl SyncConfig {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        ensure!(
            !cli.bundle_name.trim().is_empty(),
            "bundle name must not be empty"
        );
        ensure!(
            !cli.bundle_namespace.trim().is_empty(),
            "bundle namespace must not be empty"
        );
        ensure!(
            !cli.target_namespace.trim().is_empty(),
            "target namespace must not be empty"
        );
        ensure!(
            cli.interval_secs >= 1,
            "reconcile interval must be at least 1 second"
        );
        Ok(Self {
            bundle_namespace: cli.bundle_namespace.clone(),
            bundle_name: cli.bundle_name.clone(),
            interval: Duration::from_secs(cli.interval_secs),
            create_namespace: cli.create_namespace,
            target_namespace: cli.target_namespace.clone(),
            // an output format is only useful for inspection, so it forces dry-run
            dry_run: cli.dry_run || cli.output.is_some(),
            output: cli.output,
        })
    }
}
