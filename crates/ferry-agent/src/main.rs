//! Binary entrypoint for the ferry sync agent.
use anyhow::Context;
use clap::Parser;
use ferry_agent::config::{Cli, SyncConfig};
use ferry_agent::{bundle, cluster, logging, render, sync};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_logging(&cli.log_level, &cli.log_format)?;
    let cfg = SyncConfig::from_cli(&cli).context("invalid configuration")?;
    let source = cluster::client_for(cli.source_kubeconfig.as_deref(), cli.source_context.as_deref())
        .await
        .context("build source cluster client")?;

    // Inspection mode: fetch once, render to stdout, done. The target
    // cluster is never contacted on this path.
    if let Some(format) = cfg.output {
        let fetched = bundle::fetch_bundle(&source, &cfg.bundle_namespace, &cfg.bundle_name).await?;
        info!(
            entries = fetched.entry_count(),
            malformed = fetched.malformed,
            "rendering bundle"
        );
        let stdout = std::io::stdout();
        render::render_bundle(fetched.objects, format, &mut stdout.lock())?;
        return Ok(());
    }

    let target = cluster::client_for(cli.target_kubeconfig.as_deref(), cli.target_context.as_deref())
        .await
        .context("build target cluster client")?;
    cluster::preflight(&source, &target).await?;

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received Ctrl+C, finishing in-flight operation before exit");
            signal.cancel();
        }
    });

    sync::run_loop(&source, &target, &cfg, shutdown).await;
    Ok(())
}
