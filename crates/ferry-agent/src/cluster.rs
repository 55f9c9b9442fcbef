use anyhow::{Context, Result};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use std::path::Path;
use tracing::debug;

use crate::resolve::DiscoverySnapshot;

/// Build a client for one cluster from an explicit kubeconfig/context pair,
/// falling back to the ambient configuration (env/in-cluster) when neither
/// is given.
pub async fn client_for(kubeconfig: Option<&Path>, context: Option<&str>) -> Result<Client> {
    let options = KubeConfigOptions {
        context: context.map(str::to_string),
        ..KubeConfigOptions::default()
    };
    let config = match kubeconfig {
        Some(path) => {
            let kc = Kubeconfig::read_from(path)
                .with_context(|| format!("read kubeconfig {}", path.display()))?;
            Config::from_custom_kubeconfig(kc, &options)
                .await
                .with_context(|| format!("interpret kubeconfig {}", path.display()))?
        }
        None if context.is_some() => Config::from_kubeconfig(&options)
            .await
            .context("load kubeconfig for requested context")?,
        None => Config::infer().await.context("infer cluster configuration")?,
    };
    Client::try_from(config).context("construct cluster client")
}

/// Startup reachability checks. Both clusters must answer a version probe and
/// the target must serve a discovery document before the loop is allowed to
/// start; anything wrong here is fatal.
pub async fn preflight(source: &Client, target: &Client) -> Result<()> {
    let version = source
        .apiserver_version()
        .await
        .context("source cluster unreachable")?;
    debug!(git_version = %version.git_version, "source cluster reachable");
    let version = target
        .apiserver_version()
        .await
        .context("target cluster unreachable")?;
    debug!(git_version = %version.git_version, "target cluster reachable");
    DiscoverySnapshot::capture(target)
        .await
        .context("target cluster discovery preflight failed")?;
    Ok(())
}
