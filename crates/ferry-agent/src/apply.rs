use kube::api::{DynamicObject, PostParams};
use kube::discovery::Scope;
use kube::{Api, Client, ResourceExt};
use tracing::{debug, info};

use crate::config::SyncConfig;
use crate::errors::SyncError;
use crate::resolve::{self, DiscoverySnapshot};

/// Objects in this group record bundle lineage for inspection; they are
/// never materialized on the target cluster.
pub const REFERENCE_ONLY_GROUP: &str = "lineage.ferry.dev";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppliedAs {
    Created,
    Updated,
    Skipped,
    WouldApply,
}

/// `Kind/namespace/name` (or `Kind/name` for cluster-scoped objects), for
/// log lines and error messages.
pub fn display_name(obj: &DynamicObject) -> String {
    let kind = obj
        .types
        .as_ref()
        .map(|t| t.kind.as_str())
        .filter(|k| !k.is_empty())
        .unwrap_or("<unknown>");
    match obj.namespace() {
        Some(ns) => format!("{kind}/{ns}/{}", obj.name_any()),
        None => format!("{kind}/{}", obj.name_any()),
    }
}

/// Remove everything the target API server assigns itself. Owner references
/// go unconditionally: they would dangle, pointing at objects that only
/// exist on the source cluster.
pub fn strip_server_fields(obj: &mut DynamicObject) {
    let meta = &mut obj.metadata;
    meta.resource_version = None;
    meta.uid = None;
    meta.generation = None;
    meta.creation_timestamp = None;
    meta.managed_fields = None;
    meta.owner_references = None;
}

/// Carry the live object's optimistic-concurrency identity into the desired
/// payload so a full replace is accepted.
pub fn adopt_server_identity(desired: &mut DynamicObject, live: &DynamicObject) {
    desired.metadata.resource_version = live.metadata.resource_version.clone();
    desired.metadata.uid = live.metadata.uid.clone();
}

/// Converge one object on the target cluster: create it if absent, replace
/// it if present. `snapshot` is `None` in dry-run, where the action is only
/// logged and no network call is made — not even the existence check.
pub async fn apply_object(
    target: &Client,
    snapshot: Option<&DiscoverySnapshot>,
    cfg: &SyncConfig,
    mut desired: DynamicObject,
) -> Result<AppliedAs, SyncError> {
    let what = display_name(&desired);
    let types = match desired.types.clone() {
        Some(t) if !t.kind.is_empty() => t,
        _ => return Err(SyncError::MissingKind(what)),
    };
    let gvk = resolve::gvk_of(&types);
    if gvk.group == REFERENCE_ONLY_GROUP {
        debug!(object = %what, "reference-only object, not materialized");
        return Ok(AppliedAs::Skipped);
    }
    let Some(snapshot) = snapshot else {
        info!(object = %what, "would apply (dry-run)");
        return Ok(AppliedAs::WouldApply);
    };
    let location = snapshot.resolve(&gvk)?;
    let api: Api<DynamicObject> = match location.scope {
        Scope::Cluster => Api::all_with(target.clone(), &location.resource),
        Scope::Namespaced => {
            let namespace = desired
                .namespace()
                .unwrap_or_else(|| cfg.target_namespace.clone());
            Api::namespaced_with(target.clone(), &namespace, &location.resource)
        }
    };
    let name = desired.name_any();
    match api.get(&name).await {
        Ok(live) => {
            adopt_server_identity(&mut desired, &live);
            api.replace(&name, &PostParams::default(), &desired)
                .await
                .map_err(|source| SyncError::Replace {
                    object: what,
                    source,
                })?;
            Ok(AppliedAs::Updated)
        }
        Err(kube::Error::Api(ae)) if ae.code == 404 => {
            strip_server_fields(&mut desired);
            api.create(&PostParams::default(), &desired)
                .await
                .map_err(|source| SyncError::Create {
                    object: what,
                    source,
                })?;
            Ok(AppliedAs::Created)
        }
        Err(source) => Err(SyncError::Get {
            object: what,
            source,
        }),
    }
}
