use kube::core::{GroupVersionKind, TypeMeta};
use kube::discovery::{ApiResource, Discovery, Scope};
use kube::Client;
use std::collections::HashMap;

use crate::errors::SyncError;

/// Resolved REST location for one API collection on the target cluster.
#[derive(Clone, Debug)]
pub struct TargetLocation {
    pub resource: ApiResource,
    pub scope: Scope,
}

/// Point-in-time view of the target cluster's API surface, captured once per
/// reconcile cycle and shared read-only across that cycle's objects. A kind
/// installed mid-cycle only resolves on the next capture.
pub struct DiscoverySnapshot {
    locations: HashMap<String, TargetLocation>,
}

impl DiscoverySnapshot {
    pub async fn capture(target: &Client) -> Result<Self, SyncError> {
        let discovery = Discovery::new(target.clone())
            .run()
            .await
            .map_err(SyncError::Discovery)?;
        let mut locations = HashMap::new();
        for group in discovery.groups() {
            for version in group.versions() {
                for (resource, caps) in group.versioned_resources(version) {
                    let gvk =
                        GroupVersionKind::gvk(&resource.group, &resource.version, &resource.kind);
                    locations.insert(
                        key(&gvk),
                        TargetLocation {
                            resource,
                            scope: caps.scope,
                        },
                    );
                }
            }
        }
        Ok(Self { locations })
    }

    /// Build a snapshot from already-known locations, so resolution can be
    /// exercised without a cluster.
    pub fn from_locations(locations: impl IntoIterator<Item = TargetLocation>) -> Self {
        Self {
            locations: locations
                .into_iter()
                .map(|location| {
                    let gvk = GroupVersionKind::gvk(
                        &location.resource.group,
                        &location.resource.version,
                        &location.resource.kind,
                    );
                    (key(&gvk), location)
                })
                .collect(),
        }
    }

    pub fn resolve(&self, gvk: &GroupVersionKind) -> Result<&TargetLocation, SyncError> {
        self.locations
            .get(&key(gvk))
            .ok_or_else(|| SyncError::UnknownKind(display_gvk(gvk)))
    }
}

/// Split a `TypeMeta` apiVersion into group/version; a bare version means
/// the core group.
pub fn gvk_of(types: &TypeMeta) -> GroupVersionKind {
    match types.api_version.split_once('/') {
        Some((group, version)) => GroupVersionKind::gvk(group, version, &types.kind),
        None => GroupVersionKind::gvk("", &types.api_version, &types.kind),
    }
}

fn key(gvk: &GroupVersionKind) -> String {
    format!("{}/{}/{}", gvk.group, gvk.version, gvk.kind)
}

fn display_gvk(gvk: &GroupVersionKind) -> String {
    if gvk.group.is_empty() {
        format!("{}/{}", gvk.kind, gvk.version)
    } else {
        format!("{}.{}/{}", gvk.kind, gvk.group, gvk.version)
    }
}
