use k8s_openapi::api::core::v1::Namespace;
use kube::api::PostParams;
use kube::core::ObjectMeta;
use kube::{Api, Client};
use tracing::{debug, info};

use crate::errors::SyncError;

/// Idempotent existence check: create the namespace when it is missing,
/// treat a lost create race as success. Returns whether a create happened.
pub async fn ensure_namespace(target: &Client, name: &str) -> Result<bool, SyncError> {
    let api: Api<Namespace> = Api::all(target.clone());
    match api.get(name).await {
        Ok(_) => {
            debug!(namespace = name, "target namespace present");
            Ok(false)
        }
        Err(kube::Error::Api(ae)) if ae.code == 404 => {
            let ns = Namespace {
                metadata: ObjectMeta {
                    name: Some(name.to_string()),
                    ..Default::default()
                },
                ..Default::default()
            };
            match api.create(&PostParams::default(), &ns).await {
                Ok(_) => {
                    info!(namespace = name, "created target namespace");
                    Ok(true)
                }
                // someone else won the race; that is still the desired state
                Err(kube::Error::Api(ae)) if ae.code == 409 => Ok(false),
                Err(source) => Err(SyncError::NamespaceEnsure {
                    name: name.to_string(),
                    source,
                }),
            }
        }
        Err(source) => Err(SyncError::NamespaceEnsure {
            name: name.to_string(),
            source,
        }),
    }
}
