use anyhow::Context;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use kube::api::DynamicObject;
use kube::{Api, Client};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::errors::SyncError;

/// Result of one bundle fetch: the entries that parsed, plus a count of the
/// ones that did not (they are logged and dropped, never fatal).
#[derive(Debug, Default)]
pub struct FetchedBundle {
    pub objects: Vec<DynamicObject>,
    pub malformed: usize,
}

impl FetchedBundle {
    pub fn entry_count(&self) -> usize {
        self.objects.len() + self.malformed
    }
}

/// Fetch the bundle Secret from the source cluster and parse its entries.
/// A missing bundle is a valid no-op state; only a transport failure
/// retrieving the Secret itself is an error.
pub async fn fetch_bundle(
    source: &Client,
    namespace: &str,
    name: &str,
) -> Result<FetchedBundle, SyncError> {
    let api: Api<Secret> = Api::namespaced(source.clone(), namespace);
    let secret = match api.get(name).await {
        Ok(s) => s,
        Err(kube::Error::Api(ae)) if ae.code == 404 => {
            debug!(namespace, name, "bundle not found; treating as empty");
            return Ok(FetchedBundle::default());
        }
        Err(e) => return Err(SyncError::BundleFetch(e)),
    };
    Ok(parse_entries(secret.data.unwrap_or_default()))
}

/// Deserialize each entry into a `DynamicObject`, dropping entries that are
/// not valid UTF-8 or not a parseable document. YAML parsing accepts JSON
/// payloads as well.
pub fn parse_entries(data: BTreeMap<String, ByteString>) -> FetchedBundle {
    let mut bundle = FetchedBundle::default();
    for (key, ByteString(bytes)) in data {
        match parse_entry(&bytes) {
            Ok(obj) => bundle.objects.push(obj),
            Err(err) => {
                warn!(key = %key, error = %err, "dropping malformed bundle entry");
                bundle.malformed += 1;
            }
        }
    }
    bundle
}

fn parse_entry(bytes: &[u8]) -> anyhow::Result<DynamicObject> {
    let text = std::str::from_utf8(bytes).context("entry is not UTF-8")?;
    serde_yaml::from_str(text).context("entry is not a valid object document")
}
