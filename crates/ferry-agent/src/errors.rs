use thiserror::Error;

/// Errors raised inside a reconcile cycle. Fetch, discovery and namespace
/// failures abort the cycle; the remaining variants are scoped to a single
/// object and never unwind past the apply pass.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("bundle fetch failed: {0}")]
    BundleFetch(#[source] kube::Error),
    #[error("discovery against the target cluster failed: {0}")]
    Discovery(#[source] kube::Error),
    #[error("ensuring namespace {name} failed: {source}")]
    NamespaceEnsure {
        name: String,
        #[source]
        source: kube::Error,
    },
    #[error("object {0} carries no kind")]
    MissingKind(String),
    #[error("target cluster has no mapping for {0}")]
    UnknownKind(String),
    #[error("get {object} failed: {source}")]
    Get {
        object: String,
        #[source]
        source: kube::Error,
    },
    #[error("create {object} failed: {source}")]
    Create {
        object: String,
        #[source]
        source: kube::Error,
    },
    #[error("replace {object} failed: {source}")]
    Replace {
        object: String,
        #[source]
        source: kube::Error,
    },
}
