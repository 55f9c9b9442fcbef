//! Cycle-level behavior against mocked source and target clusters: soft
//! bundle-miss handling, dry-run isolation, and per-object failure isolation.

use http::{Method, Request, Response, StatusCode};
use hyper::Body;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use kube::api::DynamicObject;
use kube::core::GroupVersionKind;
use kube::discovery::{ApiResource, Scope};
use kube::Client;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_test::mock::{self, Handle};

use ferry_agent::namespace::ensure_namespace;
use ferry_agent::resolve::{DiscoverySnapshot, TargetLocation};
use ferry_agent::sync::{apply_all, run_cycle, ReconcileOutcome};
use ferry_agent::SyncConfig;

fn mock_client() -> (Client, Handle<Request<Body>, Response<Body>>) {
    let (service, handle) = mock::pair::<Request<Body>, Response<Body>>();
    (Client::new(service, "default"), handle)
}

fn config(dry_run: bool) -> SyncConfig {
    SyncConfig {
        bundle_namespace: "ferry-system".to_string(),
        bundle_name: "bundle".to_string(),
        interval: Duration::from_secs(60),
        create_namespace: true,
        target_namespace: "default".to_string(),
        dry_run,
        output: None,
    }
}

fn json_response(status: StatusCode, body: Vec<u8>) -> Response<Body> {
    Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap()
}

fn status_404() -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "kind": "Status",
        "apiVersion": "v1",
        "metadata": {},
        "status": "Failure",
        "message": "not found",
        "reason": "NotFound",
        "code": 404,
    }))
    .unwrap()
}

fn bundle_secret(entries: &[(&str, &str)]) -> Vec<u8> {
    let data: BTreeMap<String, ByteString> = entries
        .iter()
        .map(|(key, manifest)| (key.to_string(), ByteString(manifest.as_bytes().to_vec())))
        .collect();
    let secret = Secret {
        metadata: kube::core::ObjectMeta {
            name: Some("bundle".to_string()),
            namespace: Some("ferry-system".to_string()),
            ..Default::default()
        },
        data: Some(data),
        ..Default::default()
    };
    serde_json::to_vec(&secret).unwrap()
}

/// Serve exactly one GET of the bundle Secret, then go quiet.
fn spawn_bundle_source(
    mut handle: Handle<Request<Body>, Response<Body>>,
    response: Response<Body>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let (req, send) = handle.next_request().await.expect("expected bundle fetch");
        assert_eq!(req.method(), Method::GET);
        assert_eq!(
            req.uri().path(),
            "/api/v1/namespaces/ferry-system/secrets/bundle"
        );
        send.send_response(response);
    })
}

#[tokio::test]
async fn missing_bundle_is_a_clean_noop_cycle() {
    let (source, source_handle) = mock_client();
    let (target, mut target_handle) = mock_client();
    let server = spawn_bundle_source(
        source_handle,
        json_response(StatusCode::NOT_FOUND, status_404()),
    );
    let cfg = config(false);
    let shutdown = CancellationToken::new();
    let outcome = run_cycle(&source, &target, &cfg, &shutdown).await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::default());
    assert!(!outcome.is_degraded());
    server.await.unwrap();
    drop(target);
    assert!(
        target_handle.next_request().await.is_none(),
        "target must not be contacted for an absent bundle"
    );
}

#[tokio::test]
async fn dry_run_cycle_never_contacts_the_target() {
    let (source, source_handle) = mock_client();
    let (target, mut target_handle) = mock_client();
    let body = bundle_secret(&[
        (
            "cm.yaml",
            "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: app-config\ndata:\n  k: v\n",
        ),
        (
            "export.yaml",
            "apiVersion: ferry.dev/v1alpha1\nkind: BundleExport\nmetadata:\n  name: exp\n",
        ),
    ]);
    let server = spawn_bundle_source(source_handle, json_response(StatusCode::OK, body));
    // create_namespace is on; dry-run must still not write anything
    let cfg = config(true);
    let shutdown = CancellationToken::new();
    let outcome = run_cycle(&source, &target, &cfg, &shutdown).await.unwrap();
    assert_eq!(
        outcome,
        ReconcileOutcome {
            entries: 2,
            applied: 2,
            skipped: 0,
            failed: 0,
        }
    );
    assert!(!outcome.is_degraded());
    server.await.unwrap();
    drop(target);
    assert!(
        target_handle.next_request().await.is_none(),
        "dry-run must not touch the target cluster"
    );
}

#[tokio::test]
async fn malformed_entries_are_counted_but_not_fatal() {
    let (source, source_handle) = mock_client();
    let (target, _target_handle) = mock_client();
    let body = bundle_secret(&[
        (
            "good.yaml",
            "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: good\n",
        ),
        ("broken.yaml", ":: not yaml {{{"),
    ]);
    let server = spawn_bundle_source(source_handle, json_response(StatusCode::OK, body));
    let cfg = config(true);
    let shutdown = CancellationToken::new();
    let outcome = run_cycle(&source, &target, &cfg, &shutdown).await.unwrap();
    assert_eq!(
        outcome,
        ReconcileOutcome {
            entries: 2,
            applied: 1,
            skipped: 0,
            failed: 1,
        }
    );
    assert!(outcome.is_degraded());
    server.await.unwrap();
}

#[tokio::test]
async fn one_failing_object_does_not_stop_its_siblings() {
    let (target, mut handle) = mock_client();
    let gvk = GroupVersionKind::gvk("example.dev", "v1", "Widget");
    let snapshot = DiscoverySnapshot::from_locations([TargetLocation {
        resource: ApiResource::from_gvk(&gvk),
        scope: Scope::Namespaced,
    }]);
    let objects: Vec<DynamicObject> = [
        "apiVersion: example.dev/v1\nkind: Widget\nmetadata:\n  name: widget-a\n  namespace: default\n",
        // permanently unknown kind on the target; must fail alone
        "apiVersion: example.dev/v1\nkind: Gadget\nmetadata:\n  name: gadget\n  namespace: default\n",
        "apiVersion: example.dev/v1\nkind: Widget\nmetadata:\n  name: widget-b\n  namespace: default\n",
    ]
    .iter()
    .map(|m| serde_yaml::from_str(m).unwrap())
    .collect();

    let server = tokio::spawn(async move {
        let mut created = Vec::new();
        while let Some((req, send)) = handle.next_request().await {
            if req.method() == Method::GET {
                send.send_response(json_response(StatusCode::NOT_FOUND, status_404()));
            } else if req.method() == Method::POST {
                let bytes = hyper::body::to_bytes(req.into_body()).await.unwrap();
                let sent: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
                created.push(sent["metadata"]["name"].as_str().unwrap().to_string());
                send.send_response(json_response(
                    StatusCode::CREATED,
                    serde_json::to_vec(&sent).unwrap(),
                ));
            } else {
                panic!("unexpected method {}", req.method());
            }
        }
        created
    });

    let cfg = config(false);
    let shutdown = CancellationToken::new();
    let outcome = apply_all(&target, Some(&snapshot), &cfg, objects, &shutdown).await;
    assert_eq!(
        outcome,
        ReconcileOutcome {
            entries: 3,
            applied: 2,
            skipped: 0,
            failed: 1,
        }
    );
    drop(target);
    let created = server.await.unwrap();
    assert_eq!(created, ["widget-a", "widget-b"], "both siblings applied in order");
}

#[tokio::test]
async fn cancellation_between_objects_stops_the_pass() {
    let (target, mut handle) = mock_client();
    let gvk = GroupVersionKind::gvk("example.dev", "v1", "Widget");
    let snapshot = DiscoverySnapshot::from_locations([TargetLocation {
        resource: ApiResource::from_gvk(&gvk),
        scope: Scope::Namespaced,
    }]);
    let objects: Vec<DynamicObject> = [
        "apiVersion: example.dev/v1\nkind: Widget\nmetadata:\n  name: widget-a\n  namespace: default\n",
        "apiVersion: example.dev/v1\nkind: Widget\nmetadata:\n  name: widget-b\n  namespace: default\n",
    ]
    .iter()
    .map(|m| serde_yaml::from_str(m).unwrap())
    .collect();

    let shutdown = CancellationToken::new();
    let cancel_after_first = shutdown.clone();
    let server = tokio::spawn(async move {
        let mut writes = 0usize;
        while let Some((req, send)) = handle.next_request().await {
            if req.method() == Method::GET {
                send.send_response(json_response(StatusCode::NOT_FOUND, status_404()));
            } else if req.method() == Method::POST {
                writes += 1;
                // the in-flight object completes; the next one must not start
                cancel_after_first.cancel();
                let bytes = hyper::body::to_bytes(req.into_body()).await.unwrap();
                send.send_response(json_response(StatusCode::CREATED, bytes.to_vec()));
            } else {
                panic!("unexpected method {}", req.method());
            }
        }
        writes
    });

    let cfg = config(false);
    let outcome = apply_all(&target, Some(&snapshot), &cfg, objects, &shutdown).await;
    assert_eq!(outcome.applied, 1);
    assert_eq!(outcome.failed, 0);
    drop(target);
    assert_eq!(server.await.unwrap(), 1, "exactly one object was written");
}

#[tokio::test]
async fn namespace_is_created_when_absent() {
    let (target, mut handle) = mock_client();
    let server = tokio::spawn(async move {
        let (req, send) = handle.next_request().await.expect("expected existence check");
        assert_eq!(req.method(), Method::GET);
        assert_eq!(req.uri().path(), "/api/v1/namespaces/workloads");
        send.send_response(json_response(StatusCode::NOT_FOUND, status_404()));
        let (req, send) = handle.next_request().await.expect("expected create");
        assert_eq!(req.method(), Method::POST);
        assert_eq!(req.uri().path(), "/api/v1/namespaces");
        let bytes = hyper::body::to_bytes(req.into_body()).await.unwrap();
        let sent: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(sent["metadata"]["name"], "workloads");
        send.send_response(json_response(StatusCode::CREATED, bytes.to_vec()));
    });
    let created = ensure_namespace(&target, "workloads").await.unwrap();
    assert!(created);
    server.await.unwrap();
}

#[tokio::test]
async fn namespace_already_present_is_a_noop() {
    let (target, mut handle) = mock_client();
    let server = tokio::spawn(async move {
        let (req, send) = handle.next_request().await.expect("expected existence check");
        assert_eq!(req.method(), Method::GET);
        let ns = serde_json::json!({
            "apiVersion": "v1",
            "kind": "Namespace",
            "metadata": { "name": "workloads" },
        });
        send.send_response(json_response(StatusCode::OK, serde_json::to_vec(&ns).unwrap()));
    });
    let created = ensure_namespace(&target, "workloads").await.unwrap();
    assert!(!created);
    server.await.unwrap();
    drop(target);
}

#[tokio::test]
async fn losing_the_namespace_create_race_is_success() {
    let (target, mut handle) = mock_client();
    let server = tokio::spawn(async move {
        let (_req, send) = handle.next_request().await.expect("expected existence check");
        send.send_response(json_response(StatusCode::NOT_FOUND, status_404()));
        let (_req, send) = handle.next_request().await.expect("expected create");
        let conflict = serde_json::json!({
            "kind": "Status",
            "apiVersion": "v1",
            "metadata": {},
            "status": "Failure",
            "message": "namespaces \"workloads\" already exists",
            "reason": "AlreadyExists",
            "code": 409,
        });
        send.send_response(json_response(
            StatusCode::CONFLICT,
            serde_json::to_vec(&conflict).unwrap(),
        ));
    });
    let created = ensure_namespace(&target, "workloads").await.unwrap();
    assert!(!created);
    server.await.unwrap();
}
