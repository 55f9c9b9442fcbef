use kube::api::DynamicObject;
use kube::Client;
use std::time::Instant;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::apply::{self, AppliedAs};
use crate::bundle;
use crate::config::SyncConfig;
use crate::errors::SyncError;
use crate::hierarchy;
use crate::namespace;
use crate::resolve::DiscoverySnapshot;

/// Per-cycle counters. Recomputed every cycle, never persisted.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub entries: usize,
    pub applied: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl ReconcileOutcome {
    /// A cycle is degraded when anything failed, or when a non-empty bundle
    /// produced no applies at all (a bundle of only reference-only entries
    /// is fine).
    pub fn is_degraded(&self) -> bool {
        self.failed > 0 || (self.entries > 0 && self.applied == 0 && self.skipped == 0)
    }
}

/// Apply an already-sorted list of objects, strictly in order. One object's
/// failure is counted and the rest still run; a cancellation observed
/// between objects leaves the remainder for the next cycle.
pub async fn apply_all(
    target: &Client,
    snapshot: Option<&DiscoverySnapshot>,
    cfg: &SyncConfig,
    objects: Vec<DynamicObject>,
    shutdown: &CancellationToken,
) -> ReconcileOutcome {
    let mut outcome = ReconcileOutcome {
        entries: objects.len(),
        ..Default::default()
    };
    for obj in objects {
        if shutdown.is_cancelled() {
            info!("cancelled mid-cycle; leaving remaining objects for the next run");
            break;
        }
        let what = apply::display_name(&obj);
        match apply::apply_object(target, snapshot, cfg, obj).await {
            Ok(AppliedAs::Created) => {
                info!(object = %what, "created");
                outcome.applied += 1;
            }
            Ok(AppliedAs::Updated) => {
                info!(object = %what, "updated");
                outcome.applied += 1;
            }
            // dry-run logs the would-apply line itself
            Ok(AppliedAs::WouldApply) => outcome.applied += 1,
            Ok(AppliedAs::Skipped) => outcome.skipped += 1,
            Err(e) => {
                warn!(object = %what, error = %e, "apply failed");
                outcome.failed += 1;
            }
        }
    }
    outcome
}

/// One full cycle: fetch → ensure → sort → apply. Object-scoped errors are
/// folded into the outcome; only cycle-aborting errors surface as `Err`.
pub async fn run_cycle(
    source: &Client,
    target: &Client,
    cfg: &SyncConfig,
    shutdown: &CancellationToken,
) -> Result<ReconcileOutcome, SyncError> {
    let fetched = bundle::fetch_bundle(source, &cfg.bundle_namespace, &cfg.bundle_name).await?;
    let malformed = fetched.malformed;
    let partial = ReconcileOutcome {
        entries: fetched.entry_count(),
        failed: malformed,
        ..Default::default()
    };
    if fetched.entry_count() == 0 {
        debug!("bundle empty or absent; nothing to apply");
        return Ok(partial);
    }
    if shutdown.is_cancelled() {
        return Ok(partial);
    }
    if cfg.create_namespace {
        if cfg.dry_run {
            info!(namespace = %cfg.target_namespace, "would ensure target namespace (dry-run)");
        } else {
            namespace::ensure_namespace(target, &cfg.target_namespace).await?;
        }
        if shutdown.is_cancelled() {
            return Ok(partial);
        }
    }
    let mut objects = fetched.objects;
    hierarchy::sort_by_hierarchy(&mut objects);
    let snapshot = if cfg.dry_run {
        None
    } else {
        Some(DiscoverySnapshot::capture(target).await?)
    };
    let mut outcome = apply_all(target, snapshot.as_ref(), cfg, objects, shutdown).await;
    outcome.entries += malformed;
    outcome.failed += malformed;
    Ok(outcome)
}

/// Timer-driven loop: one eager cycle at startup, then one per tick. A tick
/// that lands mid-cycle queues behind it, so cycles never overlap. Cycle
/// failures are logged and the loop keeps going; only cancellation ends it.
pub async fn run_loop(
    source: &Client,
    target: &Client,
    cfg: &SyncConfig,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(cfg.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(
        interval_secs = cfg.interval.as_secs(),
        dry_run = cfg.dry_run,
        "sync loop started"
    );
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("sync loop stopped");
                return;
            }
            _ = ticker.tick() => {}
        }
        let started = Instant::now();
        match run_cycle(source, target, cfg, &shutdown).await {
            Ok(outcome) => {
                if outcome.is_degraded() {
                    warn!(
                        entries = outcome.entries,
                        applied = outcome.applied,
                        skipped = outcome.skipped,
                        failed = outcome.failed,
                        took_ms = %started.elapsed().as_millis(),
                        "cycle finished degraded"
                    );
                } else {
                    info!(
                        entries = outcome.entries,
                        applied = outcome.applied,
                        skipped = outcome.skipped,
                        failed = outcome.failed,
                        took_ms = %started.elapsed().as_millis(),
                        "cycle finished"
                    );
                }
            }
            Err(e) => warn!(error = %e, "cycle aborted; will retry on next tick"),
        }
        if shutdown.is_cancelled() {
            info!("sync loop stopped");
            return;
        }
    }
}
