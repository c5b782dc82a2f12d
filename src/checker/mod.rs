//! Injured Segment Checker
//!
//! Scans segment metadata for pieces whose owning nodes have dropped out of
//! routing, and queues segments for repair once the missing-piece count
//! reaches the segment's repair threshold.
//!
//! The checker judges *presence*, not content: a node the directory cannot
//! resolve is presumed to have taken its pieces with it. Content integrity
//! of reachable pieces is the [`audit`](crate::audit) pipeline's job.
//!
//! A pass is fail-fast. Metadata that does not deserialize, or a repair
//! queue that refuses an enqueue, aborts the scan whole; a pass that cannot
//! trust its own inputs should not keep going. Progress already made
//! (segments already enqueued) is retained.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use crate::domain::ports::{IterateScope, MetadataEntry, MetadataStore, NodeDirectory, RepairQueue};
use crate::domain::segment::{InjuredSegment, Pointer};
use crate::error::{Error, Result};
use crate::metrics::AuditMetrics;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the checker.
#[derive(Debug, Clone)]
pub struct CheckerConfig {
    /// Only metadata keys under this prefix are scanned.
    pub prefix: Bytes,
    /// Scan from this key onward (empty: from the edge of the prefix range).
    pub start: Bytes,
    /// Descend into nested keys.
    pub recurse: bool,
    /// Scan in descending key order.
    pub reverse: bool,
    /// Maximum entries visited per pass; the pass stops early once
    /// exhausted, even mid-listing.
    pub limit: u64,
    /// How often [`Checker::run`] triggers a pass.
    pub interval: Duration,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            prefix: Bytes::new(),
            start: Bytes::new(),
            recurse: true,
            reverse: false,
            limit: u64::MAX,
            interval: Duration::from_secs(30),
        }
    }
}

// =============================================================================
// Checker
// =============================================================================

/// Finds under-replicated segments and hands them to the repair queue.
pub struct Checker {
    store: Arc<dyn MetadataStore>,
    directory: Arc<dyn NodeDirectory>,
    queue: Arc<dyn RepairQueue>,
    config: CheckerConfig,
    metrics: Arc<AuditMetrics>,
}

impl Checker {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        directory: Arc<dyn NodeDirectory>,
        queue: Arc<dyn RepairQueue>,
        config: CheckerConfig,
        metrics: Arc<AuditMetrics>,
    ) -> Self {
        Self {
            store,
            directory,
            queue,
            config,
            metrics,
        }
    }

    /// One scan pass over the configured scope.
    ///
    /// Returns how many injured segments were enqueued. Cancellation between
    /// entries ends the pass cleanly with the progress made so far.
    #[instrument(skip_all)]
    pub async fn identify_injured_segments(&self, cancel: &CancellationToken) -> Result<u64> {
        self.metrics.checker_scans_total.inc();
        let result = self.scan(cancel).await;
        if result.is_err() {
            self.metrics.checker_scan_failures_total.inc();
        }
        result
    }

    async fn scan(&self, cancel: &CancellationToken) -> Result<u64> {
        let scan_id = Uuid::new_v4();
        let scope = IterateScope {
            prefix: self.config.prefix.clone(),
            start: self.config.start.clone(),
            recurse: self.config.recurse,
            reverse: self.config.reverse,
        };

        let mut entries = self.store.iterate(scope);
        let mut remaining = self.config.limit;
        let mut visited = 0u64;
        let mut enqueued = 0u64;

        while remaining > 0 {
            if cancel.is_cancelled() {
                debug!(%scan_id, visited, enqueued, "scan cancelled");
                break;
            }
            let Some(entry) = entries.next().await else {
                break;
            };
            let entry = entry?;
            remaining -= 1;
            visited += 1;
            self.metrics.segments_visited_total.inc();

            if self.check_entry(&entry).await? {
                enqueued += 1;
            }
        }

        info!(%scan_id, visited, enqueued, "scan complete");
        Ok(enqueued)
    }

    /// Inspect one metadata entry; true if it was enqueued for repair.
    async fn check_entry(&self, entry: &MetadataEntry) -> Result<bool> {
        let key = String::from_utf8_lossy(&entry.key).into_owned();

        let pointer: Pointer =
            serde_json::from_slice(&entry.value).map_err(|e| Error::Metadata {
                key: key.clone(),
                reason: e.to_string(),
            })?;
        pointer.validate().map_err(|e| Error::Metadata {
            key: key.clone(),
            reason: e.to_string(),
        })?;

        let lost_pieces = self.missing_pieces(&pointer).await?;

        if lost_pieces.len() < pointer.redundancy.repair_threshold {
            return Ok(false);
        }

        debug!(
            key = %key,
            missing = lost_pieces.len(),
            threshold = pointer.redundancy.repair_threshold,
            "segment injured"
        );

        self.queue
            .enqueue(InjuredSegment {
                path: key.clone(),
                lost_pieces,
                detected_at: Utc::now(),
            })
            .await
            .map_err(|e| match e {
                err @ Error::Enqueue { .. } => err,
                other => Error::Enqueue {
                    key,
                    reason: other.to_string(),
                },
            })?;

        self.metrics.injured_segments_enqueued_total.inc();
        Ok(true)
    }

    /// Piece numbers whose owning nodes the directory cannot resolve.
    ///
    /// One bulk round-trip for the whole pointer; a `None` in the response
    /// marks that piece as missing. The node's own claims are never
    /// consulted.
    async fn missing_pieces(&self, pointer: &Pointer) -> Result<Vec<u32>> {
        let node_ids = pointer.node_ids();
        let resolved = self.directory.bulk_lookup(&node_ids).await?;
        if resolved.len() != node_ids.len() {
            return Err(Error::Lookup(format!(
                "directory returned {} results for {} identifiers",
                resolved.len(),
                node_ids.len()
            )));
        }

        Ok(pointer
            .pieces
            .iter()
            .zip(resolved)
            .filter(|(_, node)| node.is_none())
            .map(|(piece, _)| piece.piece_number)
            .collect())
    }

    /// Periodic driver: scan on every tick until cancelled.
    ///
    /// Scan failures are logged and the next tick tries again; the pass is
    /// stateless and restartable.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(interval = ?self.config.interval, "checker starting");
        let mut tick = tokio::time::interval(self.config.interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("checker shutting down");
                    break;
                }
                _ = tick.tick() => {
                    match self.identify_injured_segments(&cancel).await {
                        Ok(enqueued) => debug!(enqueued, "checker pass complete"),
                        Err(e) => error!(error = %e, "checker pass failed"),
                    }
                }
            }
        }
    }
}
