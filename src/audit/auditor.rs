//! Stripe Auditor
//!
//! End-to-end audit of one stripe of one segment: download the shares, run
//! erasure verification, and turn accused piece numbers into the nodes that
//! served them.

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::audit::downloader::ShareDownloader;
use crate::domain::ports::ShareVerifier;
use crate::domain::segment::{Node, Pointer};
use crate::error::{Error, Result};
use crate::metrics::AuditMetrics;

/// Audits stripes and names the nodes whose shares were altered.
pub struct StripeAuditor {
    downloader: ShareDownloader,
    verifier: Arc<dyn ShareVerifier>,
    metrics: Arc<AuditMetrics>,
}

impl StripeAuditor {
    pub fn new(
        downloader: ShareDownloader,
        verifier: Arc<dyn ShareVerifier>,
        metrics: Arc<AuditMetrics>,
    ) -> Self {
        Self {
            downloader,
            verifier,
            metrics,
        }
    }

    /// Audit one stripe and return the nodes that served altered shares.
    ///
    /// The erasure parameters come from the pointer's redundancy scheme.
    /// Download failures of individual nodes are tolerated; a failed bulk
    /// lookup, unusable erasure parameters, or too few usable shares
    /// propagate as errors. No retries happen here; the caller owns that
    /// policy.
    #[instrument(skip(self, pointer, cancel), fields(pieces = pointer.pieces.len()))]
    pub async fn audit_stripe(
        &self,
        pointer: &Pointer,
        stripe_index: u64,
        cancel: &CancellationToken,
    ) -> Result<Vec<Node>> {
        self.metrics.audits_total.inc();
        let result = self.run(pointer, stripe_index, cancel).await;
        if result.is_err() {
            self.metrics.audit_failures_total.inc();
        }
        result
    }

    async fn run(
        &self,
        pointer: &Pointer,
        stripe_index: u64,
        cancel: &CancellationToken,
    ) -> Result<Vec<Node>> {
        let audit_id = Uuid::new_v4();

        let (shares, nodes) = self
            .downloader
            .download_stripe(pointer, stripe_index, cancel)
            .await?;

        let failed = shares.iter().filter(|s| s.is_failed()).count() as u64;
        self.metrics
            .shares_downloaded_total
            .inc_by(shares.len() as u64 - failed);
        self.metrics.share_download_failures_total.inc_by(failed);

        let accused_pieces = self.verifier.flag_altered(&pointer.redundancy, &shares)?;
        self.metrics
            .altered_shares_total
            .inc_by(accused_pieces.len() as u64);

        // Accusations are piece numbers; resolve them through the pointer's
        // piece list and the aligned node slice.
        let node_by_piece: HashMap<u32, &Node> = pointer
            .pieces
            .iter()
            .zip(nodes.iter())
            .filter_map(|(piece, node)| node.as_ref().map(|n| (piece.piece_number, n)))
            .collect();

        let mut bad_nodes = Vec::with_capacity(accused_pieces.len());
        for piece_number in &accused_pieces {
            let node = node_by_piece.get(piece_number).ok_or_else(|| {
                // Only downloaded shares can be accused, and a download
                // requires a resolved node.
                Error::Internal(format!(
                    "accused piece {} has no resolved node",
                    piece_number
                ))
            })?;
            bad_nodes.push((*node).clone());
        }

        info!(
            %audit_id,
            pieces = pointer.pieces.len(),
            failed_downloads = failed,
            accused = bad_nodes.len(),
            "stripe audit complete"
        );

        Ok(bad_nodes)
    }
}
