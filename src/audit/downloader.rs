//! Share Downloader
//!
//! Fetches one share per remote piece for a single stripe. Piece owners are
//! resolved in one bulk directory round-trip, then downloads fan out as
//! bounded-concurrency tasks. Every per-node failure is captured on that
//! piece's share; nothing a single node does can abort its siblings.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::domain::ports::{NodeDirectory, PieceTransport};
use crate::domain::segment::{Node, PieceId, Pointer, Share};
use crate::error::{Error, Result};

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the share downloader.
#[derive(Debug, Clone)]
pub struct DownloaderConfig {
    /// Maximum piece downloads in flight at once.
    pub max_in_flight: usize,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self { max_in_flight: 8 }
    }
}

// =============================================================================
// Downloader
// =============================================================================

/// Downloads the shares of one stripe from the nodes a pointer names.
pub struct ShareDownloader {
    directory: Arc<dyn NodeDirectory>,
    transport: Arc<dyn PieceTransport>,
    config: DownloaderConfig,
}

impl ShareDownloader {
    pub fn new(directory: Arc<dyn NodeDirectory>, transport: Arc<dyn PieceTransport>) -> Self {
        Self::with_config(directory, transport, DownloaderConfig::default())
    }

    pub fn with_config(
        directory: Arc<dyn NodeDirectory>,
        transport: Arc<dyn PieceTransport>,
        config: DownloaderConfig,
    ) -> Self {
        Self {
            directory,
            transport,
            config,
        }
    }

    /// Download one share per piece at `stripe_index`.
    ///
    /// Returns shares and resolved nodes as parallel slices, both aligned to
    /// the pointer's piece-list order regardless of completion order. A node
    /// the directory cannot resolve yields `None` in the node slice and a
    /// failed share. The stripe index is trusted to be in range; a node
    /// rejecting the implied byte range surfaces as that share's error.
    ///
    /// Fatal errors are limited to an invalid pointer and a failed bulk
    /// lookup; everything else is per-share.
    #[instrument(skip(self, pointer, cancel), fields(pieces = pointer.pieces.len()))]
    pub async fn download_stripe(
        &self,
        pointer: &Pointer,
        stripe_index: u64,
        cancel: &CancellationToken,
    ) -> Result<(Vec<Share>, Vec<Option<Node>>)> {
        pointer.validate()?;

        let node_ids = pointer.node_ids();
        let nodes = self.directory.bulk_lookup(&node_ids).await?;
        if nodes.len() != node_ids.len() {
            return Err(Error::Lookup(format!(
                "directory returned {} results for {} identifiers",
                nodes.len(),
                node_ids.len()
            )));
        }

        let share_size = pointer.redundancy.share_size;
        let piece_size = pointer.redundancy.piece_size(pointer.size);
        let offset = stripe_index * share_size;

        let semaphore = Arc::new(Semaphore::new(self.config.max_in_flight));
        let mut tasks: JoinSet<(usize, Share)> = JoinSet::new();

        for (position, (piece, node)) in pointer.pieces.iter().zip(nodes.iter()).enumerate() {
            let piece_number = piece.piece_number;
            let node_id = piece.node_id.clone();
            let derived_id = pointer.piece_id.derive_for(&node_id);
            let node = node.clone();
            let transport = Arc::clone(&self.transport);
            let semaphore = Arc::clone(&semaphore);
            let cancel = cancel.clone();

            tasks.spawn(async move {
                let share = match node {
                    None => Share::failed(
                        piece_number,
                        Error::NodeUnresolved {
                            node_id: node_id.to_string(),
                        },
                    ),
                    Some(node) => {
                        let work = fetch_share(
                            transport,
                            semaphore,
                            node,
                            derived_id,
                            piece_number,
                            piece_size,
                            offset,
                            share_size,
                        );
                        tokio::select! {
                            // Checked first so an already-cancelled pass
                            // never starts new downloads.
                            biased;
                            _ = cancel.cancelled() => {
                                Share::failed(piece_number, Error::Cancelled)
                            }
                            result = work => match result {
                                Ok(share) => share,
                                Err(cause) => Share::failed(piece_number, cause),
                            },
                        }
                    }
                };
                (position, share)
            });
        }

        // Indexed slots keep the output aligned to the piece list no matter
        // which download finishes first.
        let mut slots: Vec<Option<Share>> = (0..pointer.pieces.len()).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            let (position, share) =
                joined.map_err(|e| Error::Internal(format!("download task failed: {}", e)))?;
            slots[position] = Some(share);
        }

        let shares: Vec<Share> = slots
            .into_iter()
            .map(|slot| slot.ok_or_else(|| Error::Internal("download slot left unfilled".into())))
            .collect::<Result<_>>()?;

        let failed = shares.iter().filter(|s| s.is_failed()).count();
        debug!(
            downloaded = shares.len() - failed,
            failed, "stripe download complete"
        );

        Ok((shares, nodes))
    }
}

/// Fetch one share from one node by dialing it and range-reading the
/// node-specific piece at the stripe offset.
#[allow(clippy::too_many_arguments)]
async fn fetch_share(
    transport: Arc<dyn PieceTransport>,
    semaphore: Arc<Semaphore>,
    node: Node,
    derived_id: PieceId,
    piece_number: u32,
    piece_size: u64,
    offset: u64,
    share_size: u64,
) -> Result<Share> {
    let _permit = semaphore
        .acquire_owned()
        .await
        .map_err(|_| Error::Internal("download semaphore closed".into()))?;

    let client = transport.dial(&node).await?;
    let reader = client.get(&derived_id, piece_size).await?;
    let data = reader.range(offset, share_size).await?;

    if data.len() != share_size as usize {
        return Err(Error::ShortRead {
            wanted: share_size as usize,
            got: data.len(),
        });
    }

    Ok(Share::downloaded(piece_number, data))
}
