//! VeriStor Integration Tests
//!
//! Exercises both pipelines end to end over the in-memory adapters:
//! - Audit: stripe download, verification, node accusation
//! - Checker: metadata scan, presence lookup, repair enqueueing

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use veristor::adapters::{
    MemoryMetadataStore, MemoryPieceNetwork, MemoryRepairQueue, StaticNodeDirectory,
};
use veristor::{
    AuditMetrics, Checker, CheckerConfig, Node, NodeId, PieceId, Pointer, RedundancyScheme,
    ReedSolomonVerifier, RemotePiece, ShareDownloader, StripeAuditor,
};

/// Build a pointer for a segment spread across `total` nodes named
/// `<name>-node-{n}`, seed the piece network with its honest encoding, and
/// resolve every node in the directory.
fn seed_segment(
    name: &str,
    scheme: RedundancyScheme,
    stripes: u64,
    directory: &StaticNodeDirectory,
    network: &MemoryPieceNetwork,
) -> Pointer {
    let pointer = Pointer {
        piece_id: PieceId::from_content(name.as_bytes()),
        size: stripes * scheme.stripe_size(),
        redundancy: scheme,
        pieces: (0..scheme.total as u32)
            .map(|n| RemotePiece::new(n, format!("{name}-node-{n}")))
            .collect(),
    };

    let segment: Vec<u8> = (0..pointer.size).map(|i| (i % 239) as u8).collect();
    network.seed_segment(&pointer, &segment).unwrap();

    for piece in &pointer.pieces {
        directory.insert(Node::new(
            piece.node_id.as_str(),
            format!("{}.storage.test:7777", piece.node_id),
        ));
    }
    pointer
}

fn auditor(directory: Arc<StaticNodeDirectory>, network: Arc<MemoryPieceNetwork>) -> StripeAuditor {
    StripeAuditor::new(
        ShareDownloader::new(directory, network),
        Arc::new(ReedSolomonVerifier::new()),
        Arc::new(AuditMetrics::detached().unwrap()),
    )
}

// =============================================================================
// Audit Pipeline Tests
// =============================================================================

mod audit_tests {
    use super::*;

    /// 3-of-5, 1 KiB shares, node at piece 2 returns tampered bytes: the
    /// audit accuses exactly that node.
    #[tokio::test]
    async fn test_tampered_node_is_accused() {
        let directory = Arc::new(StaticNodeDirectory::new());
        let network = Arc::new(MemoryPieceNetwork::new());
        let scheme = RedundancyScheme::new(3, 5, 1024, 2);
        let pointer = seed_segment("audited", scheme, 4, &directory, &network);

        let bad_node = NodeId::new("audited-node-2");
        let derived = pointer.piece_id.derive_for(&bad_node);
        network.corrupt_piece(&bad_node, &derived, 10);

        let auditor = auditor(directory, network);
        let accused = auditor
            .audit_stripe(&pointer, 0, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(accused.len(), 1);
        assert_eq!(accused[0].id, bad_node);
    }

    /// An honest network survives a full sweep of every stripe without a
    /// single accusation.
    #[tokio::test]
    async fn test_honest_network_passes_every_stripe() {
        let directory = Arc::new(StaticNodeDirectory::new());
        let network = Arc::new(MemoryPieceNetwork::new());
        let scheme = RedundancyScheme::new(3, 5, 256, 2);
        let pointer = seed_segment("healthy", scheme, 8, &directory, &network);

        let auditor = auditor(directory, network);
        let cancel = CancellationToken::new();
        for stripe_index in 0..pointer.redundancy.stripe_count(pointer.size) {
            let accused = auditor
                .audit_stripe(&pointer, stripe_index, &cancel)
                .await
                .unwrap();
            assert!(accused.is_empty(), "stripe {stripe_index} accused someone");
        }
    }

    /// Offline nodes degrade the audit but never show up as accused.
    #[tokio::test]
    async fn test_unreachable_nodes_are_tolerated_not_accused() {
        let directory = Arc::new(StaticNodeDirectory::new());
        let network = Arc::new(MemoryPieceNetwork::new());
        let scheme = RedundancyScheme::new(3, 6, 512, 2);
        let pointer = seed_segment("degraded", scheme, 2, &directory, &network);

        network.set_unreachable(&NodeId::new("degraded-node-0"), true);
        let tampered = NodeId::new("degraded-node-5");
        let derived = pointer.piece_id.derive_for(&tampered);
        network.corrupt_piece(&tampered, &derived, 0);

        let auditor = auditor(directory, network);
        let accused = auditor
            .audit_stripe(&pointer, 0, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(accused.len(), 1);
        assert_eq!(accused[0].id, tampered);
    }

    /// The metrics context sees the pass.
    #[tokio::test]
    async fn test_audit_metrics_are_incremented() {
        let directory = Arc::new(StaticNodeDirectory::new());
        let network = Arc::new(MemoryPieceNetwork::new());
        let scheme = RedundancyScheme::new(2, 4, 128, 2);
        let pointer = seed_segment("measured", scheme, 1, &directory, &network);

        let metrics = Arc::new(AuditMetrics::detached().unwrap());
        let auditor = StripeAuditor::new(
            ShareDownloader::new(directory, network),
            Arc::new(ReedSolomonVerifier::new()),
            metrics.clone(),
        );
        auditor
            .audit_stripe(&pointer, 0, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(metrics.audits_total.get(), 1);
        assert_eq!(metrics.shares_downloaded_total.get(), 4);
        assert_eq!(metrics.share_download_failures_total.get(), 0);
    }
}

// =============================================================================
// Checker Pipeline Tests
// =============================================================================

mod checker_tests {
    use super::*;

    fn checker(
        store: Arc<MemoryMetadataStore>,
        directory: Arc<StaticNodeDirectory>,
        queue: Arc<MemoryRepairQueue>,
        config: CheckerConfig,
    ) -> Checker {
        Checker::new(
            store,
            directory,
            queue,
            config,
            Arc::new(AuditMetrics::detached().unwrap()),
        )
    }

    /// Two of four piece owners gone with threshold two: the segment is
    /// enqueued naming exactly the lost pieces.
    #[tokio::test]
    async fn test_injured_segment_reaches_the_queue() {
        let store = Arc::new(MemoryMetadataStore::new());
        let directory = Arc::new(StaticNodeDirectory::new());
        let queue = Arc::new(MemoryRepairQueue::new());

        let pointer = Pointer {
            piece_id: PieceId::from_content(b"seg/hurt"),
            size: 8192,
            redundancy: RedundancyScheme::new(2, 4, 1024, 2),
            pieces: (0..4)
                .map(|n| RemotePiece::new(n, format!("hurt-node-{n}")))
                .collect(),
        };
        store.put_pointer(&b"seg/hurt"[..], &pointer).unwrap();
        // Only nodes 0 and 2 still resolve.
        for n in [0, 2] {
            directory.insert(Node::new(format!("hurt-node-{n}"), "addr:7777"));
        }

        let checker = checker(store, directory, queue.clone(), CheckerConfig::default());
        let enqueued = checker
            .identify_injured_segments(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(enqueued, 1);
        let segments = queue.drain();
        assert_eq!(segments[0].path, "seg/hurt");
        assert_eq!(segments[0].lost_pieces, vec![1, 3]);
    }

    /// The periodic driver keeps scanning until cancelled.
    #[tokio::test]
    async fn test_periodic_run_enqueues_and_stops() {
        let store = Arc::new(MemoryMetadataStore::new());
        let directory = Arc::new(StaticNodeDirectory::new());
        let queue = Arc::new(MemoryRepairQueue::new());

        let pointer = Pointer {
            piece_id: PieceId::from_content(b"seg/periodic"),
            size: 4096,
            redundancy: RedundancyScheme::new(2, 4, 512, 1),
            pieces: (0..4)
                .map(|n| RemotePiece::new(n, format!("periodic-node-{n}")))
                .collect(),
        };
        store.put_pointer(&b"seg/periodic"[..], &pointer).unwrap();
        // No node resolves: all four pieces count as lost.

        let checker = Arc::new(checker(
            store,
            directory,
            queue.clone(),
            CheckerConfig {
                interval: Duration::from_millis(10),
                ..Default::default()
            },
        ));

        let cancel = CancellationToken::new();
        let handle = {
            let checker = checker.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { checker.run(cancel).await })
        };

        tokio::time::sleep(Duration::from_millis(60)).await;
        cancel.cancel();
        handle.await.unwrap();

        let segments = queue.drain();
        assert!(!segments.is_empty());
        assert!(segments
            .iter()
            .all(|s| s.lost_pieces == vec![0, 1, 2, 3] && s.path == "seg/periodic"));
    }

    /// A scan bounded by limit leaves later entries unvisited even when they
    /// are injured too.
    #[tokio::test]
    async fn test_limit_stops_mid_keyspace() {
        let store = Arc::new(MemoryMetadataStore::new());
        let directory = Arc::new(StaticNodeDirectory::new());
        let queue = Arc::new(MemoryRepairQueue::new());

        for n in 0..6 {
            let key = format!("seg/{n}");
            let pointer = Pointer {
                piece_id: PieceId::from_content(key.as_bytes()),
                size: 1024,
                redundancy: RedundancyScheme::new(2, 4, 128, 1),
                pieces: (0..4)
                    .map(|p| RemotePiece::new(p, format!("{key}-node-{p}")))
                    .collect(),
            };
            store.put_pointer(key.as_bytes(), &pointer).unwrap();
        }

        let checker = checker(
            store,
            directory,
            queue.clone(),
            CheckerConfig {
                limit: 3,
                ..Default::default()
            },
        );
        let enqueued = checker
            .identify_injured_segments(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(enqueued, 3);
        assert_eq!(queue.len(), 3);
    }
}

// =============================================================================
// Cross-Pipeline Tests
// =============================================================================

mod pipeline_tests {
    use super::*;

    /// The two pipelines watch different signals: a tampering node trips the
    /// audit but not the checker; a vanished node trips the checker but not
    /// the audit.
    #[tokio::test]
    async fn test_corruption_and_absence_are_separate_signals() {
        let directory = Arc::new(StaticNodeDirectory::new());
        let network = Arc::new(MemoryPieceNetwork::new());
        let store = Arc::new(MemoryMetadataStore::new());
        let queue = Arc::new(MemoryRepairQueue::new());

        let scheme = RedundancyScheme::new(3, 6, 256, 1);
        let pointer = seed_segment("both", scheme, 2, &directory, &network);
        store.put_pointer(&b"seg/both"[..], &pointer).unwrap();

        // Node 1 tampers; node 4 vanishes from routing.
        let tampering = NodeId::new("both-node-1");
        let derived = pointer.piece_id.derive_for(&tampering);
        network.corrupt_piece(&tampering, &derived, 3);
        let vanished = NodeId::new("both-node-4");
        directory.remove(&vanished);

        let cancel = CancellationToken::new();

        let auditor = auditor(directory.clone(), network);
        let accused = auditor.audit_stripe(&pointer, 0, &cancel).await.unwrap();
        assert_eq!(accused.len(), 1);
        assert_eq!(accused[0].id, tampering);

        let checker = Checker::new(
            store,
            directory,
            queue.clone(),
            CheckerConfig::default(),
            Arc::new(AuditMetrics::detached().unwrap()),
        );
        let enqueued = checker.identify_injured_segments(&cancel).await.unwrap();
        assert_eq!(enqueued, 1);

        let segments = queue.drain();
        // The checker flags only the vanished node's piece; the tampering
        // node still resolves and is the audit's problem.
        assert_eq!(segments[0].lost_pieces, vec![4]);
    }

    /// Pointer metadata written by one pipeline run deserializes bit-exact
    /// for the next.
    #[tokio::test]
    async fn test_pointer_survives_the_store() {
        let store = Arc::new(MemoryMetadataStore::new());
        let pointer = Pointer {
            piece_id: PieceId::from_content(b"roundtrip"),
            size: 123_456,
            redundancy: RedundancyScheme::new(29, 80, 2048, 35),
            pieces: (0..80)
                .map(|n| RemotePiece::new(n, format!("rt-node-{n}")))
                .collect(),
        };
        store.put_pointer(&b"seg/rt"[..], &pointer).unwrap();

        use futures::StreamExt;
        use veristor::domain::{IterateScope, MetadataStore};
        let mut stream = store.iterate(IterateScope {
            prefix: Bytes::from_static(b"seg/"),
            recurse: true,
            ..Default::default()
        });
        let entry = stream.next().await.unwrap().unwrap();
        let decoded: Pointer = serde_json::from_slice(&entry.value).unwrap();
        assert_eq!(decoded, pointer);
    }
}
