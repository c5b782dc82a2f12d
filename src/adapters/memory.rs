//! In-Memory Adapters
//!
//! Process-local implementations of the domain ports. They back the
//! integration tests and make a self-contained harness possible without a
//! routing layer, piece-store fleet, or durable queue. Fault injection knobs
//! (unreachable nodes, tampered pieces, failing queues) exist because the
//! pipelines are defined by how they behave when collaborators misbehave.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::{Mutex, RwLock};

use crate::domain::ports::{
    IterateScope, MetadataEntry, MetadataStore, NodeDirectory, PieceClient, PieceTransport,
    RangeReader, RepairQueue,
};
use crate::domain::segment::{InjuredSegment, Node, NodeId, PieceId, Pointer};
use crate::erasure::StripeCodec;
use crate::error::{Error, Result};

// =============================================================================
// Node directory
// =============================================================================

/// [`NodeDirectory`] over a fixed node table.
///
/// Nodes can be removed (or never inserted) to simulate peers that have
/// fallen out of routing, and the whole directory can be marked unavailable
/// to simulate a lookup transport failure.
#[derive(Debug, Default)]
pub struct StaticNodeDirectory {
    nodes: DashMap<NodeId, Node>,
    unavailable: AtomicBool,
}

impl StaticNodeDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, node: Node) {
        self.nodes.insert(node.id.clone(), node);
    }

    pub fn remove(&self, node_id: &NodeId) {
        self.nodes.remove(node_id);
    }

    /// Make every bulk lookup fail at the transport level.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl NodeDirectory for StaticNodeDirectory {
    async fn bulk_lookup(&self, node_ids: &[NodeId]) -> Result<Vec<Option<Node>>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::Lookup("directory unavailable".into()));
        }
        Ok(node_ids
            .iter()
            .map(|id| self.nodes.get(id).map(|entry| entry.clone()))
            .collect())
    }
}

// =============================================================================
// Piece network
// =============================================================================

#[derive(Debug, Default)]
struct NodePieceStore {
    pieces: DashMap<PieceId, Bytes>,
    unreachable: AtomicBool,
}

/// [`PieceTransport`] over per-node in-memory piece maps.
#[derive(Debug, Default)]
pub struct MemoryPieceNetwork {
    nodes: DashMap<NodeId, Arc<NodePieceStore>>,
}

impl MemoryPieceNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    fn node(&self, node_id: &NodeId) -> Arc<NodePieceStore> {
        self.nodes
            .entry(node_id.clone())
            .or_insert_with(|| Arc::new(NodePieceStore::default()))
            .clone()
    }

    /// Store piece bytes on a node, keyed by the (already derived) piece id.
    pub fn store_piece(&self, node_id: &NodeId, piece_id: PieceId, data: Bytes) {
        self.node(node_id).pieces.insert(piece_id, data);
    }

    /// Flip a byte of a stored piece, simulating tampering or bit rot.
    pub fn corrupt_piece(&self, node_id: &NodeId, piece_id: &PieceId, at: usize) {
        let store = self.node(node_id);
        let existing = store.pieces.get(piece_id).map(|entry| entry.to_vec());
        if let Some(mut bytes) = existing {
            if let Some(byte) = bytes.get_mut(at) {
                *byte ^= 0xff;
            }
            store.pieces.insert(*piece_id, Bytes::from(bytes));
        }
    }

    /// Make dials to a node fail with a connection error.
    pub fn set_unreachable(&self, node_id: &NodeId, unreachable: bool) {
        self.node(node_id)
            .unreachable
            .store(unreachable, Ordering::SeqCst);
    }

    /// Erasure-code `segment` per the pointer's scheme and store every piece
    /// on its owning node under the node-derived piece id, so the network ends
    /// up holding the segment exactly as an honest upload would leave it.
    /// The tail is padded out to a whole number of stripes.
    pub fn seed_segment(&self, pointer: &Pointer, segment: &[u8]) -> Result<()> {
        let scheme = &pointer.redundancy;
        let codec = StripeCodec::new(scheme)?;
        let stripe_size = scheme.stripe_size() as usize;
        let share_size = scheme.share_size as usize;

        let mut padded = segment.to_vec();
        let stripes = padded.len().div_ceil(stripe_size).max(1);
        padded.resize(stripes * stripe_size, 0);

        let mut pieces: Vec<Vec<u8>> =
            vec![Vec::with_capacity(stripes * share_size); scheme.total];
        for stripe in padded.chunks(stripe_size) {
            let shares = codec.encode_stripe(stripe)?;
            for (piece, share) in pieces.iter_mut().zip(shares) {
                piece.extend_from_slice(&share);
            }
        }

        for remote in &pointer.pieces {
            let derived = pointer.piece_id.derive_for(&remote.node_id);
            let data = pieces[remote.piece_number as usize].clone();
            self.store_piece(&remote.node_id, derived, Bytes::from(data));
        }
        Ok(())
    }
}

#[async_trait]
impl PieceTransport for MemoryPieceNetwork {
    async fn dial(&self, node: &Node) -> Result<Box<dyn PieceClient>> {
        let store = self.nodes.get(&node.id).map(|entry| entry.clone());
        match store {
            Some(store) if !store.unreachable.load(Ordering::SeqCst) => {
                Ok(Box::new(MemoryPieceClient {
                    node_id: node.id.clone(),
                    store,
                }))
            }
            _ => Err(Error::Dial {
                node_id: node.id.to_string(),
                reason: "connection refused".into(),
            }),
        }
    }
}

struct MemoryPieceClient {
    node_id: NodeId,
    store: Arc<NodePieceStore>,
}

#[async_trait]
impl PieceClient for MemoryPieceClient {
    async fn get(&self, piece_id: &PieceId, piece_size: u64) -> Result<Box<dyn RangeReader>> {
        let data = self
            .store
            .pieces
            .get(piece_id)
            .map(|entry| entry.clone())
            .ok_or_else(|| Error::PieceStore {
                node_id: self.node_id.to_string(),
                reason: format!("piece {} not held", piece_id),
            })?;
        Ok(Box::new(MemoryRangeReader { data, piece_size }))
    }
}

struct MemoryRangeReader {
    data: Bytes,
    piece_size: u64,
}

#[async_trait]
impl RangeReader for MemoryRangeReader {
    async fn range(&self, offset: u64, length: u64) -> Result<Bytes> {
        let bound = self.piece_size.min(self.data.len() as u64);
        let end = offset
            .checked_add(length)
            .filter(|end| *end <= bound)
            .ok_or(Error::RangeOutOfBounds {
                offset,
                length,
                piece_size: bound,
            })?;
        Ok(self.data.slice(offset as usize..end as usize))
    }
}

// =============================================================================
// Metadata store
// =============================================================================

/// [`MetadataStore`] over an ordered in-memory map.
///
/// Iteration snapshots the map, so a scan observes a consistent view even if
/// writers race it. Non-recursive scans skip keys nested under a further `/`
/// past the prefix rather than synthesizing directory entries.
#[derive(Debug, Default)]
pub struct MemoryMetadataStore {
    entries: Arc<RwLock<BTreeMap<Vec<u8>, Bytes>>>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, key: impl Into<Vec<u8>>, value: Bytes) {
        self.entries.write().insert(key.into(), value);
    }

    /// Serialize and store a pointer under `key`.
    pub fn put_pointer(&self, key: impl Into<Vec<u8>>, pointer: &Pointer) -> Result<()> {
        let value = serde_json::to_vec(pointer)
            .map_err(|e| Error::Internal(format!("pointer serialization failed: {}", e)))?;
        self.put(key, Bytes::from(value));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl MetadataStore for MemoryMetadataStore {
    fn iterate(&self, scope: IterateScope) -> BoxStream<'static, Result<MetadataEntry>> {
        let snapshot: Vec<MetadataEntry> = {
            let entries = self.entries.read();
            let mut selected: Vec<MetadataEntry> = entries
                .iter()
                .filter(|(key, _)| key.starts_with(&scope.prefix[..]))
                .filter(|(key, _)| {
                    scope.recurse || !key[scope.prefix.len()..].contains(&b'/')
                })
                .filter(|(key, _)| {
                    if scope.start.is_empty() {
                        return true;
                    }
                    if scope.reverse {
                        &key[..] <= &scope.start[..]
                    } else {
                        &key[..] >= &scope.start[..]
                    }
                })
                .map(|(key, value)| MetadataEntry {
                    key: Bytes::from(key.clone()),
                    value: value.clone(),
                })
                .collect();
            if scope.reverse {
                selected.reverse();
            }
            selected
        };

        stream::iter(snapshot.into_iter().map(Ok)).boxed()
    }
}

// =============================================================================
// Repair queue
// =============================================================================

/// [`RepairQueue`] over an in-memory deque, with an injectable enqueue
/// failure.
#[derive(Debug, Default)]
pub struct MemoryRepairQueue {
    segments: Mutex<VecDeque<InjuredSegment>>,
    failing: AtomicBool,
}

impl MemoryRepairQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every enqueue fail, as a crashed or full queue would.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.segments.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.lock().is_empty()
    }

    /// Take everything queued so far, oldest first.
    pub fn drain(&self) -> Vec<InjuredSegment> {
        self.segments.lock().drain(..).collect()
    }
}

#[async_trait]
impl RepairQueue for MemoryRepairQueue {
    async fn enqueue(&self, segment: InjuredSegment) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Enqueue {
                key: segment.path,
                reason: "queue unavailable".into(),
            });
        }
        self.segments.lock().push_back(segment);
        Ok(())
    }
}
