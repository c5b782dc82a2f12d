//! Domain Ports (Port/Adapter Pattern)
//!
//! Capability traits for everything the audit core consumes but does not
//! own: peer resolution, the dial/read transport toward storage nodes, the
//! object-metadata store, the repair queue, and the erasure-verification
//! seam. Infrastructure adapters implement these traits.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Audit Core                             │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │                   Ports (Traits)                     │    │
//! │  │  NodeDirectory │ PieceTransport │ MetadataStore     │    │
//! │  │  RepairQueue   │ ShareVerifier                      │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Infrastructure Layer                        │
//! │  DHT/overlay client │ TLS piece-store client │ durable KV   │
//! │  (in-memory adapters in `adapters::memory` for tests)       │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use crate::domain::segment::{InjuredSegment, Node, NodeId, PieceId, Share};
use crate::erasure::RedundancyScheme;
use crate::error::Result;

// =============================================================================
// Peer resolution
// =============================================================================

/// Port for resolving node identifiers to live peer descriptors.
///
/// Implementations batch all identifiers into a single round-trip. The output
/// preserves input order; an identifier the routing layer cannot presently
/// resolve maps to `None`, which means "unresolvable right now", not
/// necessarily "offline forever". A transport-level failure of the lookup
/// itself is an error and fatal to the calling pass.
#[async_trait]
pub trait NodeDirectory: Send + Sync {
    async fn bulk_lookup(&self, node_ids: &[NodeId]) -> Result<Vec<Option<Node>>>;
}

// =============================================================================
// Piece transport
// =============================================================================

/// Port for opening authenticated connections to storage nodes.
#[async_trait]
pub trait PieceTransport: Send + Sync {
    /// Dial a resolved node. Fails with a connection-class error on an
    /// unreachable or untrusted peer.
    async fn dial(&self, node: &Node) -> Result<Box<dyn PieceClient>>;
}

/// One authenticated connection to a storage node's piece service.
#[async_trait]
pub trait PieceClient: Send + Sync {
    /// Open a rangeable reader over a stored piece. `piece_size` bounds the
    /// readable extent; implementations fail if the node does not hold the
    /// piece.
    async fn get(&self, piece_id: &PieceId, piece_size: u64) -> Result<Box<dyn RangeReader>>;
}

/// Ranged access to one piece's bytes.
#[async_trait]
pub trait RangeReader: Send + Sync {
    /// Read `[offset, offset + length)`. Fails if the range exceeds the
    /// piece bounds. Callers must not assume the returned buffer is full
    /// length; the downloader treats a short buffer as a failed share.
    async fn range(&self, offset: u64, length: u64) -> Result<Bytes>;
}

// =============================================================================
// Object metadata
// =============================================================================

/// Iteration scope over the object-metadata keyspace.
#[derive(Debug, Clone, Default)]
pub struct IterateScope {
    /// Only keys with this prefix are visited.
    pub prefix: Bytes,
    /// Iteration begins at the first key >= `start` (<= for reverse scans).
    /// Empty means "from the edge of the prefix range".
    pub start: Bytes,
    /// When false, keys nested under a further `/` past the prefix are
    /// collapsed away and only direct children are visited.
    pub recurse: bool,
    /// Visit keys in descending order.
    pub reverse: bool,
}

/// One stored metadata entry: a key and a serialized
/// [`Pointer`](crate::domain::segment::Pointer) value.
#[derive(Debug, Clone)]
pub struct MetadataEntry {
    pub key: Bytes,
    pub value: Bytes,
}

/// Port for iterating the object-metadata store.
///
/// Entries arrive in scope order. The consumer stops on the first entry it
/// cannot process; dropping the stream ends the iteration. Visit limits are
/// the consumer's concern, matching the checker's decrement-per-item
/// contract.
pub trait MetadataStore: Send + Sync {
    fn iterate(&self, scope: IterateScope) -> BoxStream<'static, Result<MetadataEntry>>;
}

// =============================================================================
// Repair queue
// =============================================================================

/// Port for handing injured segments to the repair pipeline.
///
/// Append-only from this core's perspective: segments are consumed and
/// deleted by the external repair worker. At most one enqueue per segment
/// per pass is issued.
#[async_trait]
pub trait RepairQueue: Send + Sync {
    async fn enqueue(&self, segment: InjuredSegment) -> Result<()>;
}

// =============================================================================
// Share verification
// =============================================================================

/// Port for the erasure-mathematics seam.
///
/// Given a redundancy scheme and the downloaded shares of one stripe, report
/// the piece numbers whose bytes were altered relative to the
/// mathematically reconstructed correct content. A share carrying a download
/// error contributes nothing and is never reported: absence is
/// unavailability, a different failure class from corruption.
pub trait ShareVerifier: Send + Sync {
    fn flag_altered(&self, scheme: &RedundancyScheme, shares: &[Share]) -> Result<Vec<u32>>;
}
