//! Segment Data Model
//!
//! Core records shared by both pipelines: pointers describing where a
//! segment's erasure-coded pieces live, the nodes that hold them, the shares
//! an audit downloads, and the injured-segment records the checker emits.
//!
//! Nothing in here talks to the network; these are plain values.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::erasure::RedundancyScheme;
use crate::error::{Error, Result};

// =============================================================================
// Identifiers
// =============================================================================

/// Opaque storage-node identifier (value object).
///
/// Resolution to a network address happens externally through the
/// [`NodeDirectory`](crate::domain::ports::NodeDirectory) port.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifier of one stored piece group (value object).
///
/// A pointer carries the segment-level piece id; the identifier actually used
/// on the wire toward a given node is produced by [`PieceId::derive_for`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PieceId([u8; 32]);

impl PieceId {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Build a piece id from arbitrary input by hashing it. Convenient for
    /// tests and harnesses that key pieces by path.
    pub fn from_content(input: &[u8]) -> Self {
        use sha2::Digest;
        let digest = Sha256::digest(input);
        Self(digest.into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Derive the node-specific piece identifier.
    ///
    /// This is the stable wire contract of the audit core: an HMAC-SHA256 of
    /// the node id keyed by the segment piece id. The same transform is
    /// applied at upload time, so a re-derivation during audit addresses the
    /// exact bytes the node was given, and a node cannot answer for a piece
    /// held by a different node.
    pub fn derive_for(&self, node_id: &NodeId) -> PieceId {
        let mut mac = Hmac::<Sha256>::new_from_slice(&self.0)
            .expect("HMAC-SHA256 accepts keys of any length");
        mac.update(node_id.as_bytes());
        let out = mac.finalize().into_bytes();
        PieceId(out.into())
    }
}

impl std::fmt::Display for PieceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for b in &self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

// =============================================================================
// Nodes
// =============================================================================

/// Transport protocol a node accepts connections over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeTransport {
    TcpTls,
    Quic,
}

/// Advertised capacity limits of a storage node. Informational; never trusted
/// for audit decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NodeRestrictions {
    pub free_bandwidth: u64,
    pub free_disk: u64,
}

/// Resolved peer descriptor, produced by directory resolution.
///
/// Read-only to the audit core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub address: String,
    pub transport: NodeTransport,
    pub restrictions: Option<NodeRestrictions>,
}

impl Node {
    /// A TCP+TLS node with no advertised restrictions.
    pub fn new(id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id: NodeId::new(id),
            address: address.into(),
            transport: NodeTransport::TcpTls,
            restrictions: None,
        }
    }
}

// =============================================================================
// Pointers
// =============================================================================

/// One erasure-coded piece location: which piece number, held by which node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemotePiece {
    pub piece_number: u32,
    pub node_id: NodeId,
}

impl RemotePiece {
    pub fn new(piece_number: u32, node_id: impl Into<String>) -> Self {
        Self {
            piece_number,
            node_id: NodeId::new(node_id),
        }
    }
}

/// Metadata describing one stored, erasure-coded object segment.
///
/// Owned by the metadata store; immutable once read for an audit pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pointer {
    /// Segment-level piece identifier; per-node ids derive from it.
    pub piece_id: PieceId,
    /// Total plaintext size of the segment in bytes.
    pub size: u64,
    /// Erasure parameters for the segment.
    pub redundancy: RedundancyScheme,
    /// Where the pieces live.
    pub pieces: Vec<RemotePiece>,
}

impl Pointer {
    /// Check the cross-pipeline pointer invariants: a usable redundancy
    /// scheme, at least one remote piece, and piece numbers unique within
    /// `[0, total)`.
    pub fn validate(&self) -> Result<()> {
        self.redundancy.validate()?;

        if self.pieces.is_empty() {
            return Err(Error::InvalidPointer("pointer has no remote pieces".into()));
        }

        let total = self.redundancy.total as u32;
        let mut seen = vec![false; self.redundancy.total];
        for piece in &self.pieces {
            if piece.piece_number >= total {
                return Err(Error::InvalidPointer(format!(
                    "piece number {} out of range [0, {})",
                    piece.piece_number, total
                )));
            }
            let slot = &mut seen[piece.piece_number as usize];
            if *slot {
                return Err(Error::InvalidPointer(format!(
                    "duplicate piece number {}",
                    piece.piece_number
                )));
            }
            *slot = true;
        }
        Ok(())
    }

    /// Node ids of all piece owners, in piece-list order.
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.pieces.iter().map(|p| p.node_id.clone()).collect()
    }
}

// =============================================================================
// Shares
// =============================================================================

#[derive(Debug)]
enum SharePayload {
    /// Exactly one share's worth of downloaded bytes.
    Data(Bytes),
    /// The download failed; there are no bytes to compare.
    Failed(Error),
}

/// One downloaded fragment for one stripe.
///
/// A share either carries its bytes or records why the download failed;
/// it never does both, so a failed share cannot be mistaken for a zero-filled
/// real one.
#[derive(Debug)]
pub struct Share {
    pub piece_number: u32,
    payload: SharePayload,
}

impl Share {
    /// A successfully downloaded share.
    pub fn downloaded(piece_number: u32, data: Bytes) -> Self {
        Self {
            piece_number,
            payload: SharePayload::Data(data),
        }
    }

    /// A share whose download failed for the given cause.
    pub fn failed(piece_number: u32, cause: Error) -> Self {
        Self {
            piece_number,
            payload: SharePayload::Failed(cause),
        }
    }

    /// Downloaded bytes, absent if the download failed.
    pub fn data(&self) -> Option<&Bytes> {
        match &self.payload {
            SharePayload::Data(data) => Some(data),
            SharePayload::Failed(_) => None,
        }
    }

    /// Download failure cause, if any.
    pub fn error(&self) -> Option<&Error> {
        match &self.payload {
            SharePayload::Data(_) => None,
            SharePayload::Failed(err) => Some(err),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.payload, SharePayload::Failed(_))
    }
}

// =============================================================================
// Injured segments
// =============================================================================

/// A segment whose missing-piece count has crossed the repair trigger
/// threshold.
///
/// Created by the checker, consumed and deleted by the external repair
/// worker; this core never deletes one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InjuredSegment {
    /// Metadata key of the segment.
    pub path: String,
    /// Piece numbers believed lost.
    pub lost_pieces: Vec<u32>,
    /// When the checker detected the injury.
    pub detected_at: DateTime<Utc>,
}
