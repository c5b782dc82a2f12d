//! Error types for the VeriStor audit core

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the audit and repair-detection pipelines.
///
/// Variants fall into four classes with different blast radii:
///
/// - **Per-share** (`NodeUnresolved`, `Dial`, `PieceStore`, `RangeOutOfBounds`,
///   `ShortRead`, `Cancelled`): recovered locally, recorded on the failing
///   [`Share`](crate::domain::Share); never abort a stripe audit.
/// - **Audit-fatal** (`InvalidRedundancy`, `InvalidPointer`,
///   `InsufficientShares`, `TooManyAltered`, `Reconstruction`): abort the
///   current stripe audit and surface to the caller.
/// - **Scan-fatal** (`Metadata`, `Enqueue`): abort the current checker pass,
///   naming the failing entry's key.
/// - **Pass-fatal** (`Lookup`): a bulk-lookup transport failure kills the
///   current pass of either pipeline.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // =========================================================================
    // Per-share download errors (recovered)
    // =========================================================================
    /// The bulk lookup resolved this piece's owner to nothing
    #[error("node {node_id} is not resolvable in the directory")]
    NodeUnresolved { node_id: String },

    /// Dialing a storage node failed
    #[error("dial to node {node_id} failed: {reason}")]
    Dial { node_id: String, reason: String },

    /// The piece-store protocol failed (node does not hold the piece, refused
    /// the request, or broke the stream)
    #[error("piece store request to node {node_id} failed: {reason}")]
    PieceStore { node_id: String, reason: String },

    /// A requested byte range falls outside the piece
    #[error("range [{offset}, +{length}) exceeds piece size {piece_size}")]
    RangeOutOfBounds {
        offset: u64,
        length: u64,
        piece_size: u64,
    },

    /// A node returned fewer bytes than the requested share length
    #[error("short read: wanted {wanted} bytes, got {got}")]
    ShortRead { wanted: usize, got: usize },

    /// The surrounding pass was cancelled while this call was in flight
    #[error("operation cancelled")]
    Cancelled,

    // =========================================================================
    // Audit-fatal errors
    // =========================================================================
    /// Erasure parameters are unusable
    #[error("invalid redundancy scheme: {0}")]
    InvalidRedundancy(String),

    /// Pointer violates the data-model invariants
    #[error("invalid pointer: {0}")]
    InvalidPointer(String),

    /// Too few usable shares to reconstruct the stripe
    #[error("insufficient shares for reconstruction: have {available}, need {required}")]
    InsufficientShares { available: usize, required: usize },

    /// The stripe is inconsistent but no altered-share set within the
    /// scheme's tolerance explains it; accusation would be guesswork
    #[error(
        "stripe corruption exceeds attribution capacity ({supplied} shares, {required} required)"
    )]
    TooManyAltered { supplied: usize, required: usize },

    /// The erasure codec itself failed
    #[error("erasure reconstruction failed: {0}")]
    Reconstruction(String),

    // =========================================================================
    // Scan-fatal errors
    // =========================================================================
    /// A metadata entry's value did not deserialize into a pointer
    #[error("bad pointer metadata at key {key}: {reason}")]
    Metadata { key: String, reason: String },

    /// The repair queue rejected an injured segment
    #[error("failed to enqueue injured segment {key}: {reason}")]
    Enqueue { key: String, reason: String },

    // =========================================================================
    // Pass-fatal errors
    // =========================================================================
    /// The bulk node lookup round-trip failed as a whole
    #[error("bulk node lookup failed: {0}")]
    Lookup(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for errors that are recorded on a single share rather than
    /// aborting the stripe audit.
    pub fn is_share_error(&self) -> bool {
        matches!(
            self,
            Error::NodeUnresolved { .. }
                | Error::Dial { .. }
                | Error::PieceStore { .. }
                | Error::RangeOutOfBounds { .. }
                | Error::ShortRead { .. }
                | Error::Cancelled
        )
    }
}
