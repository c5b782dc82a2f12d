//! VeriStor - Durability Verification for Decentralized Object Storage
//!
//! Segments are erasure-coded into pieces scattered across untrusted storage
//! nodes. VeriStor is the layer that keeps that durability honest. It detects
//! nodes returning corrupted or tampered data and pieces whose owners have
//! vanished, then queues repair, without ever trusting a single remote
//! node's answer.
//!
//! # Architecture
//!
//! Two independent periodic pipelines share one trust model but watch
//! different signals:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                           VeriStor                               │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────────────────┐   ┌───────────────────────────┐   │
//! │  │      Audit Pipeline      │   │     Checker Pipeline      │   │
//! │  │  download stripe shares  │   │  scan segment metadata    │   │
//! │  │  erasure-verify content  │   │  bulk-resolve piece owners│   │
//! │  │  → accuse bad nodes      │   │  → enqueue injured segs   │   │
//! │  └──────────────────────────┘   └───────────────────────────┘   │
//! │               │                             │                    │
//! │               ▼                             ▼                    │
//! │      content integrity               piece presence              │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Peer routing, the dial/read transport, the metadata store, and the repair
//! queue are collaborators reached through the ports in [`domain::ports`];
//! [`adapters`] ships in-memory implementations for tests and harnesses.
//!
//! # Modules
//!
//! - [`audit`] - stripe download, verification, and node accusation
//! - [`checker`] - injured-segment detection and repair enqueueing
//! - [`domain`] - data model and collaborator ports
//! - [`erasure`] - redundancy schemes, stripe codec, share verifier
//! - [`adapters`] - in-memory port implementations
//! - [`metrics`] - passed-in observability context
//! - [`error`] - error types

pub mod adapters;
pub mod audit;
pub mod checker;
pub mod domain;
pub mod erasure;
pub mod error;
pub mod metrics;

// Re-export commonly used types
pub use audit::{DownloaderConfig, ShareDownloader, StripeAuditor};
pub use checker::{Checker, CheckerConfig};
pub use domain::{InjuredSegment, Node, NodeId, PieceId, Pointer, RemotePiece, Share};
pub use erasure::{RedundancyScheme, ReedSolomonVerifier, StripeCodec};
pub use error::{Error, Result};
pub use metrics::AuditMetrics;
