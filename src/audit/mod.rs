//! Stripe Audit Pipeline
//!
//! Verifies the content integrity of pieces the metadata layer believes are
//! present. One audit covers one stripe of one segment:
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────────┐
//! │  Downloader  │────▶│   Verifier   │────▶│  StripeAuditor   │
//! │ (one share   │     │ (altered     │     │ (piece numbers   │
//! │  per piece)  │     │  pieces)     │     │  → bad nodes)    │
//! └──────────────┘     └──────────────┘     └──────────────────┘
//! ```
//!
//! No remote node is trusted: every share is compared against the content
//! the rest of the stripe mathematically requires it to have. Unavailability
//! is deliberately not treated as guilt; missing-piece detection belongs to
//! the [`checker`](crate::checker).

pub mod auditor;
pub mod downloader;

pub use auditor::StripeAuditor;
pub use downloader::{DownloaderConfig, ShareDownloader};
