//! Erasure Model
//!
//! Everything the audit core knows about erasure mathematics:
//!
//! - **Scheme** (`scheme.rs`): the `(required, total)` fragment parameters of
//!   a segment and the pure padding/share-size arithmetic.
//! - **Codec** (`codec.rs`): stripe-granular Reed-Solomon encode /
//!   reconstruct / parity-check over GF(2^8).
//! - **Verifier** (`verifier.rs`): altered-share attribution via
//!   reconstruct-and-compare, behind the
//!   [`ShareVerifier`](crate::domain::ports::ShareVerifier) port.

pub mod codec;
pub mod scheme;
pub mod verifier;

#[cfg(test)]
mod proptest;

pub use codec::StripeCodec;
pub use scheme::{RedundancyScheme, MAX_TOTAL_SHARES};
pub use verifier::ReedSolomonVerifier;
