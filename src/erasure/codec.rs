//! Stripe Codec
//!
//! Thin stripe-granular wrapper around the `reed-solomon-erasure` GF(2^8)
//! codec. One codeword here is one stripe: `total` shares of `share_size`
//! bytes, of which the first `required` are data shares and the rest parity.
//!
//! The verifier drives this to rebuild expected share contents; tests use it
//! to fabricate honest stripes.

use reed_solomon_erasure::galois_8::ReedSolomon;

use crate::erasure::RedundancyScheme;
use crate::error::{Error, Result};

/// Erasure codec fixed to one redundancy scheme.
pub struct StripeCodec {
    rs: ReedSolomon,
    required: usize,
    total: usize,
    share_size: usize,
}

impl std::fmt::Debug for StripeCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeCodec")
            .field("required", &self.required)
            .field("total", &self.total)
            .field("share_size", &self.share_size)
            .finish()
    }
}

impl StripeCodec {
    /// Build a codec for the scheme.
    ///
    /// Fails on any scheme [`RedundancyScheme::validate`] rejects, and on
    /// schemes without parity shares (with zero parity every stripe is
    /// vacuously consistent and corruption cannot even be detected).
    pub fn new(scheme: &RedundancyScheme) -> Result<Self> {
        scheme.validate()?;

        let parity = scheme.total - scheme.required;
        if parity == 0 {
            return Err(Error::InvalidRedundancy(
                "scheme has no parity shares; stripe verification is impossible".into(),
            ));
        }

        let rs = ReedSolomon::new(scheme.required, parity)
            .map_err(|e| Error::InvalidRedundancy(format!("codec construction failed: {}", e)))?;

        Ok(Self {
            rs,
            required: scheme.required,
            total: scheme.total,
            share_size: scheme.share_size as usize,
        })
    }

    pub fn required(&self) -> usize {
        self.required
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn share_size(&self) -> usize {
        self.share_size
    }

    /// Encode one stripe of original data (`required * share_size` bytes)
    /// into `total` shares of `share_size` bytes each.
    pub fn encode_stripe(&self, stripe: &[u8]) -> Result<Vec<Vec<u8>>> {
        let expected = self.required * self.share_size;
        if stripe.len() != expected {
            return Err(Error::Internal(format!(
                "stripe length {} does not match required * share_size = {}",
                stripe.len(),
                expected
            )));
        }

        let mut shares: Vec<Vec<u8>> = stripe
            .chunks(self.share_size)
            .map(|chunk| chunk.to_vec())
            .collect();
        shares.resize(self.total, vec![0u8; self.share_size]);

        self.rs
            .encode(&mut shares)
            .map_err(|e| Error::Reconstruction(format!("encoding failed: {}", e)))?;

        Ok(shares)
    }

    /// Fill every `None` slot from the `Some` ones.
    ///
    /// `slots` must have `total` entries indexed by piece number. At least
    /// `required` of them must be present.
    pub fn reconstruct(&self, slots: &mut [Option<Vec<u8>>]) -> Result<()> {
        if slots.len() != self.total {
            return Err(Error::Internal(format!(
                "expected {} share slots, got {}",
                self.total,
                slots.len()
            )));
        }

        let available = slots.iter().filter(|s| s.is_some()).count();
        if available < self.required {
            return Err(Error::InsufficientShares {
                available,
                required: self.required,
            });
        }

        self.rs
            .reconstruct(slots)
            .map_err(|e| Error::Reconstruction(format!("reconstruction failed: {}", e)))
    }

    /// Check whether a trial codeword is self-consistent after removing the
    /// shares named in `excluded`.
    ///
    /// The surviving shares are treated as ground truth, every absent slot
    /// (excluded or never supplied) is erasure-reconstructed from them, and
    /// the resulting full codeword is parity-checked. `false` means at least
    /// one surviving share does not lie on the codeword the others define.
    pub fn consistent_without(
        &self,
        slots: &[Option<Vec<u8>>],
        excluded: &[usize],
    ) -> Result<bool> {
        let mut trial: Vec<Option<Vec<u8>>> = slots.to_vec();
        for &piece in excluded {
            trial[piece] = None;
        }
        self.reconstruct(&mut trial)?;

        let full: Vec<Vec<u8>> = trial
            .into_iter()
            .map(|slot| slot.ok_or_else(|| Error::Internal("reconstruction left a hole".into())))
            .collect::<Result<_>>()?;

        self.rs
            .verify(&full)
            .map_err(|e| Error::Reconstruction(format!("parity check failed: {}", e)))
    }
}
