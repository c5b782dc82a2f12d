//! Property-Based Tests for the Erasure Model
//!
//! Uses proptest to verify the padding arithmetic and the altered-share
//! attribution across a wide range of schemes and inputs.
//!
//! # Test Properties
//!
//! 1. **Padding Laws**: padded size is share-aligned and within one share of
//!    the input
//! 2. **Honesty**: an untampered stripe never produces an accusation
//! 3. **Attribution**: tampering within the decoding surplus is pinned to
//!    exactly the tampered pieces

#![cfg(test)]

use bytes::Bytes;
use proptest::prelude::*;

use super::scheme::RedundancyScheme;
use super::verifier::ReedSolomonVerifier;
use super::StripeCodec;
use crate::domain::ports::ShareVerifier;
use crate::domain::segment::Share;

// =============================================================================
// Property Strategies
// =============================================================================

/// Strategy for schemes with enough surplus to attribute a tampered share:
/// required 2-5, at least required+2 extra shares.
fn attributable_scheme_strategy() -> impl Strategy<Value = RedundancyScheme> {
    (2usize..=5, 2usize..=5, 8u64..=64).prop_map(|(required, surplus, share_size)| {
        RedundancyScheme::new(required, required + surplus, share_size, 1)
    })
}

/// Strategy for arbitrary sizes to pad.
fn size_strategy() -> impl Strategy<Value = (u64, u64)> {
    (0u64..=1_000_000, 1u64..=4096)
}

fn shares_for(scheme: &RedundancyScheme, seed: u8) -> Vec<Share> {
    let codec = StripeCodec::new(scheme).unwrap();
    let stripe: Vec<u8> = (0..scheme.required * scheme.share_size as usize)
        .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
        .collect();
    codec
        .encode_stripe(&stripe)
        .unwrap()
        .into_iter()
        .enumerate()
        .map(|(piece, data)| Share::downloaded(piece as u32, Bytes::from(data)))
        .collect()
}

// =============================================================================
// Padding Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Property: the padded size is a multiple of the share size and sits in
    /// `[size, size + share_size)`.
    #[test]
    fn prop_padding_laws((size, share_size) in size_strategy()) {
        let scheme = RedundancyScheme::new(2, 4, share_size, 1);
        let padded = scheme.padded_size(size);

        prop_assert_eq!(padded % share_size, 0);
        prop_assert!(padded >= size);
        prop_assert!(padded < size + share_size);
    }

    /// Property: aligned sizes come back unchanged.
    #[test]
    fn prop_padding_identity_on_aligned(multiple in 0u64..=10_000, share_size in 1u64..=4096) {
        let scheme = RedundancyScheme::new(2, 4, share_size, 1);
        let size = multiple * share_size;
        prop_assert_eq!(scheme.padded_size(size), size);
    }
}

// =============================================================================
// Attribution Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: a stripe downloaded exactly as encoded accuses nobody.
    #[test]
    fn prop_honest_stripe_accuses_nobody(
        scheme in attributable_scheme_strategy(),
        seed in any::<u8>(),
    ) {
        let shares = shares_for(&scheme, seed);
        let accused = ReedSolomonVerifier::new().flag_altered(&scheme, &shares)?;
        prop_assert!(accused.is_empty());
    }

    /// Property: flipping one byte of one share accuses exactly that piece.
    #[test]
    fn prop_single_tamper_attributed_exactly(
        scheme in attributable_scheme_strategy(),
        seed in any::<u8>(),
        victim_index in any::<prop::sample::Index>(),
        byte_index in any::<prop::sample::Index>(),
        flip in 1u8..=255,
    ) {
        let mut shares = shares_for(&scheme, seed);
        let victim = victim_index.index(scheme.total) as u32;
        let at = byte_index.index(scheme.share_size as usize);

        let mut data = shares[victim as usize].data().unwrap().to_vec();
        data[at] ^= flip;
        shares[victim as usize] = Share::downloaded(victim, Bytes::from(data));

        let accused = ReedSolomonVerifier::new().flag_altered(&scheme, &shares)?;
        prop_assert_eq!(accused, vec![victim]);
    }

    /// Property: a share that failed to download is never accused, and does
    /// not disturb attribution of a genuinely tampered one. The failed share
    /// eats one share of surplus, so the scheme needs at least three spare.
    #[test]
    fn prop_failed_share_never_accused(
        scheme in (2usize..=5, 3usize..=5, 8u64..=64).prop_map(
            |(required, surplus, share_size)| {
                RedundancyScheme::new(required, required + surplus, share_size, 1)
            },
        ),
        seed in any::<u8>(),
        choice in any::<prop::sample::Index>(),
    ) {
        let mut shares = shares_for(&scheme, seed);

        // Fail one share and tamper a different one.
        let failed = choice.index(scheme.total) as u32;
        let victim = (failed + 1) % scheme.total as u32;

        shares[failed as usize] = Share::failed(
            failed,
            crate::error::Error::Dial {
                node_id: format!("node-{failed}"),
                reason: "unreachable".into(),
            },
        );
        let mut data = shares[victim as usize].data().unwrap().to_vec();
        data[0] ^= 0x01;
        shares[victim as usize] = Share::downloaded(victim, Bytes::from(data));

        let accused = ReedSolomonVerifier::new().flag_altered(&scheme, &shares)?;
        prop_assert_eq!(accused, vec![victim]);
    }
}
