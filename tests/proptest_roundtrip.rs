//! Property-based coverage for the encode/trace/repair round trip.
//!
//! The free variables are payload length and which of the nine positions
//! gets erased, since `CodecParams` only accepts the one shape the static
//! tables were built for.

use proptest::prelude::*;
use tr_repair::decoder::{Decoder, HelperTrace};
use tr_repair::encoder::Encoder;
use tr_repair::CodecParams;

fn params() -> CodecParams {
    CodecParams::default()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Any payload, repaired at any position, recovers the original shard.
    #[test]
    fn prop_repair_recovers_original_shard(
        data in prop::collection::vec(any::<u8>(), 1..2000),
        erased in 0usize..9,
    ) {
        let encoder = Encoder::new(params())?;
        let decoder = Decoder::new(params());

        let stripe = encoder.encode(&data)?;
        let shard_len = stripe[0].len();

        let traces: Vec<HelperTrace> = (0..stripe.len())
            .filter(|&i| i != erased)
            .map(|i| {
                let trace = encoder.compute_trace(i, erased, &stripe[i])?;
                Ok(HelperTrace { helper_index: i, packed: trace.packed })
            })
            .collect::<Result<_, tr_repair::Error>>()?;

        let recovered = decoder.reconstruct(erased, shard_len, &traces)?;
        prop_assert_eq!(recovered.as_ref(), stripe[erased].0.as_ref());
    }

    /// Parity always agrees with data shards, whatever the zero-padding
    /// needed to split the payload into `k` equal-length shards.
    #[test]
    fn prop_verify_holds_for_any_payload_length(
        len in 1usize..5000,
    ) {
        let encoder = Encoder::new(params())?;
        let data: Vec<u8> = (0..len as u32).map(|i| (i % 256) as u8).collect();
        let stripe = encoder.encode(&data)?;
        prop_assert!(encoder.verify(&stripe)?);
    }
}
