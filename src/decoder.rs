//! Trace Repair decoder: reconstructs a single erased shard from the repair
//! traces of its `n - 1` surviving helpers.
//!
//! Unlike a plain RS decoder, which requires whole shards from `k`
//! survivors, this combines small per-helper traces from all `n - 1`
//! survivors. No matrix inversion happens here at run time — recovery
//! coefficients were folded into the static `crate::tables::TABLES` once,
//! at table-build time.

use crate::error::{Error, Result};
use crate::params::CodecParams;
use crate::tables::TABLES;
use crate::wire::unpack_bits;
use bytes::Bytes;
use tracing::instrument;

/// One helper's contribution toward repairing a given erased index: its
/// index in the stripe and its bit-packed trace at the bandwidth
/// `crate::tables::TableBundle::bandwidth(helper_index, erased_index)`.
#[derive(Debug, Clone)]
pub struct HelperTrace {
    pub helper_index: usize,
    pub packed: Bytes,
}

/// Reconstructs one erased shard from helper traces.
pub struct Decoder {
    params: CodecParams,
}

impl Decoder {
    pub fn new(params: CodecParams) -> Self {
        Decoder { params }
    }

    /// Reconstruct the erased shard at `erased_index` from `traces`, one
    /// entry per surviving position. `shard_len` is the (known) length of
    /// every shard in the stripe, in bytes.
    ///
    /// Every position other than `erased_index` must appear exactly once in
    /// `traces`; missing or duplicate entries are a caller error
    /// (`Error::InsufficientSources` / `Error::InvalidArgument`
    /// respectively), not silently tolerated.
    #[instrument(skip(self, traces), fields(erased_index, shard_len))]
    pub fn reconstruct(&self, erased_index: usize, shard_len: usize, traces: &[HelperTrace]) -> Result<Bytes> {
        let n = self.params.n();
        if erased_index >= n {
            return Err(Error::InvalidArgument(format!(
                "erased_index {erased_index} out of range for n={n}"
            )));
        }

        let expected_helpers = n - 1;
        if traces.len() < expected_helpers {
            return Err(Error::InsufficientSources {
                stripe_id: 0,
                available: traces.len(),
                required: expected_helpers,
            });
        }

        let mut seen = vec![false; n];
        for trace in traces {
            if trace.helper_index == erased_index {
                return Err(Error::InvalidArgument(format!(
                    "trace for helper_index {} collides with erased_index",
                    trace.helper_index
                )));
            }
            if trace.helper_index >= n {
                return Err(Error::InvalidArgument(format!(
                    "helper_index {} out of range for n={n}",
                    trace.helper_index
                )));
            }
            if seen[trace.helper_index] {
                return Err(Error::InvalidArgument(format!(
                    "duplicate trace for helper_index {}",
                    trace.helper_index
                )));
            }
            seen[trace.helper_index] = true;
        }

        let t = self.params.t();
        let dual_basis = TABLES.dual_basis(erased_index);

        let mut per_helper_bits: Vec<(usize, u8, Vec<bool>)> = Vec::with_capacity(traces.len());
        for trace in traces {
            let row = TABLES
                .helper_row(trace.helper_index, erased_index)
                .ok_or_else(|| {
                    Error::InvalidArgument(format!(
                        "no helper row for ({}, {erased_index})",
                        trace.helper_index
                    ))
                })?;
            let n_bits = shard_len * row.bw as usize;
            let required_bytes = n_bits.div_ceil(8);
            if trace.packed.len() < required_bytes {
                return Err(Error::CorruptInput {
                    stripe_id: 0,
                    reason: format!(
                        "trace from helper {} too short: expected >= {required_bytes} bytes, got {}",
                        trace.helper_index,
                        trace.packed.len()
                    ),
                });
            }
            let bits = unpack_bits(&trace.packed, n_bits);
            per_helper_bits.push((trace.helper_index, row.bw, bits));
        }

        let mut out = vec![0u8; shard_len];
        for (p, out_byte) in out.iter_mut().enumerate() {
            let mut target = vec![false; t];
            for (helper_index, bw, bits) in &per_helper_bits {
                let recovery = TABLES.recovery_row(*helper_index, erased_index).ok_or_else(|| {
                    Error::Internal(format!("no recovery row for ({helper_index}, {erased_index})"))
                })?;
                let bw = *bw as usize;
                let helper_trace_bits: Vec<bool> = (0..bw).map(|a| bits[a * shard_len + p]).collect();
                for s in 0..t {
                    let mask = crate::bits::expand_mask(recovery.r[s], bw as u8);
                    let contribution = mask
                        .iter()
                        .zip(helper_trace_bits.iter())
                        .fold(false, |acc, (&m, &b)| acc ^ (m && b));
                    target[s] ^= contribution;
                }
            }

            let mut recovered = 0u8;
            for (s, &target_bit) in target.iter().enumerate() {
                if target_bit {
                    recovered ^= dual_basis[s];
                }
            }
            *out_byte = recovered;
        }

        Ok(Bytes::from(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::Encoder;
    use assert_matches::assert_matches;

    fn params() -> CodecParams {
        CodecParams::default()
    }

    #[test]
    fn reconstructs_each_erased_index_from_all_others() {
        let enc = Encoder::new(params()).unwrap();
        let dec = Decoder::new(params());
        let data = b"trace repair round trip payload spanning multiple shard bytes!!";
        let stripe = enc.encode(data).unwrap();
        let shard_len = stripe[0].len();

        for erased in 0..stripe.len() {
            let traces: Vec<HelperTrace> = (0..stripe.len())
                .filter(|&i| i != erased)
                .map(|i| {
                    let trace = enc.compute_trace(i, erased, &stripe[i]).unwrap();
                    HelperTrace {
                        helper_index: i,
                        packed: trace.packed,
                    }
                })
                .collect();

            let recovered = dec.reconstruct(erased, shard_len, &traces).unwrap();
            assert_eq!(recovered.as_ref(), stripe[erased].0.as_ref(), "erased={erased}");
        }
    }

    #[test]
    fn rejects_insufficient_traces() {
        let enc = Encoder::new(params()).unwrap();
        let dec = Decoder::new(params());
        let stripe = enc.encode(b"short payload").unwrap();
        let shard_len = stripe[0].len();
        let traces: Vec<HelperTrace> = (0..3)
            .map(|i| {
                let trace = enc.compute_trace(i, 8, &stripe[i]).unwrap();
                HelperTrace {
                    helper_index: i,
                    packed: trace.packed,
                }
            })
            .collect();
        let err = dec.reconstruct(8, shard_len, &traces).unwrap_err();
        assert_matches!(err, Error::InsufficientSources { .. });
    }

    #[test]
    fn rejects_duplicate_helper_index() {
        let enc = Encoder::new(params()).unwrap();
        let dec = Decoder::new(params());
        let stripe = enc.encode(b"short payload for duplicate test").unwrap();
        let shard_len = stripe[0].len();
        let mut traces: Vec<HelperTrace> = (0..stripe.len())
            .filter(|&i| i != 8)
            .map(|i| {
                let trace = enc.compute_trace(i, 8, &stripe[i]).unwrap();
                HelperTrace {
                    helper_index: i,
                    packed: trace.packed,
                }
            })
            .collect();
        let dup = traces[0].clone();
        traces.push(dup);
        let err = dec.reconstruct(8, shard_len, &traces).unwrap_err();
        assert_matches!(err, Error::InvalidArgument(_));
    }
}
