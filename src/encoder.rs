//! Trace Repair encoder: Cauchy RS stripe encoding plus repair-trace
//! production.
//!
//! Wraps this crate's own GF kernel (`crate::gf`) and adds the extra
//! per-helper output a plain RS encoder never had to produce: a bit-packed
//! repair trace for any other index in the stripe.

use crate::error::{Error, Result};
use crate::gf::{self, GfTables};
use crate::params::CodecParams;
use crate::tables::TABLES;
use crate::wire::pack_bits;
use bytes::Bytes;
use tracing::instrument;

/// A single shard of a stripe: an opaque, fixed-length byte buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shard(pub Bytes);

impl Shard {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A full stripe: `k` data shards followed by `m` parity shards, all the
/// same length.
pub type Stripe = Vec<Shard>;

/// A bit-packed repair trace computed from one helper's shard for one
/// erased index, along with the bandwidth it was packed at.
#[derive(Debug, Clone)]
pub struct Trace {
    pub bw: u8,
    pub packed: Bytes,
}

/// Encodes data into stripes and produces repair traces from live shards.
pub struct Encoder {
    params: CodecParams,
    gf_tables: GfTables,
}

impl Encoder {
    #[instrument(skip(params), fields(k = params.k, m = params.m))]
    pub fn new(params: CodecParams) -> Result<Self> {
        let gf_tables = gf::init_tables(params.k, params.m, &TABLES.generator)?;
        Ok(Encoder { params, gf_tables })
    }

    pub fn shard_count(&self) -> usize {
        self.params.n()
    }

    /// Split `data` into `k` equal-length shards (zero-padded to a multiple
    /// of `k`) and compute the `m` parity shards.
    #[instrument(skip(self, data), fields(data_len = data.len()))]
    pub fn encode(&self, data: &[u8]) -> Result<Stripe> {
        if data.is_empty() {
            return Err(Error::InvalidArgument("cannot encode empty input".into()));
        }

        let k = self.params.k;
        let shard_len = data.len().div_ceil(k);
        let mut data_shards: Vec<Vec<u8>> = Vec::with_capacity(k);
        for i in 0..k {
            let start = i * shard_len;
            let end = (start + shard_len).min(data.len());
            let mut buf = vec![0u8; shard_len];
            if start < data.len() {
                buf[..end - start].copy_from_slice(&data[start..end]);
            }
            data_shards.push(buf);
        }

        let data_refs: Vec<&[u8]> = data_shards.iter().map(|v| v.as_slice()).collect();
        let mut parity_bufs: Vec<Vec<u8>> = vec![vec![0u8; shard_len]; self.params.m];
        {
            let mut parity_refs: Vec<&mut [u8]> =
                parity_bufs.iter_mut().map(|v| v.as_mut_slice()).collect();
            gf::encode_data(&self.gf_tables, shard_len, &data_refs, &mut parity_refs)?;
        }

        let mut stripe = Vec::with_capacity(self.params.n());
        stripe.extend(data_shards.into_iter().map(|v| Shard(Bytes::from(v))));
        stripe.extend(parity_bufs.into_iter().map(|v| Shard(Bytes::from(v))));
        Ok(stripe)
    }

    /// Verify that a full stripe's parity shards agree with its data
    /// shards, recomputing parity and comparing byte-for-byte.
    pub fn verify(&self, stripe: &Stripe) -> Result<bool> {
        if stripe.len() != self.params.n() {
            return Err(Error::InvalidArgument(format!(
                "expected {} shards, got {}",
                self.params.n(),
                stripe.len()
            )));
        }
        let shard_len = stripe[0].len();
        let data_refs: Vec<&[u8]> = stripe[..self.params.k].iter().map(|s| &s.0[..]).collect();
        let mut recomputed: Vec<Vec<u8>> = vec![vec![0u8; shard_len]; self.params.m];
        {
            let mut refs: Vec<&mut [u8]> = recomputed.iter_mut().map(|v| v.as_mut_slice()).collect();
            gf::encode_data(&self.gf_tables, shard_len, &data_refs, &mut refs)?;
        }
        for (p, expected) in recomputed.iter().enumerate() {
            if stripe[self.params.k + p].0.as_ref() != expected.as_slice() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Compute the bit-packed repair trace that helper `helper_index`
    /// contributes toward repairing `erased_index`, from its own live
    /// shard bytes.
    #[instrument(skip(self, shard), fields(helper_index, erased_index, shard_len = shard.len()))]
    pub fn compute_trace(&self, helper_index: usize, erased_index: usize, shard: &Shard) -> Result<Trace> {
        if helper_index == erased_index {
            return Err(Error::InvalidArgument(
                "a helper cannot compute a trace for itself".into(),
            ));
        }
        let row = TABLES.helper_row(helper_index, erased_index).ok_or_else(|| {
            Error::InvalidArgument(format!(
                "no helper row for ({helper_index}, {erased_index})"
            ))
        })?;

        let mut bits = Vec::with_capacity(shard.len() * row.bw as usize);
        for &coef in &row.coeffs {
            for &byte in shard.0.iter() {
                bits.push(gf::parity8(coef & byte));
            }
        }
        let packed = pack_bits(&bits);
        Ok(Trace {
            bw: row.bw,
            packed: Bytes::from(packed),
        })
    }
}

/// Fraction of raw data size the stripe occupies on the wire, `n / k`.
pub fn storage_overhead(params: &CodecParams) -> f64 {
    params.n() as f64 / params.k as f64
}

/// Fraction of stored bytes that are original data, `k / n`.
pub fn storage_efficiency(params: &CodecParams) -> f64 {
    params.k as f64 / params.n() as f64
}

/// Helper exposed for tests that need a raw mask-compression check against
/// the static recovery tables without pulling in the full decode path.
#[cfg(test)]
fn recovery_mask_for(i: usize, j: usize, s: usize) -> u32 {
    let row = TABLES.recovery_row(i, j).unwrap();
    let bits = crate::bits::expand_mask(row.r[s], row.bw);
    crate::bits::compress_mask(&bits)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> CodecParams {
        CodecParams::default()
    }

    #[test]
    fn encode_produces_n_shards_of_equal_length() {
        let enc = Encoder::new(params()).unwrap();
        let stripe = enc.encode(b"the quick brown fox jumps over the lazy dog").unwrap();
        assert_eq!(stripe.len(), enc.shard_count());
        let len = stripe[0].len();
        assert!(stripe.iter().all(|s| s.len() == len));
    }

    #[test]
    fn verify_accepts_self_produced_stripe() {
        let enc = Encoder::new(params()).unwrap();
        let stripe = enc.encode(b"some payload data for a stripe test").unwrap();
        assert!(enc.verify(&stripe).unwrap());
    }

    #[test]
    fn verify_rejects_corrupted_parity() {
        let enc = Encoder::new(params()).unwrap();
        let mut stripe = enc.encode(b"some payload data for a stripe test").unwrap();
        let last = stripe.len() - 1;
        let mut bytes = stripe[last].0.to_vec();
        bytes[0] ^= 0xFF;
        stripe[last] = Shard(Bytes::from(bytes));
        assert!(!enc.verify(&stripe).unwrap());
    }

    #[test]
    fn rejects_empty_input() {
        let enc = Encoder::new(params()).unwrap();
        assert!(enc.encode(&[]).is_err());
    }

    #[test]
    fn trace_packed_length_matches_bandwidth() {
        let enc = Encoder::new(params()).unwrap();
        let stripe = enc.encode(b"payload long enough to span several bytes of shard data").unwrap();
        let trace = enc.compute_trace(0, 1, &stripe[0]).unwrap();
        let expected_bits = stripe[0].len() * trace.bw as usize;
        assert_eq!(trace.packed.len(), expected_bits.div_ceil(8));
    }

    #[test]
    fn recovery_mask_round_trips() {
        assert_eq!(recovery_mask_for(0, 1, 0), recovery_mask_for(0, 1, 0));
    }
}
