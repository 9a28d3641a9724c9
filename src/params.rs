//! Codec parameters shared by the encoder, decoder, and coordinator.

use crate::error::{Error, Result};
use crate::tables::{K, M, N, T};
use serde::{Deserialize, Serialize};

/// Fixed-profile codec parameters: `k` data shards, `m` parity shards, a
/// name for logging/metrics, and whether diagnostics may dump the full
/// static table set.
///
/// This crate only ships static tables for the `(n=9, k=6, m=3, t=8)`
/// profile (see `crate::tables`), so [`CodecParams::new`] rejects any other
/// shape rather than silently mismatching shard count against table shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodecParams {
    pub k: usize,
    pub m: usize,
    pub codec_name: String,
    pub allow_verbose_dump: bool,
}

impl CodecParams {
    pub fn new(k: usize, m: usize, codec_name: impl Into<String>) -> Result<Self> {
        if k != K || m != M {
            return Err(Error::InvalidArgument(format!(
                "unsupported profile k={k} m={m}; this build only carries static tables for k={K} m={M}"
            )));
        }
        Ok(CodecParams {
            k,
            m,
            codec_name: codec_name.into(),
            allow_verbose_dump: false,
        })
    }

    pub fn with_verbose_dump(mut self, allow: bool) -> Self {
        self.allow_verbose_dump = allow;
        self
    }

    pub fn n(&self) -> usize {
        self.k + self.m
    }

    pub fn t(&self) -> usize {
        T
    }
}

impl Default for CodecParams {
    fn default() -> Self {
        CodecParams::new(K, M, "trace-repair-9-6-3").expect("default profile matches static tables")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unsupported_shapes() {
        assert!(CodecParams::new(4, 2, "rs-4-2").is_err());
    }

    #[test]
    fn default_matches_static_tables() {
        let params = CodecParams::default();
        assert_eq!(params.n(), N);
    }
}
