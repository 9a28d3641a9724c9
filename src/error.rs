//! Error types for the Trace Repair engine.
//!
//! Grouped by subsystem: argument validation, the GF/table kernel, shard
//! sourcing, and repair coordination — the subsystems this engine actually
//! has. No Kubernetes, SPDK, or tiered-storage variants here; those
//! concerns aren't part of this crate.

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the Trace Repair engine
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    // =========================================================================
    // Argument / configuration validation
    // =========================================================================
    /// A caller-supplied parameter (shape, index, length) is out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A requested variant of an operation isn't implemented by this engine.
    #[error("operation not implemented: {0}")]
    NotImplemented(String),

    // =========================================================================
    // Shard sourcing (reads from helpers during encode/decode/repair)
    // =========================================================================
    /// A single helper read (full shard or repair trace) failed or timed out.
    #[error("helper {helper_index} read failed for stripe {stripe_id}: {reason}")]
    SourceReadFailure {
        stripe_id: u64,
        helper_index: u8,
        reason: String,
    },

    /// Fewer usable sources survived than the codec requires.
    #[error(
        "insufficient sources for repair of stripe {stripe_id}: have {available}, need {required}"
    )]
    InsufficientSources {
        stripe_id: u64,
        available: usize,
        required: usize,
    },

    /// Input bytes don't match the shape the codec expects (bad shard length,
    /// malformed trace buffer, checksum mismatch upstream of this crate).
    #[error("corrupt input for stripe {stripe_id}: {reason}")]
    CorruptInput { stripe_id: u64, reason: String },

    // =========================================================================
    // Coordinator lifecycle
    // =========================================================================
    /// The repair was cancelled via its `CancellationToken` before completing.
    #[error("repair of stripe {stripe_id} cancelled")]
    Cancelled { stripe_id: u64 },

    // =========================================================================
    // Catch-all
    // =========================================================================
    /// An invariant this crate maintains internally was violated; should
    /// never surface from valid inputs.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// `true` for errors the coordinator should reschedule rather than fail.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::SourceReadFailure { .. })
    }
}
