//! Trace Repair: a Cauchy Reed-Solomon erasure-coding engine augmented with
//! per-helper repair traces, so a single lost shard can be rebuilt from
//! small bit-packed sketches of the other `n - 1` shards instead of
//! downloading `k` whole ones.
//!
//! # Architecture
//!
//! ```text
//! GF(2^8) kernel (gf) + static tables (tables)
//!              │
//!     ┌────────┴────────┐
//!     │                 │
//! Encoder           Decoder
//! (stripes + traces) (trace → shard)
//!     │                 │
//!     └────────┬────────┘
//!              │
//!     Repair Coordinator (coordinator)
//!     bounded scatter-gather over helper traces
//! ```
//!
//! # Modules
//!
//! - [`gf`] - GF(2^8) arithmetic and the Cauchy RS encode kernel
//! - [`tables`] - static helper/recovery/dual-basis lookup tables
//! - [`bits`] - bandwidth-mask <-> integer conversion shared by tables/decoder
//! - [`wire`] - MSB-first bit packing for repair traces
//! - [`params`] - codec shape and diagnostic flags
//! - [`encoder`] - stripe encoding and per-helper trace production
//! - [`decoder`] - single-shard reconstruction from helper traces
//! - [`coordinator`] - bounded-concurrency repair orchestration
//! - [`config`] - coordinator tunables (env + CLI)
//! - [`metrics`] - append-only repair event log
//! - [`error`] - error types

pub mod bits;
pub mod config;
pub mod coordinator;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod gf;
pub mod metrics;
pub mod params;
pub mod tables;
pub mod wire;

pub use coordinator::{RepairCoordinator, RepairStats, RepairStatsSnapshot, RepairStatus, TraceSource};
pub use decoder::{Decoder, HelperTrace};
pub use encoder::{Encoder, Shard, Stripe, Trace};
pub use error::{Error, Result};
pub use params::CodecParams;
pub use tables::TableBundle;
