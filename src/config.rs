//! Coordinator configuration: environment-variable defaults overlaid by CLI
//! flags, using `clap`'s `env` attributes layered over a plain `Default`
//! impl.

use clap::Parser;
use std::time::Duration;

/// Tunables for the repair coordinator's scatter-gather read fan-out.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Max helpers read concurrently per repair.
    pub max_concurrent: usize,
    /// Per-helper read timeout before that helper is rescheduled.
    pub read_timeout: Duration,
    /// Overall timeout for a single repair before it's abandoned.
    pub repair_timeout: Duration,
    /// Read-buffer size hint for helper trace reads, in bytes.
    pub buffer_size: usize,
}

impl CoordinatorConfig {
    /// Environment variable names follow the
    /// `reconstruction.striped-read.*` convention for this engine's
    /// tunables.
    pub fn from_env() -> Self {
        let mut cfg = CoordinatorConfig::default();
        if let Ok(v) = std::env::var("RECONSTRUCTION_STRIPED_READ_TIMEOUT_MS") {
            if let Ok(ms) = v.parse::<u64>() {
                cfg.read_timeout = Duration::from_millis(ms);
            }
        }
        if let Ok(v) = std::env::var("RECONSTRUCTION_STRIPED_READ_BUFFER_SIZE") {
            if let Ok(bytes) = v.parse::<usize>() {
                cfg.buffer_size = bytes;
            }
        }
        if let Ok(v) = std::env::var("RECONSTRUCTION_MAX_CONCURRENT") {
            if let Ok(n) = v.parse::<usize>() {
                cfg.max_concurrent = n;
            }
        }
        if let Ok(v) = std::env::var("RECONSTRUCTION_REPAIR_TIMEOUT_MS") {
            if let Ok(ms) = v.parse::<u64>() {
                cfg.repair_timeout = Duration::from_millis(ms);
            }
        }
        cfg
    }

    pub fn apply_cli(mut self, args: &Args) -> Self {
        if let Some(max_concurrent) = args.max_concurrent {
            self.max_concurrent = max_concurrent;
        }
        if let Some(ms) = args.read_timeout_ms {
            self.read_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = args.repair_timeout_ms {
            self.repair_timeout = Duration::from_millis(ms);
        }
        if let Some(bytes) = args.buffer_size {
            self.buffer_size = bytes;
        }
        self
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        CoordinatorConfig {
            max_concurrent: 4,
            read_timeout: Duration::from_millis(500),
            repair_timeout: Duration::from_secs(10),
            buffer_size: 64 * 1024,
        }
    }
}

/// CLI overlay for [`CoordinatorConfig`], used by the `tr-repair` diagnostic
/// binary. Every field is optional: unset flags fall back to whatever
/// `CoordinatorConfig::from_env` already resolved.
#[derive(Debug, Parser)]
#[command(name = "tr-repair", about = "Trace Repair erasure-coding diagnostic CLI")]
pub struct Args {
    /// Max helpers read concurrently per repair.
    #[arg(long, env = "RECONSTRUCTION_MAX_CONCURRENT")]
    pub max_concurrent: Option<usize>,

    /// Per-helper read timeout in milliseconds.
    #[arg(long, env = "RECONSTRUCTION_STRIPED_READ_TIMEOUT_MS")]
    pub read_timeout_ms: Option<u64>,

    /// Overall repair timeout in milliseconds.
    #[arg(long, env = "RECONSTRUCTION_REPAIR_TIMEOUT_MS")]
    pub repair_timeout_ms: Option<u64>,

    /// Read-buffer size hint, in bytes.
    #[arg(long, env = "RECONSTRUCTION_STRIPED_READ_BUFFER_SIZE")]
    pub buffer_size: Option<usize>,

    /// Dump the static helper/recovery/dual-basis tables as JSON and exit.
    #[arg(long)]
    pub dump_tables: bool,

    /// Run a synthetic encode/erase/repair cycle over random data and
    /// report whether it round-tripped.
    #[arg(long)]
    pub self_test: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_has_sane_values() {
        let cfg = CoordinatorConfig::default();
        assert!(cfg.max_concurrent > 0);
        assert!(cfg.read_timeout.as_millis() > 0);
    }
}
