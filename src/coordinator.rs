//! Repair coordinator: bounded-concurrency scatter-gather over helper
//! traces, with per-read timeouts and reschedule-on-failure.
//!
//! A semaphore bounds concurrent reads, a per-read `tokio::time::timeout`
//! guards each one, and a single driver loop owns the task set. Unlike a
//! plain erasure-coding reader that falls back from a "fast path" to a
//! "degraded path" whole-shard read, every helper read here *is* a small
//! trace read, and a failed helper is rescheduled rather than abandoned,
//! since repair only needs `n - 1` of them to eventually answer.

use crate::decoder::{Decoder, HelperTrace};
use crate::error::{Error, Result};
use crate::metrics::{Event, EventKind, MetricsSink};
use crate::params::CodecParams;
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{instrument, warn};

use crate::config::CoordinatorConfig;

/// Status of a repair the coordinator knows about, keyed by `(stripe_id,
/// erased_index)`. A small status registry scoped down to what this
/// coordinator's single `repair()` call needs to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairStatus {
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

/// A source of per-helper repair traces: a remote node, a local disk, or in
/// tests, an in-memory mock.
#[async_trait]
pub trait TraceSource: Send + Sync {
    async fn read_trace(
        &self,
        stripe_id: u64,
        helper_index: usize,
        erased_index: usize,
    ) -> Result<HelperTrace>;
}

/// Atomic counters for repair activity, snapshotted via [`RepairStats::snapshot`].
#[derive(Default)]
pub struct RepairStats {
    repairs_started: AtomicU64,
    repairs_completed: AtomicU64,
    repairs_failed: AtomicU64,
    repairs_cancelled: AtomicU64,
    helper_reads_ok: AtomicU64,
    helper_reads_failed: AtomicU64,
    helper_reads_rescheduled: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RepairStatsSnapshot {
    pub repairs_started: u64,
    pub repairs_completed: u64,
    pub repairs_failed: u64,
    pub repairs_cancelled: u64,
    pub helper_reads_ok: u64,
    pub helper_reads_failed: u64,
    pub helper_reads_rescheduled: u64,
}

impl RepairStats {
    pub fn snapshot(&self) -> RepairStatsSnapshot {
        RepairStatsSnapshot {
            repairs_started: self.repairs_started.load(Ordering::Relaxed),
            repairs_completed: self.repairs_completed.load(Ordering::Relaxed),
            repairs_failed: self.repairs_failed.load(Ordering::Relaxed),
            repairs_cancelled: self.repairs_cancelled.load(Ordering::Relaxed),
            helper_reads_ok: self.helper_reads_ok.load(Ordering::Relaxed),
            helper_reads_failed: self.helper_reads_failed.load(Ordering::Relaxed),
            helper_reads_rescheduled: self.helper_reads_rescheduled.load(Ordering::Relaxed),
        }
    }
}

/// Max times a single helper's read is rescheduled before the whole repair
/// gives up on it and fails with `InsufficientSources`.
const MAX_ATTEMPTS_PER_HELPER: u32 = 3;

pub struct RepairCoordinator {
    config: CoordinatorConfig,
    params: CodecParams,
    source: Arc<dyn TraceSource>,
    stats: Arc<RepairStats>,
    metrics: Option<Arc<MetricsSink>>,
    active_repairs: DashMap<(u64, usize), RepairStatus>,
}

impl RepairCoordinator {
    pub fn new(config: CoordinatorConfig, params: CodecParams, source: Arc<dyn TraceSource>) -> Self {
        RepairCoordinator {
            config,
            params,
            source,
            stats: Arc::new(RepairStats::default()),
            metrics: None,
            active_repairs: DashMap::new(),
        }
    }

    pub fn with_metrics(mut self, sink: Arc<MetricsSink>) -> Self {
        self.metrics = Some(sink);
        self
    }

    pub fn stats(&self) -> RepairStatsSnapshot {
        self.stats.snapshot()
    }

    /// Status of a repair previously or currently tracked by this
    /// coordinator, if any.
    pub fn repair_status(&self, stripe_id: u64, erased_index: usize) -> Option<RepairStatus> {
        self.active_repairs.get(&(stripe_id, erased_index)).map(|r| *r)
    }

    fn log(&self, kind: EventKind, stripe_id: u64, detail: impl Into<String>) {
        if let Some(sink) = &self.metrics {
            let label = format!("stripe={stripe_id} {}", detail.into());
            if let Err(e) = sink.record(Event::new(kind, label)) {
                warn!(error = %e, "failed to write repair metrics event");
            }
        }
    }

    /// Repair the shard at `erased_index` of stripe `stripe_id`, gathering
    /// traces from all `n - 1` other positions. Cancellable via `cancel`;
    /// bounded overall by `config.repair_timeout`.
    #[instrument(skip(self, cancel), fields(stripe_id, erased_index))]
    pub async fn repair(
        &self,
        stripe_id: u64,
        erased_index: usize,
        shard_len: usize,
        cancel: CancellationToken,
    ) -> Result<Bytes> {
        self.stats.repairs_started.fetch_add(1, Ordering::Relaxed);
        self.active_repairs
            .insert((stripe_id, erased_index), RepairStatus::InProgress);
        self.log(EventKind::Start, stripe_id, format!("event=repair_started erased={erased_index}"));

        let result = tokio::time::timeout(
            self.config.repair_timeout,
            self.gather_and_decode(stripe_id, erased_index, shard_len, cancel.clone()),
        )
        .await;

        let key = (stripe_id, erased_index);
        match result {
            Ok(Ok(bytes)) => {
                self.stats.repairs_completed.fetch_add(1, Ordering::Relaxed);
                self.active_repairs.insert(key, RepairStatus::Completed);
                self.log(EventKind::End, stripe_id, format!("event=repair_completed erased={erased_index}"));
                Ok(bytes)
            }
            Ok(Err(e)) => {
                if matches!(e, Error::Cancelled { .. }) {
                    self.stats.repairs_cancelled.fetch_add(1, Ordering::Relaxed);
                    self.active_repairs.insert(key, RepairStatus::Cancelled);
                    self.log(EventKind::End, stripe_id, format!("event=repair_cancelled erased={erased_index}"));
                } else {
                    self.stats.repairs_failed.fetch_add(1, Ordering::Relaxed);
                    self.active_repairs.insert(key, RepairStatus::Failed);
                    self.log(EventKind::End, stripe_id, format!("event=repair_failed erased={erased_index} reason={e}"));
                }
                Err(e)
            }
            Err(_elapsed) => {
                self.stats.repairs_failed.fetch_add(1, Ordering::Relaxed);
                self.active_repairs.insert(key, RepairStatus::Failed);
                self.log(
                    EventKind::End,
                    stripe_id,
                    format!("event=repair_failed erased={erased_index} reason=overall_timeout"),
                );
                Err(Error::SourceReadFailure {
                    stripe_id,
                    helper_index: erased_index as u8,
                    reason: "repair timed out before all helpers answered".into(),
                })
            }
        }
    }

    async fn gather_and_decode(
        &self,
        stripe_id: u64,
        erased_index: usize,
        shard_len: usize,
        cancel: CancellationToken,
    ) -> Result<Bytes> {
        let n = self.params.n();
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent.max(1)));

        let mut pending: Vec<usize> = (0..n).filter(|&i| i != erased_index).collect();
        let mut attempts = vec![0u32; n];
        let mut collected: Vec<HelperTrace> = Vec::with_capacity(n - 1);

        let mut in_flight: JoinSet<(usize, Result<HelperTrace>)> = JoinSet::new();

        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled { stripe_id });
            }

            while in_flight.len() < self.config.max_concurrent && !pending.is_empty() {
                let helper_index = pending.remove(0);
                attempts[helper_index] += 1;
                let permit = semaphore.clone().acquire_owned().await.map_err(|_| {
                    Error::Internal("repair semaphore closed unexpectedly".into())
                })?;
                let source = self.source.clone();
                let read_timeout = self.config.read_timeout;
                in_flight.spawn(async move {
                    let _permit = permit;
                    let res = tokio::time::timeout(
                        read_timeout,
                        source.read_trace(stripe_id, helper_index, erased_index),
                    )
                    .await;
                    let res = match res {
                        Ok(inner) => inner,
                        Err(_elapsed) => Err(Error::SourceReadFailure {
                            stripe_id,
                            helper_index: helper_index as u8,
                            reason: "helper read timed out".into(),
                        }),
                    };
                    (helper_index, res)
                });
            }

            if in_flight.is_empty() {
                if pending.is_empty() {
                    break;
                }
                continue;
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(Error::Cancelled { stripe_id });
                }
                joined = in_flight.join_next() => {
                    let Some(joined) = joined else { continue };
                    let (helper_index, outcome) = joined.map_err(|e| {
                        Error::Internal(format!("repair read task panicked: {e}"))
                    })?;
                    match outcome {
                        Ok(trace) => {
                            self.stats.helper_reads_ok.fetch_add(1, Ordering::Relaxed);
                            collected.push(trace);
                        }
                        Err(e) => {
                            self.stats.helper_reads_failed.fetch_add(1, Ordering::Relaxed);
                            if attempts[helper_index] < MAX_ATTEMPTS_PER_HELPER {
                                self.stats.helper_reads_rescheduled.fetch_add(1, Ordering::Relaxed);
                                self.log(
                                    EventKind::Mark,
                                    stripe_id,
                                    format!(
                                        "event=helper_read_rescheduled helper={helper_index} attempt={} reason={e}",
                                        attempts[helper_index]
                                    ),
                                );
                                pending.push(helper_index);
                            } else {
                                self.log(
                                    EventKind::Mark,
                                    stripe_id,
                                    format!("event=helper_read_exhausted helper={helper_index} reason={e}"),
                                );
                            }
                        }
                    }
                }
            }

            if collected.len() == n - 1 {
                break;
            }
        }

        if collected.len() < n - 1 {
            return Err(Error::InsufficientSources {
                stripe_id,
                available: collected.len(),
                required: n - 1,
            });
        }

        let decoder = Decoder::new(self.params.clone());
        decoder.reconstruct(erased_index, shard_len, &collected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::Encoder;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration as StdDuration;
    use tokio::sync::Mutex as AsyncMutex;

    struct MockSource {
        stripe: Vec<crate::encoder::Shard>,
        encoder: Encoder,
        fail_once: AsyncMutex<std::collections::HashSet<usize>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TraceSource for MockSource {
        async fn read_trace(
            &self,
            _stripe_id: u64,
            helper_index: usize,
            erased_index: usize,
        ) -> Result<HelperTrace> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            let mut fail_once = self.fail_once.lock().await;
            if fail_once.remove(&helper_index) {
                return Err(Error::SourceReadFailure {
                    stripe_id: 0,
                    helper_index: helper_index as u8,
                    reason: "injected failure".into(),
                });
            }
            drop(fail_once);
            let trace = self
                .encoder
                .compute_trace(helper_index, erased_index, &self.stripe[helper_index])?;
            Ok(HelperTrace {
                helper_index,
                packed: trace.packed,
            })
        }
    }

    fn params() -> CodecParams {
        CodecParams::default()
    }

    #[tokio::test]
    async fn repairs_successfully_with_no_failures() {
        let encoder = Encoder::new(params()).unwrap();
        let stripe = encoder.encode(b"coordinator happy path payload data").unwrap();
        let shard_len = stripe[0].len();
        let erased = 4;
        let expected = stripe[erased].0.clone();

        let source = Arc::new(MockSource {
            stripe,
            encoder,
            fail_once: AsyncMutex::new(std::collections::HashSet::new()),
            calls: AtomicUsize::new(0),
        });

        let coordinator = RepairCoordinator::new(CoordinatorConfig::default(), params(), source);
        let cancel = CancellationToken::new();
        let recovered = coordinator
            .repair(1, erased, shard_len, cancel)
            .await
            .unwrap();
        assert_eq!(recovered, expected);
        assert_eq!(coordinator.stats().repairs_completed, 1);
        assert_eq!(coordinator.repair_status(1, erased), Some(RepairStatus::Completed));
    }

    #[tokio::test]
    async fn reschedules_a_failed_helper_instead_of_aborting() {
        let encoder = Encoder::new(params()).unwrap();
        let stripe = encoder.encode(b"coordinator reschedule path payload data here").unwrap();
        let shard_len = stripe[0].len();
        let erased = 2;
        let expected = stripe[erased].0.clone();

        let mut fail_once = std::collections::HashSet::new();
        fail_once.insert(0usize);

        let source = Arc::new(MockSource {
            stripe,
            encoder,
            fail_once: AsyncMutex::new(fail_once),
            calls: AtomicUsize::new(0),
        });

        let coordinator = RepairCoordinator::new(CoordinatorConfig::default(), params(), source);
        let cancel = CancellationToken::new();
        let recovered = coordinator
            .repair(2, erased, shard_len, cancel)
            .await
            .unwrap();
        assert_eq!(recovered, expected);
        assert_eq!(coordinator.stats().helper_reads_rescheduled, 1);
    }

    #[tokio::test]
    async fn cancellation_is_observed() {
        let encoder = Encoder::new(params()).unwrap();
        let stripe = encoder.encode(b"coordinator cancellation path payload data").unwrap();
        let shard_len = stripe[0].len();

        let source = Arc::new(MockSource {
            stripe,
            encoder,
            fail_once: AsyncMutex::new(std::collections::HashSet::new()),
            calls: AtomicUsize::new(0),
        });

        let coordinator = RepairCoordinator::new(CoordinatorConfig::default(), params(), source);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = coordinator.repair(3, 1, shard_len, cancel).await.unwrap_err();
        assert!(matches!(err, Error::Cancelled { .. }));
        let _ = StdDuration::from_millis(0);
    }
}
