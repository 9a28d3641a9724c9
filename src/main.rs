//! Trace Repair diagnostic CLI
//!
//! A small binary around the `tr_repair` library: dumps the static
//! helper/recovery/dual-basis tables, or runs a synthetic encode-erase-
//! repair cycle against a randomly generated stripe and reports whether it
//! round-tripped. There's no server loop here — the engine is a library
//! meant to be embedded in a storage node; this binary stands in for a
//! running cluster's health/metrics endpoints, for local verification.

use clap::Parser;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tr_repair::config::Args;
use tr_repair::coordinator::{RepairCoordinator, TraceSource};
use tr_repair::decoder::HelperTrace;
use tr_repair::encoder::Encoder;
use tr_repair::error::Result;
use tr_repair::tables::TABLES;
use tr_repair::{CodecParams, Error};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_logging() {
    let filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .init();
}

struct InProcessSource {
    encoder: Encoder,
    stripe: tr_repair::Stripe,
}

#[async_trait::async_trait]
impl TraceSource for InProcessSource {
    async fn read_trace(
        &self,
        _stripe_id: u64,
        helper_index: usize,
        erased_index: usize,
    ) -> Result<HelperTrace> {
        let trace = self
            .encoder
            .compute_trace(helper_index, erased_index, &self.stripe[helper_index])?;
        Ok(HelperTrace {
            helper_index,
            packed: trace.packed,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let args = Args::parse();

    if args.dump_tables {
        let dump = TABLES.dump()?;
        println!("{dump}");
        return Ok(());
    }

    let params = CodecParams::default();
    info!(k = params.k, m = params.m, "trace repair engine starting");

    if args.self_test {
        run_self_test(&args, params).await?;
        return Ok(());
    }

    info!("nothing to do; pass --dump-tables or --self-test");
    Ok(())
}

async fn run_self_test(args: &Args, params: CodecParams) -> Result<()> {
    let encoder = Encoder::new(params.clone())?;

    let payload: Vec<u8> = (0..4096u32).map(|i| (i % 251) as u8).collect();
    let stripe = encoder.encode(&payload)?;
    let shard_len = stripe[0].len();

    let mut failures = 0usize;
    for erased in 0..stripe.len() {
        let source = Arc::new(InProcessSource {
            encoder: Encoder::new(params.clone())?,
            stripe: stripe.clone(),
        });

        let config = tr_repair::config::CoordinatorConfig::default().apply_cli(args);
        let coordinator = RepairCoordinator::new(config, params.clone(), source);
        let cancel = CancellationToken::new();

        match coordinator.repair(erased as u64, erased, shard_len, cancel).await {
            Ok(recovered) if recovered.as_ref() == stripe[erased].0.as_ref() => {
                info!(erased, "self-test repair OK");
            }
            Ok(_) => {
                error!(erased, "self-test repair produced wrong bytes");
                failures += 1;
            }
            Err(e) => {
                error!(erased, error = %e, "self-test repair failed");
                failures += 1;
            }
        }
    }

    if failures > 0 {
        return Err(Error::Internal(format!("{failures} self-test repairs failed")));
    }

    info!("self-test passed for all {} shards", stripe.len());
    Ok(())
}
