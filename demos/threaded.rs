//! ## Example usage of the [`modpow_bridge`] crate.
//!
//! Each worker thread plays a dealer in Feldman verifiable secret sharing. It
//! owns its own [`Bridge`], so its exponentiations are recorded and replayed
//! privately, while every worker hands its batches to the same
//! [`ParallelBackend`].
//!
//! Every worker runs two units of work: dealing (commitments to the
//! polynomial) and verification of every share against those commitments.
//! Verification exponentiates the commitments, so it cannot be part of the
//! same batch as dealing.
//!
//! Set `MPBRIDGE_BATCHING=0` to compare against unbatched execution, and
//! `RUST_LOG=modpow_bridge=trace` to see per-cycle timings.

use anyhow::{anyhow, bail};
use clap::Parser;
use libpaillier::unknown_order::BigNumber;
use modpow_bridge::{
    feldman::{FeldmanScheme, SafePrimeGroup},
    Bridge, BridgeConfig, BridgeMetrics, ModPow, ParallelBackend, ReplayMode, Work,
};
use rand::{rngs::StdRng, SeedableRng};
use std::{sync::Arc, thread, time::Instant};
use tracing::{info, instrument, span, Level};
use tracing_subscriber::{self, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Number of dealer worker threads to use.
    #[arg(short, long, default_value_t = 4)]
    number_of_workers: usize,
    /// Bit length of the safe prime modulus.
    #[arg(short, long, default_value_t = 256)]
    bits: usize,
    /// Number of shares each dealer produces.
    #[arg(short, long, default_value_t = 5)]
    size: usize,
    /// Number of shares needed to recover a secret.
    #[arg(short, long, default_value_t = 3)]
    threshold: usize,
    /// Threads in the shared backend pool. Uses rayon's global pool if unset.
    #[arg(long)]
    backend_threads: Option<usize>,
    /// Check every backend answer against the operands it claims to answer.
    #[arg(long)]
    verify: bool,
}

struct WorkerReport {
    worker: usize,
    metrics: BridgeMetrics,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    // Set up logging.
    let filter = EnvFilter::from_default_env();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .without_time()
        .compact()
        .init();
    let span = span!(Level::INFO, "main");
    let _enter = span.entered();

    let config = BridgeConfig::from_env()?;
    let mode = if cli.verify {
        ReplayMode::Verified
    } else {
        ReplayMode::Trusted
    };

    info!("Generating a {}-bit safe prime", cli.bits);
    let p = BigNumber::safe_prime(cli.bits);
    let q = (p.clone() - BigNumber::one()) / BigNumber::from(2u64);
    let group = SafePrimeGroup::new(p, q, BigNumber::from(4u64))?;
    let scheme = FeldmanScheme::new(group, cli.size, cli.threshold)?;

    let backend = match cli.backend_threads {
        Some(threads) => ParallelBackend::with_threads(threads)?,
        None => ParallelBackend::new(),
    };
    let backend = Arc::new(backend);

    info!("Spawning {} worker threads", cli.number_of_workers);
    let started = Instant::now();
    let handles: Vec<_> = (0..cli.number_of_workers)
        .map(|worker| {
            let scheme = scheme.clone();
            let backend = backend.clone();
            let config = config.clone();
            thread::spawn(move || dealer_worker(worker, scheme, backend, config, mode))
        })
        .collect();

    let mut reports = Vec::with_capacity(handles.len());
    for handle in handles {
        let report = handle
            .join()
            .map_err(|_| anyhow!("A worker thread panicked"))??;
        reports.push(report);
    }
    let elapsed = started.elapsed();

    for report in &reports {
        let metrics = &report.metrics;
        info!(
            "Worker {}: {} cycles, {} batched exponentiations, record {:?}, compute {:?}, replay {:?}, direct {}",
            report.worker,
            metrics.cycles(),
            metrics.batched_requests(),
            metrics.record_time(),
            metrics.compute_time(),
            metrics.replay_time(),
            metrics.direct_calls(),
        );
    }
    info!(
        "All {} dealers shared and verified their secrets in {:?}",
        reports.len(),
        elapsed
    );
    Ok(())
}

#[instrument(skip(scheme, backend, config), err(Debug))]
fn dealer_worker(
    worker: usize,
    scheme: FeldmanScheme,
    backend: Arc<ParallelBackend>,
    config: BridgeConfig,
    mode: ReplayMode,
) -> anyhow::Result<WorkerReport> {
    let mut rng = StdRng::from_entropy();
    let mut bridge = Bridge::new(backend, config);

    // Randomness is drawn before the unit of work runs, so both of its
    // passes see the same polynomial.
    let secret = BigNumber::from_rng(scheme.group().order(), &mut rng);
    let polynomial = scheme.sample_polynomial(&secret, &mut rng);

    let deal = |ops: &mut dyn ModPow| scheme.deal(&polynomial, ops);
    let dealt = run(&mut bridge, &deal, mode)?;

    let verify = |ops: &mut dyn ModPow| {
        scheme.verify_all(dealt.shares(), dealt.commitments(), ops)
    };
    if !run(&mut bridge, &verify, mode)? {
        bail!("Worker {worker}: a share failed verification");
    }

    let recovered = scheme.recover(&dealt.shares()[..scheme.threshold()])?;
    if recovered != secret {
        bail!("Worker {worker}: recovered the wrong secret");
    }
    info!("Worker {worker}: secret shared, verified and recovered");

    Ok(WorkerReport {
        worker,
        metrics: bridge.state().metrics().clone(),
    })
}

fn run<W: Work>(
    bridge: &mut Bridge<ParallelBackend>,
    work: &W,
    mode: ReplayMode,
) -> anyhow::Result<W::Output> {
    let dummy = bridge.config().dummy().clone();
    Ok(bridge.run_with(work, dummy, mode)?)
}
