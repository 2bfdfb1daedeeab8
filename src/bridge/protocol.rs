// Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use super::{
    intercept::ModPow,
    metrics::CycleTimings,
    state::{Answers, BridgeState},
};
use crate::{
    backend::ComputeBackend,
    config::BridgeConfig,
    errors::{BridgeError, Result},
};
use libpaillier::unknown_order::BigNumber;
use std::{sync::Arc, time::Instant};
use tracing::{error, instrument, trace};

/// A unit of batchable work.
///
/// The bridge executes a unit of work twice: once to discover which
/// exponentiations it performs and once to feed it the results. `execute`
/// takes `&self` so that both passes see the same captured inputs, and it
/// must issue the same sequence of [`ModPow::modpow`] calls both times. In
/// particular, no operand may depend on the value returned by an earlier
/// exponentiation of the same unit of work: during the first pass that value
/// is a placeholder.
///
/// Any `Fn(&mut dyn ModPow) -> Result<T>` is a unit of work.
pub trait Work {
    type Output;

    fn execute(&self, ops: &mut dyn ModPow) -> Result<Self::Output>;
}

impl<T, F> Work for F
where
    F: Fn(&mut dyn ModPow) -> Result<T>,
{
    type Output = T;

    fn execute(&self, ops: &mut dyn ModPow) -> Result<T> {
        self(ops)
    }
}

/// How the replay pass is fed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReplayMode {
    /// Use [`ComputeBackend::compute`] and trust its results.
    #[default]
    Trusted,
    /// Use [`ComputeBackend::compute_debug`] and check every returned triple
    /// against the operands of the call it answers.
    Verified,
}

/// One execution context's view of the bridge: its private
/// [`BridgeState`], a handle on the shared backend, and the configuration.
///
/// Create one `Bridge` per worker. The backend is the only thing shared.
#[derive(Debug)]
pub struct Bridge<B: ?Sized> {
    state: BridgeState,
    backend: Arc<B>,
    config: BridgeConfig,
}

impl<B: ComputeBackend + ?Sized> Bridge<B> {
    pub fn new(backend: Arc<B>, config: BridgeConfig) -> Self {
        Self {
            state: BridgeState::new(config.direct_path()),
            backend,
            config,
        }
    }

    pub fn state(&self) -> &BridgeState {
        &self.state
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Run `work` with all of its exponentiations computed as one batch, using
    /// the configured dummy value.
    pub fn run<W: Work>(&mut self, work: &W) -> Result<W::Output> {
        let dummy = self.config.dummy().clone();
        self.run_with(work, dummy, ReplayMode::Trusted)
    }

    /// Like [`Bridge::run`], but every backend answer is checked against the
    /// operands it claims to answer. Slower; meant for debugging backends.
    pub fn run_debug<W: Work>(&mut self, work: &W) -> Result<W::Output> {
        let dummy = self.config.dummy().clone();
        self.run_with(work, dummy, ReplayMode::Verified)
    }

    /// Run one record/dispatch/replay cycle.
    ///
    /// `dummy` is returned for every exponentiation of the recording pass.
    /// If the cycle fails for any reason, the state is returned to idle before
    /// the error is reported, so this context can immediately start over.
    #[instrument(skip_all, err(Debug))]
    pub fn run_with<W: Work>(
        &mut self,
        work: &W,
        dummy: BigNumber,
        mode: ReplayMode,
    ) -> Result<W::Output> {
        if !self.config.batching() {
            trace!("Batching disabled; running unit of work directly.");
            return work.execute(&mut self.state);
        }

        let outcome = self.cycle(work, dummy, mode);
        if outcome.is_err() {
            self.state.abort();
        }
        outcome
    }

    fn cycle<W: Work>(
        &mut self,
        work: &W,
        dummy: BigNumber,
        mode: ReplayMode,
    ) -> Result<W::Output> {
        let mut timings = CycleTimings::default();

        let started = Instant::now();
        self.state.begin_recording(dummy)?;
        let first_pass = work.execute(&mut self.state)?;
        let batch = self.state.end_recording()?;
        timings.record = started.elapsed();

        if batch.is_empty() {
            // Nothing was exponentiated, so the first pass already computed
            // the real output.
            self.state.reset()?;
            self.state.metrics.finish_cycle(&timings, 0);
            trace!("Record: [{:?}] (no exponentiations)", timings.record);
            return Ok(first_pass);
        }
        drop(first_pass);

        let modulus = batch.modulus().ok_or_else(|| {
            error!("Recorded a non-empty batch without a modulus");
            BridgeError::InternalInvariantFailed
        })?;

        let started = Instant::now();
        let answers = match mode {
            ReplayMode::Trusted => Answers::Plain(self.backend.compute(batch.requests(), modulus)?),
            ReplayMode::Verified => {
                Answers::Verified(self.backend.compute_debug(batch.requests(), modulus)?)
            }
        };
        timings.compute = started.elapsed();

        let started = Instant::now();
        self.state.begin_replay(answers)?;
        let output = work.execute(&mut self.state)?;
        self.state.end_replay()?;
        timings.replay = started.elapsed();

        self.state.reset()?;
        self.state.metrics.finish_cycle(&timings, batch.len());
        trace!(
            "Record: [{:?}] Compute: [{:?}] Replay: [{:?}] Total: [{:?}] ({} exponentiations)",
            timings.record,
            timings.compute,
            timings.replay,
            timings.total(),
            batch.len()
        );

        Ok(output)
    }
}

/// Outside of [`Bridge::run`], a bridge computes exponentiations directly.
impl<B: ComputeBackend + ?Sized> ModPow for Bridge<B> {
    fn modpow(
        &mut self,
        base: &BigNumber,
        exponent: &BigNumber,
        modulus: &BigNumber,
    ) -> Result<BigNumber> {
        self.state.modpow(base, exponent, modulus)
    }
}
