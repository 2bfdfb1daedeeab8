// Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use super::metrics::BridgeMetrics;
use crate::{
    direct::DirectPath,
    errors::{BridgeError, ConsistencyError, Result, UsageError},
    request::{Batch, ModExpRequest, ModExpResult},
    utils::is_valid_modulus,
};
use libpaillier::unknown_order::BigNumber;
use std::{collections::VecDeque, fmt::Display, sync::Arc};
use tracing::error;

/// The phase a [`BridgeState`] is in. Exactly one is active at a time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// No cycle in progress. Exponentiations are computed directly.
    Idle,
    /// First pass: exponentiations are logged and answered with a dummy.
    Recording,
    /// Second pass: exponentiations are answered from the backend results.
    Replaying,
    /// Second pass with verification triples instead of bare results.
    ReplayingDebug,
}

impl Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Recording => "recording",
            Phase::Replaying => "replaying",
            Phase::ReplayingDebug => "replaying (debug)",
        };
        f.write_str(name)
    }
}

/// Precomputed answers handed to [`BridgeState::begin_replay`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Answers {
    /// Bare results, in request order.
    Plain(Vec<BigNumber>),
    /// Results carrying the operands they were computed from.
    Verified(Vec<ModExpResult>),
}

impl Answers {
    pub fn len(&self) -> usize {
        match self {
            Answers::Plain(answers) => answers.len(),
            Answers::Verified(answers) => answers.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug)]
enum Queue {
    Plain(VecDeque<BigNumber>),
    Verified(VecDeque<ModExpResult>),
}

impl Queue {
    fn len(&self) -> usize {
        match self {
            Queue::Plain(queue) => queue.len(),
            Queue::Verified(queue) => queue.len(),
        }
    }
}

impl Default for Queue {
    fn default() -> Self {
        Queue::Plain(VecDeque::new())
    }
}

/// Bridge state belonging to a single execution context.
///
/// A `BridgeState` is never shared: every worker owns one and drives it
/// through `&mut` access, so the request log needs no locking. A full cycle
/// moves through `Idle → Recording → Idle → Replaying → Idle` and ends with
/// [`BridgeState::reset`], after which the state is indistinguishable from a
/// fresh one (apart from its [`BridgeMetrics`]).
#[derive(Debug)]
pub struct BridgeState {
    phase: Phase,
    dummy: BigNumber,
    modulus: Option<BigNumber>,
    /// Requests logged in the current recording pass.
    requests: Vec<ModExpRequest>,
    /// The log, frozen by `end_recording` and shared with the [`Batch`].
    sealed: Option<Arc<[ModExpRequest]>>,
    answers: Queue,
    /// Number of answers handed out in the current replay pass.
    served: usize,
    direct: DirectPath,
    pub(super) metrics: BridgeMetrics,
}

impl Default for BridgeState {
    fn default() -> Self {
        Self::new(DirectPath::default())
    }
}

impl BridgeState {
    /// Create an idle state whose direct computations use `direct`.
    pub fn new(direct: DirectPath) -> Self {
        Self {
            phase: Phase::Idle,
            dummy: BigNumber::from(crate::config::DEFAULT_DUMMY),
            modulus: None,
            requests: Vec::new(),
            sealed: None,
            answers: Queue::default(),
            served: 0,
            direct,
            metrics: BridgeMetrics::default(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The modulus shared by every request of the current batch, if any has
    /// been recorded yet.
    pub fn modulus(&self) -> Option<&BigNumber> {
        self.modulus.as_ref()
    }

    pub fn direct_path(&self) -> DirectPath {
        self.direct
    }

    pub fn metrics(&self) -> &BridgeMetrics {
        &self.metrics
    }

    /// Number of requests in the log, sealed or not.
    pub fn recorded_len(&self) -> usize {
        self.requests.len() + self.sealed.as_ref().map_or(0, |sealed| sealed.len())
    }

    /// Number of answers not yet consumed by the replay pass.
    pub fn pending_answers(&self) -> usize {
        self.answers.len()
    }

    fn require_phase(&self, expected: Phase, operation: &'static str) -> Result<()> {
        if self.phase != expected {
            error!(
                "Bridge operation `{}` called while {}; expected {}",
                operation, self.phase, expected
            );
            Err(UsageError::WrongPhase {
                operation,
                phase: self.phase,
            })?
        }
        Ok(())
    }

    /// Start logging exponentiations. Every intercepted call will be answered
    /// with `dummy` until [`BridgeState::end_recording`].
    pub fn begin_recording(&mut self, dummy: BigNumber) -> Result<()> {
        self.require_phase(Phase::Idle, "begin_recording")?;
        let leftover = self.recorded_len();
        if leftover != 0 {
            error!(
                "Tried to start recording with {} requests left from a previous cycle; `reset` was never called",
                leftover
            );
            Err(UsageError::UnresetState { leftover })?
        }

        self.dummy = dummy;
        self.modulus = None;
        self.phase = Phase::Recording;
        Ok(())
    }

    /// Stop logging and return the ordered snapshot of everything recorded.
    ///
    /// The log itself stays in place until [`BridgeState::reset`], so the
    /// replay pass can be checked against it.
    pub fn end_recording(&mut self) -> Result<Batch> {
        self.require_phase(Phase::Recording, "end_recording")?;

        let sealed: Arc<[ModExpRequest]> = std::mem::take(&mut self.requests).into();
        self.sealed = Some(sealed.clone());
        self.phase = Phase::Idle;

        Ok(Batch::new(sealed, self.modulus.clone()))
    }

    /// Log one exponentiation and return the dummy value.
    pub fn record_request(
        &mut self,
        base: &BigNumber,
        exponent: &BigNumber,
        modulus: &BigNumber,
    ) -> Result<BigNumber> {
        self.require_phase(Phase::Recording, "record_request")?;

        if self.modulus.is_none() && !is_valid_modulus(modulus) {
            error!("Refusing to record a request with a non-positive modulus");
            Err(UsageError::NonPositiveModulus)?
        }
        let expected = self.modulus.get_or_insert_with(|| modulus.clone());
        if expected != modulus {
            let index = self.requests.len();
            error!(
                "Request {} uses modulus {}, but this batch was started with modulus {}",
                index, modulus, expected
            );
            Err(ConsistencyError::ModulusMismatch {
                index,
                expected: expected.clone(),
                found: modulus.clone(),
            })?
        }

        self.requests.push(ModExpRequest::new(base.clone(), exponent.clone()));
        self.metrics.recorded_calls += 1;
        Ok(self.dummy.clone())
    }

    /// Load the backend's answers and start the replay pass.
    ///
    /// The number of answers must equal the number of recorded requests.
    pub fn begin_replay(&mut self, answers: Answers) -> Result<()> {
        self.require_phase(Phase::Idle, "begin_replay")?;
        let requests = match &self.sealed {
            Some(sealed) => sealed.len(),
            None => {
                error!("Tried to start a replay without a finished recording");
                Err(UsageError::WrongPhase {
                    operation: "begin_replay",
                    phase: self.phase,
                })?
            }
        };
        if answers.len() != requests {
            error!(
                "Received {} answers for {} recorded requests",
                answers.len(),
                requests
            );
            Err(ConsistencyError::AnswerCountMismatch {
                answers: answers.len(),
                requests,
            })?
        }

        let (queue, phase) = match answers {
            Answers::Plain(answers) => (Queue::Plain(answers.into()), Phase::Replaying),
            Answers::Verified(answers) => (Queue::Verified(answers.into()), Phase::ReplayingDebug),
        };
        self.answers = queue;
        self.served = 0;
        self.phase = phase;
        Ok(())
    }

    /// Finish the replay pass. Every answer must have been consumed.
    pub fn end_replay(&mut self) -> Result<()> {
        if !matches!(self.phase, Phase::Replaying | Phase::ReplayingDebug) {
            return self.require_phase(Phase::Replaying, "end_replay");
        }
        let remaining = self.answers.len();
        if remaining != 0 {
            error!(
                "Replay finished with {} of {} answers unconsumed; the unit of work is not deterministic",
                remaining,
                self.recorded_len()
            );
            Err(ConsistencyError::UndrainedAnswers { remaining })?
        }
        self.phase = Phase::Idle;
        Ok(())
    }

    /// Clear the request log so the context can run another cycle.
    pub fn reset(&mut self) -> Result<()> {
        self.require_phase(Phase::Idle, "reset")?;
        self.clear();
        Ok(())
    }

    /// Throw away a failed cycle, whatever phase it stopped in.
    pub fn abort(&mut self) {
        if self.phase != Phase::Idle || self.recorded_len() != 0 {
            self.metrics.aborted_cycles += 1;
        }
        self.clear();
        self.phase = Phase::Idle;
    }

    fn clear(&mut self) {
        // Dropping the requests zeroizes them.
        self.requests.clear();
        self.sealed = None;
        self.modulus = None;
        self.answers = Queue::default();
        self.served = 0;
    }

    /// Pop the next precomputed answer.
    pub fn next_answer(&mut self) -> Result<BigNumber> {
        self.require_phase(Phase::Replaying, "next_answer")?;
        let answer = match &mut self.answers {
            Queue::Plain(queue) => queue.pop_front(),
            Queue::Verified(_) => None,
        };
        let answer = answer.ok_or_else(|| self.exhausted())?;
        self.served += 1;
        Ok(answer)
    }

    /// Pop the next precomputed verification triple.
    pub fn next_verified_answer(&mut self) -> Result<ModExpResult> {
        self.require_phase(Phase::ReplayingDebug, "next_verified_answer")?;
        let answer = match &mut self.answers {
            Queue::Verified(queue) => queue.pop_front(),
            Queue::Plain(_) => None,
        };
        let answer = answer.ok_or_else(|| self.exhausted())?;
        self.served += 1;
        Ok(answer)
    }

    fn exhausted(&self) -> BridgeError {
        let requests = self.recorded_len();
        error!(
            "Replay requested more answers than the {} recorded; the unit of work is not deterministic",
            requests
        );
        ConsistencyError::AnswersExhausted { requests }.into()
    }

    /// Check that replay call `index` carries the operands recorded for it.
    pub(super) fn check_replayed(
        &self,
        index: usize,
        base: &BigNumber,
        exponent: &BigNumber,
        modulus: &BigNumber,
    ) -> Result<()> {
        let recorded = self
            .sealed
            .as_ref()
            .and_then(|sealed| sealed.get(index))
            .ok_or_else(|| {
                error!("Replay call {} has no recorded counterpart", index);
                BridgeError::InternalInvariantFailed
            })?;
        if !recorded.matches(base, exponent) || self.modulus.as_ref() != Some(modulus) {
            error!(
                "Replay call {} does not match the recorded request; the unit of work depends on exponentiation results",
                index
            );
            Err(ConsistencyError::ReplayDiverged { index })?
        }
        Ok(())
    }

    pub(super) fn served(&self) -> usize {
        self.served
    }

    pub(super) fn compute_directly(
        &mut self,
        base: &BigNumber,
        exponent: &BigNumber,
        modulus: &BigNumber,
    ) -> Result<BigNumber> {
        self.metrics.direct_calls += 1;
        self.direct.modpow(base, exponent, modulus)
    }
}
