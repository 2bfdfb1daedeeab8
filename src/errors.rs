// Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Error types returned by the bridge.
//!
//! Every failure aborts the current record/replay cycle. Nothing here is
//! recoverable mid-cycle: the caller may only start a fresh cycle from
//! [`Phase::Idle`].

use crate::bridge::Phase;
use libpaillier::unknown_order::BigNumber;
use thiserror::Error;

/// Default result type for the crate.
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Top-level error for all bridge operations.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum BridgeError {
    /// The record/replay protocol was driven out of order by the caller.
    #[error("bridge misuse: {0}")]
    Usage(#[from] UsageError),
    /// A batch invariant was violated. Either the unit of work is not
    /// deterministic or the backend returned corrupt results.
    #[error("batch consistency violated: {0}")]
    Consistency(#[from] ConsistencyError),
    /// The compute backend failed.
    #[error("compute backend failed: {0}")]
    Backend(#[from] BackendError),
    /// Something that should be impossible happened.
    #[error("internal invariant failed")]
    InternalInvariantFailed,
}

/// Errors caused by calling the bridge in a way the protocol does not allow.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum UsageError {
    #[error("recording started with {leftover} requests left over from a cycle that was never reset")]
    UnresetState { leftover: usize },
    #[error("`{operation}` is not allowed while the bridge is {phase}")]
    WrongPhase {
        operation: &'static str,
        phase: Phase,
    },
    #[error("modulus must be positive")]
    NonPositiveModulus,
    #[error("negative exponent on a base that is not invertible modulo the modulus")]
    NonInvertibleBase,
    #[error("invalid value {value:?} for configuration variable {variable}")]
    InvalidConfig { variable: String, value: String },
    #[error("bad input")]
    BadInput,
}

/// Errors signalling that the recorded batch and its answers disagree.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum ConsistencyError {
    #[error("request {index} uses modulus {found}, but the batch modulus is {expected}")]
    ModulusMismatch {
        index: usize,
        expected: BigNumber,
        found: BigNumber,
    },
    #[error("received {answers} answers for {requests} recorded requests")]
    AnswerCountMismatch { answers: usize, requests: usize },
    #[error("replay ended with {remaining} answers left unconsumed")]
    UndrainedAnswers { remaining: usize },
    #[error("replay asked for more than the {requests} recorded answers")]
    AnswersExhausted { requests: usize },
    #[error("replay call {index} does not match the operands recorded for it")]
    ReplayDiverged { index: usize },
    #[error("verified answer {index} does not match the operands recorded for it")]
    VerificationMismatch { index: usize },
}

/// Failure reported by a compute backend. Opaque to the bridge.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum BackendError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("computation failed: {0}")]
    ComputeFailed(String),
    #[error("failed to decode backend payload")]
    Deserialization,
}
