// Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! The record/replay bridge.
//!
//! # High-level protocol description
//! A unit of work is executed twice under [`Bridge::run`]:
//! - In the recording pass, every [`ModPow::modpow`] call is logged in the
//!   context's [`BridgeState`] and answered with a dummy value. All calls of
//!   one pass must share a single modulus.
//! - The log is sealed into a [`Batch`](crate::Batch) and handed to the
//!   [`ComputeBackend`](crate::ComputeBackend), which computes every
//!   exponentiation, in whatever order or degree of parallelism it likes, and
//!   returns the results in request order.
//! - In the replay pass, the same calls are answered from those results, one
//!   at a time. The value returned by this pass is the output of the cycle.
//!
//! Every mismatch between the two passes, or between the batch and the
//! backend's answers, aborts the cycle with an error. Nothing is ever
//! silently answered with a wrong value.

mod intercept;
mod metrics;
mod protocol;
mod state;

pub use intercept::ModPow;
pub use metrics::BridgeMetrics;
pub use protocol::{Bridge, ReplayMode, Work};
pub use state::{Answers, BridgeState, Phase};
