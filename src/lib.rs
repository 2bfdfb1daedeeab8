// Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Batching of modular exponentiations.
//!
//! Group arithmetic code (commitments, share verification, proofs) is
//! dominated by `base^exponent mod modulus` calls that are independent of
//! each other. This crate lets such code keep calling [`ModPow::modpow`] one
//! exponentiation at a time while a [`Bridge`] collects the calls into a
//! single [`Batch`] and hands it to a [`ComputeBackend`], which may compute
//! it on a thread pool, another process or a device.
//!
//! The code to batch is expressed as a [`Work`]: something the bridge can
//! execute twice. The first pass records every call and answers it with a
//! placeholder; the second pass replays the same calls with the backend's
//! results. [`Work`] lists the rules a unit of work has to follow.
//!
//! ```no_run
//! use libpaillier::unknown_order::BigNumber;
//! use modpow_bridge::{Bridge, BridgeConfig, ModPow, ParallelBackend};
//! use std::sync::Arc;
//!
//! # fn main() -> modpow_bridge::errors::Result<()> {
//! let p = BigNumber::from(1019u64);
//! let g = BigNumber::from(4u64);
//! let work = |ops: &mut dyn ModPow| {
//!     (0..100u64)
//!         .map(|e| ops.modpow(&g, &BigNumber::from(e), &p))
//!         .collect::<modpow_bridge::errors::Result<Vec<_>>>()
//! };
//!
//! let mut bridge = Bridge::new(Arc::new(ParallelBackend::new()), BridgeConfig::from_env()?);
//! let powers = bridge.run(&work)?;
//! assert_eq!(powers.len(), 100);
//! # Ok(())
//! # }
//! ```
//!
//! Each execution context owns its own [`Bridge`]; only the backend is
//! shared. [`pool::run_each`] runs many units of work that way on rayon.

pub mod backend;
mod bridge;
pub mod config;
mod direct;
pub mod errors;
pub mod feldman;
pub mod pool;
mod request;
mod utils;
mod wire;

pub use backend::{ComputeBackend, ParallelBackend, SequentialBackend};
pub use bridge::{Answers, Bridge, BridgeMetrics, BridgeState, ModPow, Phase, ReplayMode, Work};
pub use config::BridgeConfig;
pub use direct::DirectPath;
pub use errors::{BackendError, BridgeError, ConsistencyError, UsageError};
pub use request::{Batch, ModExpRequest, ModExpResult};
pub use wire::{decode_results, decode_verified_results, encode_results, encode_verified_results};
