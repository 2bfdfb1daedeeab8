// Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Compute backends that answer a whole [`Batch`](crate::Batch) at once.

use crate::{
    direct::DirectPath,
    errors::BackendError,
    request::{ModExpRequest, ModExpResult},
};
use libpaillier::unknown_order::BigNumber;
use rayon::{prelude::*, ThreadPool, ThreadPoolBuilder};
use std::fmt::Debug;
use tracing::{debug, error};

/// Something that can compute a batch of exponentiations sharing a modulus.
///
/// Implementations must be pure functions of their inputs: many execution
/// contexts call the same backend concurrently with unrelated batches.
pub trait ComputeBackend: Send + Sync {
    /// Compute `request.base()^request.exponent() mod modulus` for every
    /// request. The result at position `i` must answer request `i`.
    fn compute(
        &self,
        requests: &[ModExpRequest],
        modulus: &BigNumber,
    ) -> Result<Vec<BigNumber>, BackendError>;

    /// Like [`ComputeBackend::compute`], but every answer carries the operands
    /// it was computed from, so that the caller can check them.
    ///
    /// The default implementation pairs the output of `compute` with the
    /// requests. Backends that move data across a process or device boundary
    /// should override it to report the operands they actually used.
    fn compute_debug(
        &self,
        requests: &[ModExpRequest],
        modulus: &BigNumber,
    ) -> Result<Vec<ModExpResult>, BackendError> {
        let results = self.compute(requests, modulus)?;
        Ok(requests
            .iter()
            .zip(results)
            .map(|(request, result)| ModExpResult::for_request(request, modulus, result))
            .collect())
    }
}

fn compute_one(
    direct: DirectPath,
    request: &ModExpRequest,
    modulus: &BigNumber,
) -> Result<BigNumber, BackendError> {
    direct
        .modpow(request.base(), request.exponent(), modulus)
        .map_err(|e| BackendError::ComputeFailed(e.to_string()))
}

/// Computes requests one after the other on the calling thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct SequentialBackend {
    direct: DirectPath,
}

impl SequentialBackend {
    pub fn new(direct: DirectPath) -> Self {
        Self { direct }
    }
}

impl ComputeBackend for SequentialBackend {
    fn compute(
        &self,
        requests: &[ModExpRequest],
        modulus: &BigNumber,
    ) -> Result<Vec<BigNumber>, BackendError> {
        requests
            .iter()
            .map(|request| compute_one(self.direct, request, modulus))
            .collect()
    }
}

/// Spreads a batch over a `rayon` thread pool.
///
/// By default the global pool is used. [`ParallelBackend::with_threads`]
/// builds a dedicated pool instead, which keeps batch computation from
/// competing with other rayon work in the process.
#[derive(Debug, Default)]
pub struct ParallelBackend {
    pool: Option<ThreadPool>,
    direct: DirectPath,
}

impl ParallelBackend {
    /// A backend running on rayon's global pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend running on a dedicated pool of `num_threads` threads.
    pub fn with_threads(num_threads: usize) -> Result<Self, BackendError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|i| format!("modpow-backend-{i}"))
            .build()
            .map_err(|e| {
                error!("Failed to build backend thread pool: {}", e);
                BackendError::Unavailable(e.to_string())
            })?;
        debug!("Built backend thread pool with {} threads", pool.current_num_threads());
        Ok(Self {
            pool: Some(pool),
            direct: DirectPath::default(),
        })
    }

    pub fn with_direct_path(mut self, direct: DirectPath) -> Self {
        self.direct = direct;
        self
    }

    /// Number of threads a batch can be spread over.
    pub fn num_threads(&self) -> usize {
        match &self.pool {
            Some(pool) => pool.current_num_threads(),
            None => rayon::current_num_threads(),
        }
    }
}

impl ComputeBackend for ParallelBackend {
    fn compute(
        &self,
        requests: &[ModExpRequest],
        modulus: &BigNumber,
    ) -> Result<Vec<BigNumber>, BackendError> {
        let direct = self.direct;
        let job = || {
            requests
                .par_iter()
                .map(|request| compute_one(direct, request, modulus))
                .collect::<Result<Vec<_>, _>>()
        };
        match &self.pool {
            Some(pool) => pool.install(job),
            None => job(),
        }
    }
}
