// Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use super::state::{BridgeState, Phase};
use crate::errors::Result;
use libpaillier::unknown_order::BigNumber;

/// Modular exponentiation as seen by group arithmetic code.
///
/// Arithmetic that should be batchable takes a `&mut dyn ModPow` and calls
/// [`ModPow::modpow`] instead of [`BigNumber::modpow`]. Whether the call is
/// computed on the spot, recorded, or answered from a precomputed batch is
/// decided by the implementation it is handed.
pub trait ModPow {
    /// Compute `base^exponent mod modulus`.
    fn modpow(
        &mut self,
        base: &BigNumber,
        exponent: &BigNumber,
        modulus: &BigNumber,
    ) -> Result<BigNumber>;
}

impl ModPow for BridgeState {
    fn modpow(
        &mut self,
        base: &BigNumber,
        exponent: &BigNumber,
        modulus: &BigNumber,
    ) -> Result<BigNumber> {
        match self.phase() {
            Phase::Recording => self.record_request(base, exponent, modulus),
            Phase::Replaying => {
                let answer = self.next_answer()?;
                self.check_replayed(self.served() - 1, base, exponent, modulus)?;
                self.metrics.replayed_calls += 1;
                Ok(answer)
            }
            Phase::ReplayingDebug => {
                let answer = self.next_verified_answer()?;
                let index = self.served() - 1;
                self.check_replayed(index, base, exponent, modulus)?;
                let result = answer.verified_result(base, exponent, modulus, index)?;
                self.metrics.replayed_calls += 1;
                Ok(result)
            }
            Phase::Idle => self.compute_directly(base, exponent, modulus),
        }
    }
}
