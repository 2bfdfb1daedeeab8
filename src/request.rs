// Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Records exchanged between the bridge and a compute backend.

use crate::errors::{ConsistencyError, Result};
use libpaillier::unknown_order::BigNumber;
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, sync::Arc};
use tracing::error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A single intercepted exponentiation, minus its modulus.
///
/// The modulus is shared by the whole [`Batch`], so it is not repeated here.
///
/// # 🔒 Storage requirements
/// The exponent is frequently a secret share. The record is zeroized on drop
/// and its [`Debug`] output redacts the exponent.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct ModExpRequest {
    base: BigNumber,
    exponent: BigNumber,
}

impl Debug for ModExpRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModExpRequest")
            .field("base", &self.base)
            .field("exponent", &"[redacted]")
            .finish()
    }
}

impl ModExpRequest {
    pub(crate) fn new(base: BigNumber, exponent: BigNumber) -> Self {
        Self { base, exponent }
    }

    pub fn base(&self) -> &BigNumber {
        &self.base
    }

    pub fn exponent(&self) -> &BigNumber {
        &self.exponent
    }

    /// Returns `true` if this request was made with exactly these operands.
    pub(crate) fn matches(&self, base: &BigNumber, exponent: &BigNumber) -> bool {
        &self.base == base && &self.exponent == exponent
    }
}

/// The answer to a [`ModExpRequest`], carrying its full operands so that the
/// replay pass can check the backend answered the question that was asked.
///
/// Only produced by [`ComputeBackend::compute_debug`](crate::ComputeBackend::compute_debug).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct ModExpResult {
    base: BigNumber,
    exponent: BigNumber,
    modulus: BigNumber,
    result: BigNumber,
}

impl Debug for ModExpResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModExpResult")
            .field("base", &self.base)
            .field("exponent", &"[redacted]")
            .field("modulus", &self.modulus)
            .field("result", &self.result)
            .finish()
    }
}

impl ModExpResult {
    pub fn new(
        base: BigNumber,
        exponent: BigNumber,
        modulus: BigNumber,
        result: BigNumber,
    ) -> Self {
        Self {
            base,
            exponent,
            modulus,
            result,
        }
    }

    /// Pair a request with the result computed for it.
    pub fn for_request(request: &ModExpRequest, modulus: &BigNumber, result: BigNumber) -> Self {
        Self::new(
            request.base.clone(),
            request.exponent.clone(),
            modulus.clone(),
            result,
        )
    }

    pub fn base(&self) -> &BigNumber {
        &self.base
    }

    pub fn exponent(&self) -> &BigNumber {
        &self.exponent
    }

    pub fn modulus(&self) -> &BigNumber {
        &self.modulus
    }

    pub fn result(&self) -> &BigNumber {
        &self.result
    }

    /// Release the result if it was computed from exactly the given
    /// operands. `index` is the position of the request in its batch and is
    /// only used for error reporting.
    pub(crate) fn verified_result(
        &self,
        base: &BigNumber,
        exponent: &BigNumber,
        modulus: &BigNumber,
        index: usize,
    ) -> Result<BigNumber> {
        if &self.base != base || &self.exponent != exponent || &self.modulus != modulus {
            error!(
                "Verified answer {} was computed for different operands than the ones requested",
                index
            );
            Err(ConsistencyError::VerificationMismatch { index })?
        }
        Ok(self.result.clone())
    }
}

/// An ordered, immutable snapshot of the requests recorded in one cycle.
///
/// Cloning a batch is cheap: the requests are shared with the bridge state
/// that recorded them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Batch {
    requests: Arc<[ModExpRequest]>,
    modulus: Option<BigNumber>,
}

impl Batch {
    pub(crate) fn new(requests: Arc<[ModExpRequest]>, modulus: Option<BigNumber>) -> Self {
        Self { requests, modulus }
    }

    /// The recorded requests, in the order they were made.
    pub fn requests(&self) -> &[ModExpRequest] {
        &self.requests
    }

    /// The modulus shared by every request. `None` only for an empty batch.
    pub fn modulus(&self) -> Option<&BigNumber> {
        self.modulus.as_ref()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::BridgeError;

    fn bn(x: u64) -> BigNumber {
        BigNumber::from(x)
    }

    #[test]
    fn request_debug_output_redacts_exponent() {
        let request = ModExpRequest::new(bn(2), bn(123456789));
        let printed = format!("{request:?}");
        assert!(printed.contains("[redacted]"));
        assert!(!printed.contains("123456789"));
    }

    #[test]
    fn verified_result_released_for_matching_operands() {
        let result = ModExpResult::new(bn(2), bn(3), bn(5), bn(3));
        assert_eq!(
            result.verified_result(&bn(2), &bn(3), &bn(5), 0).unwrap(),
            bn(3)
        );
    }

    #[test]
    fn verified_result_rejects_any_mismatched_operand() {
        let result = ModExpResult::new(bn(2), bn(3), bn(5), bn(3));
        let expected =
            BridgeError::Consistency(ConsistencyError::VerificationMismatch { index: 7 });

        assert_eq!(
            result.verified_result(&bn(4), &bn(3), &bn(5), 7),
            Err(expected.clone())
        );
        assert_eq!(
            result.verified_result(&bn(2), &bn(4), &bn(5), 7),
            Err(expected.clone())
        );
        assert_eq!(result.verified_result(&bn(2), &bn(3), &bn(7), 7), Err(expected));
    }

    #[test]
    fn batch_shares_requests_with_its_clones() {
        let requests: Arc<[ModExpRequest]> =
            vec![ModExpRequest::new(bn(2), bn(3)), ModExpRequest::new(bn(3), bn(4))].into();
        let batch = Batch::new(requests.clone(), Some(bn(5)));
        let copy = batch.clone();

        assert_eq!(batch.len(), 2);
        assert_eq!(copy.requests()[1].base(), &bn(3));
        assert_eq!(copy.modulus(), Some(&bn(5)));
        assert_eq!(Arc::strong_count(&requests), 3);
    }
}
