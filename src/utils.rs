// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use crate::errors::{BackendError, BridgeError, Result};
use libpaillier::unknown_order::BigNumber;
use rand::{CryptoRng, RngCore};
use tracing::error;
use zeroize::Zeroize;

/// Helper type for parsing byte array into slices.
///
/// This type implements [`Zeroize`]. Batches may carry secret exponents, so
/// call `zeroize()` after parsing is complete.
#[derive(Zeroize)]
pub(crate) struct ParseBytes {
    bytes: Vec<u8>,
    offset: usize,
}

impl ParseBytes {
    /// Consume bytes for parsing.
    pub(crate) fn new(bytes: Vec<u8>) -> ParseBytes {
        ParseBytes { bytes, offset: 0 }
    }

    /// Take next `n` bytes from array.
    pub(crate) fn take_bytes(&mut self, n: usize) -> Result<&[u8]> {
        let end = self
            .offset
            .checked_add(n)
            .ok_or(BackendError::Deserialization)?;
        let slice = self
            .bytes
            .get(self.offset..end)
            .ok_or(BackendError::Deserialization)?;
        self.offset = end;
        Ok(slice)
    }

    /// Parse the next 8 bytes as a little-endian encoded usize.
    pub(crate) fn take_len(&mut self) -> Result<usize> {
        const LENGTH_BYTES: usize = 8;

        let len_slice = self.take_bytes(LENGTH_BYTES)?;
        let len_bytes: [u8; LENGTH_BYTES] = len_slice.try_into().map_err(|_| {
            error!(
                "Failed to convert byte array (should always work because we
                   defined it to be exactly 8 bytes"
            );
            BridgeError::InternalInvariantFailed
        })?;
        let len = u64::from_le_bytes(len_bytes);
        usize::try_from(len).map_err(|_| BackendError::Deserialization.into())
    }

    /// Returns `true` once every byte has been consumed.
    pub(crate) fn is_exhausted(&self) -> bool {
        self.offset == self.bytes.len()
    }
}

/// Sample a number uniformly at random from the range [0, n). This can be used
/// for sampling from a prime field `F_p` or the integers modulo `n` (for any
/// `n`).
pub(crate) fn random_positive_bn<R: RngCore + CryptoRng>(rng: &mut R, n: &BigNumber) -> BigNumber {
    BigNumber::from_rng(n, rng)
}

/// Returns `true` if `n` can be used as a modulus.
pub(crate) fn is_valid_modulus(n: &BigNumber) -> bool {
    n > &BigNumber::zero()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::testing::init_testing;

    #[test]
    fn random_positive_bn_stays_below_bound() {
        let mut rng = init_testing();
        let bound = BigNumber::from(1019u64);
        for _ in 0..1000 {
            let bn = random_positive_bn(&mut rng, &bound);
            assert!(bn < bound);
            assert!(bn >= BigNumber::zero());
        }
    }

    #[test]
    fn parse_bytes_refuses_to_read_past_the_end() {
        let mut parser = ParseBytes::new(vec![1, 2, 3]);
        assert_eq!(parser.take_bytes(2).unwrap(), &[1, 2]);
        assert!(parser.take_bytes(2).is_err());
        assert_eq!(parser.take_bytes(1).unwrap(), &[3]);
        assert!(parser.is_exhausted());
    }

    #[test]
    fn parse_bytes_reads_little_endian_lengths() {
        let mut parser = ParseBytes::new(300u64.to_le_bytes().to_vec());
        assert_eq!(parser.take_len().unwrap(), 300);
        assert!(parser.take_len().is_err());
    }
}

////////////////////////////
// Test Utility Functions //
////////////////////////////
