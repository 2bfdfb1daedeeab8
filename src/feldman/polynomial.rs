// Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use crate::utils::random_positive_bn;
use libpaillier::unknown_order::BigNumber;
use rand::{CryptoRng, RngCore};
use std::fmt::Debug;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A secret polynomial over `Z_q`, lowest degree coefficient first.
///
/// The constant term is the shared secret.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Polynomial {
    coefficients: Vec<BigNumber>,
}

impl Debug for Polynomial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Polynomial")
            .field("degree", &self.degree())
            .field("coefficients", &"[redacted]")
            .finish()
    }
}

impl Polynomial {
    /// Sample a polynomial of degree `threshold - 1` with constant term
    /// `secret mod q` and every other coefficient uniform in `[0, q)`.
    ///
    /// `threshold` must be at least 1.
    pub fn sample<R: RngCore + CryptoRng>(
        secret: &BigNumber,
        threshold: usize,
        q: &BigNumber,
        rng: &mut R,
    ) -> Self {
        let coefficients = std::iter::once(secret.nmod(q))
            .chain((1..threshold).map(|_| random_positive_bn(rng, q)))
            .collect();
        Self { coefficients }
    }

    /// A polynomial with the given coefficients, lowest degree first.
    pub fn from_coefficients(coefficients: Vec<BigNumber>) -> Self {
        Self { coefficients }
    }

    pub fn coefficients(&self) -> &[BigNumber] {
        &self.coefficients
    }

    pub fn degree(&self) -> usize {
        self.coefficients.len().saturating_sub(1)
    }

    /// Evaluate at `x` over `Z_q`, using Horner's rule.
    pub fn evaluate(&self, x: &BigNumber, q: &BigNumber) -> BigNumber {
        self.coefficients
            .iter()
            .rev()
            .fold(BigNumber::zero(), |acc, coefficient| {
                acc.modmul(x, q).modadd(coefficient, q)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::testing::init_testing;

    fn bn(x: u64) -> BigNumber {
        BigNumber::from(x)
    }

    #[test]
    fn evaluation_matches_naive_sum() {
        // 3 + 5x + 7x^2 over Z_509
        let q = bn(509);
        let poly = Polynomial::from_coefficients(vec![bn(3), bn(5), bn(7)]);
        for x in 0..20u64 {
            let expected = (3 + 5 * x + 7 * x * x) % 509;
            assert_eq!(poly.evaluate(&bn(x), &q), bn(expected));
        }
    }

    #[test]
    fn sampled_polynomial_hides_secret_at_zero() {
        let mut rng = init_testing();
        let q = bn(509);
        let poly = Polynomial::sample(&bn(1000), 4, &q, &mut rng);

        assert_eq!(poly.degree(), 3);
        assert_eq!(poly.evaluate(&BigNumber::zero(), &q), bn(1000 % 509));
        assert!(poly.coefficients().iter().all(|c| c < &q));
        assert!(format!("{poly:?}").contains("[redacted]"));
    }
}
