// Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use super::{group::SafePrimeGroup, polynomial::Polynomial};
use crate::{
    bridge::ModPow,
    errors::{BridgeError, Result, UsageError},
};
use itertools::Itertools;
use libpaillier::unknown_order::BigNumber;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use tracing::error;
use zeroize::ZeroizeOnDrop;

/// One participant's share: the secret polynomial evaluated at `x`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, ZeroizeOnDrop)]
pub struct Share {
    x: BigNumber,
    y: BigNumber,
}

impl Debug for Share {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Share")
            .field("x", &self.x)
            .field("y", &"[redacted]")
            .finish()
    }
}

impl Share {
    pub fn new(x: BigNumber, y: BigNumber) -> Self {
        Self { x, y }
    }

    pub fn x(&self) -> &BigNumber {
        &self.x
    }

    pub fn y(&self) -> &BigNumber {
        &self.y
    }
}

/// Output of dealing: one share per participant and the public commitments
/// `g^{a_j}` to the polynomial's coefficients.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SharesAndCommitments {
    shares: Vec<Share>,
    commitments: Vec<BigNumber>,
}

impl SharesAndCommitments {
    pub fn shares(&self) -> &[Share] {
        &self.shares
    }

    pub fn commitments(&self) -> &[BigNumber] {
        &self.commitments
    }

    pub fn into_parts(self) -> (Vec<Share>, Vec<BigNumber>) {
        (self.shares, self.commitments)
    }
}

/// Feldman verifiable secret sharing of elements of `Z_q` among `size`
/// participants, any `threshold` of which can recover the secret.
///
/// Operations that exponentiate take a [`ModPow`] and always issue the same
/// sequence of exponentiations for the same inputs, whatever the results.
/// They can therefore run as a unit of work under a
/// [`Bridge`](crate::Bridge). Randomness must be drawn outside of the unit of
/// work: sample a [`Polynomial`] first and [`FeldmanScheme::deal`] it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeldmanScheme {
    group: SafePrimeGroup,
    size: usize,
    threshold: usize,
}

impl FeldmanScheme {
    pub fn new(group: SafePrimeGroup, size: usize, threshold: usize) -> Result<Self> {
        if threshold == 0 || threshold > size {
            error!(
                "Threshold must be between 1 and the number of participants, got {} of {}",
                threshold, size
            );
            Err(UsageError::BadInput)?
        }
        if &BigNumber::from(size as u64) >= group.order() {
            error!("Too many participants for the subgroup order");
            Err(UsageError::BadInput)?
        }
        Ok(Self {
            group,
            size,
            threshold,
        })
    }

    pub fn group(&self) -> &SafePrimeGroup {
        &self.group
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Sample a secret polynomial for this scheme.
    pub fn sample_polynomial<R: RngCore + CryptoRng>(
        &self,
        secret: &BigNumber,
        rng: &mut R,
    ) -> Polynomial {
        Polynomial::sample(secret, self.threshold, self.group.order(), rng)
    }

    /// Commitments `g^{a_j} mod p` to every coefficient of `polynomial`.
    pub fn commit(&self, polynomial: &Polynomial, ops: &mut dyn ModPow) -> Result<Vec<BigNumber>> {
        if polynomial.coefficients().len() != self.threshold {
            error!(
                "Polynomial has {} coefficients but the threshold is {}",
                polynomial.coefficients().len(),
                self.threshold
            );
            Err(UsageError::BadInput)?
        }
        polynomial
            .coefficients()
            .iter()
            .map(|coefficient| self.group.pow_generator(coefficient, ops))
            .collect()
    }

    /// Evaluate `polynomial` at `1..=size` and commit to it.
    pub fn deal(
        &self,
        polynomial: &Polynomial,
        ops: &mut dyn ModPow,
    ) -> Result<SharesAndCommitments> {
        let commitments = self.commit(polynomial, ops)?;
        let q = self.group.order();
        let shares = (1..=self.size as u64)
            .map(BigNumber::from)
            .map(|x| {
                let y = polynomial.evaluate(&x, q);
                Share::new(x, y)
            })
            .collect();
        Ok(SharesAndCommitments {
            shares,
            commitments,
        })
    }

    /// Sample a polynomial hiding `secret` and deal it.
    ///
    /// Draws from `rng`, so this is not a unit of work for the bridge; use
    /// [`FeldmanScheme::sample_polynomial`] and [`FeldmanScheme::deal`]
    /// instead.
    pub fn share<R: RngCore + CryptoRng>(
        &self,
        secret: &BigNumber,
        rng: &mut R,
        ops: &mut dyn ModPow,
    ) -> Result<SharesAndCommitments> {
        let polynomial = self.sample_polynomial(secret, rng);
        self.deal(&polynomial, ops)
    }

    /// Check `g^y == Π_j C_j^{x^j} mod p`.
    ///
    /// Performs `threshold + 1` exponentiations before comparing anything.
    pub fn verify_share(
        &self,
        share: &Share,
        commitments: &[BigNumber],
        ops: &mut dyn ModPow,
    ) -> Result<bool> {
        if commitments.len() != self.threshold {
            error!(
                "Expected {} commitments, got {}",
                self.threshold,
                commitments.len()
            );
            Err(UsageError::BadInput)?
        }
        let q = self.group.order();

        let lhs = self.group.pow_generator(&share.y, ops)?;

        let mut rhs = BigNumber::one();
        let mut x_power = BigNumber::one();
        for commitment in commitments {
            let term = self.group.pow(commitment, &x_power, ops)?;
            rhs = self.group.mul(&rhs, &term);
            x_power = x_power.modmul(&share.x, q);
        }

        Ok(lhs == rhs)
    }

    /// Verify every share against the same commitments.
    ///
    /// Every share is checked even after a failure, so the exponentiations
    /// issued do not depend on any result.
    pub fn verify_all(
        &self,
        shares: &[Share],
        commitments: &[BigNumber],
        ops: &mut dyn ModPow,
    ) -> Result<bool> {
        let verdicts = shares
            .iter()
            .map(|share| self.verify_share(share, commitments, ops))
            .collect::<Result<Vec<_>>>()?;
        Ok(verdicts.into_iter().all(|valid| valid))
    }

    /// Lagrange coefficients for interpolating at zero from the points `xs`,
    /// over `Z_q`.
    pub fn lagrange_coefficients(&self, xs: &[BigNumber]) -> Result<Vec<BigNumber>> {
        let q = self.group.order();
        let reduced: Vec<BigNumber> = xs.iter().map(|x| x.nmod(q)).collect();

        if reduced.iter().tuple_combinations().any(|(a, b)| a == b) {
            error!("Cannot interpolate through repeated points");
            Err(UsageError::BadInput)?
        }

        reduced
            .iter()
            .enumerate()
            .map(|(i, xi)| {
                let (numerator, denominator) = reduced
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| *j != i)
                    .fold(
                        (BigNumber::one(), BigNumber::one()),
                        |(num, den), (_, xj)| {
                            (num.modmul(xj, q), den.modmul(&xj.modsub(xi, q), q))
                        },
                    );
                let inverse = denominator.invert(q).ok_or_else(|| {
                    error!("Lagrange denominator is not invertible; is q prime?");
                    BridgeError::from(UsageError::BadInput)
                })?;
                Ok(numerator.modmul(&inverse, q))
            })
            .collect()
    }

    /// Recover the secret from at least `threshold` shares.
    pub fn recover(&self, shares: &[Share]) -> Result<BigNumber> {
        if shares.len() < self.threshold || shares.len() > self.size {
            error!(
                "Recovery needs between {} and {} shares, got {}",
                self.threshold,
                self.size,
                shares.len()
            );
            Err(UsageError::BadInput)?
        }
        let q = self.group.order();
        let xs: Vec<BigNumber> = shares.iter().map(|share| share.x.clone()).collect();
        let lambdas = self.lagrange_coefficients(&xs)?;

        Ok(shares
            .iter()
            .zip(&lambdas)
            .fold(BigNumber::zero(), |secret, (share, lambda)| {
                secret.modadd(&share.y.modmul(lambda, q), q)
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend::{ParallelBackend, SequentialBackend},
        bridge::Bridge,
        config::BridgeConfig,
        direct::DirectPath,
        utils::testing::init_testing,
    };
    use std::sync::Arc;

    fn bn(x: u64) -> BigNumber {
        BigNumber::from(x)
    }

    fn scheme(size: usize, threshold: usize) -> FeldmanScheme {
        let group = SafePrimeGroup::new(bn(1019), bn(509), bn(4)).unwrap();
        FeldmanScheme::new(group, size, threshold).unwrap()
    }

    fn tamper(share: &Share, q: &BigNumber) -> Share {
        Share::new(share.x().clone(), share.y().modadd(&BigNumber::one(), q))
    }

    #[test]
    fn parameters_are_validated() {
        let group = SafePrimeGroup::new(bn(1019), bn(509), bn(4)).unwrap();
        assert!(FeldmanScheme::new(group.clone(), 5, 0).is_err());
        assert!(FeldmanScheme::new(group.clone(), 5, 6).is_err());
        assert!(FeldmanScheme::new(group.clone(), 509, 3).is_err());
        assert!(FeldmanScheme::new(group, 508, 508).is_ok());
    }

    #[test]
    fn dealing_under_the_bridge_matches_direct_dealing() {
        let mut rng = init_testing();
        let scheme = scheme(5, 3);
        let polynomial = scheme.sample_polynomial(&bn(123), &mut rng);

        let expected = scheme
            .deal(&polynomial, &mut DirectPath::Portable)
            .unwrap();

        let work = |ops: &mut dyn ModPow| scheme.deal(&polynomial, ops);
        let mut bridge = Bridge::new(
            Arc::new(SequentialBackend::default()),
            BridgeConfig::default(),
        );
        let dealt = bridge.run(&work).unwrap();

        assert_eq!(dealt, expected);
        assert_eq!(dealt.shares().len(), 5);
        assert_eq!(dealt.commitments().len(), 3);
        assert_eq!(bridge.state().metrics().batched_requests(), 3);
    }

    #[test]
    fn honest_shares_verify_in_one_batch() {
        let mut rng = init_testing();
        let scheme = scheme(7, 4);
        let dealt = scheme
            .share(&bn(42), &mut rng, &mut DirectPath::Portable)
            .unwrap();

        let work = |ops: &mut dyn ModPow| {
            scheme.verify_all(dealt.shares(), dealt.commitments(), ops)
        };
        let mut bridge = Bridge::new(Arc::new(ParallelBackend::new()), BridgeConfig::default());
        assert!(bridge.run_debug(&work).unwrap());

        // One generator power plus `threshold` commitment powers per share.
        assert_eq!(bridge.state().metrics().batched_requests(), 7 * 5);
        assert_eq!(bridge.state().metrics().cycles(), 1);
    }

    #[test]
    fn tampered_share_is_detected_under_the_bridge() {
        let mut rng = init_testing();
        let scheme = scheme(5, 3);
        let q = scheme.group().order().clone();
        let dealt = scheme
            .share(&bn(7), &mut rng, &mut DirectPath::Portable)
            .unwrap();

        let mut shares = dealt.shares().to_vec();
        shares[0] = tamper(&shares[0], &q);

        let work = |ops: &mut dyn ModPow| scheme.verify_all(&shares, dealt.commitments(), ops);
        let mut bridge = Bridge::new(
            Arc::new(SequentialBackend::default()),
            BridgeConfig::default(),
        );
        assert!(!bridge.run(&work).unwrap());

        let mut direct = DirectPath::Portable;
        assert!(!scheme
            .verify_share(&shares[0], dealt.commitments(), &mut direct)
            .unwrap());
        assert!(scheme
            .verify_share(&shares[1], dealt.commitments(), &mut direct)
            .unwrap());
    }

    #[test]
    fn wrong_number_of_commitments_is_rejected() {
        let mut rng = init_testing();
        let scheme = scheme(5, 3);
        let dealt = scheme
            .share(&bn(7), &mut rng, &mut DirectPath::Portable)
            .unwrap();
        assert_eq!(
            scheme.verify_share(
                &dealt.shares()[0],
                &dealt.commitments()[..2],
                &mut DirectPath::Portable
            ),
            Err(UsageError::BadInput.into())
        );
    }

    #[test]
    fn any_threshold_subset_recovers_the_secret() {
        let mut rng = init_testing();
        let scheme = scheme(5, 3);
        let secret = bn(321);
        let dealt = scheme
            .share(&secret, &mut rng, &mut DirectPath::Portable)
            .unwrap();
        let shares = dealt.shares();

        for subset in shares.iter().cloned().combinations(3) {
            assert_eq!(scheme.recover(&subset).unwrap(), secret);
        }
        assert_eq!(scheme.recover(shares).unwrap(), secret);
    }

    #[test]
    fn recovery_rejects_bad_share_sets() {
        let mut rng = init_testing();
        let scheme = scheme(5, 3);
        let dealt = scheme
            .share(&bn(5), &mut rng, &mut DirectPath::Portable)
            .unwrap();
        let shares = dealt.shares();

        assert!(scheme.recover(&shares[..2]).is_err());

        let repeated = vec![shares[0].clone(), shares[1].clone(), shares[0].clone()];
        assert_eq!(scheme.recover(&repeated), Err(UsageError::BadInput.into()));
    }

    #[test]
    fn lagrange_coefficients_sum_to_one() {
        let scheme = scheme(6, 2);
        let xs: Vec<BigNumber> = [1u64, 3, 4, 6].into_iter().map(bn).collect();
        let lambdas = scheme.lagrange_coefficients(&xs).unwrap();
        let q = scheme.group().order();
        let sum = lambdas
            .iter()
            .fold(BigNumber::zero(), |acc, lambda| acc.modadd(lambda, q));
        assert_eq!(sum, BigNumber::one());
    }
}
