// Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

use crate::{
    bridge::ModPow,
    errors::{Result, UsageError},
};
use libpaillier::unknown_order::BigNumber;
use serde::{Deserialize, Serialize};
use tracing::error;

/// The order-`q` subgroup of `Z_p^*` for a safe prime `p = 2q + 1`,
/// generated by `g`.
///
/// Every exponentiation goes through a [`ModPow`], so group operations can be
/// recorded and batched by the bridge. All of them use `p` as the modulus.
///
/// Primality of `p` and `q` is the caller's responsibility.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafePrimeGroup {
    p: BigNumber,
    q: BigNumber,
    g: BigNumber,
}

impl SafePrimeGroup {
    pub fn new(p: BigNumber, q: BigNumber, g: BigNumber) -> Result<Self> {
        if p != &q + &q + BigNumber::one() {
            error!("Group modulus is not of the form 2q + 1");
            Err(UsageError::BadInput)?
        }
        if q <= BigNumber::one() {
            error!("Subgroup order must be larger than 1");
            Err(UsageError::BadInput)?
        }
        if g <= BigNumber::one() || g >= p {
            error!("Generator must lie in (1, p)");
            Err(UsageError::BadInput)?
        }
        Ok(Self { p, q, g })
    }

    /// The modulus `p`.
    pub fn modulus(&self) -> &BigNumber {
        &self.p
    }

    /// The subgroup order `q`.
    pub fn order(&self) -> &BigNumber {
        &self.q
    }

    pub fn generator(&self) -> &BigNumber {
        &self.g
    }

    /// `base^exponent mod p`.
    pub fn pow(
        &self,
        base: &BigNumber,
        exponent: &BigNumber,
        ops: &mut dyn ModPow,
    ) -> Result<BigNumber> {
        ops.modpow(base, exponent, &self.p)
    }

    /// `g^exponent mod p`.
    pub fn pow_generator(&self, exponent: &BigNumber, ops: &mut dyn ModPow) -> Result<BigNumber> {
        self.pow(&self.g, exponent, ops)
    }

    /// `a * b mod p`.
    pub fn mul(&self, a: &BigNumber, b: &BigNumber) -> BigNumber {
        a.modmul(b, &self.p)
    }

    /// Returns `true` if `x` is an element of the order-`q` subgroup.
    ///
    /// Always performs exactly one exponentiation, even for out of range
    /// inputs, so the call pattern does not depend on `x`.
    pub fn contains(&self, x: &BigNumber, ops: &mut dyn ModPow) -> Result<bool> {
        let in_range = x > &BigNumber::zero() && x < &self.p;
        let power = self.pow(x, &self.q, ops)?;
        Ok(in_range && power == BigNumber::one())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::direct::DirectPath;

    fn bn(x: u64) -> BigNumber {
        BigNumber::from(x)
    }

    fn small_group() -> SafePrimeGroup {
        SafePrimeGroup::new(bn(1019), bn(509), bn(4)).unwrap()
    }

    #[test]
    fn rejects_malformed_parameters() {
        assert!(SafePrimeGroup::new(bn(1019), bn(500), bn(4)).is_err());
        assert!(SafePrimeGroup::new(bn(1019), bn(509), bn(1)).is_err());
        assert!(SafePrimeGroup::new(bn(1019), bn(509), bn(1019)).is_err());
        assert!(SafePrimeGroup::new(bn(3), bn(1), bn(2)).is_err());
    }

    #[test]
    fn generator_has_order_q() {
        let group = small_group();
        let mut ops = DirectPath::Portable;
        assert_eq!(
            group.pow_generator(group.order(), &mut ops).unwrap(),
            BigNumber::one()
        );
        assert!(group.contains(group.generator(), &mut ops).unwrap());
    }

    #[test]
    fn membership() {
        let group = small_group();
        let mut ops = DirectPath::Portable;

        // 1019 = 3 mod 8, so 2 is not a quadratic residue.
        assert!(!group.contains(&bn(2), &mut ops).unwrap());
        assert!(group.contains(&bn(16), &mut ops).unwrap());
        assert!(!group.contains(&bn(0), &mut ops).unwrap());
        assert!(!group.contains(&bn(1019 + 16), &mut ops).unwrap());
    }

    #[test]
    fn mul_stays_in_range() {
        let group = small_group();
        assert_eq!(group.mul(&bn(1000), &bn(1000)), bn(1_000_000 % 1019));
    }
}
