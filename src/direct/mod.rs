//! Exponentiation computed on the spot, used whenever no cycle is running.

mod native;

use crate::{
    bridge::ModPow,
    errors::{BridgeError, Result, UsageError},
    utils::is_valid_modulus,
};
use libpaillier::unknown_order::BigNumber;
use serde::{Deserialize, Serialize};
use tracing::error;

/// Which routine computes an exponentiation that is not batched.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DirectPath {
    /// [`BigNumber::modpow`], constant time in the exponent. Even moduli,
    /// which it does not support, fall back to `mpz_powm`.
    #[default]
    Portable,
    /// GMP's `mpz_powm`, called directly. Variable time in the exponent.
    Native,
}

impl DirectPath {
    /// Compute `base^exponent mod modulus`.
    ///
    /// Negative exponents are computed through the inverse of `base`, which
    /// must exist. The result always lies in `[0, modulus)`.
    pub fn modpow(
        self,
        base: &BigNumber,
        exponent: &BigNumber,
        modulus: &BigNumber,
    ) -> Result<BigNumber> {
        if !is_valid_modulus(modulus) {
            error!("Cannot exponentiate modulo a non-positive number");
            Err(UsageError::NonPositiveModulus)?
        }
        if modulus == &BigNumber::one() {
            return Ok(BigNumber::zero());
        }
        if exponent < &BigNumber::zero() {
            let inverse = base.invert(modulus).ok_or_else(|| {
                error!("Negative exponent on a base with no inverse modulo the modulus");
                BridgeError::from(UsageError::NonInvertibleBase)
            })?;
            let magnitude = BigNumber::zero() - exponent.clone();
            return self.modpow(&inverse, &magnitude, modulus);
        }
        if exponent == &BigNumber::zero() {
            return Ok(BigNumber::one());
        }

        Ok(match self {
            // The constant-time routine only supports odd moduli.
            DirectPath::Portable if is_odd(modulus) => {
                base.nmod(modulus).modpow(exponent, modulus)
            }
            DirectPath::Portable | DirectPath::Native => {
                native::modpow_vartime(base, exponent, modulus)
            }
        })
    }
}

fn is_odd(n: &BigNumber) -> bool {
    n.nmod(&BigNumber::from(2u64)) == BigNumber::one()
}

impl ModPow for DirectPath {
    fn modpow(
        &mut self,
        base: &BigNumber,
        exponent: &BigNumber,
        modulus: &BigNumber,
    ) -> Result<BigNumber> {
        DirectPath::modpow(*self, base, exponent, modulus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::testing::init_testing;

    #[test]
    fn small_values() {
        for path in [DirectPath::Portable, DirectPath::Native] {
            let five = BigNumber::from(5u64);
            assert_eq!(
                path.modpow(&BigNumber::from(2u64), &BigNumber::from(3u64), &five)
                    .unwrap(),
                BigNumber::from(3u64)
            );
            assert_eq!(
                path.modpow(&BigNumber::from(3u64), &BigNumber::from(4u64), &five)
                    .unwrap(),
                BigNumber::one()
            );
            assert_eq!(
                path.modpow(&BigNumber::from(7u64), &BigNumber::zero(), &five)
                    .unwrap(),
                BigNumber::one()
            );
        }
    }

    fn bn(x: u64) -> BigNumber {
        BigNumber::from(x)
    }

    /// Square-and-multiply over `u128`, for cross-checking small cases.
    fn reference_modpow(base: u64, exponent: u64, modulus: u64) -> u64 {
        let m = modulus as u128;
        let mut result = 1 % m;
        let mut square = base as u128 % m;
        let mut e = exponent;
        while e > 0 {
            if e & 1 == 1 {
                result = result * square % m;
            }
            square = square * square % m;
            e >>= 1;
        }
        result as u64
    }

    #[test]
    fn both_paths_accept_odd_and_even_moduli() {
        let moduli = [2u64, 5, 8, 12, 1019, 1024, 65_536, 1_000_003, u32::MAX as u64 + 1];
        for path in [DirectPath::Portable, DirectPath::Native] {
            for modulus in moduli {
                for (base, exponent) in [(3u64, 5u64), (7, 10), (0, 9), (123_456, 65_537)] {
                    assert_eq!(
                        path.modpow(&bn(base), &bn(exponent), &bn(modulus)).unwrap(),
                        bn(reference_modpow(base, exponent, modulus)),
                        "{path:?}: {base}^{exponent} mod {modulus}"
                    );
                }
            }
        }
    }

    #[test]
    fn native_agrees_with_portable() {
        let mut rng = init_testing();
        let bound = BigNumber::one() << 1024usize;
        for _ in 0..10 {
            let half = BigNumber::from_rng(&bound, &mut rng);
            let odd = &half + &half + BigNumber::one();
            let even = &odd + &odd;
            let base = BigNumber::from_rng(&even, &mut rng);
            let exponent = BigNumber::from_rng(&(BigNumber::one() << 512usize), &mut rng);

            for modulus in [&odd, &even] {
                assert_eq!(
                    DirectPath::Native.modpow(&base, &exponent, modulus).unwrap(),
                    DirectPath::Portable.modpow(&base, &exponent, modulus).unwrap()
                );
            }

            // The even modulus is twice the odd one, so reducing its result
            // must land on the constant-time result for the odd one.
            let wide = DirectPath::Portable.modpow(&base, &exponent, &even).unwrap();
            assert!(wide < even);
            assert_eq!(
                wide.nmod(&odd),
                DirectPath::Portable.modpow(&base, &exponent, &odd).unwrap()
            );
        }
    }

    #[test]
    fn modulus_one_gives_zero() {
        for path in [DirectPath::Portable, DirectPath::Native] {
            for exponent in [0u64, 1, 5] {
                assert_eq!(
                    path.modpow(&bn(5), &bn(exponent), &BigNumber::one()).unwrap(),
                    BigNumber::zero()
                );
            }
        }
    }

    #[test]
    fn negative_exponents_use_the_inverse() {
        let minus = |x: u64| BigNumber::zero() - bn(x);
        for path in [DirectPath::Portable, DirectPath::Native] {
            // 3 * 7 = 21 = 1 mod 10
            assert_eq!(path.modpow(&bn(3), &minus(1), &bn(10)).unwrap(), bn(7));
            assert_eq!(path.modpow(&bn(3), &minus(2), &bn(10)).unwrap(), bn(9));
            assert_eq!(path.modpow(&bn(4), &minus(1), &bn(1019)).unwrap(), bn(255));
        }
    }

    #[test]
    fn negative_exponent_without_inverse_is_rejected() {
        let minus_one = BigNumber::zero() - BigNumber::one();
        for path in [DirectPath::Portable, DirectPath::Native] {
            assert_eq!(
                path.modpow(&bn(3), &minus_one, &bn(9)),
                Err(UsageError::NonInvertibleBase.into())
            );
            assert_eq!(
                path.modpow(&bn(0), &minus_one, &bn(8)),
                Err(UsageError::NonInvertibleBase.into())
            );
        }
    }

    #[test]
    fn negative_bases_are_reduced() {
        let base = BigNumber::zero() - bn(3);
        for path in [DirectPath::Portable, DirectPath::Native] {
            // (-3)^5 = -243 = 776 mod 1019 and 5 mod 8
            assert_eq!(path.modpow(&base, &bn(5), &bn(1019)).unwrap(), bn(776));
            assert_eq!(path.modpow(&base, &bn(5), &bn(8)).unwrap(), bn(5));
        }
    }

    #[test]
    fn non_positive_modulus_is_rejected() {
        for path in [DirectPath::Portable, DirectPath::Native] {
            let two = BigNumber::from(2u64);
            assert_eq!(
                path.modpow(&two, &two, &BigNumber::zero()),
                Err(UsageError::NonPositiveModulus.into())
            );
            assert_eq!(
                path.modpow(&two, &two, &(BigNumber::zero() - BigNumber::one())),
                Err(UsageError::NonPositiveModulus.into())
            );
        }
    }
}
