//! Direct calls into GMP.
//!
//! [`BigNumber`] is backed by GMP already, but only exposes its constant
//! interface. This module goes straight to `mpz_powm`, the variable-time
//! routine, for callers that have decided exponent timing is not a concern.

use gmp_mpfr_sys::gmp;
use libpaillier::unknown_order::BigNumber;
use std::mem::MaybeUninit;
use zeroize::Zeroize;

/// An owned, initialized `mpz_t`.
struct Mpz(gmp::mpz_t);

impl Mpz {
    fn new() -> Self {
        let mut raw = MaybeUninit::<gmp::mpz_t>::uninit();
        unsafe {
            // SAFETY: `mpz_init` initializes the value it is handed.
            gmp::mpz_init(raw.as_mut_ptr());
            Mpz(raw.assume_init())
        }
    }

    /// Import a big-endian magnitude.
    fn from_be_bytes(bytes: &[u8]) -> Self {
        let mut value = Self::new();
        if !bytes.is_empty() {
            unsafe {
                // SAFETY: `bytes` is a valid buffer of `bytes.len()` one-byte words.
                gmp::mpz_import(
                    &mut value.0,
                    bytes.len(),
                    1,
                    1,
                    1,
                    0,
                    bytes.as_ptr().cast(),
                );
            }
        }
        value
    }

    /// Export the magnitude as big-endian bytes.
    fn to_be_bytes(&self) -> Vec<u8> {
        let bits = unsafe {
            // SAFETY: `self.0` is initialized.
            gmp::mpz_sizeinbase(&self.0, 2)
        };
        let mut bytes = vec![0u8; (bits + 7) / 8];
        let mut written = 0usize;
        unsafe {
            // SAFETY: `bytes` has room for every byte of the magnitude.
            gmp::mpz_export(
                bytes.as_mut_ptr().cast(),
                &mut written,
                1,
                1,
                1,
                0,
                &self.0,
            );
        }
        bytes.truncate(written);
        bytes
    }
}

impl Drop for Mpz {
    fn drop(&mut self) {
        unsafe {
            // SAFETY: `self.0` was initialized in `Mpz::new` and is cleared once.
            gmp::mpz_clear(&mut self.0);
        }
    }
}

/// Compute `base^exponent mod modulus` with `mpz_powm`.
///
/// The caller guarantees `modulus` is positive and `exponent` is
/// non-negative. Any modulus parity is accepted.
pub(super) fn modpow_vartime(
    base: &BigNumber,
    exponent: &BigNumber,
    modulus: &BigNumber,
) -> BigNumber {
    // `to_bytes` drops the sign, so bring the base into [0, modulus) first.
    let reduced = base.nmod(modulus);
    let mut exponent_bytes = exponent.to_bytes();

    let b = Mpz::from_be_bytes(&reduced.to_bytes());
    let e = Mpz::from_be_bytes(&exponent_bytes);
    let m = Mpz::from_be_bytes(&modulus.to_bytes());
    exponent_bytes.zeroize();

    let mut result = Mpz::new();
    unsafe {
        // SAFETY: all four values are initialized and `m` is non-zero.
        gmp::mpz_powm(&mut result.0, &b.0, &e.0, &m.0);
    }

    let mut result_bytes = result.to_be_bytes();
    let value = BigNumber::from_slice(&result_bytes);
    result_bytes.zeroize();
    value
}
