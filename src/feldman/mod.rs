// Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Feldman verifiable secret sharing over a safe-prime subgroup, written
//! against [`ModPow`](crate::ModPow) so that dealing and verification batch
//! their exponentiations through the bridge.
//!
//! A typical session under a [`Bridge`](crate::Bridge) runs two units of
//! work, because verification exponentiates the commitments produced by
//! dealing:
//! 1. sample a [`Polynomial`] outside of any unit of work, then run
//!    [`FeldmanScheme::deal`];
//! 2. run [`FeldmanScheme::verify_all`] over the resulting shares and
//!    commitments.
//!
//! Recovery ([`FeldmanScheme::recover`]) needs no exponentiation.

mod group;
mod polynomial;
mod scheme;

pub use group::SafePrimeGroup;
pub use polynomial::Polynomial;
pub use scheme::{FeldmanScheme, Share, SharesAndCommitments};
