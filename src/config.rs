// Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Bridge configuration.

use crate::{
    direct::DirectPath,
    errors::{Result, UsageError},
};
use libpaillier::unknown_order::BigNumber;
use tracing::{debug, error};

/// Environment variable selecting the native direct path.
pub const NATIVE_ENV: &str = "MPBRIDGE_NATIVE";
/// Environment variable switching batching on or off.
pub const BATCHING_ENV: &str = "MPBRIDGE_BATCHING";
/// Placeholder returned by recorded exponentiations unless configured
/// otherwise.
pub const DEFAULT_DUMMY: u64 = 2;

/// Settings shared by every [`Bridge`](crate::Bridge) built from them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BridgeConfig {
    direct: DirectPath,
    batching: bool,
    dummy: BigNumber,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            direct: DirectPath::Portable,
            batching: true,
            dummy: BigNumber::from(DEFAULT_DUMMY),
        }
    }
}

impl BridgeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the two toggles from [`NATIVE_ENV`] and [`BATCHING_ENV`].
    ///
    /// Unset variables keep their default. Accepted values are `1`/`0`,
    /// `true`/`false`, `yes`/`no` and `on`/`off`, in any case.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(native) = lookup(NATIVE_ENV) {
            config = config.with_native_direct(parse_flag(NATIVE_ENV, &native)?);
        }
        if let Some(batching) = lookup(BATCHING_ENV) {
            config = config.with_batching(parse_flag(BATCHING_ENV, &batching)?);
        }
        debug!(
            "Bridge configuration: direct path {:?}, batching {}",
            config.direct, config.batching
        );
        Ok(config)
    }

    /// Use GMP's `mpz_powm` instead of [`BigNumber::modpow`] for direct
    /// computations.
    pub fn with_native_direct(mut self, native: bool) -> Self {
        self.direct = if native {
            DirectPath::Native
        } else {
            DirectPath::Portable
        };
        self
    }

    /// With batching off, [`Bridge::run`](crate::Bridge::run) executes its
    /// unit of work once, computing every exponentiation directly.
    pub fn with_batching(mut self, batching: bool) -> Self {
        self.batching = batching;
        self
    }

    /// Set the placeholder returned by recorded exponentiations.
    pub fn with_dummy(mut self, dummy: BigNumber) -> Self {
        self.dummy = dummy;
        self
    }

    pub fn direct_path(&self) -> DirectPath {
        self.direct
    }

    pub fn batching(&self) -> bool {
        self.batching
    }

    pub fn dummy(&self) -> &BigNumber {
        &self.dummy
    }
}

fn parse_flag(variable: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => {
            error!("Invalid value {:?} for {}", value, variable);
            Err(UsageError::InvalidConfig {
                variable: variable.to_string(),
                value: value.to_string(),
            })?
        }
    }
}
