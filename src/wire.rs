// Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Byte encoding of batches and their answers, for backends that live in
//! another process or on a device.
//!
//! Every number is written as an 8 byte little-endian length followed by its
//! big-endian magnitude. Only non-negative numbers can be encoded.

use crate::{
    errors::{BackendError, Result, UsageError},
    request::{Batch, ModExpRequest, ModExpResult},
    utils::{is_valid_modulus, ParseBytes},
};
use libpaillier::unknown_order::BigNumber;
use std::sync::Arc;
use tracing::error;
use zeroize::Zeroize;

const BATCH_TAG: &[u8] = b"ModExp Batch";
const RESULTS_TAG: &[u8] = b"ModExp Results";
const VERIFIED_TAG: &[u8] = b"ModExp Verified Results";

fn put_number(out: &mut Vec<u8>, n: &BigNumber) -> Result<()> {
    if n < &BigNumber::zero() {
        error!("Negative numbers cannot be encoded for a backend");
        Err(UsageError::BadInput)?
    }
    let mut bytes = n.to_bytes();
    out.extend_from_slice(&(bytes.len() as u64).to_le_bytes());
    out.extend_from_slice(&bytes);
    bytes.zeroize();
    Ok(())
}

fn put_len(out: &mut Vec<u8>, len: usize) {
    out.extend_from_slice(&(len as u64).to_le_bytes());
}

fn take_number(parser: &mut ParseBytes) -> Result<BigNumber> {
    let len = parser.take_len()?;
    Ok(BigNumber::from_slice(parser.take_bytes(len)?))
}

fn take_tag(parser: &mut ParseBytes, tag: &[u8]) -> Result<()> {
    if parser.take_bytes(tag.len())? != tag {
        Err(BackendError::Deserialization)?
    }
    Ok(())
}

/// Run `parse` over `bytes`, then wipe the input whatever the outcome.
fn parse_all<T>(
    bytes: Vec<u8>,
    what: &str,
    parse: impl FnOnce(&mut ParseBytes) -> Result<T>,
) -> Result<T> {
    let mut parser = ParseBytes::new(bytes);
    let result = parse(&mut parser).and_then(|value| {
        if parser.is_exhausted() {
            Ok(value)
        } else {
            Err(BackendError::Deserialization.into())
        }
    });
    parser.zeroize();

    if result.is_err() {
        error!(
            "Failed to deserialize {}. Expected a tag followed by 8 byte little-endian length prefixed fields",
            what
        );
    }
    result
}

impl Batch {
    /// Encode the batch for an out-of-process backend.
    ///
    /// 🔒 The output contains every exponent of the batch.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        // Format:
        // BATCH TAG
        // modulus (empty for an empty batch)
        // number of requests (8 bytes)
        // base, exponent for every request

        let mut out = BATCH_TAG.to_vec();
        match self.modulus() {
            Some(modulus) => put_number(&mut out, modulus)?,
            None => put_len(&mut out, 0),
        }
        put_len(&mut out, self.len());
        for request in self.requests() {
            put_number(&mut out, request.base())?;
            put_number(&mut out, request.exponent())?;
        }
        Ok(out)
    }

    /// Decode a batch produced by [`Batch::to_bytes`].
    pub fn try_from_bytes(bytes: Vec<u8>) -> Result<Self> {
        parse_all(bytes, "`Batch`", |parser| {
            take_tag(parser, BATCH_TAG)?;

            let modulus_len = parser.take_len()?;
            let modulus = match modulus_len {
                0 => None,
                len => {
                    let modulus = BigNumber::from_slice(parser.take_bytes(len)?);
                    if !is_valid_modulus(&modulus) {
                        Err(BackendError::Deserialization)?
                    }
                    Some(modulus)
                }
            };

            let count = parser.take_len()?;
            let mut requests = Vec::new();
            for _ in 0..count {
                let base = take_number(parser)?;
                let exponent = take_number(parser)?;
                requests.push(ModExpRequest::new(base, exponent));
            }
            if modulus.is_none() != requests.is_empty() {
                Err(BackendError::Deserialization)?
            }

            let requests: Arc<[ModExpRequest]> = requests.into();
            Ok(Batch::new(requests, modulus))
        })
    }
}

/// Encode the answers to a batch.
pub fn encode_results(results: &[BigNumber]) -> Result<Vec<u8>> {
    let mut out = RESULTS_TAG.to_vec();
    put_len(&mut out, results.len());
    for result in results {
        put_number(&mut out, result)?;
    }
    Ok(out)
}

/// Decode answers produced by [`encode_results`].
pub fn decode_results(bytes: Vec<u8>) -> Result<Vec<BigNumber>> {
    parse_all(bytes, "results", |parser| {
        take_tag(parser, RESULTS_TAG)?;
        let count = parser.take_len()?;
        (0..count).map(|_| take_number(parser)).collect()
    })
}

/// Encode verification triples.
pub fn encode_verified_results(results: &[ModExpResult]) -> Result<Vec<u8>> {
    let mut out = VERIFIED_TAG.to_vec();
    put_len(&mut out, results.len());
    for result in results {
        put_number(&mut out, result.base())?;
        put_number(&mut out, result.exponent())?;
        put_number(&mut out, result.modulus())?;
        put_number(&mut out, result.result())?;
    }
    Ok(out)
}

/// Decode verification triples produced by [`encode_verified_results`].
pub fn decode_verified_results(bytes: Vec<u8>) -> Result<Vec<ModExpResult>> {
    parse_all(bytes, "verified results", |parser| {
        take_tag(parser, VERIFIED_TAG)?;
        let count = parser.take_len()?;
        let mut results = Vec::new();
        for _ in 0..count {
            let base = take_number(parser)?;
            let exponent = take_number(parser)?;
            let modulus = take_number(parser)?;
            let result = take_number(parser)?;
            results.push(ModExpResult::new(base, exponent, modulus, result));
        }
        Ok(results)
    })
}
