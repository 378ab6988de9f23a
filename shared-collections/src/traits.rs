// SPDX-License-Identifier: MIT OR Apache-2.0

//! Interfaces to the collaborators around collections and members.
use std::error::Error;

use crate::attributes::AttributeMap;
use crate::codec::DecodeError;
use crate::key::SymmetricKey;

/// Cipher turning attribute dictionaries into encrypted blobs and back.
///
/// The algorithm is chosen by the implementer, entities only pass their own key along.
pub trait AttributeCipher {
    type Error: Error;

    fn decrypt(&self, blob: &[u8], key: &SymmetricKey) -> Result<AttributeMap, Self::Error>;

    fn encrypt(&self, attributes: &AttributeMap, key: &SymmetricKey) -> Vec<u8>;
}

/// Values which can be stored in and restored from the local cache.
pub trait Cacheable: Sized {
    fn to_cache_bytes(&self) -> Vec<u8>;

    fn from_cache_bytes(bytes: &[u8]) -> Result<Self, DecodeError>;
}
