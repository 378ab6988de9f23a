// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities.
use rand::Rng;
use thiserror::Error;

use crate::attributes::{AttributeMap, Attributes};
use crate::codec::{CacheReader, CacheWriter, DecodeError};
use crate::handle::{Handle, NodeHandle};
use crate::key::SymmetricKey;
use crate::traits::AttributeCipher;

pub fn setup_logging() {
    if std::env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }
}

pub fn random_handle<R: Rng>(rng: &mut R) -> Handle {
    // Avoid accidentally producing the "undefined" value
    Handle::new(rng.random_range(0..u64::MAX))
}

pub fn random_node_handle<R: Rng>(rng: &mut R) -> NodeHandle {
    NodeHandle::new(rng.random_range(0..NodeHandle::UNDEF.as_u64()))
}

pub fn random_key<R: Rng>(rng: &mut R) -> SymmetricKey {
    let bytes: [u8; 16] = rng.random();
    SymmetricKey::new(bytes)
}

pub fn random_attributes<R: Rng>(rng: &mut R) -> AttributeMap {
    let count = rng.random_range(0..6);
    (0..count)
        .map(|index| {
            let value_len = rng.random_range(0..24);
            let value: String = (0..value_len)
                .map(|_| char::from(rng.random_range(b'a'..=b'z')))
                .collect();
            (format!("t{index}"), value)
        })
        .collect()
}

/// Toy cipher for tests: a key fingerprint followed by the attribute record XOR-ed with the key.
///
/// Offers no confidentiality whatsoever but detects blobs made for another key.
#[derive(Clone, Copy, Debug, Default)]
pub struct TestCipher;

impl TestCipher {
    fn fingerprint(key: &SymmetricKey) -> [u8; 4] {
        // 32-bit FNV-1a
        let hash = key.as_bytes().iter().fold(0x811c_9dc5_u32, |hash, byte| {
            (hash ^ u32::from(*byte)).wrapping_mul(0x0100_0193)
        });
        hash.to_le_bytes()
    }

    fn apply_key(bytes: &[u8], key: &SymmetricKey) -> Vec<u8> {
        if key.is_empty() {
            return bytes.to_vec();
        }
        bytes
            .iter()
            .zip(key.as_bytes().iter().cycle())
            .map(|(byte, key_byte)| byte ^ key_byte)
            .collect()
    }
}

impl AttributeCipher for TestCipher {
    type Error = TestCipherError;

    fn decrypt(&self, blob: &[u8], key: &SymmetricKey) -> Result<AttributeMap, Self::Error> {
        let (fingerprint, body) = blob
            .split_first_chunk::<4>()
            .ok_or(TestCipherError::Malformed)?;
        if *fingerprint != Self::fingerprint(key) {
            return Err(TestCipherError::KeyMismatch);
        }

        let plaintext = Self::apply_key(body, key);
        let attributes = CacheReader::new(&plaintext).read_attributes()?;
        Ok(attributes.as_map().cloned().unwrap_or_default())
    }

    fn encrypt(&self, attributes: &AttributeMap, key: &SymmetricKey) -> Vec<u8> {
        let attributes = Attributes::from_map(attributes.clone());
        let mut plaintext = Vec::new();
        CacheWriter::new(&mut plaintext).write_attributes(&attributes);

        let mut blob = Self::fingerprint(key).to_vec();
        blob.extend(Self::apply_key(&plaintext, key));
        blob
    }
}

#[derive(Debug, Error)]
pub enum TestCipherError {
    #[error("blob is too short")]
    Malformed,

    #[error("blob was encrypted with another key")]
    KeyMismatch,

    #[error(transparent)]
    Decode(#[from] DecodeError),
}
