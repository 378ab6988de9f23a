// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lifecycle of attributes which arrive encrypted.
//!
//! Attributes are received from the server as an encrypted blob next to the entity's symmetric
//! key. The blob is kept until a decryption succeeds, after which the decrypted dictionary
//! replaces the local attributes and the blob is dropped:
//!
//! ```text
//! NotReceived ----------------------------\
//! ReceivedEmpty --(no cipher needed)-------+--> Decrypted
//! ReceivedEncrypted --(decrypt succeeds)--/
//! ```
//!
//! A failed decryption leaves everything as it was so it can be retried later, for example after
//! the key got refreshed.
use std::fmt;

use tracing::debug;

use crate::attributes::{AttributeMap, Attributes};
use crate::key::SymmetricKey;

/// Where an entity's attributes are in their decryption lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttributeState {
    /// No encrypted attributes were ever received and none are set.
    NotReceived,

    /// An empty blob was received, decrypting it yields an empty dictionary.
    ReceivedEmpty,

    /// A blob was received and waits for decryption.
    ReceivedEncrypted,

    /// Attributes are available in cleartext.
    Decrypted,
}

/// Encrypted attribute blob and the key needed to open it.
#[derive(Clone, Debug, Default)]
pub struct EncryptedAttributes {
    blob: Option<Vec<u8>>,
    key: SymmetricKey,
}

impl EncryptedAttributes {
    pub fn new(key: SymmetricKey) -> Self {
        Self { blob: None, key }
    }

    pub fn key(&self) -> &SymmetricKey {
        &self.key
    }

    /// Raw blob as received, present only until it was decrypted.
    pub fn blob(&self) -> Option<&[u8]> {
        self.blob.as_deref()
    }

    /// Stores a blob received from the server.
    pub fn set_blob(&mut self, blob: Vec<u8>) {
        self.blob = Some(blob);
    }

    /// Returns true while a received blob waits for decryption.
    pub fn is_pending(&self) -> bool {
        self.blob.is_some()
    }

    pub fn state(&self, attributes: &Attributes) -> AttributeState {
        match &self.blob {
            Some(blob) if blob.is_empty() => AttributeState::ReceivedEmpty,
            Some(_) => AttributeState::ReceivedEncrypted,
            None if attributes.is_present() => AttributeState::Decrypted,
            None => AttributeState::NotReceived,
        }
    }

    /// Decrypts a pending blob into `attributes`.
    ///
    /// `decrypt` receives the raw blob and the key and is only called for a non-empty blob. On
    /// error neither the blob nor `attributes` are touched and the error is handed back.
    pub fn decrypt<F, E>(&mut self, attributes: &mut Attributes, decrypt: F) -> Result<(), E>
    where
        F: FnOnce(&[u8], &SymmetricKey) -> Result<AttributeMap, E>,
        E: fmt::Display,
    {
        let Some(blob) = &self.blob else {
            return Ok(());
        };

        let decrypted = if blob.is_empty() {
            AttributeMap::new()
        } else {
            decrypt(blob.as_slice(), &self.key).inspect_err(|err| {
                debug!(blob_len = blob.len(), "failed decrypting attributes: {err}");
            })?
        };

        *attributes = Attributes::present(decrypted);
        self.blob = None;

        Ok(())
    }

    /// Encrypts `attributes` with the entity's key.
    ///
    /// Returns an empty blob without calling `encrypt` when there are no attributes.
    pub fn encrypt<F>(&self, attributes: &Attributes, encrypt: F) -> Vec<u8>
    where
        F: FnOnce(&AttributeMap, &SymmetricKey) -> Vec<u8>,
    {
        match attributes.as_map() {
            Some(map) if !map.is_empty() => encrypt(map, &self.key),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use crate::attributes::{AttributeMap, Attributes};
    use crate::key::SymmetricKey;

    use super::{AttributeState, EncryptedAttributes};

    fn map(pairs: &[(&str, &str)]) -> AttributeMap {
        pairs
            .iter()
            .map(|(tag, value)| (tag.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn nothing_received() {
        let mut encrypted = EncryptedAttributes::new(SymmetricKey::new([1]));
        let mut attributes = Attributes::new();
        assert_eq!(encrypted.state(&attributes), AttributeState::NotReceived);

        let result: Result<(), String> =
            encrypted.decrypt(&mut attributes, |_, _| panic!("cipher should not be called"));
        assert!(result.is_ok());
        assert!(!attributes.is_present());
        assert_eq!(encrypted.state(&attributes), AttributeState::NotReceived);
    }

    #[test]
    fn empty_blob() {
        let mut encrypted = EncryptedAttributes::new(SymmetricKey::new([1]));
        encrypted.set_blob(Vec::new());
        let mut attributes = Attributes::new();
        assert_eq!(encrypted.state(&attributes), AttributeState::ReceivedEmpty);

        let called = Cell::new(false);
        let result: Result<(), String> = encrypted.decrypt(&mut attributes, |_, _| {
            called.set(true);
            Ok(AttributeMap::new())
        });
        assert!(result.is_ok());
        assert!(!called.get());
        assert!(attributes.is_present());
        assert!(attributes.is_empty());
        assert_eq!(encrypted.blob(), None);
        assert_eq!(encrypted.state(&attributes), AttributeState::Decrypted);
    }

    #[test]
    fn successful_decryption() {
        let mut encrypted = EncryptedAttributes::new(SymmetricKey::new([9, 9]));
        encrypted.set_blob(vec![1, 2, 3]);
        let mut attributes = Attributes::new();
        assert_eq!(encrypted.state(&attributes), AttributeState::ReceivedEncrypted);

        let result: Result<(), String> = encrypted.decrypt(&mut attributes, |blob, key| {
            assert_eq!(blob, &[1, 2, 3]);
            assert_eq!(key.as_bytes(), &[9, 9]);
            Ok(map(&[("n", "Summer")]))
        });
        assert!(result.is_ok());
        assert_eq!(attributes.get("n"), "Summer");
        assert!(!encrypted.is_pending());
    }

    #[test]
    fn failed_decryption_is_inert() {
        let mut encrypted = EncryptedAttributes::new(SymmetricKey::new([9]));
        encrypted.set_blob(vec![1, 2, 3]);
        let mut attributes: Attributes = [("n", "old")].into_iter().collect();

        let result = encrypted.decrypt(&mut attributes, |_, _| Err("wrong key"));
        assert_eq!(result, Err("wrong key"));
        assert_eq!(encrypted.blob(), Some(&[1, 2, 3][..]));
        assert_eq!(attributes.get("n"), "old");
        assert_eq!(attributes.len(), 1);
    }

    #[test]
    fn encrypt_skips_empty_attributes() {
        let encrypted = EncryptedAttributes::new(SymmetricKey::new([3]));

        let blob = encrypted.encrypt(&Attributes::new(), |_, _| panic!("not expected"));
        assert!(blob.is_empty());

        let blob = encrypted.encrypt(&Attributes::present(AttributeMap::new()), |_, _| {
            panic!("not expected")
        });
        assert!(blob.is_empty());

        let attributes: Attributes = [("n", "x")].into_iter().collect();
        let blob = encrypted.encrypt(&attributes, |map, key| {
            let mut blob = key.as_bytes().to_vec();
            blob.extend_from_slice(map["n"].as_bytes());
            blob
        });
        assert_eq!(blob, vec![3, b'x']);
    }
}
