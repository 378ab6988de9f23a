// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt;

use tracing::{debug, trace};

use crate::attributes::{AttributeMap, Attributes, NAME_TAG};
use crate::changes::{Changes, CollectionChange};
use crate::codec::{CacheReader, CacheWriter, DecodeError};
use crate::encryption::{AttributeState, EncryptedAttributes};
use crate::handle::Handle;
use crate::key::SymmetricKey;
use crate::traits::{AttributeCipher, Cacheable};

/// Tag of the attribute holding the base64 handle of the cover member.
pub const COVER_TAG: &str = "c";

/// Server-managed, shareable grouping of storage objects.
///
/// Members are not held by the collection, they point back at it through their collection id.
#[derive(Clone, Debug)]
pub struct Collection {
    id: Handle,
    owner: Handle,
    timestamp: u64,
    attributes: Attributes,
    encrypted: EncryptedAttributes,
    changes: Changes<CollectionChange>,
}

impl Collection {
    pub fn new(id: Handle, owner: Handle, key: SymmetricKey, attributes: AttributeMap) -> Self {
        Self {
            id,
            owner,
            timestamp: 0,
            attributes: Attributes::from_map(attributes),
            encrypted: EncryptedAttributes::new(key),
            changes: Changes::new(),
        }
    }

    pub fn id(&self) -> Handle {
        self.id
    }

    pub fn owner(&self) -> Handle {
        self.owner
    }

    pub fn key(&self) -> &SymmetricKey {
        self.encrypted.key()
    }

    /// Last modification time in seconds.
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn set_timestamp(&mut self, timestamp: u64) {
        self.timestamp = timestamp;
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn has_attributes(&self) -> bool {
        self.attributes.is_present()
    }

    pub fn attribute(&self, tag: &str) -> &str {
        self.attributes.get(tag)
    }

    pub fn set_attribute(&mut self, tag: impl Into<String>, value: impl Into<String>) {
        self.attributes.set(tag, value);
    }

    pub fn name(&self) -> &str {
        self.attributes.get(NAME_TAG)
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.attributes.set(NAME_TAG, name);
    }

    /// Handle of the member used as visual representative.
    ///
    /// Returns [`Handle::UNDEF`] if no cover is set or the stored value is malformed.
    pub fn cover(&self) -> Handle {
        let encoded = self.attributes.get(COVER_TAG);
        if encoded.is_empty() {
            return Handle::UNDEF;
        }
        Handle::from_base64(encoded).unwrap_or(Handle::UNDEF)
    }

    /// Sets the cover member, [`Handle::UNDEF`] stores the delete marker.
    pub fn set_cover(&mut self, cover: Handle) {
        if cover.is_undef() {
            self.attributes.set(COVER_TAG, String::new());
        } else {
            self.attributes.set(COVER_TAG, cover.to_base64());
        }
    }

    /// Merges inherited `base` attributes underneath the local ones.
    pub fn rebase_attributes_on(&mut self, base: &Attributes) {
        self.attributes.rebase_on(base);
    }

    pub fn has_attribute_changed(&self, tag: &str, other: &Attributes) -> bool {
        self.attributes.has_changed(tag, other)
    }

    /// Stores the encrypted attribute blob received from the server.
    pub fn set_encrypted_attributes(&mut self, blob: Vec<u8>) {
        self.encrypted.set_blob(blob);
    }

    pub fn has_encrypted_attributes(&self) -> bool {
        self.encrypted.is_pending()
    }

    pub fn attribute_state(&self) -> AttributeState {
        self.encrypted.state(&self.attributes)
    }

    /// Decrypts pending attributes, see [`EncryptedAttributes::decrypt`].
    pub fn decrypt_attributes<F, E>(&mut self, decrypt: F) -> Result<(), E>
    where
        F: FnOnce(&[u8], &SymmetricKey) -> Result<AttributeMap, E>,
        E: fmt::Display,
    {
        self.encrypted.decrypt(&mut self.attributes, decrypt)
    }

    pub fn decrypt_attributes_with<C: AttributeCipher>(
        &mut self,
        cipher: &C,
    ) -> Result<(), C::Error> {
        self.decrypt_attributes(|blob, key| cipher.decrypt(blob, key))
    }

    /// Encrypts the current attributes, returning an empty blob if there are none.
    pub fn encrypt_attributes<F>(&self, encrypt: F) -> Vec<u8>
    where
        F: FnOnce(&AttributeMap, &SymmetricKey) -> Vec<u8>,
    {
        self.encrypted.encrypt(&self.attributes, encrypt)
    }

    pub fn encrypt_attributes_with<C: AttributeCipher>(&self, cipher: &C) -> Vec<u8> {
        self.encrypt_attributes(|attributes, key| cipher.encrypt(attributes, key))
    }

    pub fn changes(&self) -> &Changes<CollectionChange> {
        &self.changes
    }

    pub fn has_changed(&self, change: CollectionChange) -> bool {
        self.changes.contains(change)
    }

    pub fn has_changes(&self) -> bool {
        self.changes.any()
    }

    pub fn mark_changed(&mut self, change: CollectionChange) {
        self.changes.set(change);
    }

    pub fn reset_changes(&mut self) {
        self.changes.clear();
    }

    /// Merges an authoritative update of this collection.
    ///
    /// The timestamp is taken over and the attributes are replaced as a whole. Name and cover
    /// changes are recorded. Identity fields stay untouched. Returns true if any change flag is
    /// set afterwards.
    pub fn update_with(&mut self, incoming: Collection) -> bool {
        self.timestamp = incoming.timestamp;

        if self.attributes.has_changed(NAME_TAG, &incoming.attributes) {
            self.changes.set(CollectionChange::Name);
        }
        if self.attributes.has_changed(COVER_TAG, &incoming.attributes) {
            self.changes.set(CollectionChange::Cover);
        }
        self.attributes = incoming.attributes;

        trace!(id = %self.id, changes = ?self.changes, "merged collection update");

        self.changes.any()
    }

    /// Encodes the collection into its canonical record.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        let mut writer = CacheWriter::new(&mut bytes);
        writer.write_handle(self.id);
        writer.write_handle(self.owner);
        writer.write_compressed_u64(self.timestamp);
        writer.write_bytes(self.key().as_bytes());
        writer.write_attributes(&self.attributes);
        writer.write_expansion_flags(&[]);
        bytes
    }

    /// Decodes a collection from its canonical record.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = CacheReader::new(bytes);
        let id = reader.read_handle("id")?;
        let owner = reader.read_handle("owner")?;
        let timestamp = reader.read_compressed_u64("timestamp")?;
        let key = reader.read_bytes("key")?;
        let attributes = reader.read_attributes()?;
        reader.read_expansion_flags(0)?;

        Ok(Self {
            id,
            owner,
            timestamp,
            attributes,
            encrypted: EncryptedAttributes::new(SymmetricKey::from(key)),
            changes: Changes::new(),
        })
    }
}

/// Two collections are equal when their persisted state matches.
impl PartialEq for Collection {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.owner == other.owner
            && self.timestamp == other.timestamp
            && self.key() == other.key()
            && self.attributes == other.attributes
    }
}

impl Eq for Collection {}

impl Cacheable for Collection {
    fn to_cache_bytes(&self) -> Vec<u8> {
        self.to_bytes()
    }

    fn from_cache_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        Self::from_bytes(bytes).inspect_err(|err| {
            debug!("failed decoding cached collection: {err}");
        })
    }
}

#[cfg(feature = "arbitrary")]
impl<'a> arbitrary::Arbitrary<'a> for Collection {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        let mut collection = Collection::new(
            u.arbitrary()?,
            u.arbitrary()?,
            u.arbitrary()?,
            u.arbitrary()?,
        );
        collection.set_timestamp(u.arbitrary()?);
        Ok(collection)
    }
}
