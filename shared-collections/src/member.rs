// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt;

use tracing::{debug, trace};

use crate::attributes::{AttributeMap, Attributes, NAME_TAG};
use crate::changes::{Changes, MemberChange};
use crate::codec::{CacheReader, CacheWriter, DecodeError};
use crate::encryption::{AttributeState, EncryptedAttributes};
use crate::handle::{Handle, NodeHandle};
use crate::key::SymmetricKey;
use crate::traits::{AttributeCipher, Cacheable};

/// Entry of exactly one collection, wrapping a single storage object.
#[derive(Clone, Debug)]
pub struct Member {
    id: Handle,
    collection_id: Handle,
    node: NodeHandle,
    order: Option<i64>,
    timestamp: u64,
    attributes: Attributes,
    encrypted: EncryptedAttributes,
    attributes_cleared_by_last_update: bool,
    changes: Changes<MemberChange>,
}

impl Member {
    pub fn new(
        id: Handle,
        collection_id: Handle,
        node: NodeHandle,
        key: SymmetricKey,
        attributes: AttributeMap,
    ) -> Self {
        Self {
            id,
            collection_id,
            node,
            order: None,
            timestamp: 0,
            attributes: Attributes::from_map(attributes),
            encrypted: EncryptedAttributes::new(key),
            attributes_cleared_by_last_update: false,
            changes: Changes::new(),
        }
    }

    pub fn id(&self) -> Handle {
        self.id
    }

    pub fn collection_id(&self) -> Handle {
        self.collection_id
    }

    /// Storage object this member wraps.
    pub fn node(&self) -> NodeHandle {
        self.node
    }

    pub fn key(&self) -> &SymmetricKey {
        self.encrypted.key()
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn set_timestamp(&mut self, timestamp: u64) {
        self.timestamp = timestamp;
    }

    pub fn order(&self) -> Option<i64> {
        self.order
    }

    pub fn has_order(&self) -> bool {
        self.order.is_some()
    }

    /// Sets the position of this member inside its collection.
    ///
    /// The first assignment always counts as a change, later ones only if the value differs.
    pub fn set_order(&mut self, order: i64) {
        if self.order != Some(order) {
            self.order = Some(order);
            self.changes.set(MemberChange::Order);
        }
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

    pub fn rebase_attributes_on(&mut self, base: &Attributes) {
        self.attributes.rebase_on(base);
    }

    pub fn has_attribute_changed(&self, tag: &str, other: &Attributes) -> bool {
        self.attributes.has_changed(tag, other)
    }

    /// Returns true if the update which produced this value explicitly cleared all attributes.
    pub fn attributes_cleared_by_last_update(&self) -> bool {
        self.attributes_cleared_by_last_update
    }

    pub fn set_attributes_cleared_by_last_update(&mut self, cleared: bool) {
        self.attributes_cleared_by_last_update = cleared;
    }

    pub fn set_encrypted_attributes(&mut self, blob: Vec<u8>) {
        self.encrypted.set_blob(blob);
    }

    pub fn has_encrypted_attributes(&self) -> bool {
        self.encrypted.is_pending()
    }

    pub fn attribute_state(&self) -> AttributeState {
        self.encrypted.state(&self.attributes)
    }

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

    pub fn encrypt_attributes<F>(&self, encrypt: F) -> Vec<u8>
    where
        F: FnOnce(&AttributeMap, &SymmetricKey) -> Vec<u8>,
    {
        self.encrypted.encrypt(&self.attributes, encrypt)
    }

    pub fn encrypt_attributes_with<C: AttributeCipher>(&self, cipher: &C) -> Vec<u8> {
        self.encrypt_attributes(|attributes, key| cipher.encrypt(attributes, key))
    }

    pub fn changes(&self) -> &Changes<MemberChange> {
        &self.changes
    }

    pub fn has_changed(&self, change: MemberChange) -> bool {
        self.changes.contains(change)
    }

    pub fn has_changes(&self) -> bool {
        self.changes.any()
    }

    pub fn mark_changed(&mut self, change: MemberChange) {
        self.changes.set(change);
    }

    pub fn reset_changes(&mut self) {
        self.changes.clear();
    }

    /// Merges an update of this member received from the server.
    ///
    /// An update without attributes keeps the local ones unless it explicitly cleared them.
    /// Returns true if any change flag is set afterwards.
    pub fn update_with(&mut self, incoming: Member) -> bool {
        if let Some(order) = incoming.order {
            self.set_order(order);
        }
        self.timestamp = incoming.timestamp;

        if incoming.has_attributes() || incoming.attributes_cleared_by_last_update {
            if self.attributes.has_changed(NAME_TAG, &incoming.attributes) {
                self.changes.set(MemberChange::Name);
            }
            self.attributes = incoming.attributes;
        }

        trace!(
            id = %self.id,
            collection_id = %self.collection_id,
            changes = ?self.changes,
            "merged member update"
        );

        self.changes.any()
    }

    /// Encodes the member into its canonical record.
    ///
    /// A member without order is written with order zero.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        let mut writer = CacheWriter::new(&mut bytes);
        writer.write_handle(self.collection_id);
        writer.write_handle(self.id);
        writer.write_node_handle(self.node);
        writer.write_i64(self.order.unwrap_or_default());
        writer.write_compressed_u64(self.timestamp);
        writer.write_bytes(self.key().as_bytes());
        writer.write_attributes(&self.attributes);
        writer.write_expansion_flags(&[]);
        bytes
    }

    /// Decodes a member from its canonical record.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = CacheReader::new(bytes);
        let collection_id = reader.read_handle("collection id")?;
        let id = reader.read_handle("id")?;
        let node = reader.read_node_handle("node")?;
        let order = reader.read_i64("order")?;
        let timestamp = reader.read_compressed_u64("timestamp")?;
        let key = reader.read_bytes("key")?;
        let attributes = reader.read_attributes()?;
        reader.read_expansion_flags(0)?;

        Ok(Self {
            id,
            collection_id,
            node,
            order: Some(order),
            timestamp,
            attributes,
            encrypted: EncryptedAttributes::new(SymmetricKey::from(key)),
            attributes_cleared_by_last_update: false,
            changes: Changes::new(),
        })
    }
}

/// Two members are equal when their persisted state matches, an absent order persists as zero.
impl PartialEq for Member {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.collection_id == other.collection_id
            && self.node == other.node
            && self.order.unwrap_or_default() == other.order.unwrap_or_default()
            && self.timestamp == other.timestamp
            && self.key() == other.key()
            && self.attributes == other.attributes
    }
}

impl Eq for Member {}

impl Cacheable for Member {
    fn to_cache_bytes(&self) -> Vec<u8> {
        self.to_bytes()
    }

    fn from_cache_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        Self::from_bytes(bytes).inspect_err(|err| {
            debug!("failed decoding cached member: {err}");
        })
    }
}

#[cfg(feature = "arbitrary")]
impl<'a> arbitrary::Arbitrary<'a> for Member {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        let mut member = Member::new(
            u.arbitrary()?,
            u.arbitrary()?,
            u.arbitrary()?,
            u.arbitrary()?,
            u.arbitrary()?,
        );
        if let Some(order) = u.arbitrary::<Option<i64>>()? {
            member.set_order(order);
        }
        member.set_timestamp(u.arbitrary()?);
        Ok(member)
    }
}
