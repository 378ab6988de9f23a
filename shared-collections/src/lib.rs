// SPDX-License-Identifier: MIT OR Apache-2.0

//! `shared-collections` is the local representation of server-managed, shareable collections of
//! storage objects and of their members, as tracked by a synchronisation client.
//!
//! Both entity types carry a dictionary of named attributes. Attributes either arrive in
//! cleartext or as an encrypted blob next to a per-entity symmetric key; the blob is kept until
//! the application's cipher manages to open it. Updates pushed by the server are merged into
//! the local values with `update_with`, which records which fields changed so observers can be
//! notified. Finally every entity has a canonical binary record used for the local cache.
//!
//! This crate never selects a cipher, performs I/O or stores records. Ciphers are passed in as
//! closures or [`AttributeCipher`] implementations, records are handed to a cache engine as plain
//! bytes via [`Cacheable`].
//!
//! ## Example
//!
//! ```
//! use shared_collections::{
//!     AttributeMap, Cacheable, Collection, CollectionChange, Handle, SymmetricKey,
//! };
//!
//! let key = SymmetricKey::new([7; 16]);
//! let mut local = Collection::new(Handle::new(1), Handle::new(2), key.clone(), AttributeMap::new());
//! local.set_name("Holidays");
//!
//! // An update received from the server, attributes arrive encrypted.
//! let mut incoming = Collection::new(Handle::new(1), Handle::new(2), key, AttributeMap::new());
//! incoming.set_timestamp(1_700_000_000);
//! incoming.set_encrypted_attributes(b"opaque".to_vec());
//! incoming
//!     .decrypt_attributes(|_blob, _key| {
//!         let mut attributes = AttributeMap::new();
//!         attributes.insert("n".into(), "Summer holidays".into());
//!         Ok::<_, String>(attributes)
//!     })
//!     .expect("decryption should succeed");
//!
//! assert!(local.update_with(incoming));
//! assert!(local.has_changed(CollectionChange::Name));
//!
//! // Store and restore the merged state.
//! let bytes = local.to_cache_bytes();
//! assert_eq!(Collection::from_cache_bytes(&bytes).unwrap(), local);
//! ```
pub mod attributes;
pub mod changes;
pub mod codec;
pub mod collection;
pub mod encryption;
pub mod handle;
pub mod key;
pub mod member;
mod serde;
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
#[cfg(test)]
mod tests;
pub mod traits;

pub use attributes::{AttributeMap, Attributes, NAME_TAG};
pub use changes::{ChangeKind, Changes, CollectionChange, MemberChange};
pub use codec::DecodeError;
pub use collection::{COVER_TAG, Collection};
pub use encryption::{AttributeState, EncryptedAttributes};
pub use handle::{Handle, HandleError, NodeHandle};
pub use key::SymmetricKey;
pub use member::Member;
pub use traits::{AttributeCipher, Cacheable};
