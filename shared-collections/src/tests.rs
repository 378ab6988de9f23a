// SPDX-License-Identifier: MIT OR Apache-2.0

use assert_matches::assert_matches;
use rand::Rng;

use crate::attributes::{AttributeMap, Attributes};
use crate::changes::{CollectionChange, MemberChange};
use crate::encryption::AttributeState;
use crate::handle::{Handle, NodeHandle};
use crate::key::SymmetricKey;
use crate::test_utils::{
    TestCipher, TestCipherError, random_attributes, random_handle, random_key,
    random_node_handle, setup_logging,
};
use crate::traits::{AttributeCipher, Cacheable};
use crate::{Collection, Member};

fn attributes(pairs: &[(&str, &str)]) -> AttributeMap {
    pairs
        .iter()
        .map(|(tag, value)| (tag.to_string(), value.to_string()))
        .collect()
}

/// Builds a collection the way it arrives from the server: attributes only as encrypted blob.
fn incoming_collection(
    id: Handle,
    owner: Handle,
    key: &SymmetricKey,
    plaintext: &AttributeMap,
) -> Collection {
    let mut collection = Collection::new(id, owner, key.clone(), AttributeMap::new());
    collection.set_encrypted_attributes(TestCipher.encrypt(plaintext, key));
    collection
}

#[test]
fn server_update_flow() {
    setup_logging();

    let id = Handle::new(0x1000);
    let owner = Handle::new(0x2000);
    let key = SymmetricKey::new([0x42; 16]);

    // Local state restored from the cache
    let mut local = Collection::new(id, owner, key.clone(), attributes(&[("n", "Trip")]));
    local.set_timestamp(100);
    let cached = local.to_cache_bytes();
    let mut local = Collection::from_cache_bytes(&cached).unwrap();
    assert_eq!(local.name(), "Trip");

    // Update arrives encrypted and gets decrypted before merging
    let cover = Handle::new(7).to_base64();
    let mut incoming = incoming_collection(
        id,
        owner,
        &key,
        &attributes(&[("n", "Road trip"), ("c", cover.as_str())]),
    );
    incoming.set_timestamp(200);
    assert_eq!(incoming.attribute_state(), AttributeState::ReceivedEncrypted);
    incoming.decrypt_attributes_with(&TestCipher).unwrap();
    assert_eq!(incoming.attribute_state(), AttributeState::Decrypted);

    assert!(local.update_with(incoming));
    assert!(local.has_changed(CollectionChange::Name));
    assert!(local.has_changed(CollectionChange::Cover));
    assert_eq!(local.cover(), Handle::new(7));
    assert_eq!(local.timestamp(), 200);

    // The merged state survives the cache again
    let reloaded = Collection::from_cache_bytes(&local.to_cache_bytes()).unwrap();
    assert_eq!(reloaded, local);
    assert!(!reloaded.has_changes());
}

#[test]
fn decryption_can_be_retried_after_key_refresh() {
    setup_logging();

    let stale_key = SymmetricKey::new([1; 16]);
    let fresh_key = SymmetricKey::new([2; 16]);

    let mut member = Member::new(
        Handle::new(1),
        Handle::new(2),
        NodeHandle::new(3),
        stale_key,
        AttributeMap::new(),
    );
    let blob = TestCipher.encrypt(&attributes(&[("n", "Beach")]), &fresh_key);
    member.set_encrypted_attributes(blob.clone());

    let result = member.decrypt_attributes_with(&TestCipher);
    assert_matches!(result, Err(TestCipherError::KeyMismatch));
    assert!(member.has_encrypted_attributes());
    assert!(!member.has_attributes());
    assert_eq!(member.attribute_state(), AttributeState::ReceivedEncrypted);

    member
        .decrypt_attributes(|blob, _| TestCipher.decrypt(blob, &fresh_key))
        .unwrap();
    assert_eq!(member.name(), "Beach");
    assert!(!member.has_encrypted_attributes());
}

#[test]
fn encrypt_decrypt_through_entity() {
    let key = SymmetricKey::new([9; 16]);
    let mut collection = Collection::new(
        Handle::new(1),
        Handle::new(2),
        key.clone(),
        attributes(&[("n", "Album")]),
    );
    collection.set_cover(Handle::new(55));

    let blob = collection.encrypt_attributes_with(&TestCipher);
    let mut received = Collection::new(Handle::new(1), Handle::new(2), key, AttributeMap::new());
    received.set_encrypted_attributes(blob);
    received.decrypt_attributes_with(&TestCipher).unwrap();

    assert_eq!(received.attributes(), collection.attributes());
    assert_eq!(received.cover(), Handle::new(55));
}

#[test]
fn member_update_without_attributes_keeps_decrypted_state() {
    let key = SymmetricKey::new([3; 16]);
    let mut local = Member::new(
        Handle::new(1),
        Handle::new(2),
        NodeHandle::new(3),
        key.clone(),
        attributes(&[("n", "A")]),
    );
    local.set_order(10);
    local.reset_changes();

    // Order-only update: attributes were not part of it
    let mut incoming = Member::new(
        Handle::new(1),
        Handle::new(2),
        NodeHandle::new(3),
        key.clone(),
        AttributeMap::new(),
    );
    incoming.set_order(20);
    incoming.decrypt_attributes_with(&TestCipher).unwrap();

    assert!(local.update_with(incoming));
    assert!(local.has_changed(MemberChange::Order));
    assert!(!local.has_changed(MemberChange::Name));
    assert_eq!(local.name(), "A");

    // Update which received an empty attribute blob replaces the local attributes
    let mut incoming = Member::new(
        Handle::new(1),
        Handle::new(2),
        NodeHandle::new(3),
        key,
        AttributeMap::new(),
    );
    incoming.set_encrypted_attributes(Vec::new());
    incoming.decrypt_attributes_with(&TestCipher).unwrap();
    assert!(incoming.has_attributes());

    local.reset_changes();
    assert!(local.update_with(incoming));
    assert!(local.has_changed(MemberChange::Name));
    assert!(local.attributes().is_empty());
}

#[test]
fn rebase_before_merge() {
    let base: Attributes = [("n", "Default"), ("c", "AAAAAAAAAAA"), ("d", "desc")]
        .into_iter()
        .collect();

    let mut member = Member::new(
        Handle::new(1),
        Handle::new(2),
        NodeHandle::new(3),
        SymmetricKey::default(),
        attributes(&[("n", "Custom"), ("d", "")]),
    );
    member.rebase_attributes_on(&base);

    assert_eq!(member.name(), "Custom");
    assert_eq!(member.attribute("c"), "AAAAAAAAAAA");
    assert_eq!(member.attribute("d"), "");
    assert_eq!(member.attributes().len(), 2);
    assert!(!member.has_attribute_changed("n", &[("n", "Custom")].into_iter().collect()));
}

#[test]
fn randomised_roundtrips() {
    let mut rng = rand::rng();

    for _ in 0..64 {
        let mut collection = Collection::new(
            random_handle(&mut rng),
            random_handle(&mut rng),
            random_key(&mut rng),
            random_attributes(&mut rng),
        );
        collection.set_timestamp(rng.random());
        assert_eq!(
            Collection::from_cache_bytes(&collection.to_cache_bytes()).unwrap(),
            collection
        );

        let mut member = Member::new(
            random_handle(&mut rng),
            collection.id(),
            random_node_handle(&mut rng),
            random_key(&mut rng),
            random_attributes(&mut rng),
        );
        member.set_order(rng.random());
        member.set_timestamp(rng.random());
        assert_eq!(
            Member::from_cache_bytes(&member.to_cache_bytes()).unwrap(),
            member
        );
    }
}
