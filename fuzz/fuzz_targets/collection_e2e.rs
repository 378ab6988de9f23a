#![no_main]

use shared_collections::Collection;

use libfuzzer_sys::fuzz_target;

fuzz_target!(|collection: Collection| {
    let bytes = collection.to_bytes();
    let collection_again = Collection::from_bytes(&bytes).unwrap();
    assert_eq!(collection, collection_again);

    // Malformed cover values read as undefined instead of failing
    let _ = collection_again.cover();
});
