#![no_main]

use shared_collections::Collection;

use libfuzzer_sys::fuzz_target;

fuzz_target!(|bytes: &[u8]| {
    // Arbitrary input either fails to decode or yields a value which survives re-encoding
    if let Ok(collection) = Collection::from_bytes(bytes) {
        let collection_again = Collection::from_bytes(&collection.to_bytes()).unwrap();
        assert_eq!(collection, collection_again);
    }
});
