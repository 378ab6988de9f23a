#![no_main]

use shared_collections::Member;

use libfuzzer_sys::fuzz_target;

fuzz_target!(|bytes: &[u8]| {
    if let Ok(member) = Member::from_bytes(bytes) {
        let member_again = Member::from_bytes(&member.to_bytes()).unwrap();
        assert_eq!(member, member_again);
    }
});
