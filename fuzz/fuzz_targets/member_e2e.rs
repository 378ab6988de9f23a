#![no_main]

use shared_collections::Member;

use libfuzzer_sys::fuzz_target;

fuzz_target!(|member: Member| {
    let bytes = member.to_bytes();
    let member_again = Member::from_bytes(&bytes).unwrap();
    assert_eq!(member, member_again);
});
