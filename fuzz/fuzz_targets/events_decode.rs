#![no_main]
use libfuzzer_sys::fuzz_target;

use eezo_serde::{decode_exact, Encode};
use eezo_sidechain::SidechainEvents;

fuzz_target!(|data: &[u8]| {
    if let Ok(ev) = decode_exact::<SidechainEvents>(data) {
        let enc = ev.encode();
        let again: SidechainEvents = decode_exact(&enc).expect("re-encoded events must decode");
        assert_eq!(ev, again, "events roundtrip mismatch");
    }
});
