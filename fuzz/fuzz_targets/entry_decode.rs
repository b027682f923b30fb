#![no_main]
use libfuzzer_sys::fuzz_target;

use eezo_serde::Encode;
use eezo_sidechain::{ChainParams, SidechainEntry};

fuzz_target!(|data: &[u8]| {
    let chain = ChainParams::default();
    // Stored entries come from disk; anything accepted must re-encode stably.
    if let Ok(entry) = SidechainEntry::from_persisted(data, &chain) {
        let enc = entry.encode();
        let again = SidechainEntry::from_persisted(&enc, &chain).expect("re-encoded entry must decode");
        assert_eq!(entry, again, "entry roundtrip mismatch");
        let _ = entry.state();
    }
});
