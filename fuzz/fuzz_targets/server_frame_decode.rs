//! Fuzz target for frame decoding
//!
//! Arbitrary text is decoded as both a server frame and a command frame.
//! Decoding should never panic, and anything that decodes must survive a
//! re-encode and decode unchanged.

#![no_main]

use hangouts_proto::{CommandFrame, ServerFrame};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(frame) = ServerFrame::decode(text) {
        let encoded = frame.encode().expect("decoded frame re-encodes");
        assert_eq!(ServerFrame::decode(&encoded).ok(), Some(frame));
    }

    if let Ok(frame) = CommandFrame::decode(text) {
        let encoded = frame.encode().expect("decoded frame re-encodes");
        assert_eq!(CommandFrame::decode(&encoded).ok(), Some(frame));
    }
});
