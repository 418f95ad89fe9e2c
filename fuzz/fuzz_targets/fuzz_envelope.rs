#![no_main]

use libfuzzer_sys::fuzz_target;
use wahub::fuzz_api::{envelope_phone_id, parse_envelope};

fuzz_target!(|data: &[u8]| {
    let _ = envelope_phone_id(data);
    if let Ok(messages) = parse_envelope(data) {
        for m in &messages {
            let _ = m.transcript_text();
        }
    }
});
