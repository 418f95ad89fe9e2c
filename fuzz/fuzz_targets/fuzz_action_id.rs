#![no_main]

use libfuzzer_sys::fuzz_target;
use wahub::fuzz_api::parse_pos_action;

fuzz_target!(|data: &str| {
    let _ = parse_pos_action(data);
});
