#![no_main]

use libfuzzer_sys::fuzz_target;
use wahub::fuzz_api::parse_config;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data)
        && let Ok(config) = parse_config(text)
    {
        let _ = config.validate();
    }
});
