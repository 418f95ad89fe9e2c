#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use wahub::fuzz_api::{validate_and_parse, validate_signature};

#[derive(Arbitrary, Debug)]
struct Input {
    secret: String,
    signature: Option<String>,
    body: Vec<u8>,
}

fuzz_target!(|input: Input| {
    if let Some(sig) = &input.signature {
        let _ = validate_signature(&input.secret, sig, &input.body);
    }
    let _ = validate_and_parse(&input.body, input.signature.as_deref(), &input.secret);
});
