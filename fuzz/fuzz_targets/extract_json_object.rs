#![no_main]

use libfuzzer_sys::fuzz_target;
use reviewer_types::extract_json_object;
use serde_json::Value;

fuzz_target!(|data: &[u8]| {
    // This is the first thing touched by an untrusted LLM response: prose
    // wrapping, stray braces, and truncated JSON must never panic, only
    // ever resolve to `Ok` or a `SchemaError`.
    let Ok(raw) = std::str::from_utf8(data) else {
        return;
    };
    let _: Result<Value, _> = extract_json_object(raw);
});
