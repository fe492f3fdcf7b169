#![no_main]

use libfuzzer_sys::fuzz_target;
use reviewer_signature::verify;

fuzz_target!(|data: &[u8]| {
    // Split the corpus into a secret, a header, and a body so the fuzzer
    // can explore mismatched-length digests and malformed `sha256=` prefixes
    // without ever crashing the constant-time compare.
    if data.len() < 2 {
        return;
    }
    let split = data[0] as usize % data.len();
    let (secret, rest) = data[1..].split_at(split.min(data[1..].len()));
    let header_len = rest.len() / 2;
    let (header_bytes, body) = rest.split_at(header_len);
    let header = String::from_utf8_lossy(header_bytes);

    let _ = verify(body, &header, secret);
});
