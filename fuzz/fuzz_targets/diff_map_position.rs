#![no_main]

use libfuzzer_sys::fuzz_target;
use reviewer_diff_map::map_position;

fuzz_target!(|data: &[u8]| {
    // Arbitrary byte soup as a "patch": exercises hunk-header parsing
    // against truncated `@@ ... @@` lines, missing counts, and non-UTF8
    // input without ever panicking.
    let Ok(patch) = std::str::from_utf8(data) else {
        return;
    };
    for target in [0u32, 1, 2, 40, 1000, u32::MAX] {
        let _ = map_position(patch, target);
    }
});
