#![no_main]

use libfuzzer_sys::fuzz_target;
use reviewer_patch_apply::apply_patch;

fuzz_target!(|data: &[u8]| {
    // First half is the "original" file, second half is the "patch" to
    // apply against it. Neither is required to be well-formed.
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let mid = text.len() / 2;
    let split = text.char_indices().map(|(i, _)| i).find(|&i| i >= mid).unwrap_or(text.len());
    let (original, patch) = text.split_at(split);

    let _ = apply_patch(original, patch);
});
