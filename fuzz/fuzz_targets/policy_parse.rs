#![no_main]

use libfuzzer_sys::fuzz_target;
use reviewer_policy::load_repo_policy;

fuzz_target!(|data: &[u8]| {
    // `.ai-reviewer.yml` is attacker-influenced (anyone who can open a PR
    // can edit it on their branch). Parsing must always resolve to a
    // usable policy or a typed error, never panic.
    let Ok(raw) = std::str::from_utf8(data) else {
        return;
    };
    let _ = load_repo_policy(Some(raw));
});
