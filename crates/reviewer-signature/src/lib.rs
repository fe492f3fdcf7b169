//! Webhook signature verification and replay-window enforcement.
//!
//! Both functions here are pure: they take their inputs by value/reference
//! and return a bool, with no I/O and no notion of "policy" (a malformed
//! header is simply a failed verification, not an error). The caller
//! decides what to do with a `false` — at the receiver that's a `401`.
//!
//! # Example
//!
//! ```
//! use reviewer_signature::{sign, verify};
//!
//! let secret = b"topsecret";
//! let body = b"payload bytes";
//! let header = sign(secret, body);
//! assert!(verify(body, &header, secret));
//! ```

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_PREFIX: &str = "sha256=";

/// Verify that `header` is a valid `sha256=<hex>` HMAC-SHA256 signature of
/// `body` under `secret`. Returns `false` for any malformed header
/// (missing prefix, non-hex remainder, wrong length) rather than erroring.
///
/// The comparison is constant-time: [`Mac::verify_slice`] uses a
/// constant-time equality check internally, so timing does not leak how
/// many leading bytes of the signature matched.
pub fn verify(body: &[u8], header: &str, secret: &[u8]) -> bool {
    let Some(hex_digest) = header.strip_prefix(SIGNATURE_PREFIX) else {
        return false;
    };
    let Ok(expected_bytes) = hex::decode(hex_digest) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected_bytes).is_ok()
}

/// Compute the `sha256=<hex>` header value for `body` under `secret`.
/// Used by tests and by any component that needs to re-sign an outbound
/// fan-out payload.
pub fn sign(secret: &[u8], body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts keys of any length");
    mac.update(body);
    format!("{SIGNATURE_PREFIX}{}", hex::encode(mac.finalize().into_bytes()))
}

/// `true` if `age_seconds` is within the replay window. A `max_age` of
/// `0` disables the check entirely (always `true`), matching
/// `MAX_WEBHOOK_AGE_SECONDS=0`.
pub fn within_replay_window(age_seconds: i64, max_age_seconds: i64) -> bool {
    if max_age_seconds == 0 {
        return true;
    }
    age_seconds >= 0 && age_seconds <= max_age_seconds
}
