//! Unverified claim inspection for opaque bearer tokens
//!
//! This layer holds no verification keys, so decoding is purely structural:
//! the payload segment is base64url-decoded and parsed as JSON. Anything
//! unreadable is treated as maximally expired, never as "unknown".

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};

/// Decode the payload segment of a bearer token without verifying the
/// signature. Returns `None` on any malformation.
pub fn decode(token: &str) -> Option<Value> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// The `iat` (issued-at) claim in epoch seconds, if present and numeric.
pub fn issued_at(token: &str) -> Option<u64> {
    decode(token)?.get("iat")?.as_u64()
}

/// Whether the token's age measured from `iat` exceeds `hours` at `now`.
///
/// A token whose issued-at cannot be read counts as too old.
pub fn age_exceeds_at(token: &str, hours: u64, now: u64) -> bool {
    match issued_at(token) {
        Some(iat) => now.saturating_sub(iat) > hours * 3600,
        None => true,
    }
}

/// [`age_exceeds_at`] against the wall clock.
pub fn age_exceeds(token: &str, hours: u64) -> bool {
    age_exceeds_at(token, hours, epoch_now())
}

/// Current wall-clock time in epoch seconds.
pub(crate) fn epoch_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
