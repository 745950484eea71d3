// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Slack request signing.
//!
//! `X-Slack-Signature` is `v0=` followed by the hex HMAC-SHA256 of
//! `"v0:{timestamp}:{body}"` keyed with the app signing secret.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "X-Slack-Signature";
pub const TIMESTAMP_HEADER: &str = "X-Slack-Request-Timestamp";

/// Requests older than this are replays.
pub const MAX_REQUEST_AGE_SECS: u64 = 5 * 60;

fn digest(secret: &str, timestamp: &str, body: &[u8]) -> Option<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(b"v0:");
    mac.update(timestamp.as_bytes());
    mac.update(b":");
    mac.update(body);
    Some(mac.finalize().into_bytes().to_vec())
}

pub fn sign(secret: &str, timestamp: &str, body: &[u8]) -> String {
    let hex = digest(secret, timestamp, body)
        .map(hex::encode)
        .unwrap_or_default();
    format!("v0={hex}")
}

/// Checks the signature and the request age against `now` (unix seconds).
pub fn verify(secret: &str, timestamp: &str, body: &[u8], signature: &str, now: i64) -> bool {
    let Ok(sent_at) = timestamp.parse::<i64>() else {
        return false;
    };
    if now.abs_diff(sent_at) > MAX_REQUEST_AGE_SECS {
        return false;
    }
    let Some(received) = signature
        .strip_prefix("v0=")
        .and_then(|hex_sig| hex::decode(hex_sig).ok())
    else {
        return false;
    };
    let Some(expected) = digest(secret, timestamp, body) else {
        return false;
    };
    expected.ct_eq(&received).into()
}
