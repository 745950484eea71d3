// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `Verification-Signature` checks for platform requests.
//!
//! The header is `v0=` followed by the hex HMAC-SHA256 of `"v0:" || body`
//! keyed with the workspace signing secret.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "Verification-Signature";
const VERSION_PREFIX: &str = "v0=";

fn digest(secret: &str, body: &[u8]) -> Option<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(b"v0:");
    mac.update(body);
    Some(mac.finalize().into_bytes().to_vec())
}

/// Header value for `body`, as the platform computes it.
pub fn sign(secret: &str, body: &[u8]) -> String {
    let hex = digest(secret, body).map(hex::encode).unwrap_or_default();
    format!("{VERSION_PREFIX}{hex}")
}

/// Constant-time check of a received header value.
pub fn verify(secret: &str, body: &[u8], header: &str) -> bool {
    let Some(received) = header.strip_prefix(VERSION_PREFIX) else {
        return false;
    };
    let Ok(received) = hex::decode(received) else {
        return false;
    };
    let Some(expected) = digest(secret, body) else {
        return false;
    };
    expected.ct_eq(&received).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_body_verifies() {
        let body = br#"{"text":"help"}"#;
        let header = sign("secret", body);
        assert!(header.starts_with("v0="));
        assert!(verify("secret", body, &header));
    }

    #[test]
    fn tampered_body_is_rejected() {
        let header = sign("secret", b"help");
        assert!(!verify("secret", b"reset", &header));
        assert!(!verify("other", b"help", &header));
    }

    #[test]
    fn malformed_header_is_rejected() {
        assert!(!verify("secret", b"help", "deadbeef"));
        assert!(!verify("secret", b"help", "v0=not-hex"));
        assert!(!verify("secret", b"help", "v0="));
    }
}
