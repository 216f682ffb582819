// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unverified access-token inspection.
//!
//! The backend signs its tokens; the client only peeks at the payload to show
//! who is logged in and when the token lapses. Verification stays server-side.

use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;

/// Claims the console cares about. Everything else in the payload is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    /// Expiry as epoch seconds.
    #[serde(default)]
    pub exp: Option<u64>,
}

/// Decode the payload segment of a JWT. Returns `None` for opaque tokens.
pub fn claims(token: &str) -> Option<Claims> {
    let mut parts = token.split('.');
    let (_header, payload, _sig) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    serde_json::from_slice(&bytes).ok()
}

pub fn expires_at(token: &str) -> Option<u64> {
    claims(token)?.exp
}

/// Whether the token's embedded expiry is at or before `now` (epoch seconds).
///
/// Tokens without a decodable expiry are never considered expired.
pub fn is_expired(token: &str, now: u64) -> bool {
    expires_at(token).is_some_and(|exp| exp <= now)
}

pub fn epoch_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

#[cfg(test)]
#[path = "token_tests.rs"]
mod tests;
