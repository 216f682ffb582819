// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde_json::Value;

use crate::store::StoreError;

/// Why a credential refresh did not produce a new access token.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("refresh failed{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
pub struct RefreshError {
    /// HTTP status from the refresh endpoint, if it answered at all.
    pub status: Option<u16>,
    pub message: String,
}

impl RefreshError {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }

    pub fn missing_refresh_token() -> Self {
        Self::new(None, "no refresh token stored")
    }
}

/// Errors surfaced to callers of [`crate::ApiClient`].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// 401 on a request that was already replayed after a refresh.
    #[error("unauthorized: {message}")]
    Unauthorized { message: String },

    /// 403: the credential is valid but not allowed; it has been evicted.
    #[error("forbidden: {message}")]
    Forbidden { message: String },

    #[error("{0}")]
    RefreshFailed(RefreshError),

    /// The task driving the refresh went away before replaying this request.
    #[error("refresh abandoned before this request was replayed")]
    RefreshAbandoned,

    #[error("http {status}: {message}")]
    Status { status: u16, message: String },

    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ClientError {
    /// HTTP status associated with this error, where the server produced one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            Self::Unauthorized { .. } => Some(401),
            Self::Forbidden { .. } => Some(403),
            Self::RefreshFailed(e) => e.status,
            Self::Status { status, .. } => Some(*status),
            Self::InvalidUrl { .. }
            | Self::RefreshAbandoned
            | Self::Decode(_)
            | Self::Store(_) => None,
        }
    }

    /// Whether the caller has to log in again before retrying.
    pub fn requires_login(&self) -> bool {
        matches!(self, Self::Forbidden { .. } | Self::RefreshFailed(_))
    }
}

/// Pull a human-readable message out of an error response body.
///
/// Prefers a JSON `message` or `error` string, then the raw text, then the
/// canonical reason phrase for `status`.
pub fn error_message(status: u16, body: &[u8]) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_slice::<Value>(body) {
        for key in ["message", "error"] {
            if let Some(Value::String(s)) = map.get(key) {
                if !s.is_empty() {
                    return s.clone();
                }
            }
        }
    }
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if !text.is_empty() {
        return text.to_owned();
    }
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("unknown status")
        .to_owned()
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
