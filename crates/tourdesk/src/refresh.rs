// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Access-token refresh against `POST {base}/auth/refresh`.

use serde::{Deserialize, Serialize};

use crate::error::{error_message, RefreshError};

/// Path of the refresh endpoint relative to the API base URL.
pub const REFRESH_PATH: &str = "/auth/refresh";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// Successful refresh response. Unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenGrant {
    pub access_token: String,
    /// Present when the backend rotates refresh tokens.
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Perform a single refresh exchange. No retries: a refresh token may be
/// single-use server-side.
pub async fn do_refresh(
    client: &reqwest::Client,
    base_url: &str,
    refresh_token: &str,
) -> Result<TokenGrant, RefreshError> {
    let url = format!("{base_url}{REFRESH_PATH}");
    let resp = client
        .post(&url)
        .json(&RefreshRequest { refresh_token })
        .send()
        .await
        .map_err(|e| RefreshError::new(None, e.to_string()))?;

    let status = resp.status();
    let body = resp.bytes().await.map_err(|e| RefreshError::new(Some(status.as_u16()), e.to_string()))?;
    if !status.is_success() {
        return Err(RefreshError::new(Some(status.as_u16()), error_message(status.as_u16(), &body)));
    }

    serde_json::from_slice::<TokenGrant>(&body)
        .map_err(|e| RefreshError::new(Some(status.as_u16()), format!("invalid refresh response: {e}")))
}
