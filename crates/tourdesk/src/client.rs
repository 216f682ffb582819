// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Authenticated HTTP client for the booking backend.
//!
//! Every call carries the access token stored at send time. A 401 hands the
//! request to the [`SessionManager`]: the first one leads a single refresh,
//! the rest queue behind it, and the leader replays each once the new token
//! is stored. A replay that fails again is surfaced, never retried.

use std::sync::{Arc, Once};
use std::time::Duration;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::error::{error_message, ClientError, RefreshError};
use crate::refresh;
use crate::request::{ApiRequest, ApiResponse};
use crate::session::{ReauthReason, RefreshTicket, SentWith, SessionManager};

/// Default backend location, matching the booking API's dev deployment.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api";

static CRYPTO: Once = Once::new();

/// Install the rustls ring provider (needed by reqwest even for plain HTTP).
pub fn ensure_crypto_provider() {
    CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Connection settings for [`ApiClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API root; request paths are appended verbatim.
    pub base_url: String,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), timeout: Duration::from_secs(30) }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

/// HTTP client with transparent bearer attachment and deduplicated refresh.
#[derive(Debug)]
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
    session: Arc<SessionManager>,
}

impl ApiClient {
    pub fn new(config: ClientConfig, session: Arc<SessionManager>) -> Self {
        ensure_crypto_provider();
        let http = reqwest::Client::builder().timeout(config.timeout).build().unwrap_or_default();
        Self { base_url: config.base_url.trim_end_matches('/').to_owned(), http, session }
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Issue `req`, recovering once from an expired access token.
    pub async fn request(&self, req: ApiRequest) -> Result<ApiResponse, ClientError> {
        if !req.authenticated {
            let resp = self.send(&req, None).await?;
            return self.finish(&req, resp);
        }
        let sent = self.session.sent_with();
        let resp = self.send(&req, sent.token.as_deref()).await?;
        if resp.status == StatusCode::UNAUTHORIZED {
            debug!(request = %req.label(), "unauthorized, attempting recovery");
            return self.recover(req, sent).await;
        }
        self.finish(&req, resp)
    }

    /// Issue `req` and deserialize the response body.
    pub async fn json<T: DeserializeOwned>(&self, req: ApiRequest) -> Result<T, ClientError> {
        self.request(req).await?.json()
    }

    async fn recover(&self, req: ApiRequest, sent: SentWith) -> Result<ApiResponse, ClientError> {
        let mut lease = match self.session.begin_refresh(&req, &sent) {
            RefreshTicket::Stale => return self.replay(&req).await,
            RefreshTicket::Failed(e) => return Err(ClientError::RefreshFailed(e)),
            RefreshTicket::Queued(rx) => {
                return rx.await.unwrap_or(Err(ClientError::RefreshAbandoned));
            }
            RefreshTicket::Lead(lease) => lease,
        };

        let grant = match self.session.refresh_token() {
            Some(refresh_token) => {
                refresh::do_refresh(&self.http, &self.base_url, &refresh_token).await
            }
            None => Err(RefreshError::missing_refresh_token()),
        };

        match grant {
            Ok(grant) => {
                lease.store(&grant);
                info!("access token refreshed");
                let own = self.replay(&req).await;
                while let Some(queued) = lease.next_queued() {
                    let result = self.replay(&queued.request).await;
                    queued.reply(result);
                }
                own
            }
            Err(e) => {
                warn!(err = %e, "credential refresh failed");
                for queued in lease.fail(&e) {
                    queued.reply(Err(ClientError::RefreshFailed(e.clone())));
                }
                Err(ClientError::RefreshFailed(e))
            }
        }
    }

    /// Reissue after a refresh. A second 401 is terminal.
    async fn replay(&self, req: &ApiRequest) -> Result<ApiResponse, ClientError> {
        let token = self.session.access_token();
        let resp = self.send(req, token.as_deref()).await?;
        if resp.status == StatusCode::UNAUTHORIZED {
            warn!(request = %req.label(), "still unauthorized after refresh");
        }
        self.finish(req, resp)
    }

    /// Map a non-recoverable response to the caller's result.
    fn finish(&self, req: &ApiRequest, resp: ApiResponse) -> Result<ApiResponse, ClientError> {
        let status = resp.status;
        if status.is_success() {
            return Ok(resp);
        }
        let message = error_message(status.as_u16(), &resp.body);
        match status {
            StatusCode::UNAUTHORIZED => Err(ClientError::Unauthorized { message }),
            StatusCode::FORBIDDEN => {
                if req.authenticated {
                    warn!(request = %req.label(), "forbidden, evicting credentials");
                    self.session.evict(ReauthReason::Forbidden);
                }
                Err(ClientError::Forbidden { message })
            }
            _ => Err(ClientError::Status { status: status.as_u16(), message }),
        }
    }

    async fn send(
        &self,
        req: &ApiRequest,
        token: Option<&str>,
    ) -> Result<ApiResponse, ClientError> {
        let url = self.url(req)?;
        let mut builder =
            self.http.request(req.method.clone(), url).headers(req.outbound_headers(token));
        if let Some(ref body) = req.body {
            builder = builder.json(body);
        }
        let resp = builder.send().await?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp.bytes().await?;
        debug!(request = %req.label(), status = status.as_u16(), bytes = body.len(), "response");
        Ok(ApiResponse { status, headers, body })
    }

    fn url(&self, req: &ApiRequest) -> Result<reqwest::Url, ClientError> {
        let raw = if req.path.starts_with('/') {
            format!("{}{}", self.base_url, req.path)
        } else {
            format!("{}/{}", self.base_url, req.path)
        };
        let mut url = reqwest::Url::parse(&raw)
            .map_err(|e| ClientError::InvalidUrl { url: raw.clone(), reason: e.to_string() })?;
        if !req.query.is_empty() {
            url.query_pairs_mut().extend_pairs(req.query.iter());
        }
        Ok(url)
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
