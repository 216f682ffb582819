// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session state shared by every request a client issues.
//!
//! Owns the stored credential pair and the refresh state: an "in flight" flag
//! plus a FIFO queue of requests waiting on that refresh. The first request to
//! hit a 401 leads the refresh; every other 401 while it runs joins the queue
//! and is replayed by the leader once a new token exists.
//!
//! The flag check-and-set, enqueue, and dequeue all happen under one mutex
//! that is never held across an await point.
//!
//! Every finished refresh bumps an epoch. A request remembers the epoch it
//! was sent under, so a 401 that lands after a refresh resolved follows that
//! refresh's outcome instead of starting another one.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::error::{ClientError, RefreshError};
use crate::refresh::TokenGrant;
use crate::request::{ApiRequest, ApiResponse};
use crate::store::{CredentialStore, StoreError};
use crate::token;

/// Why the user has to authenticate again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReauthReason {
    /// The refresh endpoint rejected the refresh token, or none was stored.
    RefreshFailed,
    /// The backend answered 403 for the current credential.
    Forbidden,
}

impl std::fmt::Display for ReauthReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RefreshFailed => f.write_str("session expired"),
            Self::Forbidden => f.write_str("access forbidden"),
        }
    }
}

/// Notified after credentials are evicted. A UI host navigates to its login
/// screen here; a headless host logs or exits.
pub trait ReauthHook: Send + Sync {
    fn reauth_required(&self, reason: ReauthReason);
}

impl<F> ReauthHook for F
where
    F: Fn(ReauthReason) + Send + Sync,
{
    fn reauth_required(&self, reason: ReauthReason) {
        self(reason)
    }
}

/// Store keys for everything the session reads or writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialKeys {
    pub access_token: String,
    pub refresh_token: String,
    pub role: String,
    pub email: String,
    pub guide_id: String,
    pub customer_id: String,
}

impl Default for CredentialKeys {
    fn default() -> Self {
        Self {
            access_token: "token".to_owned(),
            refresh_token: "refreshToken".to_owned(),
            role: "role".to_owned(),
            email: "email".to_owned(),
            guide_id: "guideId".to_owned(),
            customer_id: "customerId".to_owned(),
        }
    }
}

impl CredentialKeys {
    fn all(&self) -> [&str; 6] {
        [
            self.access_token.as_str(),
            self.refresh_token.as_str(),
            self.role.as_str(),
            self.email.as_str(),
            self.guide_id.as_str(),
            self.customer_id.as_str(),
        ]
    }
}

/// Access/refresh token pair as created at login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

/// Who is logged in, as reported by the login endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Profile {
    pub role: Option<String>,
    pub email: Option<String>,
    pub guide_id: Option<i64>,
    pub customer_id: Option<i64>,
}

/// Snapshot for the `status` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    pub logged_in: bool,
    pub has_refresh_token: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
    pub expired: bool,
}

type Reply = oneshot::Sender<Result<ApiResponse, ClientError>>;

/// A request parked behind the in-flight refresh.
#[derive(Debug)]
pub struct Queued {
    pub request: ApiRequest,
    reply: Reply,
}

impl Queued {
    /// Hand the replay result back to the suspended caller.
    pub fn reply(self, result: Result<ApiResponse, ClientError>) {
        if self.reply.send(result).is_err() {
            debug!(request = %self.request.label(), "queued caller went away before reply");
        }
    }
}

/// Outcome of reporting a 401 to the session.
#[derive(Debug)]
pub enum RefreshTicket<'a> {
    /// No refresh was running; the caller now owns it.
    Lead(RefreshLease<'a>),
    /// A refresh is running; await the leader's replay of this request.
    Queued(oneshot::Receiver<Result<ApiResponse, ClientError>>),
    /// The token this request used has already been replaced; replay directly.
    Stale,
    /// A refresh that resolved after this request was sent failed and the
    /// credentials are gone. Carries that refresh's error.
    Failed(RefreshError),
}

/// Credential state captured when a request is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentWith {
    pub token: Option<String>,
    epoch: u64,
}

#[derive(Debug, Default)]
struct RefreshState {
    in_flight: bool,
    queue: VecDeque<Queued>,
    epoch: u64,
    last_failure: Option<RefreshError>,
}

/// Credential pair, refresh coordination, and re-auth notification.
pub struct SessionManager {
    store: Arc<dyn CredentialStore>,
    hook: Arc<dyn ReauthHook>,
    keys: CredentialKeys,
    state: Mutex<RefreshState>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SessionManager")
            .field("keys", &self.keys)
            .field("in_flight", &state.in_flight)
            .field("queued", &state.queue.len())
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    pub fn new(store: Arc<dyn CredentialStore>, hook: Arc<dyn ReauthHook>) -> Arc<Self> {
        Self::with_keys(store, hook, CredentialKeys::default())
    }

    pub fn with_keys(
        store: Arc<dyn CredentialStore>,
        hook: Arc<dyn ReauthHook>,
        keys: CredentialKeys,
    ) -> Arc<Self> {
        Arc::new(Self { store, hook, keys, state: Mutex::new(RefreshState::default()) })
    }

    pub fn access_token(&self) -> Option<String> {
        self.store.get(&self.keys.access_token)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.store.get(&self.keys.refresh_token)
    }

    /// Store a freshly issued credential pair (login).
    ///
    /// A missing refresh token removes any left over from an earlier login.
    pub fn install(&self, creds: &Credentials) -> Result<(), StoreError> {
        self.store.set(&self.keys.access_token, &creds.access_token)?;
        match creds.refresh_token {
            Some(ref refresh) => self.store.set(&self.keys.refresh_token, refresh),
            None => self.store.delete(&self.keys.refresh_token),
        }
    }

    pub fn install_profile(&self, profile: &Profile) -> Result<(), StoreError> {
        let entries = [
            (&self.keys.role, profile.role.clone()),
            (&self.keys.email, profile.email.clone()),
            (&self.keys.guide_id, profile.guide_id.map(|id| id.to_string())),
            (&self.keys.customer_id, profile.customer_id.map(|id| id.to_string())),
        ];
        for (key, value) in entries {
            match value {
                Some(v) => self.store.set(key, &v)?,
                None => self.store.delete(key)?,
            }
        }
        Ok(())
    }

    /// Snapshot the credential state for an outgoing request.
    pub fn sent_with(&self) -> SentWith {
        // Epoch first: a token read after it is never older than the epoch.
        let epoch = self.state.lock().epoch;
        SentWith { token: self.access_token(), epoch }
    }

    /// Persist the result of a successful refresh.
    ///
    /// Store failures are logged; the new token is still served from memory.
    pub fn store_refreshed(&self, grant: &TokenGrant) {
        if let Err(e) = self.store.set(&self.keys.access_token, &grant.access_token) {
            warn!(err = %e, "failed to persist refreshed access token");
        }
        if let Some(ref rotated) = grant.refresh_token {
            if let Err(e) = self.store.set(&self.keys.refresh_token, rotated) {
                warn!(err = %e, "failed to persist rotated refresh token");
            }
        }
    }

    /// Forget everything stored for this session (logout).
    pub fn clear(&self) -> Result<(), StoreError> {
        for key in self.keys.all() {
            self.store.delete(key)?;
        }
        Ok(())
    }

    /// Erase both tokens and tell the host the user must log in again.
    pub fn evict(&self, reason: ReauthReason) {
        for key in [&self.keys.access_token, &self.keys.refresh_token] {
            if let Err(e) = self.store.delete(key) {
                warn!(key = %key, err = %e, "failed to erase credential");
            }
        }
        info!(%reason, "credentials evicted");
        self.hook.reauth_required(reason);
    }

    /// Report a 401 for `request`, which was sent with `sent`.
    ///
    /// Exactly one caller gets [`RefreshTicket::Lead`] until that lease is
    /// finished or dropped.
    pub fn begin_refresh(&self, request: &ApiRequest, sent: &SentWith) -> RefreshTicket<'_> {
        let mut state = self.state.lock();
        if state.in_flight {
            let (reply, rx) = oneshot::channel();
            state.queue.push_back(Queued { request: request.clone(), reply });
            debug!(request = %request.label(), queued = state.queue.len(), "joined in-flight refresh");
            return RefreshTicket::Queued(rx);
        }

        let current = self.access_token();
        let replaced = current.is_some() && current != sent.token;
        if replaced || state.epoch != sent.epoch {
            return match current {
                Some(_) => {
                    debug!(request = %request.label(), "token already replaced, replaying");
                    RefreshTicket::Stale
                }
                None => {
                    debug!(request = %request.label(), "credentials already evicted");
                    let failure = state.last_failure.clone();
                    RefreshTicket::Failed(failure.unwrap_or_else(RefreshError::missing_refresh_token))
                }
            };
        }

        state.in_flight = true;
        debug!(request = %request.label(), "leading credential refresh");
        RefreshTicket::Lead(RefreshLease { session: self, done: false })
    }

    pub fn refresh_in_flight(&self) -> bool {
        self.state.lock().in_flight
    }

    /// Number of requests waiting on the in-flight refresh.
    pub fn pending_len(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub fn status(&self) -> SessionStatus {
        self.status_at(token::epoch_secs())
    }

    pub fn status_at(&self, now: u64) -> SessionStatus {
        let access = self.access_token();
        let expires_at = access.as_deref().and_then(token::expires_at);
        SessionStatus {
            logged_in: access.is_some(),
            has_refresh_token: self.refresh_token().is_some(),
            role: self.store.get(&self.keys.role),
            email: self.store.get(&self.keys.email),
            expires_at,
            expired: expires_at.is_some_and(|exp| exp <= now),
        }
    }
}

/// Ownership of the in-flight refresh.
///
/// Dropping an unfinished lease clears the flag and releases every queued
/// caller with [`ClientError::RefreshAbandoned`].
#[derive(Debug)]
pub struct RefreshLease<'a> {
    session: &'a SessionManager,
    done: bool,
}

impl RefreshLease<'_> {
    /// Persist a successful refresh and close the epoch it resolves.
    pub fn store(&mut self, grant: &TokenGrant) {
        self.session.store_refreshed(grant);
        let mut state = self.session.state.lock();
        state.epoch += 1;
        state.last_failure = None;
    }

    /// Pop the oldest queued request, or clear the flag if none remain.
    pub fn next_queued(&mut self) -> Option<Queued> {
        let mut state = self.session.state.lock();
        let next = state.queue.pop_front();
        if next.is_none() {
            state.in_flight = false;
            self.done = true;
        }
        next
    }

    /// Evict the credentials, record `error` for late 401s, clear the flag,
    /// and hand back every queued request for failure delivery.
    ///
    /// Eviction runs while the flag is still held, so no new leader can start
    /// from the credentials being discarded.
    pub fn fail(mut self, error: &RefreshError) -> Vec<Queued> {
        self.session.evict(ReauthReason::RefreshFailed);
        self.done = true;
        let mut state = self.session.state.lock();
        state.epoch += 1;
        state.last_failure = Some(error.clone());
        state.in_flight = false;
        state.queue.drain(..).collect()
    }
}

impl Drop for RefreshLease<'_> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        let dropped = {
            let mut state = self.session.state.lock();
            state.in_flight = false;
            std::mem::take(&mut state.queue)
        };
        if !dropped.is_empty() {
            warn!(queued = dropped.len(), "refresh cancelled, releasing queued requests");
        }
        for queued in dropped {
            queued.reply(Err(ClientError::RefreshAbandoned));
        }
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
