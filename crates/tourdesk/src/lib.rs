// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tourdesk: staff console client for the tour booking REST backend.
//!
//! The core is [`client::ApiClient`], which attaches bearer credentials to
//! every call and funnels concurrent 401s through a single refresh owned by
//! [`session::SessionManager`].

pub mod client;
pub mod command;
pub mod config;
pub mod error;
pub mod refresh;
pub mod request;
pub mod resources;
pub mod session;
pub mod store;
pub mod token;

pub use client::{ApiClient, ClientConfig};
pub use error::ClientError;
pub use request::{ApiRequest, ApiResponse};
pub use session::{ReauthHook, ReauthReason, SessionManager};
pub use store::{CredentialStore, FileStore, MemoryStore};
