// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Owned request and response values carried through the client.
//!
//! An [`ApiRequest`] holds everything needed to reissue a call verbatim, which
//! is what lets a request sit in the refresh queue and be replayed later.

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ClientError;

/// A single logical call against the backend, relative to the base URL.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    pub headers: HeaderMap,
    /// Whether to attach the bearer token and take part in refresh handling.
    pub authenticated: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            headers: HeaderMap::new(),
            authenticated: true,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, path).json(body)
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::PUT, path).json(body)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Send without credentials and outside the refresh flow (login, health).
    pub fn anonymous(mut self) -> Self {
        self.authenticated = false;
        self
    }

    /// Headers to transmit: the caller's headers plus the bearer token.
    ///
    /// Always derives a fresh map so the token read at call time is the one
    /// sent, and the caller's request is left untouched.
    pub fn outbound_headers(&self, access_token: Option<&str>) -> HeaderMap {
        let mut headers = self.headers.clone();
        if let Some(token) = access_token.filter(|_| self.authenticated) {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {token}")) {
                headers.insert(reqwest::header::AUTHORIZATION, value);
            }
        }
        headers
    }

    /// Short label for logs, e.g. `GET /reservations`.
    pub fn label(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

/// A fully-buffered backend response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ApiResponse {
    /// Deserialize the body. An empty body (e.g. 204) reads as JSON `null`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ClientError> {
        if self.body.is_empty() {
            return Ok(serde_json::from_value(Value::Null)?);
        }
        Ok(serde_json::from_slice(&self.body)?)
    }
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
