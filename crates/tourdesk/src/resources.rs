// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Backend resources used by the staff console.
//!
//! Bodies are carried through as opaque JSON; the backend owns their schema.

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::client::ApiClient;
use crate::error::ClientError;
use crate::request::ApiRequest;
use crate::session::{Credentials, Profile};

/// Response from `POST /auth/login`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    #[serde(alias = "accessToken")]
    pub token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub guide_id: Option<i64>,
    #[serde(default)]
    pub customer_id: Option<i64>,
}

impl LoginResponse {
    pub fn credentials(&self) -> Credentials {
        Credentials { access_token: self.token.clone(), refresh_token: self.refresh_token.clone() }
    }

    pub fn profile(&self) -> Profile {
        Profile {
            role: self.role.clone(),
            email: self.email.clone(),
            guide_id: self.guide_id,
            customer_id: self.customer_id,
        }
    }
}

impl ApiClient {
    /// Exchange email/password for a credential pair and store it.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ClientError> {
        let req = ApiRequest::post("/auth/login", json!({ "email": email, "password": password }))
            .anonymous();
        let login: LoginResponse = self.json(req).await?;
        self.session().install(&login.credentials())?;
        self.session().install_profile(&login.profile())?;
        info!(email = %email, role = login.role.as_deref().unwrap_or("-"), "logged in");
        Ok(login)
    }

    /// Forget every stored credential and profile entry.
    pub fn logout(&self) -> Result<(), ClientError> {
        self.session().clear()?;
        info!("logged out");
        Ok(())
    }

    // -- Reservations ---------------------------------------------------------

    pub async fn reservations(&self) -> Result<Value, ClientError> {
        self.json(ApiRequest::get("/reservations")).await
    }

    pub async fn reservation(&self, id: u64) -> Result<Value, ClientError> {
        self.json(ApiRequest::get(format!("/reservations/{id}"))).await
    }

    pub async fn set_reservation_status(&self, id: u64, status: &str) -> Result<Value, ClientError> {
        let req = ApiRequest::put(format!("/reservations/{id}/status"), json!({ "status": status }));
        self.json(req).await
    }

    pub async fn assign_guide(&self, id: u64, guide_id: u64) -> Result<Value, ClientError> {
        let req =
            ApiRequest::put(format!("/reservations/{id}/assign-guide"), json!({ "guideId": guide_id }));
        self.json(req).await
    }

    pub async fn complete_reservation(&self, id: u64) -> Result<Value, ClientError> {
        self.json(ApiRequest::put(format!("/reservations/{id}/complete"), json!({}))).await
    }

    pub async fn delete_reservation(&self, id: u64) -> Result<Value, ClientError> {
        self.json(ApiRequest::delete(format!("/reservations/{id}"))).await
    }

    // -- Guides ---------------------------------------------------------------

    pub async fn guides(&self) -> Result<Value, ClientError> {
        self.json(ApiRequest::get("/guides")).await
    }

    pub async fn guide(&self, id: u64) -> Result<Value, ClientError> {
        self.json(ApiRequest::get(format!("/guides/{id}"))).await
    }

    pub async fn guide_feedback(&self, id: u64) -> Result<Value, ClientError> {
        self.json(ApiRequest::get(format!("/guides/{id}/feedback"))).await
    }

    // -- Admin profile and dashboards -----------------------------------------

    pub async fn admin_profile(&self) -> Result<Value, ClientError> {
        self.json(ApiRequest::get("/admin/profile")).await
    }

    /// Send only the changed fields; the backend merges them.
    pub async fn update_admin_profile(&self, changes: Value) -> Result<Value, ClientError> {
        self.json(ApiRequest::put("/admin/profile", changes)).await
    }

    pub async fn manager_dashboard(&self) -> Result<Value, ClientError> {
        self.json(ApiRequest::get("/manager/dashboard")).await
    }
}

#[cfg(test)]
#[path = "resources_tests.rs"]
mod tests;
