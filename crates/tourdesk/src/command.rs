// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command dispatch for the `tourdesk` binary.

use std::sync::Arc;

use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use crate::client::ApiClient;
use crate::config::{
    parse_assignments, Command, Config, GuideCommand, ProfileCommand, ReservationCommand,
};
use crate::request::ApiRequest;
use crate::session::{ReauthReason, SessionManager};
use crate::store::{default_credentials_path, FileStore};

/// Initialize tracing from config. Logs go to stderr; stdout carries results.
pub fn init_tracing(config: &Config) {
    use tracing_subscriber::fmt;

    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));

    let result = match config.log_format.as_str() {
        "json" => fmt::fmt().with_env_filter(filter).with_writer(std::io::stderr).json().try_init(),
        _ => fmt::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init(),
    };
    drop(result);
}

/// Build a client backed by the on-disk credential file.
pub fn build_client(config: &Config) -> anyhow::Result<ApiClient> {
    let path = config.credentials.clone().unwrap_or_else(default_credentials_path);
    let store = FileStore::open(path)?;
    debug!(path = %store.path().display(), "opened credential store");
    let session = SessionManager::new(
        Arc::new(store),
        Arc::new(|reason: ReauthReason| {
            warn!(%reason, "credentials cleared, run `tourdesk login` to sign in again");
        }),
    );
    let client = ApiClient::new(config.client_config(), session);
    debug!(base_url = %client.base_url(), "client ready");
    Ok(client)
}

/// Run the parsed command, printing its result to stdout.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let client = build_client(&config)?;
    let output = execute(&client, config.command).await?;
    if let Some(value) = output {
        print_json(&value)?;
    }
    Ok(())
}

/// Execute one command. `None` means nothing to print.
pub async fn execute(client: &ApiClient, command: Command) -> anyhow::Result<Option<Value>> {
    let value = match command {
        Command::Login { email, password } => {
            client.login(&email, &password).await?;
            serde_json::to_value(client.session().status())?
        }
        Command::Logout => {
            client.logout()?;
            return Ok(None);
        }
        Command::Status => serde_json::to_value(client.session().status())?,
        Command::Reservations(cmd) => reservations(client, cmd).await?,
        Command::Guides(cmd) => match cmd {
            GuideCommand::List => client.guides().await?,
            GuideCommand::Show { id } => client.guide(id).await?,
            GuideCommand::Feedback { id } => client.guide_feedback(id).await?,
        },
        Command::Profile(cmd) => match cmd {
            ProfileCommand::Show => client.admin_profile().await?,
            ProfileCommand::Update { set } => {
                let changes = parse_assignments(&set)?;
                client.update_admin_profile(Value::Object(changes)).await?
            }
        },
        Command::Dashboard => client.manager_dashboard().await?,
        Command::Request { method, path, data } => {
            let req = raw_request(&method, path, data.as_deref())?;
            client.json(req).await?
        }
    };
    Ok(Some(value))
}

async fn reservations(client: &ApiClient, cmd: ReservationCommand) -> anyhow::Result<Value> {
    let value = match cmd {
        ReservationCommand::List => client.reservations().await?,
        ReservationCommand::Show { id } => client.reservation(id).await?,
        ReservationCommand::SetStatus { id, status } => {
            client.set_reservation_status(id, &status.to_uppercase()).await?
        }
        ReservationCommand::Assign { id, guide } => client.assign_guide(id, guide).await?,
        ReservationCommand::Complete { id } => client.complete_reservation(id).await?,
        ReservationCommand::Delete { id } => client.delete_reservation(id).await?,
    };
    Ok(value)
}

/// Build an authenticated request from CLI strings.
pub fn raw_request(method: &str, path: String, data: Option<&str>) -> anyhow::Result<ApiRequest> {
    let method = Method::from_bytes(method.to_uppercase().as_bytes())
        .map_err(|_| anyhow::anyhow!("invalid HTTP method: {method}"))?;
    let mut req = ApiRequest::new(method, path);
    if let Some(data) = data {
        let body: Value = serde_json::from_str(data)
            .map_err(|e| anyhow::anyhow!("--data is not valid JSON: {e}"))?;
        req = req.json(body);
    }
    Ok(req)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    println!("{text}");
    Ok(())
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
