// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::client::{ClientConfig, DEFAULT_BASE_URL};

/// Staff console for the tour booking backend.
#[derive(Debug, Parser)]
#[command(name = "tourdesk", version, about)]
pub struct Config {
    /// Base URL of the booking API.
    #[arg(long, global = true, env = "TOURDESK_API_URL", default_value = DEFAULT_BASE_URL)]
    pub api_url: String,

    /// Credential file (defaults to the state directory).
    #[arg(long, global = true, env = "TOURDESK_CREDENTIALS")]
    pub credentials: Option<PathBuf>,

    /// Per-request timeout in milliseconds.
    #[arg(long, global = true, env = "TOURDESK_TIMEOUT_MS", default_value_t = 30_000)]
    pub timeout_ms: u64,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, env = "TOURDESK_LOG_LEVEL", default_value = "warn")]
    pub log_level: String,

    /// Log format (json or text).
    #[arg(long, global = true, env = "TOURDESK_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, clap::Subcommand)]
pub enum Command {
    /// Log in and store the issued credentials.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "TOURDESK_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget stored credentials.
    Logout,
    /// Show who is logged in and when the access token expires.
    Status,
    /// Reservation management.
    #[command(subcommand)]
    Reservations(ReservationCommand),
    /// Tour guide directory.
    #[command(subcommand)]
    Guides(GuideCommand),
    /// Admin profile.
    #[command(subcommand)]
    Profile(ProfileCommand),
    /// Manager dashboard summary.
    Dashboard,
    /// Send an arbitrary authenticated request.
    Request {
        /// HTTP method (GET, POST, PUT, PATCH, DELETE).
        method: String,
        /// Path relative to the API base URL.
        path: String,
        /// JSON request body.
        #[arg(long)]
        data: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, clap::Subcommand)]
pub enum ReservationCommand {
    List,
    Show { id: u64 },
    SetStatus { id: u64, status: String },
    Assign {
        id: u64,
        #[arg(long)]
        guide: u64,
    },
    Complete { id: u64 },
    Delete { id: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, clap::Subcommand)]
pub enum GuideCommand {
    List,
    Show { id: u64 },
    Feedback { id: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, clap::Subcommand)]
pub enum ProfileCommand {
    Show,
    /// Update fields, e.g. `--set firstName=Ana --set phone=555`.
    Update {
        #[arg(long = "set", value_name = "KEY=VALUE", required = true)]
        set: Vec<String>,
    },
}

impl Config {
    /// Validate the configuration after parsing.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_url.trim().is_empty() {
            anyhow::bail!("--api-url must not be empty");
        }
        match self.log_format.as_str() {
            "json" | "text" => {}
            other => anyhow::bail!("invalid log format: {other} (expected json or text)"),
        }
        if self.timeout_ms == 0 {
            anyhow::bail!("--timeout-ms must be greater than zero");
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(self.api_url.clone()).with_timeout(self.timeout())
    }
}

/// Parse `key=value` pairs into a JSON object.
///
/// Values that parse as JSON (numbers, booleans, quoted strings) keep their
/// type; anything else is sent as a string.
pub fn parse_assignments(pairs: &[String]) -> anyhow::Result<serde_json::Map<String, serde_json::Value>> {
    let mut map = serde_json::Map::new();
    for pair in pairs {
        let Some((key, raw)) = pair.split_once('=') else {
            anyhow::bail!("expected KEY=VALUE, got: {pair}");
        };
        let key = key.trim();
        if key.is_empty() {
            anyhow::bail!("empty key in: {pair}");
        }
        let value = serde_json::from_str(raw)
            .unwrap_or_else(|_| serde_json::Value::String(raw.to_owned()));
        map.insert(key.to_owned(), value);
    }
    Ok(map)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
