//! Server configuration — parsed from TOML file + environment variable overrides.
//!
//! Priority: environment variables > config file > defaults.
//!
//! The transport password is stored encrypted with the pre-shared key and
//! decrypted exactly once at startup; the running dispatcher only ever sees
//! the decrypted snapshot.

use anyhow::{Context, Result};
use mailgate_core::{crypto, Defaults, TransportOptions};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level server configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    /// General server settings
    #[serde(default)]
    pub server: ServerSection,

    /// Outbound SMTP transport settings
    #[serde(default)]
    pub transport: TransportOptions,

    /// Fallback message fields
    #[serde(default)]
    pub defaults: Defaults,
}

/// General server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    /// Run mode: "subscribe" exits after an idle period, anything else
    /// stays resident
    #[serde(default = "default_mode")]
    pub mode: String,

    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            log_level: default_log_level(),
        }
    }
}

fn default_mode() -> String {
    "daemon".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl ServerConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: ServerConfig =
            toml::from_str(&contents).with_context(|| "Failed to parse TOML config")?;
        Ok(config)
    }

    /// Apply environment variable overrides.
    ///
    /// Supported env vars:
    /// - `MAILGATE_MODE`
    /// - `MAILGATE_LOG_LEVEL`
    /// - `MAILGATE_SMTP_HOST`
    /// - `MAILGATE_SMTP_PORT`
    /// - `MAILGATE_SMTP_SERVICE`
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("MAILGATE_MODE") {
            self.server.mode = v;
        }
        if let Ok(v) = std::env::var("MAILGATE_LOG_LEVEL") {
            self.server.log_level = v;
        }
        if let Ok(v) = std::env::var("MAILGATE_SMTP_HOST") {
            self.transport.host = Some(v);
        }
        if let Ok(v) = std::env::var("MAILGATE_SMTP_PORT") {
            if let Ok(port) = v.parse::<u16>() {
                self.transport.port = Some(port);
            }
        }
        if let Ok(v) = std::env::var("MAILGATE_SMTP_SERVICE") {
            self.transport.service = Some(v);
        }
    }

    /// Whether idle auto-stop is armed.
    pub fn is_subscribe(&self) -> bool {
        self.server.mode == "subscribe"
    }

    /// Validate that the configuration is usable.
    ///
    /// Transport field combinations are deliberately not checked here; a
    /// bad combination surfaces as a construction or send-time error and
    /// is reported through the normal failure path.
    pub fn validate(&self) -> Result<()> {
        const LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];
        anyhow::ensure!(
            LEVELS.contains(&self.server.log_level.as_str()),
            "server.log_level must be one of {:?}, got '{}'",
            LEVELS,
            self.server.log_level
        );
        Ok(())
    }

    /// Decrypt the transport password in place. Called exactly once at
    /// startup, before the dispatcher is constructed.
    pub fn decrypt_credentials(&mut self) -> Result<()> {
        if let Some(auth) = self.transport.auth.as_mut() {
            auth.pass = crypto::decrypt(crypto::PRESHARED_KEY, &auth.pass)
                .context("Failed to decrypt transport password")?;
        }
        Ok(())
    }
}
