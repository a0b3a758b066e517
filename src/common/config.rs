//! Configuration schema, defaults, and layered loading.
//!
//! Precedence: defaults < config file < PORT/AUTH_FOLDER < DOCRELAY_* env < CLI
use anyhow::{ensure, Context, Result};
use directories::ProjectDirs;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;
const MAX_FILES_CEILING: usize = 1000;

pub fn config_path() -> PathBuf {
    ProjectDirs::from("", "", "docrelay")
        .map(|p| p.config_dir().join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("docrelay.toml"))
}

/// Where documents go and how recipients are addressed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliverySettings {
    /// Prefix prepended to the 10-digit national number
    pub country_code: String,
    /// Suffix of the messaging network's personal addressing scheme
    pub address_domain: String,
    /// Staging directory for uploaded parts
    pub upload_dir: PathBuf,
    pub max_file_size: u64,
    pub max_files: usize,
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self {
            country_code: "91".to_string(),
            address_domain: "s.whatsapp.net".to_string(),
            upload_dir: PathBuf::from("uploads"),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_files: 20,
        }
    }
}

/// Timing of the session supervisor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Delay before rebuilding the socket after a recoverable close
    pub reconnect_delay_ms: u64,
    /// Delay before retrying a failed start
    pub startup_retry_delay_ms: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            reconnect_delay_ms: 3_000,
            startup_retry_delay_ms: 5_000,
        }
    }
}

impl SessionSettings {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn startup_retry_delay(&self) -> Duration {
        Duration::from_millis(self.startup_retry_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeSettings {
    /// Base URL of the messaging gateway sidecar
    pub url: String,
    /// Long-poll window for the event stream
    pub poll_timeout_secs: u64,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8090".to_string(),
            poll_timeout_secs: 25,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PairingSettings {
    pub show_qr: bool,
    pub show_link: bool,
}

impl Default for PairingSettings {
    fn default() -> Self {
        Self {
            show_qr: true,
            show_link: true,
        }
    }
}

/// Fully resolved application configuration after all layers merge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub port: u16,
    pub auth_folder: PathBuf,
    pub delivery: DeliverySettings,
    pub session: SessionSettings,
    pub bridge: BridgeSettings,
    pub pairing: PairingSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            auth_folder: PathBuf::from("./auth_info"),
            delivery: DeliverySettings::default(),
            session: SessionSettings::default(),
            bridge: BridgeSettings::default(),
            pairing: PairingSettings::default(),
        }
    }
}

impl AppConfig {
    /// Rejects values the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        let code = &self.delivery.country_code;
        ensure!(
            !code.is_empty() && code.chars().all(|c| c.is_ascii_digit()),
            "Invalid config: delivery.country_code must be digits, got '{code}'"
        );
        ensure!(
            !self.delivery.address_domain.trim().is_empty(),
            "Invalid config: delivery.address_domain must not be empty"
        );
        ensure!(
            self.delivery.max_file_size > 0,
            "Invalid config: delivery.max_file_size must be > 0"
        );
        ensure!(
            (1..=MAX_FILES_CEILING).contains(&self.delivery.max_files),
            "Invalid config: delivery.max_files must be within 1..={MAX_FILES_CEILING}"
        );
        ensure!(
            self.session.reconnect_delay_ms > 0,
            "Invalid config: session.reconnect_delay_ms must be > 0"
        );
        ensure!(
            self.session.startup_retry_delay_ms > 0,
            "Invalid config: session.startup_retry_delay_ms must be > 0"
        );
        ensure!(
            self.bridge.url.starts_with("http://") || self.bridge.url.starts_with("https://"),
            "Invalid config: bridge.url must be an http(s) URL"
        );
        Ok(())
    }

    /// Upper bound for a whole multipart request body.
    pub fn request_body_limit(&self) -> usize {
        let files = self.delivery.max_file_size as usize;
        files
            .saturating_mul(self.delivery.max_files)
            .saturating_add(1024 * 1024)
    }
}

/// Command line values that win over every other layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_folder: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bridge_url: Option<String>,
    #[serde(skip)]
    pub config_file: Option<PathBuf>,
}

/// Loads config from defaults/file/env and applies CLI overrides.
pub fn load_config(overrides: &ConfigOverrides) -> Result<AppConfig> {
    let path = overrides.config_file.clone().unwrap_or_else(config_path);
    load_config_from(&path, overrides)
}

pub fn load_config_from(path: &Path, overrides: &ConfigOverrides) -> Result<AppConfig> {
    let config: AppConfig = Figment::new()
        .merge(Serialized::defaults(AppConfig::default()))
        .merge(Toml::file(path))
        .merge(Env::raw().only(&["PORT", "AUTH_FOLDER"]))
        .merge(Env::prefixed("DOCRELAY_").split("__"))
        .extract()
        .context("Failed to load configuration")?;

    let config = apply_overrides(config, overrides);
    config.validate()?;

    Ok(config)
}

/// Applies runtime overrides to a loaded config.
pub fn apply_overrides(mut config: AppConfig, overrides: &ConfigOverrides) -> AppConfig {
    if let Some(port) = overrides.port {
        config.port = port;
    }
    if let Some(folder) = &overrides.auth_folder {
        config.auth_folder = folder.clone();
    }
    if let Some(url) = &overrides.bridge_url {
        config.bridge.url = url.clone();
    }

    config
}
