//! Shared configuration for the fbxctl CLI.
//!
//! TOML profiles, figment-based loading (defaults, file, environment),
//! and the keyring-backed credential store that makes granted app tokens
//! survive restarts.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use fbx_api::{
    AppIdentity, AuthorizationStatus, CredentialStore, StoredCredentials, TlsMode,
    TransportConfig,
};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named appliance profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default)]
    pub insecure: bool,

    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            insecure: false,
            timeout: default_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    10
}

/// A named appliance profile.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Profile {
    /// Appliance root URL (e.g., "http://mafreebox.freebox.fr").
    pub host: String,

    /// Application identifier presented during pairing.
    #[serde(default = "default_app_id")]
    pub app_id: String,

    /// Human-readable application name shown on the appliance display.
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Device name shown next to the pairing prompt.
    pub device_name: Option<String>,

    /// Accept self-signed certificates for this appliance.
    pub insecure: Option<bool>,

    /// Per-profile request timeout in seconds.
    pub timeout: Option<u64>,
}

fn default_app_id() -> String {
    "org.fbxctl".into()
}
fn default_app_name() -> String {
    "fbxctl".into()
}

impl Profile {
    /// The application identity this profile presents to the appliance.
    pub fn identity(&self) -> AppIdentity {
        AppIdentity {
            app_id: self.app_id.clone(),
            app_name: self.app_name.clone(),
            app_version: env!("CARGO_PKG_VERSION").into(),
            device_name: self.device_name.clone().unwrap_or_else(local_hostname),
        }
    }

    /// HTTP transport settings for this profile.
    pub fn transport(&self, defaults: &Defaults) -> TransportConfig {
        let tls = if self.insecure.unwrap_or(defaults.insecure) {
            TlsMode::DangerAcceptInvalid
        } else {
            TlsMode::System
        };
        TransportConfig {
            tls,
            timeout: Duration::from_secs(self.timeout.unwrap_or(defaults.timeout)),
        }
    }

    /// Parse the configured host into a root URL.
    pub fn root_url(&self) -> Result<url::Url, ConfigError> {
        self.host.parse().map_err(|_| ConfigError::Validation {
            field: "host".into(),
            reason: format!("invalid URL: {}", self.host),
        })
    }
}

fn local_hostname() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "fbxctl".into())
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
///
/// `FBXCTL_CONFIG` overrides the computed path (used by tests and
/// containers).
pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("FBXCTL_CONFIG") {
        return PathBuf::from(path);
    }

    ProjectDirs::from("org", "fbxctl", "fbxctl").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("fbxctl");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load a Config from an explicit file path + environment.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("FBX_").split("_"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

/// Serialize config to TOML at an explicit path.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Keyring credential store ────────────────────────────────────────

const KEYRING_SERVICE: &str = "fbxctl";

/// Credential store backed by the platform keyring.
///
/// One instance per profile; entries are namespaced as
/// `{profile}/app-token`, `{profile}/track-id`, `{profile}/auth-status`
/// under the `fbxctl` service.
pub struct KeyringStore {
    profile: String,
}

impl KeyringStore {
    pub fn new(profile: impl Into<String>) -> Self {
        Self {
            profile: profile.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<keyring::Entry, fbx_api::Error> {
        keyring::Entry::new(KEYRING_SERVICE, &format!("{}/{key}", self.profile))
            .map_err(store_error)
    }

    /// Read one entry, mapping "no such entry" to `None`.
    fn read(&self, key: &str) -> Result<Option<String>, fbx_api::Error> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(store_error(e)),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), fbx_api::Error> {
        self.entry(key)?.set_password(value).map_err(store_error)
    }

    fn delete(&self, key: &str) -> Result<(), fbx_api::Error> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(store_error(e)),
        }
    }
}

impl CredentialStore for KeyringStore {
    fn load(&self) -> Result<Option<StoredCredentials>, fbx_api::Error> {
        let Some(token) = self.read("app-token")? else {
            return Ok(None);
        };

        let track_id = self.read("track-id")?.unwrap_or_default();
        let status = self
            .read("auth-status")?
            .and_then(|s| s.parse().ok())
            .unwrap_or(AuthorizationStatus::Unset);

        Ok(Some(StoredCredentials {
            app_token: SecretString::from(token),
            track_id,
            status,
        }))
    }

    fn save(&self, credentials: &StoredCredentials) -> Result<(), fbx_api::Error> {
        self.write("app-token", credentials.app_token.expose_secret())?;
        self.write("track-id", &credentials.track_id)?;
        self.write("auth-status", credentials.status.as_str())
    }

    fn clear(&self) -> Result<(), fbx_api::Error> {
        self.delete("app-token")?;
        self.delete("track-id")?;
        self.delete("auth-status")
    }
}

fn store_error(err: keyring::Error) -> fbx_api::Error {
    fbx_api::Error::CredentialStore {
        message: err.to_string(),
    }
}

// ── Tests ───────────────────────────────────────────────────────────
