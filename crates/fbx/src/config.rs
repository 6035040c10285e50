//! CLI configuration -- thin wrapper around `fbx_config` shared types.
//!
//! Re-exports the shared types and adds CLI-specific resolution that
//! respects `GlobalOpts` flag overrides (--host, --insecure, etc.).

use std::time::Duration;

use fbx_api::{AppIdentity, ClientConfig, PollPolicy, TlsMode, TransportConfig};

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use fbx_config::{
    Config, KeyringStore, Profile, config_path, load_config_or_default, save_config,
};

// ── CLI-specific helpers ────────────────────────────────────────────

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Resolve the active profile and flag overrides into a `ClientConfig`.
///
/// Returns the profile name alongside so callers can key the credential
/// store consistently. Flag overrides take priority over profile values.
pub fn resolve_client_config(global: &GlobalOpts) -> Result<(String, ClientConfig), CliError> {
    let cfg = load_config_or_default();
    let profile_name = active_profile_name(global, &cfg);

    if let Some(profile) = cfg.profiles.get(&profile_name) {
        return Ok((
            profile_name,
            client_config_from_profile(profile, &cfg, global)?,
        ));
    }

    // No profile -- build from --host / FBX_HOST alone
    let host = global.host.as_deref().ok_or_else(|| CliError::NoConfig {
        path: config_path().display().to_string(),
    })?;

    let adhoc = Profile {
        host: host.to_owned(),
        ..blank_profile()
    };
    let config = client_config_from_profile(&adhoc, &cfg, global)?;
    Ok((profile_name, config))
}

fn client_config_from_profile(
    profile: &Profile,
    cfg: &Config,
    global: &GlobalOpts,
) -> Result<ClientConfig, CliError> {
    // 1. Root URL (flag > env > profile)
    let root_url = match global.host.as_deref() {
        Some(host) => host.parse().map_err(|_| CliError::Validation {
            field: "host".into(),
            reason: format!("invalid URL: {host}"),
        })?,
        None => profile.root_url().map_err(CliError::Config)?,
    };

    // 2. TLS and timeout (flags win)
    let mut transport = profile.transport(&cfg.defaults);
    if global.insecure {
        transport = TransportConfig {
            tls: TlsMode::DangerAcceptInvalid,
            ..transport
        };
    }
    if let Some(secs) = global.timeout {
        transport.timeout = Duration::from_secs(secs);
    }

    Ok(ClientConfig {
        root_url,
        identity: profile.identity(),
        transport,
        poll: PollPolicy::default(),
    })
}

/// A profile with only defaults filled in, for flag-only invocations.
pub fn blank_profile() -> Profile {
    Profile {
        host: String::new(),
        app_id: "org.fbxctl".into(),
        app_name: "fbxctl".into(),
        device_name: None,
        insecure: None,
        timeout: None,
    }
}

/// Override the pairing device name on an already-resolved identity.
pub fn with_device_name(mut identity: AppIdentity, device_name: Option<String>) -> AppIdentity {
    if let Some(name) = device_name {
        identity.device_name = name;
    }
    identity
}
