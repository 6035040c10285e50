//! Shared helpers for command handlers.

use std::io::{self, IsTerminal, Write};
use std::sync::Arc;

use fbx_api::{AuthorizationStatus, CredentialStore, FbxClient};

use crate::cli::GlobalOpts;
use crate::config::{self, KeyringStore};
use crate::error::CliError;

/// Resolve configuration and connect a client for the active profile.
///
/// Registration must already be granted: anything else is rejected with
/// "not registered" instead of silently starting a pairing prompt on the
/// appliance. Returns the profile name alongside so handlers can
/// reference it in messages.
pub async fn connect_client(global: &GlobalOpts) -> Result<(FbxClient, String), CliError> {
    let (profile_name, client_config) = config::resolve_client_config(global)?;
    let store = Arc::new(KeyringStore::new(profile_name.clone()));

    match store.load()? {
        Some(credentials) if credentials.status == AuthorizationStatus::Granted => {}
        _ => {
            return Err(CliError::NotRegistered {
                profile: profile_name,
            });
        }
    }

    let client = FbxClient::new(client_config, store);
    client.connect().await?;

    Ok((client, profile_name))
}

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: message.into(),
        });
    }

    eprint!("{message} [y/N] ");
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(matches!(line.trim(), "y" | "Y" | "yes"))
}

/// Read and parse a JSON file for `--data-file` flags.
pub fn read_json_file(path: &std::path::Path) -> Result<serde_json::Value, CliError> {
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents).map_err(|e| CliError::Validation {
        field: "data-file".into(),
        reason: format!("invalid JSON: {e}"),
    })
}
