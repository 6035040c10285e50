//! Status handler: appliance identity, pairing state, login state.

use serde::Deserialize;

use fbx_api::{CredentialStore, HttpClient, discover};

use crate::cli::GlobalOpts;
use crate::config::{self, KeyringStore};
use crate::error::CliError;
use crate::output;

#[derive(Deserialize)]
struct LoginProbe {
    logged_in: bool,
}

pub async fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let (profile_name, client_config) = config::resolve_client_config(global)?;

    let probe = client_config.transport.build_client().map_err(CliError::from)?;
    let device = discover(&probe, &client_config.root_url).await?;

    let http = HttpClient::new(probe, device.base_url.clone());
    let login: LoginProbe = http.get("login").await?;

    let store = KeyringStore::new(profile_name.clone());
    let pairing = store
        .load()?
        .map_or_else(|| "not paired".to_owned(), |c| c.status.to_string());

    let pairs = vec![
        ("profile".to_owned(), profile_name),
        ("uid".to_owned(), device.uid),
        ("device".to_owned(), device.device_name),
        ("type".to_owned(), device.device_type),
        ("api base".to_owned(), device.base_url.to_string()),
        ("pairing".to_owned(), pairing),
        ("logged in".to_owned(), login.logged_in.to_string()),
    ];

    output::print_output(&output::render_pairs(&global.output, &pairs), global.quiet);
    Ok(())
}
