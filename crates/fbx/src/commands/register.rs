//! Pairing handler: drives registration to completion with live feedback.

use std::sync::Arc;

use owo_colors::OwoColorize;

use fbx_api::{AuthorizationStatus, CredentialStore, FbxClient, StatusEvent};

use crate::cli::{GlobalOpts, RegisterArgs};
use crate::config::{self, KeyringStore};
use crate::error::CliError;
use crate::output;

pub async fn handle(args: RegisterArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let (profile_name, mut client_config) = config::resolve_client_config(global)?;
    client_config.identity =
        config::with_device_name(client_config.identity, args.device_name.clone());

    let store = Arc::new(KeyringStore::new(profile_name.clone()));

    if args.force {
        store.clear()?;
    } else if let Some(credentials) = store.load()? {
        if credentials.status == AuthorizationStatus::Granted {
            if !global.quiet {
                eprintln!("Already paired (profile '{profile_name}'). Use --force to re-pair.");
            }
            return Ok(());
        }
    }

    let client = FbxClient::new(client_config, store);

    // Narrate the poll loop while it runs; the connect() result is what
    // decides success or failure.
    let color = output::should_color(&global.color);
    let quiet = global.quiet;
    let mut events = client.events();
    let narrator = tokio::spawn(async move {
        let mut announced = false;
        while let Ok(event) = events.recv().await {
            if quiet {
                continue;
            }
            match event {
                StatusEvent::ApplicationPending if !announced => {
                    announced = true;
                    eprintln!("Confirm the request on the appliance's front panel...");
                }
                StatusEvent::ApplicationGranted => {
                    if color {
                        eprintln!("{}", "Pairing granted.".green());
                    } else {
                        eprintln!("Pairing granted.");
                    }
                }
                StatusEvent::ApplicationTimeout => {
                    eprintln!("Confirmation window elapsed; requesting a fresh pairing...");
                }
                _ => {}
            }
        }
    });

    let connected = tokio::select! {
        result = client.connect() => result,
        _ = tokio::signal::ctrl_c() => {
            client.cancel_pending().await;
            Err(fbx_api::Error::Cancelled)
        }
    };
    narrator.abort();
    connected?;

    if let Some(device) = client.device().await {
        let pairs = vec![
            ("profile".to_owned(), profile_name),
            ("uid".to_owned(), device.uid),
            ("device".to_owned(), device.device_name),
            ("api base".to_owned(), device.base_url.to_string()),
        ];
        output::print_output(&output::render_pairs(&global.output, &pairs), global.quiet);
    }

    Ok(())
}
