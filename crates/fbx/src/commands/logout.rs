//! Logout handler.
//!
//! Sessions are per-process, so a session is opened first and then
//! closed on the appliance -- this confirms the stored credentials still
//! work and leaves no lingering appliance-side login for this app.

use crate::cli::GlobalOpts;
use crate::commands::util;
use crate::error::CliError;

pub async fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let (client, profile_name) = util::connect_client(global).await?;

    client.open_session().await?;
    client.logout().await;

    if !global.quiet {
        eprintln!("Session closed (profile '{profile_name}').");
    }
    Ok(())
}
