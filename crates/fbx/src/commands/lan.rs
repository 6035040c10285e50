//! LAN configuration (leaf proxy over one signed GET).

use crate::cli::GlobalOpts;
use crate::commands::util;
use crate::error::CliError;
use crate::output;

pub async fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let (client, _) = util::connect_client(global).await?;
    let result = client.call("lan/config", None).await?;
    client.logout().await;

    output::print_output(&output::render_value(&global.output, &result), global.quiet);
    Ok(())
}
