//! Arbitrary signed call handler.

use crate::cli::{CallArgs, GlobalOpts};
use crate::commands::util;
use crate::error::CliError;
use crate::output;

pub async fn handle(args: CallArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let body = match (&args.data, &args.data_file) {
        (Some(inline), _) => Some(serde_json::from_str(inline)?),
        (None, Some(path)) => Some(util::read_json_file(path)?),
        (None, None) => None,
    };

    let (client, _) = util::connect_client(global).await?;
    let result = client.call(&args.path, body.as_ref()).await?;
    client.logout().await;

    output::print_output(&output::render_value(&global.output, &result), global.quiet);
    Ok(())
}
