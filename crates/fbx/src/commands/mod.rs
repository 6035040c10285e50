//! Command dispatch: bridges CLI args -> fbx-api calls -> output formatting.

pub mod call;
pub mod config_cmd;
pub mod connection;
pub mod lan;
pub mod logout;
pub mod register;
pub mod status;
pub mod util;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch an appliance-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Register(args) => register::handle(args, global).await,
        Command::Status => status::handle(global).await,
        Command::Call(args) => call::handle(args, global).await,
        Command::Connection => connection::handle(global).await,
        Command::Lan => lan::handle(global).await,
        Command::Logout => logout::handle(global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
