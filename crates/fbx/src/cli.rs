//! Clap derive structures for the `fbx` CLI.
//!
//! Defines the command tree, global flags, and shared enums.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// fbx -- command-line client for Freebox-style appliances
#[derive(Debug, Parser)]
#[command(
    name = "fbx",
    version,
    about = "Pair with a Freebox-style appliance and call its local API",
    long_about = "Registers this machine as an application on the appliance \
        (the user confirms on the device itself), then keeps a signed \
        session open for authenticated API calls.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Appliance profile to use
    #[arg(long, short = 'p', env = "FBX_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Appliance root URL (overrides profile)
    #[arg(long, short = 'H', env = "FBX_HOST", global = true)]
    pub host: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "FBX_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "FBX_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "FBX_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Key/value or table view (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Pair this machine with the appliance (requires confirming on the device)
    #[command(alias = "pair")]
    Register(RegisterArgs),

    /// Show appliance identity, pairing state, and session status
    #[command(alias = "st")]
    Status,

    /// Perform one signed API call against an arbitrary endpoint
    Call(CallArgs),

    /// Show the WAN connection state
    #[command(alias = "conn")]
    Connection,

    /// Show the LAN configuration
    Lan,

    /// Close the current session on the appliance
    Logout,

    /// Manage CLI configuration and stored credentials
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Register ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct RegisterArgs {
    /// Device name shown next to the pairing prompt on the appliance
    #[arg(long)]
    pub device_name: Option<String>,

    /// Re-register even if granted credentials already exist
    #[arg(long)]
    pub force: bool,
}

// ── Call ─────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CallArgs {
    /// API path relative to the versioned base (e.g. "wifi/config")
    pub path: String,

    /// JSON body -- presence switches the request from GET to POST
    #[arg(long, short = 'd', conflicts_with = "data_file")]
    pub data: Option<String>,

    /// Read the JSON body from a file
    #[arg(long, short = 'F', value_name = "FILE")]
    pub data_file: Option<PathBuf>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create or overwrite a profile
    Init {
        /// Appliance root URL (e.g. "http://mafreebox.freebox.fr")
        #[arg(long, required = true)]
        host: String,

        /// Device name shown on the appliance pairing prompt
        #[arg(long)]
        device_name: Option<String>,

        /// Accept self-signed certificates for this profile
        #[arg(long)]
        insecure: bool,
    },

    /// Display current configuration
    Show,

    /// Print the config file path
    Path,

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },

    /// Forget stored credentials for the active profile
    Forget,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
