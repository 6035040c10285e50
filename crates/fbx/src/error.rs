//! CLI error types with miette diagnostics.
//!
//! Maps `fbx_api::Error` variants into user-facing errors with actionable
//! help text.

use miette::Diagnostic;
use thiserror::Error;

/// Exit codes for the `fbx` binary.
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const DENIED: i32 = 5;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the appliance at {url}")]
    #[diagnostic(
        code(fbx::connection_failed),
        help(
            "Check that the appliance is powered on and reachable.\n\
             URL: {url}\n\
             Try: fbx status --insecure"
        )
    )]
    ConnectionFailed {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Appliance discovery failed: {message}")]
    #[diagnostic(
        code(fbx::discovery_failed),
        help(
            "The host did not answer the public version endpoint like an \
             appliance would.\n\
             Verify the URL with: fbx config show"
        )
    )]
    DiscoveryFailed { message: String },

    // ── Authorization ────────────────────────────────────────────────
    #[error("This machine is not paired with the appliance")]
    #[diagnostic(
        code(fbx::not_registered),
        help("Pair first with: fbx register --profile {profile}")
    )]
    NotRegistered { profile: String },

    #[error("Pairing was refused on the appliance")]
    #[diagnostic(
        code(fbx::authorization_denied),
        help("Someone declined the request on the device. Run `fbx register` to try again.")
    )]
    AuthorizationDenied,

    #[error("Pairing was not confirmed in time")]
    #[diagnostic(
        code(fbx::authorization_timeout),
        help(
            "The confirmation window on the appliance elapsed.\n\
             Run `fbx register` again and confirm on the device's front panel."
        )
    )]
    AuthorizationTimedOut,

    #[error("Pairing ended with unrecognized status '{status}'")]
    #[diagnostic(code(fbx::authorization_unknown))]
    AuthorizationUnknown { status: String },

    #[error("Session error: {message}")]
    #[diagnostic(
        code(fbx::session),
        help(
            "The appliance refused the login handshake. If credentials were \
             revoked on the device, run: fbx config forget && fbx register"
        )
    )]
    SessionFailed { message: String },

    // ── API ──────────────────────────────────────────────────────────
    #[error("API error ({code}): {message}")]
    #[diagnostic(code(fbx::api_error))]
    ApiError { code: String, message: String },

    #[error("Unexpected response from the appliance: {message}")]
    #[diagnostic(code(fbx::protocol))]
    Protocol { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(fbx::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(fbx::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: fbx config init --host <URL>"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No appliance configured")]
    #[diagnostic(
        code(fbx::no_config),
        help(
            "Create a profile with: fbx config init --host <URL>\n\
             Or pass --host / set FBX_HOST.\n\
             Config expected at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(fbx::config))]
    Config(#[from] fbx_config::ConfigError),

    // ── Credential store ─────────────────────────────────────────────
    #[error("Keyring access failed: {message}")]
    #[diagnostic(
        code(fbx::keyring),
        help("Credentials live in the system keyring. Check that a keyring daemon is available.")
    )]
    Keyring { message: String },

    // ── Interactive ──────────────────────────────────────────────────
    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(fbx::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── Cancellation ─────────────────────────────────────────────────
    #[error("Cancelled")]
    #[diagnostic(code(fbx::cancelled))]
    Cancelled,

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON payload: {0}")]
    #[diagnostic(code(fbx::json), help("Check the JSON body and try again."))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::DiscoveryFailed { .. } => exit_code::CONNECTION,
            Self::NotRegistered { .. } | Self::SessionFailed { .. } | Self::Keyring { .. } => {
                exit_code::AUTH
            }
            Self::AuthorizationDenied | Self::AuthorizationUnknown { .. } => exit_code::DENIED,
            Self::AuthorizationTimedOut => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── fbx_api::Error → CliError mapping ────────────────────────────────

impl From<fbx_api::Error> for CliError {
    fn from(err: fbx_api::Error) -> Self {
        match err {
            // A no-longer-accepted session token is an auth problem, not a
            // generic API refusal: sessions are re-validated on the next
            // call, so retrying heals it.
            err if err.is_auth_expired() => CliError::SessionFailed {
                message: format!("{err}; run the command again to re-login"),
            },

            fbx_api::Error::Discovery { message } => CliError::DiscoveryFailed { message },

            fbx_api::Error::Registration { message } => CliError::ApiError {
                code: "registration".into(),
                message,
            },

            fbx_api::Error::AuthorizationDenied => CliError::AuthorizationDenied,

            fbx_api::Error::AuthorizationUnknown { status } => {
                CliError::AuthorizationUnknown { status }
            }

            fbx_api::Error::AuthorizationTimedOut { .. } => CliError::AuthorizationTimedOut,

            fbx_api::Error::NotAuthorized => CliError::NotRegistered {
                profile: "current".into(),
            },

            fbx_api::Error::Session { message } => CliError::SessionFailed { message },

            fbx_api::Error::Api { message, code, .. } => CliError::ApiError {
                code: code.unwrap_or_default(),
                message,
            },

            fbx_api::Error::Transport(e) => CliError::ConnectionFailed {
                url: e
                    .url()
                    .map_or_else(|| "(unknown)".into(), ToString::to_string),
                source: e.into(),
            },

            fbx_api::Error::InvalidUrl(e) => CliError::Validation {
                field: "url".into(),
                reason: e.to_string(),
            },

            fbx_api::Error::Deserialization { message, .. } => CliError::Protocol { message },

            fbx_api::Error::CredentialStore { message } => CliError::Keyring { message },

            fbx_api::Error::Cancelled => CliError::Cancelled,
        }
    }
}
