use thiserror::Error;

/// Top-level error type for the `fbx-api` crate.
///
/// Covers every failure mode across the authorization flow: discovery,
/// registration, session login, and signed calls. Authorization *outcomes*
/// (pending/granted/timeout) are not errors -- they drive the registrar's
/// state machine. Only the two terminal refusals surface here.
#[derive(Debug, Error)]
pub enum Error {
    // ── Discovery ───────────────────────────────────────────────────
    /// Discovery endpoint unreachable or response missing required fields.
    #[error("Discovery failed: {message}")]
    Discovery { message: String },

    // ── Registration ────────────────────────────────────────────────
    /// Authorize/track request failed at the protocol level.
    #[error("Registration failed: {message}")]
    Registration { message: String },

    /// The user explicitly refused the authorization request.
    #[error("Authorization denied by the appliance")]
    AuthorizationDenied,

    /// The appliance reported a status this client does not recognize.
    #[error("Authorization ended with unrecognized status '{status}'")]
    AuthorizationUnknown { status: String },

    /// The poll attempt budget was exhausted without a grant.
    #[error("Authorization polling gave up after {attempts} attempts")]
    AuthorizationTimedOut { attempts: u32 },

    /// A signed call was attempted before registration reached `granted`.
    #[error("Not authorized yet -- run registration first")]
    NotAuthorized,

    // ── Session ─────────────────────────────────────────────────────
    /// Login-status or open-session call failed.
    #[error("Session error: {message}")]
    Session { message: String },

    // ── API envelope ────────────────────────────────────────────────
    /// The appliance rejected a request (`success: false` or non-2xx).
    #[error("API error: {message}")]
    Api {
        message: String,
        /// Appliance error code (e.g. `auth_required`, `invalid_token`).
        code: Option<String>,
        /// HTTP status, when the failure carried one.
        status: Option<u16>,
    },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout).
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    // ── Credential store ────────────────────────────────────────────
    /// The credential store could not be read or written.
    #[error("Credential store error: {message}")]
    CredentialStore { message: String },

    // ── Cancellation ────────────────────────────────────────────────
    /// The registration poll loop was cancelled.
    #[error("Operation cancelled")]
    Cancelled,
}

impl Error {
    /// Returns `true` if this error means the session token is no longer
    /// accepted and a fresh `ensure_session` is worth attempting.
    pub fn is_auth_expired(&self) -> bool {
        match self {
            Self::Api { code: Some(c), .. } => c == "auth_required" || c == "invalid_token",
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::FORBIDDEN),
            _ => false,
        }
    }

    /// Returns `true` if this is a transient failure worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refused(code: &str) -> Error {
        Error::Api {
            message: "request refused (HTTP 403)".into(),
            code: Some(code.into()),
            status: Some(403),
        }
    }

    #[test]
    fn expired_session_codes_are_flagged() {
        assert!(refused("auth_required").is_auth_expired());
        assert!(refused("invalid_token").is_auth_expired());
    }

    #[test]
    fn other_refusals_are_not_expired() {
        assert!(!refused("insufficient_rights").is_auth_expired());
        assert!(
            !Error::Api {
                message: "forbidden".into(),
                code: None,
                status: Some(403),
            }
            .is_auth_expired()
        );
        assert!(!Error::NotAuthorized.is_auth_expired());
    }

    #[test]
    fn non_transport_errors_are_not_transient() {
        assert!(!refused("auth_required").is_transient());
        assert!(!Error::Cancelled.is_transient());
    }
}
