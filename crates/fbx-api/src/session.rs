// Session management.
//
// Guarantees a usable session token before every signed call. The whole
// check-then-login sequence runs under one async mutex so concurrent
// callers can never race two open-session requests into inconsistent
// tokens.

use std::collections::HashMap;
use std::sync::Arc;

use secrecy::SecretString;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::events::StatusEvent;
use crate::registrar::AppIdentity;
use crate::signing::session_password;
use crate::transport::HttpClient;

/// One open session. Never persisted; the appliance invalidates it on its
/// own schedule and we only learn by a refused call.
#[derive(Clone)]
pub struct Session {
    pub token: SecretString,
    pub permissions: HashMap<String, bool>,
}

#[derive(Deserialize)]
struct LoginStatus {
    logged_in: bool,
    challenge: Option<String>,
}

#[derive(Deserialize)]
struct OpenedSession {
    session_token: String,
    #[serde(default)]
    permissions: HashMap<String, bool>,
}

/// Opens and renews sessions for one granted application.
pub struct SessionManager {
    http: Arc<HttpClient>,
    identity: AppIdentity,
    app_token: SecretString,
    events: broadcast::Sender<StatusEvent>,
    session: Mutex<Option<Session>>,
}

impl SessionManager {
    pub fn new(
        http: Arc<HttpClient>,
        identity: AppIdentity,
        app_token: SecretString,
        events: broadcast::Sender<StatusEvent>,
    ) -> Self {
        Self {
            http,
            identity,
            app_token,
            events,
            session: Mutex::new(None),
        }
    }

    /// Ensure a valid session exists and return its token.
    ///
    /// The login-status endpoint is queried before every call: when we
    /// hold a token it rides along so the appliance can vouch for it,
    /// otherwise the query is anonymous and `logged_in` comes back false
    /// with a challenge. Only a `logged_in: false` answer triggers the
    /// challenge-response login; an appliance-side "still valid" leaves
    /// the held token untouched.
    pub async fn ensure_session(&self) -> Result<SecretString, Error> {
        let mut guard = self.session.lock().await;

        let status: LoginStatus = match guard.as_ref() {
            Some(session) => self.http.get_authed("login", &session.token).await,
            None => self.http.get("login").await,
        }
        .map_err(session_error)?;

        if status.logged_in {
            return match guard.as_ref() {
                Some(session) => Ok(session.token.clone()),
                // Shouldn't happen: logged_in without a token we sent.
                None => Err(Error::Session {
                    message: "appliance reports an open session but no token is held".into(),
                }),
            };
        }

        let challenge = status.challenge.ok_or_else(|| Error::Session {
            message: "login status carried no challenge".into(),
        })?;

        debug!("opening session");
        let password = session_password(&self.app_token, &challenge);
        let opened: OpenedSession = self
            .http
            .post(
                "login/session",
                &json!({
                    "app_id": self.identity.app_id,
                    "app_version": self.identity.app_version,
                    "password": password,
                }),
            )
            .await
            .map_err(session_error)?;

        let session = Session {
            token: SecretString::from(opened.session_token),
            permissions: opened.permissions,
        };
        let token = session.token.clone();
        // Token and permissions are committed together or not at all.
        *guard = Some(session);

        let _ = self.events.send(StatusEvent::SessionOpened);
        info!("session opened");
        Ok(token)
    }

    /// Permissions granted to the current session, if one is open.
    pub async fn permissions(&self) -> Option<HashMap<String, bool>> {
        self.session
            .lock()
            .await
            .as_ref()
            .map(|s| s.permissions.clone())
    }

    /// Close the session on the appliance and clear local state.
    ///
    /// Best-effort: failures are logged, never escalated -- logout runs
    /// during teardown where no further action is possible. Local state
    /// is cleared either way.
    pub async fn logout(&self) {
        let mut guard = self.session.lock().await;
        let Some(session) = guard.take() else {
            return;
        };

        match self
            .http
            .post_authed::<serde_json::Value, ()>("login/logout", &session.token, None)
            .await
        {
            Ok(_) => {
                let _ = self.events.send(StatusEvent::SessionClosed);
                debug!("session closed");
            }
            Err(e) => warn!(error = %e, "logout failed (non-fatal)"),
        }
    }
}

fn session_error(err: Error) -> Error {
    match err {
        Error::Api { message, .. } => Error::Session { message },
        other => other,
    }
}
