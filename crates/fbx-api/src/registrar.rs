// Application registration (device pairing).
//
// Drives the one-time handshake that turns an anonymous installation into
// a granted application: request an app token, then poll the track status
// until the user confirms on the appliance itself. Polling is an explicit
// loop with bounded backoff and a cancellation token, never unbounded.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::events::StatusEvent;
use crate::store::{AuthorizationStatus, CredentialStore, StoredCredentials};
use crate::transport::HttpClient;

/// Fixed identity this installation presents when requesting authorization
/// and when opening sessions.
#[derive(Debug, Clone)]
pub struct AppIdentity {
    pub app_id: String,
    pub app_name: String,
    pub app_version: String,
    pub device_name: String,
}

/// Bounds for the authorization poll loop.
///
/// The delay doubles after each `pending` answer up to `max_delay`; the
/// attempt budget covers the whole registration, including restarts after
/// a `timeout` outcome, so the flow always terminates.
#[derive(Debug, Clone)]
pub struct PollPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(10),
            max_attempts: 60,
        }
    }
}

impl PollPolicy {
    fn next_delay(&self, current: Duration) -> Duration {
        (current * 2).min(self.max_delay)
    }
}

#[derive(Deserialize)]
struct AuthorizeResult {
    app_token: String,
    track_id: u64,
}

#[derive(Deserialize)]
struct TrackResult {
    status: String,
}

/// Drives the pairing state machine for one appliance.
pub struct Registrar {
    http: Arc<HttpClient>,
    identity: AppIdentity,
    store: Arc<dyn CredentialStore>,
    events: broadcast::Sender<StatusEvent>,
    policy: PollPolicy,
    cancel: CancellationToken,
}

impl Registrar {
    pub fn new(
        http: Arc<HttpClient>,
        identity: AppIdentity,
        store: Arc<dyn CredentialStore>,
        events: broadcast::Sender<StatusEvent>,
        policy: PollPolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            http,
            identity,
            store,
            events,
            policy,
            cancel,
        }
    }

    /// Obtain granted application credentials, reusing stored ones when
    /// possible.
    ///
    /// - Already granted: returned immediately, nothing is requested.
    /// - Stored but not yet granted: polling resumes on the stored track
    ///   id without requesting a new app token.
    /// - Nothing stored: a fresh authorize request starts the handshake.
    ///
    /// Transport failures propagate without a state transition, so a
    /// caller-driven re-invocation picks up where this one stopped.
    pub async fn register(&self) -> Result<StoredCredentials, Error> {
        let credentials = match self.store.load()? {
            Some(c) if c.status == AuthorizationStatus::Granted => {
                debug!(track_id = %c.track_id, "reusing granted credentials");
                return Ok(c);
            }
            Some(c) => {
                debug!(track_id = %c.track_id, "resuming authorization polling");
                c
            }
            None => self.request_authorization().await?,
        };

        self.poll_until_settled(credentials).await
    }

    /// POST the authorize request and persist the pending credentials so a
    /// restart resumes polling instead of requesting another token.
    async fn request_authorization(&self) -> Result<StoredCredentials, Error> {
        let body = json!({
            "app_id": self.identity.app_id,
            "app_name": self.identity.app_name,
            "app_version": self.identity.app_version,
            "device_name": self.identity.device_name,
        });

        let res: AuthorizeResult = self
            .http
            .post("login/authorize", &body)
            .await
            .map_err(registration_error)?;

        info!(track_id = res.track_id, "authorization requested -- confirm on the appliance");

        let credentials = StoredCredentials {
            app_token: SecretString::from(res.app_token),
            track_id: res.track_id.to_string(),
            status: AuthorizationStatus::Pending,
        };
        self.store.save(&credentials)?;
        Ok(credentials)
    }

    #[allow(clippy::cognitive_complexity)]
    async fn poll_until_settled(
        &self,
        mut credentials: StoredCredentials,
    ) -> Result<StoredCredentials, Error> {
        let mut delay = self.policy.initial_delay;

        for _attempt in 0..self.policy.max_attempts {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let track: TrackResult = self
                .http
                .get(&format!("login/authorize/{}", credentials.track_id))
                .await
                .map_err(registration_error)?;

            match AuthorizationStatus::from_str(&track.status) {
                Ok(AuthorizationStatus::Pending) => {
                    debug!(track_id = %credentials.track_id, "authorization still pending");
                    self.emit(StatusEvent::ApplicationPending);
                    self.sleep_or_cancel(delay).await?;
                    delay = self.policy.next_delay(delay);
                }
                Ok(AuthorizationStatus::Granted) => {
                    credentials.status = AuthorizationStatus::Granted;
                    self.store.save(&credentials)?;
                    self.emit(StatusEvent::ApplicationGranted);
                    info!(track_id = %credentials.track_id, "application granted");
                    return Ok(credentials);
                }
                Ok(AuthorizationStatus::Timeout) => {
                    // A timed-out request needs re-registration, not
                    // re-polling: discard everything and start over with
                    // a fresh app token.
                    warn!(track_id = %credentials.track_id, "authorization timed out, re-registering");
                    self.emit(StatusEvent::ApplicationTimeout);
                    self.store.clear()?;
                    credentials = self.request_authorization().await?;
                    delay = self.policy.initial_delay;
                }
                Ok(AuthorizationStatus::Denied) => {
                    warn!(track_id = %credentials.track_id, "authorization denied");
                    self.emit(StatusEvent::ApplicationDenied);
                    self.store.clear()?;
                    return Err(Error::AuthorizationDenied);
                }
                Ok(AuthorizationStatus::Unset) | Err(()) => {
                    warn!(status = %track.status, "unrecognized authorization status");
                    self.emit(StatusEvent::ApplicationUnknown);
                    self.store.clear()?;
                    return Err(Error::AuthorizationUnknown {
                        status: track.status,
                    });
                }
            }
        }

        Err(Error::AuthorizationTimedOut {
            attempts: self.policy.max_attempts,
        })
    }

    async fn sleep_or_cancel(&self, delay: Duration) -> Result<(), Error> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(Error::Cancelled),
            () = tokio::time::sleep(delay) => Ok(()),
        }
    }

    fn emit(&self, event: StatusEvent) {
        // No subscribers is fine -- events are observability only.
        let _ = self.events.send(event);
    }
}

fn registration_error(err: Error) -> Error {
    match err {
        Error::Api { message, .. } => Error::Registration { message },
        other => other,
    }
}
