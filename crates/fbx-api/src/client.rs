// ── Client facade ──
//
// Composes discovery, registration, session management, and transport
// behind one cheaply-cloneable handle. One instance owns the identity,
// credentials, and session for one configured appliance endpoint; nothing
// is shared across instances.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::{Mutex, broadcast};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;

use crate::discovery::{self, DeviceIdentity};
use crate::error::Error;
use crate::events::{EVENT_CHANNEL_SIZE, StatusEvent};
use crate::registrar::{AppIdentity, PollPolicy, Registrar};
use crate::session::SessionManager;
use crate::store::{CredentialStore, StoredCredentials};
use crate::transport::{HttpClient, TransportConfig};

/// Configuration for connecting to a single appliance.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Appliance root URL (e.g. `http://mafreebox.freebox.fr`). The
    /// versioned API base is derived from it during discovery.
    pub root_url: Url,
    /// Application identity presented during pairing and login.
    pub identity: AppIdentity,
    /// HTTP transport tuning.
    pub transport: TransportConfig,
    /// Bounds for the authorization poll loop.
    pub poll: PollPolicy,
}

/// Everything that exists only while connected.
struct Connected {
    device: DeviceIdentity,
    http: Arc<HttpClient>,
    session: SessionManager,
}

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc`. [`connect()`](Self::connect) runs
/// discovery and registration to completion; afterwards every
/// [`call()`](Self::call) transparently ensures a session and signs the
/// request.
#[derive(Clone)]
pub struct FbxClient {
    inner: Arc<Inner>,
}

struct Inner {
    config: ClientConfig,
    store: Arc<dyn CredentialStore>,
    event_tx: broadcast::Sender<StatusEvent>,
    cancel: CancellationToken,
    /// Child token for the current connection -- cancelled on disconnect,
    /// replaced on reconnect.
    cancel_child: Mutex<CancellationToken>,
    state: Mutex<Option<Arc<Connected>>>,
}

impl FbxClient {
    /// Create a client. Does NOT touch the network -- call
    /// [`connect()`](Self::connect) to discover and register.
    pub fn new(config: ClientConfig, store: Arc<dyn CredentialStore>) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        let cancel = CancellationToken::new();
        let cancel_child = cancel.child_token();

        Self {
            inner: Arc::new(Inner {
                config,
                store,
                event_tx,
                cancel,
                cancel_child: Mutex::new(cancel_child),
                state: Mutex::new(None),
            }),
        }
    }

    /// Access the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Subscribe to status-change notifications.
    ///
    /// Observability only: UIs display these, but control flow never
    /// depends on them.
    pub fn events(&self) -> broadcast::Receiver<StatusEvent> {
        self.inner.event_tx.subscribe()
    }

    // ── Connection lifecycle ─────────────────────────────────────────

    /// Discover the appliance and drive registration to completion.
    ///
    /// Registration either reuses granted credentials, resumes polling a
    /// stored track id, or runs the full pairing handshake (the user must
    /// confirm on the appliance). Blocks until granted or a terminal
    /// failure; cancel via [`cancel_pending()`](Self::cancel_pending).
    pub async fn connect(&self) -> Result<(), Error> {
        // Fresh child token for this connection (supports reconnect).
        let child = self.inner.cancel.child_token();
        *self.inner.cancel_child.lock().await = child.clone();

        let config = &self.inner.config;
        let probe = config.transport.build_client()?;

        let device = match discovery::discover(&probe, &config.root_url).await {
            Ok(device) => device,
            Err(e) => {
                let _ = self.inner.event_tx.send(StatusEvent::ApplicationError);
                return Err(e);
            }
        };
        debug!(uid = %device.uid, "appliance discovered");

        let http = Arc::new(HttpClient::new(probe, device.base_url.clone()));

        let registrar = Registrar::new(
            Arc::clone(&http),
            config.identity.clone(),
            Arc::clone(&self.inner.store),
            self.inner.event_tx.clone(),
            config.poll.clone(),
            child,
        );
        let credentials = registrar.register().await?;

        let session = SessionManager::new(
            Arc::clone(&http),
            config.identity.clone(),
            credentials.app_token.clone(),
            self.inner.event_tx.clone(),
        );

        *self.inner.state.lock().await = Some(Arc::new(Connected {
            device,
            http,
            session,
        }));

        info!("connected to appliance");
        Ok(())
    }

    /// Cancel an in-flight registration poll loop.
    pub async fn cancel_pending(&self) {
        self.inner.cancel_child.lock().await.cancel();
    }

    /// Log out (best-effort) and drop all connection state.
    pub async fn disconnect(&self) {
        self.inner.cancel_child.lock().await.cancel();

        if let Some(connected) = self.inner.state.lock().await.take() {
            connected.session.logout().await;
        }

        let _ = self.inner.event_tx.send(StatusEvent::Disconnected);
        debug!("disconnected");
    }

    /// Identity of the discovered appliance, once connected.
    pub async fn device(&self) -> Option<DeviceIdentity> {
        self.inner
            .state
            .lock()
            .await
            .as_ref()
            .map(|c| c.device.clone())
    }

    /// The stored credentials, when registration has run.
    pub fn credentials(&self) -> Result<Option<StoredCredentials>, Error> {
        self.inner.store.load()
    }

    // ── Signed calls ─────────────────────────────────────────────────

    /// Perform one signed API call.
    ///
    /// GET when `body` is absent, POST when present; either way the
    /// request carries the session auth header. Rejected with
    /// [`Error::NotAuthorized`] before [`connect()`](Self::connect) has
    /// succeeded. Auth failures are surfaced, not retried: the session is
    /// re-validated against the login endpoint on the next call anyway,
    /// so callers simply retry.
    pub async fn call(
        &self,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<serde_json::Value, Error> {
        match body {
            Some(body) => self.post(path, body).await,
            None => self.get(path).await,
        }
    }

    /// Signed GET returning a typed payload.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let connected = self.connected().await?;
        let token = connected.session.ensure_session().await?;
        connected.http.get_authed(path, &token).await
    }

    /// Signed POST returning a typed payload.
    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T, Error>
    where
        T: DeserializeOwned,
        B: Serialize + Sync,
    {
        let connected = self.connected().await?;
        let token = connected.session.ensure_session().await?;
        connected.http.post_authed(path, &token, Some(body)).await
    }

    /// Open a session now instead of lazily on the first signed call.
    pub async fn open_session(&self) -> Result<(), Error> {
        let connected = self.connected().await?;
        connected.session.ensure_session().await?;
        Ok(())
    }

    /// Close the current session without dropping connection state.
    pub async fn logout(&self) {
        if let Some(connected) = self.inner.state.lock().await.as_ref().cloned() {
            connected.session.logout().await;
        }
    }

    /// Permissions granted to the current session, if one is open.
    pub async fn permissions(&self) -> Option<std::collections::HashMap<String, bool>> {
        let connected = self.inner.state.lock().await.as_ref().cloned()?;
        connected.session.permissions().await
    }

    async fn connected(&self) -> Result<Arc<Connected>, Error> {
        self.inner
            .state
            .lock()
            .await
            .as_ref()
            .cloned()
            .ok_or(Error::NotAuthorized)
    }
}
