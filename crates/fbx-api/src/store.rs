// Credential persistence seam.
//
// Granted app credentials are durable and must survive restarts; the
// actual secret storage belongs to the host platform. This module only
// defines the contract (plus an in-memory impl for tests and short-lived
// tools) -- the keyring-backed implementation lives in `fbx-config`.

use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;

use secrecy::SecretString;

use crate::error::Error;

/// Where an authorization request currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationStatus {
    /// No authorization has been requested yet.
    Unset,
    /// Waiting for the user to confirm on the appliance.
    Pending,
    /// The user granted access; credentials are durable.
    Granted,
    /// The confirmation window elapsed without a user action.
    Timeout,
    /// The user refused the request.
    Denied,
}

impl AuthorizationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unset => "unset",
            Self::Pending => "pending",
            Self::Granted => "granted",
            Self::Timeout => "timeout",
            Self::Denied => "denied",
        }
    }
}

impl fmt::Display for AuthorizationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthorizationStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unset" => Ok(Self::Unset),
            "pending" => Ok(Self::Pending),
            "granted" => Ok(Self::Granted),
            "timeout" => Ok(Self::Timeout),
            "denied" => Ok(Self::Denied),
            _ => Err(()),
        }
    }
}

/// Application credentials as handed to the credential store.
///
/// The app token is the only long-lived secret in the system: it is never
/// logged and never transmitted except as the HMAC key for the session
/// challenge. The track id is an opaque handle onto the authorization
/// request it came from.
#[derive(Clone)]
pub struct StoredCredentials {
    pub app_token: SecretString,
    pub track_id: String,
    pub status: AuthorizationStatus,
}

impl fmt::Debug for StoredCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredCredentials")
            .field("app_token", &"[REDACTED]")
            .field("track_id", &self.track_id)
            .field("status", &self.status)
            .finish()
    }
}

/// Storage contract for application credentials.
///
/// Implementations are keyed by a stable per-configuration identifier
/// chosen at construction time (one store instance per appliance profile).
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> Result<Option<StoredCredentials>, Error>;
    fn save(&self, credentials: &StoredCredentials) -> Result<(), Error>;
    fn clear(&self) -> Result<(), Error>;
}

/// Volatile in-memory store. Credentials are lost on drop -- suitable for
/// tests and one-shot tools that re-register every run.
#[derive(Default)]
pub struct MemoryStore {
    slot: Mutex<Option<StoredCredentials>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryStore {
    fn load(&self) -> Result<Option<StoredCredentials>, Error> {
        Ok(self.slot.lock().expect("store lock poisoned").clone())
    }

    fn save(&self, credentials: &StoredCredentials) -> Result<(), Error> {
        *self.slot.lock().expect("store lock poisoned") = Some(credentials.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), Error> {
        *self.slot.lock().expect("store lock poisoned") = None;
        Ok(())
    }
}
