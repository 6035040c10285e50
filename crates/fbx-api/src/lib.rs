//! fbx-api: Async Rust client for the Freebox-style appliance local HTTP API.
//!
//! The crate owns the whole authorization lifecycle for one appliance:
//!
//! - **[`discovery`]** -- read the public version endpoint and derive the
//!   versioned API base URL.
//! - **[`Registrar`]** -- the one-time pairing handshake: request an app
//!   token, poll until the user confirms on the appliance.
//! - **[`SessionManager`]** -- challenge-response login
//!   (HMAC-SHA1 of the server challenge keyed by the app token) and
//!   best-effort logout.
//! - **[`FbxClient`]** -- the facade: connect once, then issue signed
//!   calls that transparently ensure a session.
//!
//! Credentials persist through the [`CredentialStore`] seam; the
//! keyring-backed implementation lives in `fbx-config`.

pub mod client;
pub mod discovery;
pub mod error;
pub mod events;
pub mod registrar;
pub mod session;
pub mod signing;
pub mod store;
pub mod transport;

// ── Primary re-exports ──────────────────────────────────────────────
pub use client::{ClientConfig, FbxClient};
pub use discovery::{DeviceIdentity, VersionInfo, derive_api_base, discover};
pub use error::Error;
pub use events::StatusEvent;
pub use registrar::{AppIdentity, PollPolicy, Registrar};
pub use session::{Session, SessionManager};
pub use signing::session_password;
pub use store::{AuthorizationStatus, CredentialStore, MemoryStore, StoredCredentials};
pub use transport::{AUTH_HEADER, HttpClient, TlsMode, TransportConfig};
