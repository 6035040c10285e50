// HTTP transport for the appliance API.
//
// Wraps `reqwest::Client` with base-URL construction, response-envelope
// unwrapping, and the session auth header. The registrar and session
// manager consume this as a plain "send request, get decoded result"
// capability and never touch reqwest directly.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;

/// Header carrying the session token on authenticated calls.
pub const AUTH_HEADER: &str = "X-Fbx-App-Auth";

/// TLS verification mode.
#[derive(Debug, Clone, Default)]
pub enum TlsMode {
    /// Use the system certificate store.
    #[default]
    System,
    /// Accept any certificate (appliances often serve self-signed certs).
    DangerAcceptInvalid,
}

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub tls: TlsMode,
    pub timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls: TlsMode::System,
            timeout: Duration::from_secs(10),
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("fbxctl/", env!("CARGO_PKG_VERSION")));

        if matches!(self.tls, TlsMode::DangerAcceptInvalid) {
            builder = builder.danger_accept_invalid_certs(true);
        }

        builder.build().map_err(Error::Transport)
    }
}

/// Response envelope used by every versioned API endpoint:
/// `{ success, result }` on success, `{ success: false, msg, error_code }`
/// on refusal. Endpoints with no payload omit `result` entirely.
#[derive(serde::Deserialize)]
struct Envelope {
    success: Option<bool>,
    result: Option<serde_json::Value>,
    msg: Option<String>,
    error_code: Option<String>,
}

/// HTTP client bound to a discovered, versioned API base URL.
///
/// All methods return the unwrapped `result` payload -- the envelope is
/// stripped before the caller sees it.
pub struct HttpClient {
    http: reqwest::Client,
    base_url: Url,
}

impl HttpClient {
    /// Create a client from a pre-built `reqwest::Client` and the derived
    /// API base (e.g. `http://192.168.1.254:80/api/v8`).
    pub fn new(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    /// The versioned API base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build a full URL for an API path relative to the versioned base.
    fn endpoint(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Url::parse(&format!("{base}/{path}")).map_err(Error::InvalidUrl)
    }

    // ── Unauthenticated requests ─────────────────────────────────────

    /// Send a GET request and unwrap the envelope.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let url = self.endpoint(path)?;
        debug!("GET {}", url);

        let resp = self.http.get(url).send().await.map_err(Error::Transport)?;
        parse_envelope(resp).await
    }

    /// Send a POST request with a JSON body and unwrap the envelope.
    pub async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &(impl Serialize + Sync),
    ) -> Result<T, Error> {
        let url = self.endpoint(path)?;
        debug!("POST {}", url);

        let resp = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(Error::Transport)?;
        parse_envelope(resp).await
    }

    // ── Authenticated requests ───────────────────────────────────────

    /// Send a GET request carrying the session token header.
    pub async fn get_authed<T: DeserializeOwned>(
        &self,
        path: &str,
        token: &SecretString,
    ) -> Result<T, Error> {
        let url = self.endpoint(path)?;
        debug!("GET {} (authed)", url);

        let resp = self
            .http
            .get(url)
            .header(AUTH_HEADER, token.expose_secret())
            .send()
            .await
            .map_err(Error::Transport)?;
        parse_envelope(resp).await
    }

    /// Send a POST request carrying the session token header.
    ///
    /// `body: None` sends an empty POST (logout takes no payload).
    pub async fn post_authed<T, B>(
        &self,
        path: &str,
        token: &SecretString,
        body: Option<&B>,
    ) -> Result<T, Error>
    where
        T: DeserializeOwned,
        B: Serialize + Sync,
    {
        let url = self.endpoint(path)?;
        debug!("POST {} (authed)", url);

        let mut builder = self.http.post(url).header(AUTH_HEADER, token.expose_secret());
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let resp = builder.send().await.map_err(Error::Transport)?;
        parse_envelope(resp).await
    }
}

/// Parse the `{ success, result }` envelope, returning `result` on success
/// or an [`Error::Api`] when `success` is false or the status is non-2xx.
///
/// The appliance reports refusals both ways: auth failures arrive as
/// HTTP 403 with an enveloped `error_code`, some validation failures as
/// HTTP 200 with `success: false`.
async fn parse_envelope<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
    let status = resp.status();
    let body = resp.text().await.map_err(Error::Transport)?;

    let envelope: Envelope = serde_json::from_str(&body).map_err(|e| {
        if status.is_success() {
            let preview: String = body.chars().take(200).collect();
            Error::Deserialization {
                message: format!("{e} (body preview: {preview:?})"),
                body: body.clone(),
            }
        } else {
            Error::Api {
                message: format!("HTTP {status}"),
                code: None,
                status: Some(status.as_u16()),
            }
        }
    })?;

    if !status.is_success() || envelope.success == Some(false) {
        return Err(Error::Api {
            message: envelope
                .msg
                .unwrap_or_else(|| format!("request refused (HTTP {status})")),
            code: envelope.error_code,
            status: Some(status.as_u16()),
        });
    }

    let result = envelope.result.unwrap_or(serde_json::Value::Null);
    serde_json::from_value(result).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body,
    })
}
