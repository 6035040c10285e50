// Device discovery.
//
// The appliance exposes an unauthenticated, un-enveloped version endpoint
// at its root. Discovery reads it once, validates the identity fields,
// and derives the versioned API base every later call is issued against.

use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::error::Error;

/// Raw payload of the public `/api_version` endpoint.
///
/// Served bare (no `{ success, result }` envelope) since it predates any
/// session. Unknown fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct VersionInfo {
    pub uid: Option<String>,
    pub device_name: Option<String>,
    pub device_type: Option<String>,
    pub api_base_url: String,
    pub api_version: String,
}

/// Identity of one appliance, fixed after discovery.
///
/// Rediscovery (a fresh [`discover`] call) restarts the whole flow; the
/// struct itself is never mutated.
#[derive(Debug, Clone)]
pub struct DeviceIdentity {
    pub uid: String,
    pub device_name: String,
    pub device_type: String,
    /// Versioned API base, e.g. `http://192.168.1.254:80/api/v8`.
    pub base_url: Url,
}

/// Query the version endpoint and build the device identity.
///
/// `root_url` is the appliance root (e.g. `http://mafreebox.freebox.fr`).
/// A missing `uid` is treated as "not the appliance we expect" and fails
/// discovery even when the endpoint answered.
pub async fn discover(http: &reqwest::Client, root_url: &Url) -> Result<DeviceIdentity, Error> {
    let url = root_url.join("api_version").map_err(Error::InvalidUrl)?;
    debug!("discovering appliance at {}", url);

    let resp = http.get(url).send().await.map_err(|e| Error::Discovery {
        message: format!("version endpoint unreachable: {e}"),
    })?;

    let status = resp.status();
    if !status.is_success() {
        return Err(Error::Discovery {
            message: format!("version endpoint returned HTTP {status}"),
        });
    }

    let info: VersionInfo = resp.json().await.map_err(|e| Error::Discovery {
        message: format!("malformed version response: {e}"),
    })?;

    let Some(uid) = info.uid else {
        return Err(Error::Discovery {
            message: "version response is missing 'uid'".into(),
        });
    };

    let base = derive_api_base(root_url, &info.api_base_url, &info.api_version)?;
    let base_url = Url::parse(&base).map_err(Error::InvalidUrl)?;
    debug!(%uid, %base_url, "appliance discovered");

    Ok(DeviceIdentity {
        uid,
        device_name: info.device_name.unwrap_or_default(),
        device_type: info.device_type.unwrap_or_default(),
        base_url,
    })
}

/// Derive the versioned API base from the discovery response:
/// `scheme://host:port` + `api_base_url` + `v` + major(api_version).
///
/// Only the major component of the reported version participates -- the
/// appliance guarantees compatibility within a major. Returned as a
/// string so the port stays explicit even when it is the scheme default
/// (`Url` would normalize `:80` away).
pub fn derive_api_base(
    root_url: &Url,
    api_base_url: &str,
    api_version: &str,
) -> Result<String, Error> {
    let major = api_version
        .split('.')
        .next()
        .filter(|m| !m.is_empty() && m.chars().all(|c| c.is_ascii_digit()))
        .ok_or_else(|| Error::Discovery {
            message: format!("unparseable api_version '{api_version}'"),
        })?;

    let host = root_url.host_str().ok_or_else(|| Error::Discovery {
        message: format!("root URL '{root_url}' has no host"),
    })?;
    let scheme = root_url.scheme();
    let base = api_base_url.trim_end_matches('/');

    Ok(match root_url.port_or_known_default() {
        Some(port) => format!("{scheme}://{host}:{port}{base}/v{major}"),
        None => format!("{scheme}://{host}{base}/v{major}"),
    })
}
