// Challenge-response signing for session login.
//
// The open-session password is a keyed hash of the server-issued
// challenge: HMAC-SHA1 keyed by the long-lived app token, hex-encoded.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// Compute the open-session password for a login challenge.
///
/// Deterministic: the same (token, challenge) pair always yields the same
/// signature. The app token is the key, the challenge the message.
pub fn session_password(app_token: &SecretString, challenge: &str) -> String {
    let mut mac = HmacSha1::new_from_slice(app_token.expose_secret().as_bytes())
        .expect("HMAC accepts keys of any size");
    mac.update(challenge.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}
