//! HMAC-SHA256 request signing.
//!
//! REST requests sign `timestamp + method + path + body`; the stream login
//! signs `timestamp + "websocket_login"`. Signatures are hex-encoded.
//! Secrets never appear in logs or error messages.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

fn hmac_hex(secret: &str, payload: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Sign a REST request.
pub fn sign_request(secret: &str, timestamp_ms: i64, method: &str, path: &str, body: &str) -> String {
    let payload = format!("{}{}{}{}", timestamp_ms, method, path, body);
    hmac_hex(secret, &payload)
}

/// Sign the websocket login payload.
pub fn sign_ws_login(secret: &str, timestamp_ms: i64) -> String {
    let payload = format!("{}websocket_login", timestamp_ms);
    hmac_hex(secret, &payload)
}
