//! KSO-1 signature scheme.
//!
//! Two uses of HMAC-SHA256 with the application secret: signing the
//! WebSocket handshake (lowercase hex, sent in the authorization header)
//! and verifying per-event signatures (URL-safe unpadded base64, compared
//! in constant time).

use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use kso_core::constants;

type HmacSha256 = Hmac<Sha256>;

/// Computes and verifies KSO-1 signatures for one application identity.
#[derive(Debug, Clone)]
pub struct Signer {
    app_id: String,
    app_secret: String,
}

impl Signer {
    pub fn new(app_id: impl Into<String>, app_secret: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            app_secret: app_secret.into(),
        }
    }

    /// Build the handshake header pair for a request to `uri`.
    ///
    /// `uri` is the path plus query of the endpoint. Returns the values for
    /// `X-Kso-Date` and `X-Kso-Authorization`.
    pub fn handshake_headers(&self, uri: &str) -> (String, String) {
        let date = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        let authorization = self.authorization_value(uri, &date);
        (date, authorization)
    }

    /// The `X-Kso-Authorization` value for the given uri and date string.
    pub fn authorization_value(&self, uri: &str, date: &str) -> String {
        let signature = self.sign_handshake(uri, date);
        format!(
            "{} {}:{}",
            constants::SIGNATURE_SCHEME,
            self.app_id,
            signature
        )
    }

    /// HMAC-SHA256 over the canonical handshake string, lowercase hex.
    ///
    /// The canonical string concatenates the scheme, the method, the uri,
    /// an empty content type, the date, and an empty content hash.
    fn sign_handshake(&self, uri: &str, date: &str) -> String {
        let string_to_sign = format!("{}GET{uri}{date}", constants::SIGNATURE_SCHEME);
        hex::encode(hmac_sha256(
            self.app_secret.as_bytes(),
            string_to_sign.as_bytes(),
        ))
    }

    /// The expected signature of an inbound event, URL-safe unpadded base64.
    pub fn event_signature(&self, topic: &str, nonce: &str, time: i64, encrypted_data: &str) -> String {
        let content = format!("{}:{topic}:{nonce}:{time}:{encrypted_data}", self.app_id);
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(hmac_sha256(
            self.app_secret.as_bytes(),
            content.as_bytes(),
        ))
    }

    /// Verify an inbound event signature in constant time.
    ///
    /// Mismatched lengths compare as false without touching the contents.
    pub fn verify_event(
        &self,
        topic: &str,
        nonce: &str,
        time: i64,
        encrypted_data: &str,
        signature: &str,
    ) -> bool {
        let expected = self.event_signature(topic, nonce, time, encrypted_data);
        constant_time_eq(expected.as_bytes(), signature.as_bytes())
    }
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Constant-time byte comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
