use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use chrono::{DateTime, SecondsFormat, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

use crate::config::ApiConfig;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "DYDX-SIGNATURE";
pub const API_KEY_HEADER: &str = "DYDX-API-KEY";
pub const TIMESTAMP_HEADER: &str = "DYDX-TIMESTAMP";
pub const PASSPHRASE_HEADER: &str = "DYDX-PASSPHRASE";
pub const ETHEREUM_ADDRESS_HEADER: &str = "DYDX-ETHEREUM-ADDRESS";

#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("API secret is not valid base64url")]
    SecretEncoding(#[source] base64::DecodeError),
    #[error("invalid HMAC key: {0}")]
    HmacKey(String),
}

/// API credentials with the decoded HMAC secret ready for signing.
///
/// Decoding happens once, so a malformed secret fails before any request.
#[derive(Clone)]
pub struct ApiCredentials {
    api_key: String,
    passphrase: String,
    hmac_template: HmacSha256,
}

impl fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("api_key", &self.api_key)
            .finish_non_exhaustive()
    }
}

impl ApiCredentials {
    pub fn new(api_key: &str, secret: &str, passphrase: &str) -> Result<Self, CredentialsError> {
        let decoded = URL_SAFE
            .decode(secret.trim())
            .map_err(CredentialsError::SecretEncoding)?;
        let hmac_template = HmacSha256::new_from_slice(&decoded)
            .map_err(|e| CredentialsError::HmacKey(e.to_string()))?;
        Ok(Self {
            api_key: api_key.to_string(),
            passphrase: passphrase.to_string(),
            hmac_template,
        })
    }

    pub fn from_config(config: &ApiConfig) -> Result<Self, CredentialsError> {
        Self::new(&config.key, &config.secret, &config.passphrase)
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn passphrase(&self) -> &str {
        &self.passphrase
    }

    /// Sign a private request.
    ///
    /// The message is `timestamp + METHOD + request_path + body`, where `body`
    /// is the exact compact JSON string sent on the wire (empty when absent).
    pub fn sign(
        &self,
        request_path: &str,
        method: &str,
        iso_timestamp: &str,
        body: Option<&str>,
    ) -> String {
        let mut mac = self.hmac_template.clone();
        mac.update(iso_timestamp.as_bytes());
        mac.update(method.to_uppercase().as_bytes());
        mac.update(request_path.as_bytes());
        if let Some(body) = body {
            mac.update(body.as_bytes());
        }
        URL_SAFE.encode(mac.finalize().into_bytes())
    }
}

/// ISO-8601 UTC timestamp with millisecond precision, e.g. `2024-01-31T12:00:00.000Z`.
pub fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn now_iso() -> String {
    iso_timestamp(Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    // base64url("dydx-test-secret-0123456789")
    const SECRET: &str = "ZHlkeC10ZXN0LXNlY3JldC0wMTIzNDU2Nzg5";
    const TS: &str = "2024-01-31T12:00:00.000Z";

    fn creds() -> ApiCredentials {
        ApiCredentials::new("key", SECRET, "pass").unwrap()
    }

    #[test]
    fn signature_is_deterministic() {
        let a = creds().sign("/v3/accounts", "GET", TS, None);
        let b = creds().sign("/v3/accounts", "GET", TS, None);
        assert_eq!(a, b);

        let decoded = URL_SAFE.decode(&a).unwrap();
        assert_eq!(decoded.len(), 32);
    }

    #[test]
    fn signature_matches_manual_hmac() {
        let mut mac = HmacSha256::new_from_slice(b"dydx-test-secret-0123456789").unwrap();
        mac.update(format!("{TS}POST/v3/withdrawals{{\"amount\":\"10\"}}").as_bytes());
        let expected = URL_SAFE.encode(mac.finalize().into_bytes());

        let actual = creds().sign("/v3/withdrawals", "post", TS, Some(r#"{"amount":"10"}"#));
        assert_eq!(actual, expected);
    }

    #[test]
    fn signature_changes_with_timestamp_and_body() {
        let c = creds();
        let base = c.sign("/v3/withdrawals", "POST", TS, Some(r#"{"amount":"10"}"#));
        let later = c.sign(
            "/v3/withdrawals",
            "POST",
            "2024-01-31T12:00:00.001Z",
            Some(r#"{"amount":"10"}"#),
        );
        let other_body = c.sign("/v3/withdrawals", "POST", TS, Some(r#"{"amount":"11"}"#));
        assert_ne!(base, later);
        assert_ne!(base, other_body);
    }

    #[test]
    fn missing_body_signs_like_empty_string() {
        let c = creds();
        assert_eq!(
            c.sign("/v3/transfers", "GET", TS, None),
            c.sign("/v3/transfers", "GET", TS, Some(""))
        );
    }

    #[test]
    fn malformed_secret_fails_fast() {
        let err = ApiCredentials::new("key", "not base64!!", "pass").unwrap_err();
        assert!(matches!(err, CredentialsError::SecretEncoding(_)));
    }

    #[test]
    fn debug_hides_secret_material() {
        let rendered = format!("{:?}", creds());
        assert!(rendered.contains("key"));
        assert!(!rendered.contains("pass"));
    }

    #[test]
    fn iso_timestamp_uses_millis_and_z() {
        let at = Utc.with_ymd_and_hms(2024, 1, 31, 12, 0, 0).unwrap();
        assert_eq!(iso_timestamp(at), TS);
    }
}
