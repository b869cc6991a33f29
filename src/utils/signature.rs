//! Svix-style webhook signatures, as used by Clerk.
//!
//! The signed content is `{msg_id}.{timestamp}.{raw body}`, authenticated with
//! HMAC-SHA256 under the base64 key carried by a `whsec_` secret. The signature
//! header holds one or more space-separated `v1,<base64>` entries.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::{Error, Result};
use crate::utils::time;

type HmacSha256 = Hmac<Sha256>;

pub const MESSAGE_ID_HEADER: &str = "svix-id";
pub const TIMESTAMP_HEADER: &str = "svix-timestamp";
pub const SIGNATURE_HEADER: &str = "svix-signature";

const SECRET_PREFIX: &str = "whsec_";
const SIGNATURE_VERSION: &str = "v1";
pub const TIMESTAMP_TOLERANCE_SECS: i64 = 5 * 60;

#[derive(Debug, Clone)]
pub struct WebhookHeaders {
    pub message_id: String,
    pub timestamp: String,
    pub signature: String,
}

impl WebhookHeaders {
    pub fn from_header_map(headers: &axum::http::HeaderMap) -> Result<Self> {
        Ok(Self {
            message_id: required_header(headers, MESSAGE_ID_HEADER)?,
            timestamp: required_header(headers, TIMESTAMP_HEADER)?,
            signature: required_header(headers, SIGNATURE_HEADER)?,
        })
    }
}

fn required_header(headers: &axum::http::HeaderMap, name: &str) -> Result<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| Error::Verification(format!("missing {} header", name)))
}

#[derive(Clone)]
pub struct WebhookVerifier {
    key: Vec<u8>,
}

// Never print key material.
impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier").finish_non_exhaustive()
    }
}

impl WebhookVerifier {
    pub fn new(secret: &str) -> Result<Self> {
        let encoded = secret.trim();
        let encoded = encoded.strip_prefix(SECRET_PREFIX).unwrap_or(encoded);
        let key = STANDARD
            .decode(encoded)
            .map_err(|_| Error::Config("webhook secret is not valid base64".to_string()))?;
        if key.is_empty() {
            return Err(Error::Config("webhook secret is empty".to_string()));
        }
        Ok(Self { key })
    }

    pub fn verify(&self, headers: &WebhookHeaders, body: &str) -> Result<()> {
        self.verify_at(headers, body, time::now())
    }

    pub fn verify_at(&self, headers: &WebhookHeaders, body: &str, now: DateTime<Utc>) -> Result<()> {
        let timestamp = time::from_unix_seconds(&headers.timestamp)
            .ok_or_else(|| Error::Verification("invalid timestamp header".to_string()))?;

        let skew = now.timestamp() - timestamp.timestamp();
        if skew > TIMESTAMP_TOLERANCE_SECS {
            return Err(Error::Verification("message timestamp too old".to_string()));
        }
        if skew < -TIMESTAMP_TOLERANCE_SECS {
            return Err(Error::Verification("message timestamp too new".to_string()));
        }

        let expected = self.compute(&headers.message_id, &headers.timestamp, body)?;

        let matched = headers
            .signature
            .split_whitespace()
            .filter_map(|entry| entry.split_once(','))
            .filter(|(version, _)| *version == SIGNATURE_VERSION)
            .filter_map(|(_, sig)| STANDARD.decode(sig).ok())
            .any(|candidate| bool::from(candidate.ct_eq(&expected)));

        if matched {
            Ok(())
        } else {
            Err(Error::Verification("no matching signature found".to_string()))
        }
    }

    /// Returns a header-ready `v1,<base64>` signature for the given message.
    pub fn sign(&self, message_id: &str, timestamp: &str, body: &str) -> Result<String> {
        let mac = self.compute(message_id, timestamp, body)?;
        Ok(format!("{},{}", SIGNATURE_VERSION, STANDARD.encode(mac)))
    }

    fn compute(&self, message_id: &str, timestamp: &str, body: &str) -> Result<Vec<u8>> {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|_| Error::Internal("failed to initialize HMAC".to_string()))?;
        mac.update(message_id.as_bytes());
        mac.update(b".");
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(body.as_bytes());
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SECRET: &str = "whsec_MfKQ9r8GKYqrTwjUPD8ILPZIo2LaLaSw";
    const BODY: &str = r#"{"type":"user.created","data":{"id":"ext_1"}}"#;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().unwrap()
    }

    fn signed_headers(verifier: &WebhookVerifier, ts: i64, body: &str) -> WebhookHeaders {
        let timestamp = ts.to_string();
        let signature = verifier.sign("msg_1", &timestamp, body).unwrap();
        WebhookHeaders {
            message_id: "msg_1".into(),
            timestamp,
            signature,
        }
    }

    #[test]
    fn accepts_valid_signature() {
        let verifier = WebhookVerifier::new(SECRET).unwrap();
        let headers = signed_headers(&verifier, 1_700_000_000, BODY);
        assert!(verifier.verify_at(&headers, BODY, at(1_700_000_010)).is_ok());
    }

    #[test]
    fn accepts_secret_without_prefix() {
        let prefixed = WebhookVerifier::new(SECRET).unwrap();
        let bare = WebhookVerifier::new(SECRET.trim_start_matches("whsec_")).unwrap();
        let headers = signed_headers(&prefixed, 1_700_000_000, BODY);
        assert!(bare.verify_at(&headers, BODY, at(1_700_000_000)).is_ok());
    }

    #[test]
    fn rejects_tampered_body() {
        let verifier = WebhookVerifier::new(SECRET).unwrap();
        let headers = signed_headers(&verifier, 1_700_000_000, BODY);
        let tampered = BODY.replace("ext_1", "ext_2");
        let err = verifier
            .verify_at(&headers, &tampered, at(1_700_000_000))
            .unwrap_err();
        assert!(matches!(err, Error::Verification(_)));
    }

    #[test]
    fn rejects_wrong_secret() {
        let signer = WebhookVerifier::new(SECRET).unwrap();
        let other = WebhookVerifier::new("whsec_c2VjcmV0LXRoYXQtaXMtbm90LXRoZS1zYW1l").unwrap();
        let headers = signed_headers(&signer, 1_700_000_000, BODY);
        assert!(matches!(
            other.verify_at(&headers, BODY, at(1_700_000_000)),
            Err(Error::Verification(_))
        ));
    }

    #[test]
    fn rejects_timestamps_outside_tolerance() {
        let verifier = WebhookVerifier::new(SECRET).unwrap();
        let headers = signed_headers(&verifier, 1_700_000_000, BODY);

        let too_old = verifier.verify_at(&headers, BODY, at(1_700_000_000 + TIMESTAMP_TOLERANCE_SECS + 1));
        assert!(matches!(too_old, Err(Error::Verification(msg)) if msg.contains("too old")));

        let too_new = verifier.verify_at(&headers, BODY, at(1_700_000_000 - TIMESTAMP_TOLERANCE_SECS - 1));
        assert!(matches!(too_new, Err(Error::Verification(msg)) if msg.contains("too new")));

        let edge = verifier.verify_at(&headers, BODY, at(1_700_000_000 + TIMESTAMP_TOLERANCE_SECS));
        assert!(edge.is_ok());
    }

    #[test]
    fn timestamp_is_part_of_signed_content() {
        let verifier = WebhookVerifier::new(SECRET).unwrap();
        let mut headers = signed_headers(&verifier, 1_700_000_000, BODY);
        headers.timestamp = "1700000001".into();
        assert!(verifier.verify_at(&headers, BODY, at(1_700_000_000)).is_err());
    }

    #[test]
    fn any_listed_v1_signature_may_match() {
        let verifier = WebhookVerifier::new(SECRET).unwrap();
        let mut headers = signed_headers(&verifier, 1_700_000_000, BODY);
        headers.signature = format!("v1,Zm9vYmFy v2,whatever {}", headers.signature);
        assert!(verifier.verify_at(&headers, BODY, at(1_700_000_000)).is_ok());
    }

    #[test]
    fn ignores_unsupported_versions() {
        let verifier = WebhookVerifier::new(SECRET).unwrap();
        let mut headers = signed_headers(&verifier, 1_700_000_000, BODY);
        headers.signature = headers.signature.replacen("v1,", "v1a,", 1);
        assert!(verifier.verify_at(&headers, BODY, at(1_700_000_000)).is_err());
    }

    #[test]
    fn rejects_non_numeric_timestamp() {
        let verifier = WebhookVerifier::new(SECRET).unwrap();
        let mut headers = signed_headers(&verifier, 1_700_000_000, BODY);
        headers.timestamp = "yesterday".into();
        assert!(matches!(
            verifier.verify_at(&headers, BODY, at(1_700_000_000)),
            Err(Error::Verification(_))
        ));
    }

    #[test]
    fn malformed_secret_is_a_configuration_error() {
        assert!(matches!(
            WebhookVerifier::new("whsec_***not base64***"),
            Err(Error::Config(_))
        ));
        assert!(matches!(WebhookVerifier::new("whsec_"), Err(Error::Config(_))));
    }
}
