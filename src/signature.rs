//! Inbound webhook signature verification.
//!
//! The sender transmits three headers:
//!
//! - `digest`: lowercase hex SHA-1 of the raw body
//! - `signature-input`: `fr1=` followed by the signature parameters
//! - `signature`: `fr1=:<hex HMAC-SHA256>:`
//!
//! The HMAC is computed with the shared secret over the base string
//! `"digest": "<digest>"\n@signature-params: <params>`.

use crate::audit;
use crate::errors::SignatureError;
use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use sha1::{Digest, Sha1};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const INPUT_PREFIX: &str = "fr1=";
const SIGNATURE_PREFIX: &str = "fr1=:";
const SIGNATURE_SUFFIX: &str = ":";

/// The three signature headers, as received.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignatureHeaders {
    pub digest: Option<String>,
    pub signature_input: Option<String>,
    pub signature: Option<String>,
}

impl SignatureHeaders {
    pub fn from_header_map(headers: &HeaderMap) -> Self {
        let get = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        Self {
            digest: get("digest"),
            signature_input: get("signature-input"),
            signature: get("signature"),
        }
    }
}

/// Successful verification, kept for the audit trail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedSignature {
    pub digest: String,
    pub signature: String,
}

#[derive(Clone)]
pub struct SignatureVerifier {
    secret: Option<String>,
}

impl SignatureVerifier {
    pub fn new(secret: Option<String>) -> Self {
        Self {
            secret: secret.filter(|s| !s.is_empty()),
        }
    }

    /// Verifies `body` against the signature headers.
    pub fn verify(
        &self,
        body: &[u8],
        headers: &SignatureHeaders,
    ) -> Result<VerifiedSignature, SignatureError> {
        let Some(secret) = self.secret.as_deref() else {
            audit::signature_validation_failed(SignatureError::MissingSecret, None, None);
            return Err(SignatureError::MissingSecret);
        };

        let (Some(digest), Some(signature_input), Some(signature)) = (
            present(&headers.digest),
            present(&headers.signature_input),
            present(&headers.signature),
        ) else {
            audit::signature_validation_failed(SignatureError::MissingHeaders, None, None);
            return Err(SignatureError::MissingHeaders);
        };

        let expected_digest = body_digest(body);
        if expected_digest != digest {
            audit::signature_validation_failed(
                SignatureError::DigestMismatch,
                Some((expected_digest.as_str(), digest)),
                None,
            );
            return Err(SignatureError::DigestMismatch);
        }

        let params = signature_input.replacen(INPUT_PREFIX, "", 1);
        let mac = signature_mac(secret, digest, &params)?;
        let received_signature = strip_signature(signature);

        let matches = decode_signature(received_signature)
            .is_some_and(|received| mac.clone().verify_slice(&received).is_ok());
        if !matches {
            let expected_signature = hex::encode(mac.finalize().into_bytes());
            audit::signature_validation_failed(
                SignatureError::InvalidSignature,
                Some((expected_digest.as_str(), digest)),
                Some((expected_signature.as_str(), received_signature)),
            );
            return Err(SignatureError::InvalidSignature);
        }

        audit::signature_validated(digest, received_signature);
        Ok(VerifiedSignature {
            digest: digest.to_string(),
            signature: received_signature.to_string(),
        })
    }
}

/// Produces headers that [`SignatureVerifier::verify`] accepts for `body`.
///
/// Used to generate fixtures for integration testing against a deployment.
pub fn sign(body: &[u8], secret: &str, created: i64) -> SignatureHeaders {
    let digest = body_digest(body);
    let params = format!("(\"digest\");created={}", created);
    let signature = signature_mac(secret, &digest, &params)
        .ok()
        .map(|mac| hex::encode(mac.finalize().into_bytes()))
        .map(|signature| format!("{}{}{}", SIGNATURE_PREFIX, signature, SIGNATURE_SUFFIX));
    SignatureHeaders {
        digest: Some(digest),
        signature_input: Some(format!("{}{}", INPUT_PREFIX, params)),
        signature,
    }
}

/// Lowercase hex SHA-1 of the body.
pub fn body_digest(body: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(body);
    hex::encode(hasher.finalize())
}

pub fn signature_base(digest: &str, params: &str) -> String {
    format!("\"digest\": \"{}\"\n@signature-params: {}", digest, params)
}

/// HMAC-SHA256 keyed with `secret`, fed with the signature base string.
fn signature_mac(secret: &str, digest: &str, params: &str) -> Result<HmacSha256, SignatureError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| SignatureError::MissingSecret)?;
    mac.update(signature_base(digest, params).as_bytes());
    Ok(mac)
}

/// Lowercase hex only; anything else cannot match what the sender emits.
fn decode_signature(signature: &str) -> Option<Vec<u8>> {
    signature
        .bytes()
        .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
        .then(|| hex::decode(signature).ok())
        .flatten()
}

fn strip_signature(signature: &str) -> &str {
    let signature = signature.strip_prefix(SIGNATURE_PREFIX).unwrap_or(signature);
    signature.strip_suffix(SIGNATURE_SUFFIX).unwrap_or(signature)
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test_secret_for_local_dev";

    #[test]
    fn test_signed_body_verifies() {
        let body = br#"{"id":"evt_1","event":"PAYMENT.CREATED"}"#;
        let headers = sign(body, SECRET, 1_700_000_000);

        let verified = SignatureVerifier::new(Some(SECRET.to_string()))
            .verify(body, &headers)
            .unwrap();
        assert_eq!(verified.digest, body_digest(body));
    }

    #[test]
    fn test_known_digest() {
        // sha1("abc")
        assert_eq!(body_digest(b"abc"), "a9993e364706816aba3e25717850c26c9cd0d89d");
    }

    #[test]
    fn test_signature_base_format() {
        assert_eq!(
            signature_base("abc", "(\"digest\");created=1"),
            "\"digest\": \"abc\"\n@signature-params: (\"digest\");created=1"
        );
    }

    #[test]
    fn test_missing_secret_is_configuration_error() {
        let body = b"{}";
        let headers = sign(body, SECRET, 1);
        assert_eq!(
            SignatureVerifier::new(None).verify(body, &headers),
            Err(SignatureError::MissingSecret)
        );
        assert_eq!(
            SignatureVerifier::new(Some(String::new())).verify(body, &headers),
            Err(SignatureError::MissingSecret)
        );
    }

    #[test]
    fn test_missing_headers() {
        let body = b"{}";
        let mut headers = sign(body, SECRET, 1);
        headers.signature_input = None;
        assert_eq!(
            SignatureVerifier::new(Some(SECRET.to_string())).verify(body, &headers),
            Err(SignatureError::MissingHeaders)
        );
    }

    #[test]
    fn test_digest_comparison_is_case_sensitive() {
        let body = b"{\"a\":1}";
        let mut headers = sign(body, SECRET, 1);
        headers.digest = headers.digest.map(|d| d.to_uppercase());
        assert_eq!(
            SignatureVerifier::new(Some(SECRET.to_string())).verify(body, &headers),
            Err(SignatureError::DigestMismatch)
        );
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let body = b"{}";
        let headers = sign(body, "other-secret", 1);
        assert_eq!(
            SignatureVerifier::new(Some(SECRET.to_string())).verify(body, &headers),
            Err(SignatureError::InvalidSignature)
        );
    }

    #[test]
    fn test_uppercase_signature_rejected() {
        let body = b"{}";
        let mut headers = sign(body, SECRET, 1);
        headers.signature = headers.signature.map(|s| s.to_uppercase().replace("FR1=", "fr1="));
        assert_eq!(
            SignatureVerifier::new(Some(SECRET.to_string())).verify(body, &headers),
            Err(SignatureError::InvalidSignature)
        );
    }

    #[test]
    fn test_truncated_or_non_hex_signature_rejected() {
        let body = b"{}";
        let verifier = SignatureVerifier::new(Some(SECRET.to_string()));
        let signed = sign(body, SECRET, 1);
        let full = signed.signature.clone().unwrap();

        let mut truncated = signed.clone();
        truncated.signature = Some(format!("{}:", &full[..full.len() - 3]));
        assert_eq!(verifier.verify(body, &truncated), Err(SignatureError::InvalidSignature));

        let mut garbage = signed;
        garbage.signature = Some("fr1=:not-hex:".to_string());
        assert_eq!(verifier.verify(body, &garbage), Err(SignatureError::InvalidSignature));
    }

    #[test]
    fn test_decode_signature() {
        assert_eq!(decode_signature("0aff"), Some(vec![0x0a, 0xff]));
        assert_eq!(decode_signature("0AFF"), None);
        assert_eq!(decode_signature("abc"), None);
    }

    #[test]
    fn test_headers_from_map() {
        let mut map = HeaderMap::new();
        map.insert("digest", "abc".parse().unwrap());
        map.insert("signature", "fr1=:def:".parse().unwrap());
        let headers = SignatureHeaders::from_header_map(&map);
        assert_eq!(headers.digest.as_deref(), Some("abc"));
        assert_eq!(headers.signature_input, None);
        assert_eq!(strip_signature(headers.signature.as_deref().unwrap()), "def");
    }
}
