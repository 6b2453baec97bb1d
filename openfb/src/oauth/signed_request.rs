//! Decoding of the provider's `signed_request` blob.
//!
//! The format is `<base64url(signature)>.<base64url(json payload)>`. Only the
//! algorithm tag is checked. The HMAC signature is NOT verified here (that
//! would need the app secret, which a client-side flow must not hold), so the
//! decoded payload is informational and must not be trusted for
//! authorization decisions on a server.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::Deserialize;

/// Algorithm tag the provider uses for signed requests.
pub const EXPECTED_ALGORITHM: &str = "HMAC-SHA256";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SignedRequestError {
    #[error("signed request is not of the form <signature>.<payload>")]
    Malformed,
    #[error("signed request is not valid base64url")]
    Base64,
    #[error("signed request payload is not valid JSON: {0}")]
    Json(String),
    #[error("unexpected signed request algorithm: {0}")]
    Algorithm(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SignedRequestPayload {
    pub algorithm: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub issued_at: Option<i64>,
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    /// Raw signature bytes, kept for callers that verify server side.
    pub signature: Vec<u8>,
    pub payload: SignedRequestPayload,
}

fn decode_segment(segment: &str) -> Result<Vec<u8>, SignedRequestError> {
    URL_SAFE_NO_PAD
        .decode(segment.trim_end_matches('='))
        .map_err(|_| SignedRequestError::Base64)
}

/// Decode `raw` and check its algorithm tag.
pub fn decode_signed_request(raw: &str) -> Result<SignedRequest, SignedRequestError> {
    let (sig, payload) = raw.split_once('.').ok_or(SignedRequestError::Malformed)?;
    if sig.is_empty() || payload.is_empty() || payload.contains('.') {
        return Err(SignedRequestError::Malformed);
    }

    let signature = decode_segment(sig)?;
    let payload_bytes = decode_segment(payload)?;
    let payload: SignedRequestPayload = serde_json::from_slice(&payload_bytes)
        .map_err(|e| SignedRequestError::Json(e.to_string()))?;

    if !payload.algorithm.eq_ignore_ascii_case(EXPECTED_ALGORITHM) {
        return Err(SignedRequestError::Algorithm(payload.algorithm));
    }

    Ok(SignedRequest { signature, payload })
}

fn string_or_number<'de, D>(d: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Option::<serde_json::Value>::deserialize(d)? {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[cfg(test)]
pub(crate) fn encode_for_test(payload: &serde_json::Value) -> String {
    let sig = URL_SAFE_NO_PAD.encode(b"not-a-real-signature");
    let body = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{}.{}", sig, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_user_id() {
        let raw = encode_for_test(&json!({
            "algorithm": "HMAC-SHA256",
            "user_id": "1000123",
            "issued_at": 1700000000,
            "code": "abc"
        }));
        let req = decode_signed_request(&raw).unwrap();
        assert_eq!(req.payload.user_id.as_deref(), Some("1000123"));
        assert_eq!(req.payload.issued_at, Some(1700000000));
        assert_eq!(req.signature, b"not-a-real-signature");
    }

    #[test]
    fn numeric_user_id_is_accepted() {
        let raw = encode_for_test(&json!({ "algorithm": "HMAC-SHA256", "user_id": 42 }));
        let req = decode_signed_request(&raw).unwrap();
        assert_eq!(req.payload.user_id.as_deref(), Some("42"));
    }

    #[test]
    fn wrong_algorithm_is_rejected() {
        let raw = encode_for_test(&json!({ "algorithm": "none", "user_id": "1" }));
        assert_eq!(
            decode_signed_request(&raw),
            Err(SignedRequestError::Algorithm("none".into()))
        );
    }

    #[test]
    fn padded_segments_are_tolerated() {
        let body = base64::engine::general_purpose::URL_SAFE
            .encode(json!({ "algorithm": "HMAC-SHA256", "user_id": "7" }).to_string());
        assert!(body.ends_with('='));
        let raw = format!("c2ln.{}", body);
        assert!(decode_signed_request(&raw).is_ok());
    }

    #[test]
    fn malformed_inputs() {
        assert_eq!(decode_signed_request("nodot"), Err(SignedRequestError::Malformed));
        assert_eq!(decode_signed_request(".abc"), Err(SignedRequestError::Malformed));
        assert_eq!(decode_signed_request("a.b.c"), Err(SignedRequestError::Malformed));
        assert_eq!(decode_signed_request("c2ln.!!!"), Err(SignedRequestError::Base64));
        assert!(matches!(
            decode_signed_request("c2ln.bm90LWpzb24"),
            Err(SignedRequestError::Json(_))
        ));
    }
}
