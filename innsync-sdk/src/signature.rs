//! Webhook signature algorithm shared by both directions of channel sync.
//!
//! Inbound OTA webhooks and outbound sync jobs carry an HMAC-SHA256
//! signature over the **exact raw request body bytes**, base64-encoded in
//! a header:
//!
//! ```text
//! X-Innsync-Signature: {base64_signature}
//! ```
//!
//! The body must never be re-serialized before verification; any byte
//! difference invalidates the signature.

/// Header name for the HMAC signature.
pub const SIGNATURE_HEADER: &str = "X-Innsync-Signature";

/// Errors produced by signature operations.
#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("missing signature header")]
    MissingHeader,
    #[error("invalid base64 encoding")]
    InvalidBase64,
    #[error("invalid signature")]
    SignatureMismatch,
}

impl From<ring::error::Unspecified> for SignatureError {
    fn from(_: ring::error::Unspecified) -> Self {
        Self::SignatureMismatch
    }
}

/// Sign a raw body with HMAC-SHA256 and return the base64 header value.
pub fn sign_body(body: &[u8], key: &[u8]) -> String {
    let signature = ring::hmac::sign(&ring::hmac::Key::new(ring::hmac::HMAC_SHA256, key), body);
    fast32::base64::RFC4648_NOPAD.encode(signature.as_ref())
}

/// Verify a base64 signature header value against the raw body bytes.
///
/// The underlying `ring::hmac::verify` comparison is constant-time.
pub fn verify_body(body: &[u8], header_value: &str, key: &[u8]) -> Result<(), SignatureError> {
    let signature = fast32::base64::RFC4648_NOPAD
        .decode_str(header_value)
        .map_err(|_| SignatureError::InvalidBase64)?;
    ring::hmac::verify(
        &ring::hmac::Key::new(ring::hmac::HMAC_SHA256, key),
        body,
        &signature,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_verify_roundtrip() {
        let body = br#"{"event":"new_reservation","external_ref":"bcom-991"}"#;
        let header = sign_body(body, b"channel-secret");
        assert!(verify_body(body, &header, b"channel-secret").is_ok());
    }

    #[test]
    fn flipped_byte_is_rejected() {
        let body = br#"{"event":"new_reservation","external_ref":"bcom-991"}"#.to_vec();
        let header = sign_body(&body, b"channel-secret");

        let mut tampered = body.clone();
        tampered[10] ^= 0x01;
        assert!(matches!(
            verify_body(&tampered, &header, b"channel-secret"),
            Err(SignatureError::SignatureMismatch)
        ));
    }

    #[test]
    fn wrong_key_is_rejected() {
        let body = b"payload";
        let header = sign_body(body, b"secret-a");
        assert!(verify_body(body, &header, b"secret-b").is_err());
    }

    #[test]
    fn reserialized_body_does_not_verify() {
        // Same JSON value, different byte representation.
        let original = br#"{"a":1,"b":2}"#;
        let reserialized = br#"{ "a": 1, "b": 2 }"#;
        let header = sign_body(original, b"k");
        assert!(verify_body(reserialized, &header, b"k").is_err());
    }

    #[test]
    fn garbage_header_is_invalid_base64() {
        assert!(matches!(
            verify_body(b"body", "!!not-base64!!", b"k"),
            Err(SignatureError::InvalidBase64)
        ));
    }
}
