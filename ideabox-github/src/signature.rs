//! Webhook signature handling
//!
//! GitHub signs each delivery with HMAC-SHA256 over the raw body and sends
//! `X-Hub-Signature-256: sha256=<hex>`.

use hmac::{Hmac, Mac};
use rand::distributions::Alphanumeric;
use rand::Rng;
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";
const SIGNATURE_PREFIX: &str = "sha256=";
const WEBHOOK_SECRET_LEN: usize = 40;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("webhook secret is empty")]
    EmptySecret,

    #[error("signature must start with 'sha256='")]
    MissingPrefix,

    #[error("signature is not valid hex")]
    BadHex,

    #[error("signature does not match payload")]
    Mismatch,
}

fn mac_for(secret: &[u8]) -> Result<HmacSha256, SignatureError> {
    if secret.is_empty() {
        return Err(SignatureError::EmptySecret);
    }
    HmacSha256::new_from_slice(secret).map_err(|_| SignatureError::EmptySecret)
}

/// Compute the header value GitHub would send for `body`.
pub fn sign(secret: &[u8], body: &[u8]) -> Result<String, SignatureError> {
    let mut mac = mac_for(secret)?;
    mac.update(body);
    Ok(format!(
        "{}{}",
        SIGNATURE_PREFIX,
        hex::encode(mac.finalize().into_bytes())
    ))
}

/// Check an `X-Hub-Signature-256` header against the raw body.
///
/// Comparison is constant-time (`Mac::verify_slice`).
pub fn verify_signature(secret: &[u8], body: &[u8], header: &str) -> Result<(), SignatureError> {
    let hex_digest = header
        .trim()
        .strip_prefix(SIGNATURE_PREFIX)
        .ok_or(SignatureError::MissingPrefix)?;
    let expected = hex::decode(hex_digest).map_err(|_| SignatureError::BadHex)?;

    let mut mac = mac_for(secret)?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| SignatureError::Mismatch)
}

/// Random secret registered with a repository webhook.
pub fn generate_webhook_secret() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(WEBHOOK_SECRET_LEN)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    // Test vector published in GitHub's "Validating webhook deliveries" docs
    const DOC_SECRET: &[u8] = b"It's a Secret to Everybody";
    const DOC_BODY: &[u8] = b"Hello, World!";
    const DOC_SIGNATURE: &str =
        "sha256=757107ea0eb2509fc211221cce984b8a37570b6d7586c22c46f4379c8b043e17";

    #[test]
    fn matches_documented_vector() {
        assert_eq!(sign(DOC_SECRET, DOC_BODY).unwrap(), DOC_SIGNATURE);
        assert_eq!(verify_signature(DOC_SECRET, DOC_BODY, DOC_SIGNATURE), Ok(()));
    }

    #[test]
    fn rejects_wrong_secret() {
        assert_eq!(
            verify_signature(b"another secret", DOC_BODY, DOC_SIGNATURE),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn rejects_tampered_body() {
        assert_eq!(
            verify_signature(DOC_SECRET, b"Hello, World?", DOC_SIGNATURE),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn rejects_sha1_style_header() {
        assert_eq!(
            verify_signature(DOC_SECRET, DOC_BODY, "sha1=0123abcd"),
            Err(SignatureError::MissingPrefix)
        );
    }

    #[test]
    fn rejects_non_hex() {
        assert_eq!(
            verify_signature(DOC_SECRET, DOC_BODY, "sha256=zzzz"),
            Err(SignatureError::BadHex)
        );
    }

    #[test]
    fn rejects_truncated_digest() {
        let truncated = &DOC_SIGNATURE[..DOC_SIGNATURE.len() - 2];
        assert_eq!(
            verify_signature(DOC_SECRET, DOC_BODY, truncated),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn empty_secret_never_verifies() {
        assert_eq!(sign(b"", DOC_BODY), Err(SignatureError::EmptySecret));
        assert_eq!(
            verify_signature(b"", DOC_BODY, DOC_SIGNATURE),
            Err(SignatureError::EmptySecret)
        );
    }

    #[test]
    fn generated_secrets_differ() {
        let a = generate_webhook_secret();
        let b = generate_webhook_secret();
        assert_eq!(a.len(), WEBHOOK_SECRET_LEN);
        assert_ne!(a, b);
    }
}
