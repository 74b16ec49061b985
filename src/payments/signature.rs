//! Provider webhook signature verification.
//!
//! The provider sends `Stripe-Signature: t=<unix>,v1=<hex>[,v1=<hex>...]`
//! where each `v1` is HMAC-SHA256 over `"{t}.{payload}"` keyed with the
//! endpoint secret. Several `v1` entries appear while a secret is rolled.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Why a webhook signature was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    /// The request carried no signature header.
    #[error("signature header missing")]
    MissingHeader,

    /// The header has no timestamp or no `v1` entry.
    #[error("malformed signature header")]
    Malformed,

    /// The timestamp is further from now than the tolerance allows.
    #[error("signature timestamp outside tolerance")]
    Expired,

    /// No `v1` entry matches the payload.
    #[error("signature mismatch")]
    Mismatch,
}

fn mac_for(secret: &str, timestamp: i64, payload: &[u8]) -> Result<HmacSha256, SignatureError> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::Mismatch)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// Verifies a signature header against the raw request body.
///
/// `now` and `tolerance_secs` are unix seconds; the timestamp may be off in
/// either direction by at most `tolerance_secs`.
///
/// # Errors
///
/// Returns the [`SignatureError`] describing the first check that failed.
pub fn verify_signature(
    secret: &str,
    payload: &[u8],
    header: &str,
    now: i64,
    tolerance_secs: i64,
) -> Result<(), SignatureError> {
    let mut timestamp = None;
    let mut candidates = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => candidates.push(value),
            _ => {}
        }
    }
    let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
    if candidates.is_empty() {
        return Err(SignatureError::Malformed);
    }
    if now.abs_diff(timestamp) > tolerance_secs.unsigned_abs() {
        return Err(SignatureError::Expired);
    }

    let mac = mac_for(secret, timestamp, payload)?;
    let matched = candidates
        .into_iter()
        .filter_map(|candidate| hex::decode(candidate).ok())
        .any(|expected| mac.clone().verify_slice(&expected).is_ok());
    if matched {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// Produces a header value in the provider's format. Used to sign fixture
/// payloads when exercising the webhook endpoint.
///
/// # Errors
///
/// Returns [`SignatureError::Mismatch`] if the secret cannot key an HMAC.
pub fn signature_header(
    secret: &str,
    payload: &[u8],
    timestamp: i64,
) -> Result<String, SignatureError> {
    let mac = mac_for(secret, timestamp, payload)?;
    Ok(format!(
        "t={timestamp},v1={}",
        hex::encode(mac.finalize().into_bytes())
    ))
}
