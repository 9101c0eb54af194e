//! Webhook event parsing and signature verification.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha512;

type HmacSha512 = Hmac<Sha512>;

/// Header carrying the hex-encoded HMAC-SHA512 of the raw request body.
pub const SIGNATURE_HEADER: &str = "x-paystack-signature";

/// Event type emitted when a charge settles.
pub const CHARGE_SUCCESS: &str = "charge.success";

/// A gateway webhook event. Only the fields the core consumes.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    /// Event type, e.g. `charge.success`.
    pub event: String,
    pub data: WebhookData,
}

/// Payload of a charge event.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookData {
    /// The transaction reference the charge belongs to.
    pub reference: String,
}

/// Verifies the webhook signature over the raw body.
///
/// Comparison happens inside the MAC verification, which is
/// constant-time; a malformed hex signature simply fails.
pub fn verify_signature(secret: &str, body: &[u8], signature_hex: &str) -> bool {
    let Ok(signature) = hex::decode(signature_hex) else {
        return false;
    };
    let Ok(mut mac) = HmacSha512::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&signature).is_ok()
}

/// Computes the hex signature for a body, as the gateway does.
pub fn sign(secret: &str, body: &[u8]) -> String {
    let Ok(mut mac) = HmacSha512::new_from_slice(secret.as_bytes()) else {
        // HMAC accepts keys of any length
        return String::new();
    };
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}
