//! Webhook authenticity: request signatures and the subscription handshake.

use {
    hmac::{Hmac, Mac},
    sha2::Sha256,
    tracing::warn,
};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the `sha256=<hex>` body signature.
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

/// Check the `X-Hub-Signature-256` header against the raw request body.
pub fn verify_signature(body: &[u8], signature_header: &str, app_secret: &str) -> bool {
    let Some(expected) = signature_header.trim().strip_prefix("sha256=") else {
        warn!("signature header is missing the sha256= prefix");
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(app_secret.as_bytes()) else {
        warn!("could not key HMAC with app secret");
        return false;
    };
    mac.update(body);
    let computed = hex::encode(mac.finalize().into_bytes());

    constant_time_eq(&computed, &expected.to_ascii_lowercase())
}

/// Compare two strings without short-circuiting on the first differing byte.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0, |acc, (x, y)| acc | (x ^ y))
        == 0
}

/// Answer the GET subscription handshake.
///
/// The gateway sends `hub.mode=subscribe`, `hub.verify_token` and
/// `hub.challenge`; the challenge is echoed back only when the token matches
/// the configured one. An empty configured token never matches.
pub fn verify_webhook_subscription(
    mode: Option<&str>,
    token: Option<&str>,
    challenge: Option<&str>,
    verify_token: &str,
) -> Option<String> {
    let (mode, token, challenge) = (mode?, token?, challenge?);
    if verify_token.is_empty() {
        warn!("webhook verification attempted with no verify token configured");
        return None;
    }
    (mode == "subscribe" && constant_time_eq(token, verify_token)).then(|| challenge.to_string())
}
