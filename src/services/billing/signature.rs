//! Stripe webhook signature verification.
//!
//! The `Stripe-Signature` header looks like `t=1704067200,v1=<hex>,v1=<hex>`.
//! Each `v1` value is a hex HMAC-SHA256 of `"{t}.{raw body}"` keyed by the
//! endpoint secret. Any one matching `v1` is enough.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::PaymentError;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Parsed `Stripe-Signature` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub timestamp: i64,
    pub signatures: Vec<String>,
}

impl SignatureHeader {
    pub fn parse(header: &str) -> Result<Self, PaymentError> {
        let mut timestamp = None;
        let mut signatures = Vec::new();

        for part in header.split(',') {
            let Some((key, value)) = part.trim().split_once('=') else {
                continue;
            };
            match key {
                "t" => {
                    timestamp = Some(
                        value
                            .parse::<i64>()
                            .map_err(|_| PaymentError::InvalidSignature("timestamp is not a number".to_string()))?,
                    )
                }
                "v1" => signatures.push(value.to_string()),
                // v0 and unknown schemes are ignored
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or_else(|| PaymentError::InvalidSignature("missing timestamp".to_string()))?;
        if signatures.is_empty() {
            return Err(PaymentError::InvalidSignature("missing v1 signature".to_string()));
        }
        Ok(Self { timestamp, signatures })
    }
}

/// Hex HMAC-SHA256 of `"{timestamp}.{payload}"`
pub fn compute_signature(secret: &str, timestamp: i64, payload: &[u8]) -> Result<String, PaymentError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| PaymentError::NotConfigured("webhook secret".to_string()))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(format!("{:x}", mac.finalize().into_bytes()))
}

/// Header value for a payload, in the same shape Stripe sends
pub fn sign_payload(secret: &str, timestamp: i64, payload: &[u8]) -> Result<String, PaymentError> {
    Ok(format!("t={},v1={}", timestamp, compute_signature(secret, timestamp, payload)?))
}

/// Verify a `Stripe-Signature` header against the raw body.
///
/// `now` is unix seconds; the header timestamp must be within `tolerance_secs`.
pub fn verify(header: &str, payload: &[u8], secret: &str, tolerance_secs: i64, now: i64) -> Result<(), PaymentError> {
    if secret.is_empty() {
        return Err(PaymentError::NotConfigured("STRIPE_WEBHOOK_SECRET".to_string()));
    }

    let parsed = SignatureHeader::parse(header)?;
    let tolerance = u64::try_from(tolerance_secs).unwrap_or(0);
    if now.abs_diff(parsed.timestamp) > tolerance {
        return Err(PaymentError::InvalidSignature("timestamp outside the tolerance window".to_string()));
    }

    let expected = compute_signature(secret, parsed.timestamp, payload)?;
    let matched = parsed
        .signatures
        .iter()
        .any(|candidate| constant_time_eq(candidate.as_bytes(), expected.as_bytes()));

    if matched {
        Ok(())
    } else {
        Err(PaymentError::InvalidSignature("no matching v1 signature".to_string()))
    }
}

/// Constant-time byte comparison
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";
    const NOW: i64 = 1_704_067_200;

    #[test]
    fn sign_and_verify() {
        let body = br#"{"id":"evt_1"}"#;
        let header = sign_payload(SECRET, NOW, body).unwrap();
        assert!(verify(&header, body, SECRET, 300, NOW + 10).is_ok());
    }

    #[test]
    fn rejects_tampered_body() {
        let header = sign_payload(SECRET, NOW, b"original").unwrap();
        assert!(matches!(
            verify(&header, b"tampered", SECRET, 300, NOW),
            Err(PaymentError::InvalidSignature(_))
        ));
    }

    #[test]
    fn rejects_old_timestamp() {
        let header = sign_payload(SECRET, NOW, b"{}").unwrap();
        assert!(verify(&header, b"{}", SECRET, 300, NOW + 301).is_err());
        assert!(verify(&header, b"{}", SECRET, 300, NOW + 300).is_ok());
    }

    #[test]
    fn any_v1_entry_may_match() {
        let good = compute_signature(SECRET, NOW, b"{}").unwrap();
        let header = format!("t={},v0=legacy,v1=deadbeef,v1={}", NOW, good);
        assert!(verify(&header, b"{}", SECRET, 300, NOW).is_ok());
    }

    #[test]
    fn malformed_headers() {
        assert!(SignatureHeader::parse("v1=abc").is_err());
        assert!(SignatureHeader::parse("t=abc,v1=abc").is_err());
        assert!(SignatureHeader::parse("t=1").is_err());
        for extreme in [i64::MIN, i64::MAX] {
            let header = format!("t={},v1=aa", extreme);
            assert!(matches!(
                verify(&header, b"{}", SECRET, 300, NOW),
                Err(PaymentError::InvalidSignature(_))
            ));
        }
        assert_eq!(
            SignatureHeader::parse("t=5, v1=aa").unwrap(),
            SignatureHeader {
                timestamp: 5,
                signatures: vec!["aa".to_string()]
            }
        );
    }

    #[test]
    fn empty_secret_is_not_configured() {
        assert!(matches!(
            verify("t=1,v1=aa", b"{}", "", 300, 1),
            Err(PaymentError::NotConfigured(_))
        ));
    }
}
