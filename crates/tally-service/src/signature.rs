//! Webhook signature verification.
//!
//! The provider signs every delivery with the endpoint's signing secret and
//! sends the result in the `Stripe-Signature` header:
//!
//! ```text
//! Stripe-Signature: t=1700000000,v1=5257a869e7ecebeda32affa62cdca3fa51cad7e77a0e56ff536d0ce8e108d8bd
//! ```
//!
//! The signed message is the header timestamp, a literal `.`, and the raw
//! request body exactly as transmitted. Several `v1` entries may be present
//! while a secret is being rolled; any one of them matching is sufficient.
//!
//! A [`VerifiedEvent`] can only be obtained from [`SignatureVerifier::verify`],
//! so holding one is proof the payload passed verification.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use tally_core::EventKind;

use crate::crypto::{constant_time_eq, hmac_sha256_hex};

/// Header carrying the provider signature.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Signature scheme accepted by the verifier.
pub const SIGNATURE_SCHEME: &str = "v1";

/// Default freshness window for signed timestamps.
pub const DEFAULT_TOLERANCE: Duration = Duration::from_secs(300);

/// Reasons a webhook is rejected.
///
/// The `Display` text is returned to the caller as the rejection reason.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    /// No signature header on the request.
    #[error("Missing Stripe-Signature header")]
    MissingHeader,

    /// The header is empty.
    #[error("Unable to extract timestamp and signatures from header")]
    MalformedHeader,

    /// The header has no `t=` entry.
    #[error("Unable to extract timestamp from header")]
    MissingTimestamp,

    /// The `t=` entry is not a unix timestamp.
    #[error("Invalid timestamp in header: {0:?}")]
    InvalidTimestamp(String),

    /// The header has no `v1=` entry.
    #[error("No signatures found with expected scheme v1")]
    NoSignatures,

    /// The timestamp is too far from the current time.
    #[error("Timestamp outside the tolerance zone ({age_seconds}s > {tolerance_seconds}s)")]
    TimestampOutsideTolerance {
        /// Distance between the signed timestamp and now.
        age_seconds: u64,
        /// Configured tolerance.
        tolerance_seconds: u64,
    },

    /// No signature in the header matches the payload.
    #[error("No signatures found matching the expected signature for payload")]
    SignatureMismatch,

    /// The payload is authentic but is not a provider event.
    #[error("Invalid event payload: {0}")]
    InvalidPayload(String),
}

/// Parsed `Stripe-Signature` header.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SignatureHeader<'a> {
    /// The timestamp exactly as sent; this is what was signed.
    timestamp_raw: &'a str,
    timestamp: i64,
    signatures: Vec<&'a str>,
}

impl<'a> SignatureHeader<'a> {
    fn parse(header: &'a str) -> Result<Self, SignatureError> {
        if header.trim().is_empty() {
            return Err(SignatureError::MalformedHeader);
        }

        let mut timestamp_raw: Option<&str> = None;
        let mut signatures = Vec::new();

        // Parts without a key (stray or trailing commas) are skipped
        for (key, value) in header
            .split(',')
            .filter_map(|part| part.trim().split_once('='))
        {
            match key {
                "t" if timestamp_raw.is_none() => timestamp_raw = Some(value),
                SIGNATURE_SCHEME => signatures.push(value),
                // v0 and future schemes are ignored
                _ => {}
            }
        }

        let timestamp_raw = timestamp_raw.ok_or(SignatureError::MissingTimestamp)?;
        let timestamp = timestamp_raw
            .parse::<i64>()
            .map_err(|_| SignatureError::InvalidTimestamp(timestamp_raw.to_string()))?;

        if signatures.is_empty() {
            return Err(SignatureError::NoSignatures);
        }

        Ok(Self {
            timestamp_raw,
            timestamp,
            signatures,
        })
    }
}

/// Verifies provider signatures with a shared signing secret.
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: String,
    tolerance: Duration,
}

impl fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("secret", &"<redacted>")
            .field("tolerance", &self.tolerance)
            .finish()
    }
}

impl SignatureVerifier {
    /// Create a verifier for the given signing secret (`whsec_...`) using
    /// the default tolerance.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            tolerance: DEFAULT_TOLERANCE,
        }
    }

    /// Set the timestamp tolerance. A zero tolerance disables the freshness
    /// check.
    #[must_use]
    pub fn with_tolerance(mut self, tolerance: Duration) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// The configured timestamp tolerance.
    #[must_use]
    pub fn tolerance(&self) -> Duration {
        self.tolerance
    }

    /// Verify a delivery against the current time.
    ///
    /// # Errors
    ///
    /// Returns a [`SignatureError`] describing why the delivery was rejected.
    pub fn verify(
        &self,
        payload: &[u8],
        header: Option<&str>,
    ) -> Result<VerifiedEvent, SignatureError> {
        self.verify_at(payload, header, chrono::Utc::now().timestamp())
    }

    /// Verify a delivery as of `now` (unix seconds).
    ///
    /// # Errors
    ///
    /// Returns a [`SignatureError`] describing why the delivery was rejected.
    pub fn verify_at(
        &self,
        payload: &[u8],
        header: Option<&str>,
        now: i64,
    ) -> Result<VerifiedEvent, SignatureError> {
        let header = SignatureHeader::parse(header.ok_or(SignatureError::MissingHeader)?)?;

        let expected = hmac_sha256_hex(
            self.secret.as_bytes(),
            &[header.timestamp_raw.as_bytes(), b".", payload],
        );

        let matched = header
            .signatures
            .iter()
            .any(|sig| constant_time_eq(expected.as_bytes(), sig.as_bytes()));

        if !matched {
            return Err(SignatureError::SignatureMismatch);
        }

        let tolerance_seconds = self.tolerance.as_secs();
        let age_seconds = now.abs_diff(header.timestamp);
        if tolerance_seconds > 0 && age_seconds > tolerance_seconds {
            return Err(SignatureError::TimestampOutsideTolerance {
                age_seconds,
                tolerance_seconds,
            });
        }

        VerifiedEvent::from_payload(payload)
    }
}

/// Build a valid `Stripe-Signature` header for `payload`.
///
/// Used to produce fixtures and to replay captured payloads against a local
/// instance.
#[must_use]
pub fn signature_header(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    let timestamp = timestamp.to_string();
    let signature = hmac_sha256_hex(secret.as_bytes(), &[timestamp.as_bytes(), b".", payload]);
    format!("t={timestamp},{SIGNATURE_SCHEME}={signature}")
}

/// Minimal view of a provider event envelope.
#[derive(Debug, Deserialize)]
struct EventEnvelope {
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    data: Option<EventData>,
}

#[derive(Debug, Deserialize)]
struct EventData {
    #[serde(default)]
    object: serde_json::Value,
}

/// A provider event whose signature has been checked.
#[derive(Debug, Clone)]
pub struct VerifiedEvent {
    id: Option<String>,
    kind: EventKind,
    object: serde_json::Value,
}

impl VerifiedEvent {
    fn from_payload(payload: &[u8]) -> Result<Self, SignatureError> {
        let envelope: EventEnvelope = serde_json::from_slice(payload)
            .map_err(|e| SignatureError::InvalidPayload(e.to_string()))?;

        Ok(Self {
            id: envelope.id,
            kind: EventKind::from(envelope.event_type),
            object: envelope
                .data
                .map_or(serde_json::Value::Null, |data| data.object),
        })
    }

    /// Provider event id (`evt_...`), if the payload carried one.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Declared event type.
    #[must_use]
    pub fn kind(&self) -> &EventKind {
        &self.kind
    }

    /// The event's `data.object`, or `Null` when absent.
    #[must_use]
    pub fn object(&self) -> &serde_json::Value {
        &self.object
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";
    const NOW: i64 = 1_700_000_000;
    const BODY: &[u8] = br#"{"id":"evt_1","type":"checkout.session.completed","data":{"object":{"id":"cs_1"}}}"#;

    fn verifier() -> SignatureVerifier {
        SignatureVerifier::new(SECRET)
    }

    #[test]
    fn valid_signature_verifies() {
        let header = signature_header(SECRET, NOW, BODY);
        let event = verifier().verify_at(BODY, Some(&header), NOW).unwrap();

        assert_eq!(event.id(), Some("evt_1"));
        assert_eq!(event.kind(), &EventKind::CheckoutSessionCompleted);
        assert_eq!(event.object()["id"], "cs_1");
    }

    #[test]
    fn minimal_payload_verifies() {
        let body = br#"{"type":"checkout.session.completed"}"#;
        let header = signature_header(SECRET, NOW, body);
        let event = verifier().verify_at(body, Some(&header), NOW).unwrap();

        assert_eq!(event.id(), None);
        assert!(event.object().is_null());
    }

    #[test]
    fn every_single_bit_flip_is_rejected() {
        let header = signature_header(SECRET, NOW, BODY);
        let verifier = verifier();

        for byte in 0..BODY.len() {
            for bit in 0..8 {
                let mut tampered = BODY.to_vec();
                tampered[byte] ^= 1 << bit;
                assert_eq!(
                    verifier.verify_at(&tampered, Some(&header), NOW).unwrap_err(),
                    SignatureError::SignatureMismatch,
                    "flip of bit {bit} in byte {byte} was accepted"
                );
            }
        }
    }

    #[test]
    fn reencoded_body_is_rejected() {
        let header = signature_header(SECRET, NOW, BODY);
        let value: serde_json::Value = serde_json::from_slice(BODY).unwrap();
        let pretty = serde_json::to_vec_pretty(&value).unwrap();

        let result = verifier().verify_at(&pretty, Some(&header), NOW);
        assert_eq!(result.unwrap_err(), SignatureError::SignatureMismatch);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let header = signature_header("whsec_other", NOW, BODY);
        let result = verifier().verify_at(BODY, Some(&header), NOW);
        assert_eq!(result.unwrap_err(), SignatureError::SignatureMismatch);
    }

    #[test]
    fn stale_timestamp_is_rejected() {
        let signed_at = NOW - 301;
        let header = signature_header(SECRET, signed_at, BODY);
        let result = verifier().verify_at(BODY, Some(&header), NOW);

        assert_eq!(
            result.unwrap_err(),
            SignatureError::TimestampOutsideTolerance {
                age_seconds: 301,
                tolerance_seconds: 300
            }
        );
    }

    #[test]
    fn timestamp_at_tolerance_edge_is_accepted() {
        let header = signature_header(SECRET, NOW - 300, BODY);
        assert!(verifier().verify_at(BODY, Some(&header), NOW).is_ok());
    }

    #[test]
    fn future_timestamp_is_rejected() {
        let header = signature_header(SECRET, NOW + 3600, BODY);
        let result = verifier().verify_at(BODY, Some(&header), NOW);
        assert!(matches!(
            result,
            Err(SignatureError::TimestampOutsideTolerance { .. })
        ));
    }

    #[test]
    fn zero_tolerance_disables_freshness_check() {
        let header = signature_header(SECRET, NOW - 86_400, BODY);
        let verifier = verifier().with_tolerance(Duration::ZERO);
        assert!(verifier.verify_at(BODY, Some(&header), NOW).is_ok());
    }

    #[test]
    fn timestamp_cannot_be_swapped() {
        let header = signature_header(SECRET, NOW - 1000, BODY);
        let signature = header.split_once(",v1=").unwrap().1;
        let forged = format!("t={NOW},v1={signature}");

        let result = verifier().verify_at(BODY, Some(&forged), NOW);
        assert_eq!(result.unwrap_err(), SignatureError::SignatureMismatch);
    }

    #[test]
    fn any_matching_signature_is_accepted() {
        let good = signature_header(SECRET, NOW, BODY);
        let good_sig = good.split_once(",v1=").unwrap().1;
        let header = format!("t={NOW},v1={},v1={good_sig},v0=legacy", "0".repeat(64));

        assert!(verifier().verify_at(BODY, Some(&header), NOW).is_ok());
    }

    #[test]
    fn stray_header_parts_are_skipped() {
        let header = signature_header(SECRET, NOW, BODY);

        for variant in [
            format!("{header},"),
            format!(",{header}"),
            format!("{header},,junk, "),
            header.replacen(',', ", extra ,", 1),
        ] {
            assert!(
                verifier().verify_at(BODY, Some(&variant), NOW).is_ok(),
                "{variant}"
            );
        }
    }

    #[test]
    fn malformed_headers_are_rejected() {
        let v = verifier();
        assert_eq!(
            v.verify_at(BODY, None, NOW).unwrap_err(),
            SignatureError::MissingHeader
        );
        assert_eq!(
            v.verify_at(BODY, Some(""), NOW).unwrap_err(),
            SignatureError::MalformedHeader
        );
        assert_eq!(
            v.verify_at(BODY, Some("garbage"), NOW).unwrap_err(),
            SignatureError::MissingTimestamp
        );
        assert_eq!(
            v.verify_at(BODY, Some("v1=abc"), NOW).unwrap_err(),
            SignatureError::MissingTimestamp
        );
        assert_eq!(
            v.verify_at(BODY, Some("t=soon,v1=abc"), NOW).unwrap_err(),
            SignatureError::InvalidTimestamp("soon".into())
        );
        assert_eq!(
            v.verify_at(BODY, Some(&format!("t={NOW},v0=abc")), NOW)
                .unwrap_err(),
            SignatureError::NoSignatures
        );
    }

    #[test]
    fn authentic_non_event_payload_is_rejected() {
        let body = b"not json";
        let header = signature_header(SECRET, NOW, body);
        assert!(matches!(
            verifier().verify_at(body, Some(&header), NOW),
            Err(SignatureError::InvalidPayload(_))
        ));

        let body = br#"{"id":"evt_1"}"#;
        let header = signature_header(SECRET, NOW, body);
        assert!(matches!(
            verifier().verify_at(body, Some(&header), NOW),
            Err(SignatureError::InvalidPayload(_))
        ));
    }

    #[test]
    fn debug_redacts_secret() {
        let rendered = format!("{:?}", verifier());
        assert!(!rendered.contains(SECRET));
    }
}
