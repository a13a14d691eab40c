//! Locked tokens: bearer tokens bound to a session key and a timestamp.
//!
//! Wire format (five `.`-separated segments):
//!
//! ```text
//! <jwt header>.<jwt payload>.<jwt signature>.<unix ms>.<base64 ECDSA P-256 signature>
//! ```
//!
//! The first three segments are the untouched bearer token. Its payload carries the
//! session `publicKey`. The outer signature covers the first four segments joined by `.`.
//!
//! [`parse`] only splits and decodes; authorization must go through [`LockVerifier`].

use crate::{
    error::{Error, Result},
    keystore::KeyStore,
};
use base64ct::{Base64, Base64Url, Base64UrlUnpadded, Encoding};
use p256::ecdsa::{signature::Verifier, Signature, VerifyingKey};
use serde::Serialize;
use std::{
    fmt,
    time::{SystemTime, UNIX_EPOCH},
};
use tracing::{debug, warn};
use utoipa::ToSchema;

pub const FRESHNESS_WINDOW_MS: u64 = 3000;

const SEGMENT_SEPARATOR: char = '.';
const MIN_SEGMENTS: usize = 5;
const PUBLIC_KEY_CLAIM: &str = "publicKey";

/// Milliseconds since the Unix epoch. Clocks before the epoch read as zero.
#[must_use]
pub fn now_unix_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
}

/// Lock `bearer_token` with the session key held by `keystore`.
///
/// # Errors
/// Returns [`Error::KeyNotFound`] if the session has no key pair yet, or
/// [`Error::Signing`] if signing fails. Nothing is retried.
pub async fn lock(keystore: &KeyStore, bearer_token: &str) -> Result<String> {
    lock_at(keystore, bearer_token, now_unix_millis()).await
}

/// Lock with an explicit timestamp.
///
/// # Errors
/// Same as [`lock`].
pub async fn lock_at(
    keystore: &KeyStore,
    bearer_token: &str,
    timestamp_ms: i64,
) -> Result<String> {
    let candidate = format!("{bearer_token}{SEGMENT_SEPARATOR}{timestamp_ms}");
    let handle = keystore.private_key_handle().await?;
    let signature = handle.sign(candidate.as_bytes())?;

    Ok(format!(
        "{candidate}{SEGMENT_SEPARATOR}{}",
        Base64::encode_string(&signature)
    ))
}

/// Segments of a locked token. Carries no trust on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLockedToken {
    pub inner_token: String,
    pub timestamped_token: String,
    pub timestamp: i64,
    pub signature: String,
    pub embedded_public_key: String,
}

/// Split a locked token and extract the `publicKey` claim from the inner payload.
///
/// # Errors
/// Returns [`Error::MalformedToken`] if there are fewer than five segments, the payload
/// is not base64url JSON with a string `publicKey`, or the timestamp is not unsigned
/// decimal digits.
pub fn parse(locked_token: &str) -> Result<ParsedLockedToken> {
    let segments: Vec<&str> = locked_token.split(SEGMENT_SEPARATOR).collect();
    if segments.len() < MIN_SEGMENTS {
        return Err(Error::MalformedToken("expected five segments"));
    }

    let payload = decode_base64url(segments[1])?;
    let payload: serde_json::Value = serde_json::from_slice(&payload)
        .map_err(|_| Error::MalformedToken("payload is not json"))?;
    let embedded_public_key = payload
        .get(PUBLIC_KEY_CLAIM)
        .and_then(serde_json::Value::as_str)
        .ok_or(Error::MalformedToken("payload has no publicKey"))?
        .to_string();

    let timestamp = parse_timestamp(segments[3])?;

    Ok(ParsedLockedToken {
        inner_token: segments[..3].join("."),
        timestamped_token: segments[..4].join("."),
        timestamp,
        signature: segments[4].to_string(),
        embedded_public_key,
    })
}

// Decimal milliseconds since epoch: ASCII digits only, no sign.
fn parse_timestamp(segment: &str) -> Result<i64> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::MalformedToken("timestamp is not decimal milliseconds"));
    }
    segment
        .parse::<i64>()
        .map_err(|_| Error::MalformedToken("timestamp out of range"))
}

// JWT segments are unpadded base64url, but tolerate padding.
fn decode_base64url(segment: &str) -> Result<Vec<u8>> {
    Base64UrlUnpadded::decode_vec(segment)
        .or_else(|_| Base64Url::decode_vec(segment))
        .map_err(|_| Error::MalformedToken("payload is not base64url"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub enum Verification {
    Valid,
    Expired,
    InvalidSignature,
    Malformed,
}

impl Verification {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Valid => "Valid",
            Self::Expired => "Expired",
            Self::InvalidSignature => "InvalidSignature",
            Self::Malformed => "Malformed",
        }
    }

    #[must_use]
    pub const fn is_valid(self) -> bool {
        matches!(self, Self::Valid)
    }

    /// The matching [`Error`], or `None` for `Valid`.
    #[must_use]
    pub fn into_error(self) -> Option<Error> {
        match self {
            Self::Valid => None,
            Self::Expired => Some(Error::Expired),
            Self::InvalidSignature => Some(Error::InvalidSignature),
            Self::Malformed => Some(Error::MalformedToken("locked token does not parse")),
        }
    }
}

impl fmt::Display for Verification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Server-side verifier for locked tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockVerifier {
    /// Maximum age of the lock timestamp.
    freshness_window_ms: u64,
    /// Maximum amount a timestamp may lie in the future; unbounded when `None`.
    max_clock_skew_ms: Option<u64>,
}

impl Default for LockVerifier {
    fn default() -> Self {
        Self::new(FRESHNESS_WINDOW_MS)
    }
}

impl LockVerifier {
    #[must_use]
    pub const fn new(freshness_window_ms: u64) -> Self {
        Self {
            freshness_window_ms,
            max_clock_skew_ms: None,
        }
    }

    #[must_use]
    pub const fn with_max_clock_skew(mut self, max_clock_skew_ms: Option<u64>) -> Self {
        self.max_clock_skew_ms = max_clock_skew_ms;
        self
    }

    #[must_use]
    pub const fn freshness_window_ms(&self) -> u64 {
        self.freshness_window_ms
    }

    #[must_use]
    pub fn verify(&self, locked_token: &str) -> Verification {
        self.verify_at(locked_token, now_unix_millis())
    }

    /// Verify against an explicit `now`.
    ///
    /// Freshness and signature are both evaluated. A stale token reports `Expired`
    /// whatever its signature; a fresh one reports `InvalidSignature` if the signature
    /// fails.
    #[must_use]
    pub fn verify_at(&self, locked_token: &str, now_ms: i64) -> Verification {
        match self.check_at(locked_token, now_ms) {
            Ok(_) => Verification::Valid,
            Err(result) => result,
        }
    }

    /// Verify and hand back the parsed token only when it is `Valid`.
    ///
    /// # Errors
    /// Returns the failing [`Verification`] kind.
    pub fn unlock(&self, locked_token: &str) -> Result<ParsedLockedToken, Verification> {
        self.check_at(locked_token, now_unix_millis())
    }

    fn check_at(
        &self,
        locked_token: &str,
        now_ms: i64,
    ) -> Result<ParsedLockedToken, Verification> {
        let parsed = match parse(locked_token) {
            Ok(parsed) => parsed,
            Err(err) => {
                debug!("locked token rejected: {err}");
                return Err(Verification::Malformed);
            }
        };

        let Some(verifying_key) = import_public_key(&parsed.embedded_public_key) else {
            debug!("locked token rejected: embedded key is not a P-256 point");
            return Err(Verification::Malformed);
        };

        let fresh = self.is_fresh(parsed.timestamp, now_ms);
        let signed = signature_matches(&verifying_key, &parsed);

        if !fresh {
            warn!(
                timestamp = parsed.timestamp,
                now = now_ms,
                signature_valid = signed,
                "locked token expired"
            );
            return Err(Verification::Expired);
        }
        if !signed {
            warn!("locked token signature invalid");
            return Err(Verification::InvalidSignature);
        }

        Ok(parsed)
    }

    fn is_fresh(&self, timestamp_ms: i64, now_ms: i64) -> bool {
        let age = i128::from(now_ms) - i128::from(timestamp_ms);
        if age > i128::from(self.freshness_window_ms) {
            return false;
        }
        match self.max_clock_skew_ms {
            Some(skew) => -age <= i128::from(skew),
            None => true,
        }
    }
}

/// Verify with the default freshness window.
#[must_use]
pub fn verify(locked_token: &str) -> Verification {
    LockVerifier::default().verify(locked_token)
}

fn import_public_key(encoded: &str) -> Option<VerifyingKey> {
    let bytes = Base64::decode_vec(encoded).ok()?;
    VerifyingKey::from_sec1_bytes(&bytes).ok()
}

// An undecodable or wrongly sized signature is a failed signature, not a parse error.
fn signature_matches(key: &VerifyingKey, parsed: &ParsedLockedToken) -> bool {
    let Ok(bytes) = Base64::decode_vec(&parsed.signature) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(&bytes) else {
        return false;
    };
    key.verify(parsed.timestamped_token.as_bytes(), &signature)
        .is_ok()
}
