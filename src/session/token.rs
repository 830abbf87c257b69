//! Bearer token payload decoding.
//!
//! Tokens are compact `header.payload.signature` strings. Only the payload is
//! read here and the signature is never checked: the backend stays the
//! authority and answers `401` for anything it does not accept.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use serde::Serialize;
use serde_json::{Map, Value};

/// base64url, padded or not.
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token must have three dot-separated segments with a payload")]
    Segments,
    #[error("token payload is not base64url: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("token payload is not a JSON object: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("token payload has no numeric exp claim")]
    MissingExpiry,
}

/// Raw bearer credential as issued by the backend.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Token {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

// Tokens end up in tracing fields; keep the credential out of logs.
impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({} bytes)", self.0.len())
    }
}

/// Claims read from the token payload. Everything except `exp` is display-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenClaims {
    /// Expiry, whole Unix seconds (fractional values are floored).
    pub exp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl TokenClaims {
    /// Inclusive: a token expiring this very second is still usable.
    #[must_use]
    pub fn is_live_at(&self, now: i64) -> bool {
        self.exp >= now
    }
}

/// Decode the payload segment of `token` without verifying its signature.
pub fn decode_claims(token: &str) -> Result<TokenClaims, TokenError> {
    let mut segments = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (segments.next(), segments.next(), segments.next(), segments.next())
    else {
        return Err(TokenError::Segments);
    };
    if payload.is_empty() {
        return Err(TokenError::Segments);
    }

    let bytes = PAYLOAD_ENGINE.decode(payload)?;
    let claims: Map<String, Value> = serde_json::from_slice(&bytes)?;

    let exp = claims
        .get("exp")
        .and_then(|exp| match exp {
            Value::Number(number) => unix_seconds(number),
            _ => None,
        })
        .ok_or(TokenError::MissingExpiry)?;

    Ok(TokenClaims {
        exp,
        sub: string_claim(&claims, "sub"),
        name: string_claim(&claims, "name"),
        email: string_claim(&claims, "email"),
    })
}

/// Whether `token` decodes and has not yet expired. Fails closed.
#[must_use]
pub fn is_valid(token: &str) -> bool {
    is_valid_at(token, now_unix())
}

#[must_use]
pub fn is_valid_at(token: &str, now: i64) -> bool {
    decode_claims(token).is_ok_and(|claims| claims.is_live_at(now))
}

/// Current wall-clock time in whole Unix seconds. No skew compensation.
#[must_use]
pub fn now_unix() -> i64 {
    let Ok(duration) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(duration.as_secs()).unwrap_or(i64::MAX)
}

#[allow(clippy::cast_possible_truncation)]
fn unix_seconds(number: &serde_json::Number) -> Option<i64> {
    if let Some(secs) = number.as_i64() {
        return Some(secs);
    }
    // `as` saturates, so oversized values clamp instead of wrapping.
    number
        .as_f64()
        .filter(|secs| secs.is_finite())
        .map(|secs| secs.floor() as i64)
}

fn string_claim(claims: &Map<String, Value>, key: &str) -> Option<String> {
    claims.get(key).and_then(Value::as_str).map(ToOwned::to_owned)
}

#[cfg(test)]
#[path = "token_test.rs"]
mod tests;
