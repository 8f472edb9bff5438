//! Lease token format.
//!
//! A token is 16 bytes of entropy rendered as URL-safe base64 without
//! padding: exactly 22 characters from `[A-Za-z0-9_-]`. Tokens prove lease
//! ownership across renew and release, so a token that does not match this
//! shape is rejected before any backend round-trip.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;
use serde::Serialize;

use crate::error::AllocatorError;

/// Length of an encoded lease token in characters.
pub const TOKEN_LEN: usize = 22;

/// Number of entropy bytes behind a token (128 bits).
pub const TOKEN_BYTES: usize = 16;

/// A validated lease token.
///
/// Construction goes through [`LeaseToken::parse`] (caller-supplied strings)
/// or [`LeaseToken::from_bytes`] (freshly drawn entropy), so a value of this
/// type always has the correct length and alphabet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LeaseToken(String);

impl LeaseToken {
    /// Validate a caller-supplied token string.
    ///
    /// Rejects anything that is not exactly [`TOKEN_LEN`] characters from the
    /// URL-safe base64 alphabet.
    pub fn parse(raw: &str) -> Result<Self, AllocatorError> {
        if raw.len() != TOKEN_LEN {
            return Err(AllocatorError::InvalidToken {
                reason: format!("length {} != {}", raw.len(), TOKEN_LEN),
            });
        }
        if let Some(bad) = raw.chars().find(|c| !is_url_safe(*c)) {
            return Err(AllocatorError::InvalidToken {
                reason: format!("character {bad:?} outside URL-safe base64 alphabet"),
            });
        }
        Ok(Self(raw.to_string()))
    }

    /// Encode raw entropy bytes into a token.
    pub fn from_bytes(bytes: &[u8; TOKEN_BYTES]) -> Self {
        let encoded = URL_SAFE_NO_PAD.encode(bytes);
        debug_assert_eq!(encoded.len(), TOKEN_LEN);
        Self(encoded)
    }

    /// The encoded token string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_url_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

impl std::fmt::Display for LeaseToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for LeaseToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for LeaseToken {
    type Err = AllocatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for LeaseToken {
    type Error = AllocatorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<LeaseToken> for String {
    fn from(token: LeaseToken) -> Self {
        token.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_bytes_produces_22_url_safe_chars() {
        let token = LeaseToken::from_bytes(&[0xFF; TOKEN_BYTES]);
        assert_eq!(token.as_str().len(), TOKEN_LEN);
        assert!(token.as_str().chars().all(is_url_safe));
    }

    #[test]
    fn parse_accepts_well_formed_token() {
        let token = LeaseToken::parse("AbCdEfGhIjKlMnOpQrStU_").unwrap();
        assert_eq!(token.as_str(), "AbCdEfGhIjKlMnOpQrStU_");
    }

    #[test]
    fn parse_rejects_wrong_length() {
        for raw in ["", "short", "AbCdEfGhIjKlMnOpQrStU_x"] {
            let err = LeaseToken::parse(raw).unwrap_err();
            assert!(
                matches!(err, AllocatorError::InvalidToken { ref reason } if reason.contains("length")),
                "unexpected error for {raw:?}: {err:?}"
            );
        }
    }

    #[test]
    fn parse_rejects_out_of_alphabet_characters() {
        // '+' and '/' belong to the standard alphabet, not the URL-safe one.
        for raw in ["AbCdEfGhIjKlMnOpQrSt++", "AbCdEfGhIjKlMnOpQrSt//", "AbCdEfGhIjKlMnOpQrStU="] {
            let err = LeaseToken::parse(raw).unwrap_err();
            assert!(matches!(err, AllocatorError::InvalidToken { .. }), "accepted {raw:?}");
        }
    }

    #[test]
    fn serde_round_trip_validates() {
        let token = LeaseToken::from_bytes(&[7; TOKEN_BYTES]);
        let json = serde_json::to_string(&token).unwrap();
        let back: LeaseToken = serde_json::from_str(&json).unwrap();
        assert_eq!(token, back);

        let bad: Result<LeaseToken, _> = serde_json::from_str("\"not a token\"");
        assert!(bad.is_err());
    }
}
