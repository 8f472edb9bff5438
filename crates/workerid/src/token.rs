//! Token minting.

use rand::rngs::OsRng;
use rand::TryRngCore;
use workerid_core::BackendError;
use workerid_core::LeaseToken;
use workerid_core::TOKEN_BYTES;

/// Mint a fresh lease token from the OS entropy source.
///
/// 128 bits of entropy, URL-safe base64 without padding. An entropy failure
/// propagates; there is no fallback to a weaker generator.
pub(crate) fn mint_token() -> Result<LeaseToken, BackendError> {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|err| BackendError::Entropy { reason: err.to_string() })?;
    Ok(LeaseToken::from_bytes(&bytes))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use workerid_core::TOKEN_LEN;

    use super::*;

    #[test]
    fn minted_tokens_are_well_formed() {
        let token = mint_token().unwrap();
        assert_eq!(token.as_str().len(), TOKEN_LEN);
        assert!(token
            .as_str()
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'));
        // Round-trips through the validating parser.
        assert_eq!(LeaseToken::parse(token.as_str()).unwrap(), token);
    }

    #[test]
    fn minted_tokens_are_unique() {
        let mut seen = HashSet::new();
        for _ in 0..256 {
            assert!(seen.insert(mint_token().unwrap()));
        }
    }
}
