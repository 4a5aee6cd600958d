//! Organization API keys in `prefix_secret` form.
//!
//! The prefix is a public lookup handle (`cs` + 12 hex chars, never
//! containing `_`); the secret is 32 random bytes, base64url-encoded.
//! Only the SHA-256 of the secret is stored.

use subtle::ConstantTimeEq;

use crate::error::AuthError;
use crate::token::{generate_opaque_token, hash_token};

const PREFIX_TAG: &str = "cs";

/// A freshly minted key. `raw` is shown to the caller exactly once.
#[derive(Debug, Clone)]
pub struct GeneratedApiKey {
    pub prefix: String,
    pub secret_hash: String,
    pub raw: String,
}

pub fn generate() -> GeneratedApiKey {
    let mut rng = rand::rng();
    let id: [u8; 6] = rand::Rng::random(&mut rng);
    let prefix = format!("{PREFIX_TAG}{}", hex::encode(id));
    let secret = generate_opaque_token();
    GeneratedApiKey {
        raw: format!("{prefix}_{secret}"),
        secret_hash: hash_token(&secret),
        prefix,
    }
}

/// Split a presented key into `(prefix, secret)`.
pub fn parse(raw: &str) -> Result<(&str, &str), AuthError> {
    let (prefix, secret) = raw.trim().split_once('_').ok_or(AuthError::InvalidApiKey)?;
    if !prefix.starts_with(PREFIX_TAG) || prefix.len() <= PREFIX_TAG.len() || secret.is_empty() {
        return Err(AuthError::InvalidApiKey);
    }
    Ok((prefix, secret))
}

/// Constant-time comparison of a presented secret with a stored hash.
pub fn verify_secret(secret: &str, stored_hash: &str) -> bool {
    hash_token(secret)
        .as_bytes()
        .ct_eq(stored_hash.as_bytes())
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_key_parses_and_verifies() {
        let key = generate();
        assert!(key.prefix.starts_with("cs"));
        assert_eq!(key.prefix.len(), 14);

        let (prefix, secret) = parse(&key.raw).unwrap();
        assert_eq!(prefix, key.prefix);
        assert!(verify_secret(secret, &key.secret_hash));
        assert!(!verify_secret("nope", &key.secret_hash));
    }

    #[test]
    fn secret_may_contain_underscores() {
        let (prefix, secret) = parse("csabcdef012345_se_cr_et").unwrap();
        assert_eq!(prefix, "csabcdef012345");
        assert_eq!(secret, "se_cr_et");
    }

    #[test]
    fn malformed_keys_are_rejected() {
        assert!(parse("no-separator").is_err());
        assert!(parse("cs_").is_err());
        assert!(parse("xx1234_secret").is_err());
        assert!(parse("csabc_").is_err());
    }
}
