//! Small helpers for credential generation, hashing, and header parsing.

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};

/// Prefix distinguishing api keys from session tokens in a bearer value.
pub(crate) const API_KEY_PREFIX: &str = "gk_";

const SECRET_LEN: usize = 32;

/// Create a new raw api key string.
///
/// The raw value is returned to the caller exactly once; the database only
/// ever sees its hash.
pub(crate) fn generate_api_key() -> Result<String> {
    let mut bytes = [0u8; SECRET_LEN];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate api key")?;
    Ok(format!("{API_KEY_PREFIX}{}", URL_SAFE_NO_PAD.encode(bytes)))
}

/// Hash an api key so raw values never touch the database.
/// The hash is the lookup key when the credential is presented.
pub(crate) fn hash_api_key(raw_key: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(raw_key.as_bytes());
    hasher.finalize().to_vec()
}

/// Extract the credential from an `Authorization: Bearer` header value.
pub(crate) fn extract_bearer(header_value: &str) -> Option<&str> {
    let trimmed = header_value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() { None } else { Some(token) }
}

/// True when the bearer value looks like an api key rather than a session
/// token.
pub(crate) fn is_api_key(credential: &str) -> bool {
    credential.starts_with(API_KEY_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keys_are_prefixed_and_distinct() {
        let first = generate_api_key().ok();
        let second = generate_api_key().ok();
        assert!(first.as_deref().is_some_and(|k| k.starts_with("gk_")));
        assert_ne!(first, second);
    }

    #[test]
    fn generated_key_decodes_to_secret_len() {
        let decoded_len = generate_api_key()
            .ok()
            .and_then(|key| {
                URL_SAFE_NO_PAD
                    .decode(key.trim_start_matches(API_KEY_PREFIX).as_bytes())
                    .ok()
            })
            .map(|bytes| bytes.len());
        assert_eq!(decoded_len, Some(SECRET_LEN));
    }

    #[test]
    fn hash_api_key_stable() {
        let first = hash_api_key("gk_token");
        let second = hash_api_key("gk_token");
        let different = hash_api_key("gk_other");
        assert_eq!(first, second);
        assert_ne!(first, different);
    }

    #[test]
    fn extract_bearer_accepts_both_cases() {
        assert_eq!(extract_bearer("Bearer abc"), Some("abc"));
        assert_eq!(extract_bearer("bearer abc"), Some("abc"));
        assert_eq!(extract_bearer("  Bearer   abc  "), Some("abc"));
    }

    #[test]
    fn extract_bearer_rejects_garbled_values() {
        assert_eq!(extract_bearer("Basic abc"), None);
        assert_eq!(extract_bearer("Bearer "), None);
        assert_eq!(extract_bearer(""), None);
    }

    #[test]
    fn api_keys_are_distinguished_from_tokens() {
        assert!(is_api_key("gk_abc"));
        assert!(!is_api_key("eyJ.payload.sig"));
    }
}
