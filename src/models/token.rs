//! Opaque bearer tokens.
//!
//! The plaintext is handed to the client once; only its SHA-256 digest is
//! persisted.

use chrono::{DateTime, Duration, Utc};
use data_encoding::BASE32_NOPAD;
use rand::RngCore;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::validator::Validator;

const TOKEN_BYTES: usize = 16;

/// Length of the base32 rendering of [`TOKEN_BYTES`] random bytes.
pub const TOKEN_PLAINTEXT_LEN: usize = 26;

/// What a token may be used for. Tokens never cross scopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Activation,
    Authentication,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Activation => "activation",
            Scope::Authentication => "authentication",
        }
    }
}

#[derive(Clone, Serialize)]
pub struct Token {
    #[serde(rename = "token")]
    pub plaintext: String,
    #[serde(skip)]
    pub hash: Vec<u8>,
    #[serde(skip)]
    pub user_id: i64,
    pub expiry: DateTime<Utc>,
    pub scope: Scope,
}

impl Token {
    pub fn generate(user_id: i64, ttl: Duration, scope: Scope) -> Self {
        let mut bytes = [0u8; TOKEN_BYTES];
        rand::rngs::OsRng.fill_bytes(&mut bytes);

        let plaintext = BASE32_NOPAD.encode(&bytes);
        let hash = hash_plaintext(&plaintext);

        Self {
            plaintext,
            hash,
            user_id,
            expiry: Utc::now() + ttl,
            scope,
        }
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("plaintext", &"[redacted]")
            .field("user_id", &self.user_id)
            .field("expiry", &self.expiry)
            .field("scope", &self.scope)
            .finish()
    }
}

/// SHA-256 digest used as the storage key for a plaintext token.
pub fn hash_plaintext(plaintext: &str) -> Vec<u8> {
    Sha256::digest(plaintext.as_bytes()).to_vec()
}

pub fn validate_token_plaintext(v: &mut Validator, plaintext: &str) {
    v.check(!plaintext.is_empty(), "token", "must be provided");
    v.check(
        plaintext.len() == TOKEN_PLAINTEXT_LEN,
        "token",
        "must be 26 bytes long",
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base32_known_vectors() {
        assert_eq!(BASE32_NOPAD.encode(b""), "");
        assert_eq!(BASE32_NOPAD.encode(b"f"), "MY");
        assert_eq!(BASE32_NOPAD.encode(b"fo"), "MZXQ");
        assert_eq!(BASE32_NOPAD.encode(b"foobar"), "MZXW6YTBOI");
        assert_eq!(BASE32_NOPAD.encode(&[0u8; 16]).len(), TOKEN_PLAINTEXT_LEN);
    }

    #[test]
    fn test_generated_token_shape() {
        let token = Token::generate(7, Duration::hours(24), Scope::Authentication);
        assert_eq!(token.plaintext.len(), TOKEN_PLAINTEXT_LEN);
        assert!(token
            .plaintext
            .bytes()
            .all(|b| b.is_ascii_uppercase() || (b'2'..=b'7').contains(&b)));
        assert_eq!(token.user_id, 7);
        assert!(token.expiry > Utc::now());
    }

    #[test]
    fn test_hash_differs_from_plaintext() {
        let token = Token::generate(1, Duration::hours(1), Scope::Activation);
        assert_ne!(token.hash, token.plaintext.as_bytes());
        assert_eq!(token.hash.len(), 32);
        assert_eq!(token.hash, hash_plaintext(&token.plaintext));
    }

    #[test]
    fn test_tokens_are_unique() {
        let a = Token::generate(1, Duration::hours(1), Scope::Activation);
        let b = Token::generate(1, Duration::hours(1), Scope::Activation);
        assert_ne!(a.plaintext, b.plaintext);
    }

    #[test]
    fn test_serialized_token_hides_hash() {
        let token = Token::generate(1, Duration::hours(1), Scope::Authentication);
        let json = serde_json::to_value(&token).unwrap();
        assert_eq!(json["token"], token.plaintext.as_str());
        assert_eq!(json["scope"], "authentication");
        assert!(json.get("hash").is_none());
        assert!(json.get("user_id").is_none());
    }

    #[test]
    fn test_validate_plaintext() {
        let mut v = Validator::new();
        validate_token_plaintext(&mut v, "");
        assert_eq!(v.errors()["token"], "must be provided");

        let mut v = Validator::new();
        validate_token_plaintext(&mut v, "ABC");
        assert_eq!(v.errors()["token"], "must be 26 bytes long");
    }
}
