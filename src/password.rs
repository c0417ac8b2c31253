//! Stored-credential handling.
//!
//! Operator, theater, and server passwords are stored as
//! `base64(bcrypt(plaintext))`. Credentials are decoded and checked at config
//! load; verification happens against the decoded digest. bcrypt re-derives
//! the digest from the supplied plaintext, so verification cost does not
//! depend on what the client sent.

use std::sync::OnceLock;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use thiserror::Error;

/// A bcrypt digest is at least 60 bytes; anything shorter is rejected at
/// load time.
pub const MIN_DIGEST_LEN: usize = 60;

const GENERATE_COST: u32 = 4;

/// Errors produced while encoding or decoding stored credentials.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("empty password")]
    Empty,

    #[error("invalid credential encoding: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("decoded credential too short: {0} bytes")]
    TooShort(usize),

    #[error("bcrypt failure: {0}")]
    Hash(#[from] bcrypt::BcryptError),
}

/// Produce the stored form of a plaintext password.
pub fn generate_encoded(plain: &str) -> Result<String, CredentialError> {
    if plain.is_empty() {
        return Err(CredentialError::Empty);
    }
    let digest = bcrypt::hash(plain, GENERATE_COST)?;
    Ok(BASE64.encode(digest.as_bytes()))
}

/// Decode a stored credential into the bcrypt digest it wraps.
pub fn decode_stored(encoded: &str) -> Result<Vec<u8>, CredentialError> {
    if encoded.is_empty() {
        return Err(CredentialError::Empty);
    }
    let decoded = BASE64.decode(encoded)?;
    if decoded.len() < MIN_DIGEST_LEN {
        return Err(CredentialError::TooShort(decoded.len()));
    }
    Ok(decoded)
}

/// Verify a plaintext password against a decoded digest.
pub fn verify(stored_digest: &[u8], plain: &str) -> bool {
    let Ok(digest) = std::str::from_utf8(stored_digest) else {
        return false;
    };
    bcrypt::verify(plain, digest).unwrap_or(false)
}

/// A throwaway digest used to equalize work when the named principal does
/// not exist, so OPER and THEATER failures do not reveal which names are
/// configured.
pub fn burn_digest() -> &'static [u8] {
    static DIGEST: OnceLock<Vec<u8>> = OnceLock::new();
    DIGEST
        .get_or_init(|| {
            bcrypt::hash("limelight", GENERATE_COST)
                .map(String::into_bytes)
                .unwrap_or_default()
        })
        .as_slice()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let stored = generate_encoded("hunter2").unwrap();
        let digest = decode_stored(&stored).unwrap();
        assert!(digest.len() >= MIN_DIGEST_LEN);
        assert!(verify(&digest, "hunter2"));
        assert!(!verify(&digest, "hunter3"));
        assert!(!verify(&digest, ""));
    }

    #[test]
    fn empty_password_rejected() {
        assert!(matches!(generate_encoded(""), Err(CredentialError::Empty)));
        assert!(matches!(decode_stored(""), Err(CredentialError::Empty)));
    }

    #[test]
    fn short_digest_rejected() {
        let stored = BASE64.encode(b"not a bcrypt digest");
        assert!(matches!(
            decode_stored(&stored),
            Err(CredentialError::TooShort(_))
        ));
    }

    #[test]
    fn garbage_encoding_rejected() {
        assert!(matches!(
            decode_stored("!!not base64!!"),
            Err(CredentialError::Encoding(_))
        ));
    }
}
