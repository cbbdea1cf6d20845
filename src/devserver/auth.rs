use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};

use argon2::password_hash::{SaltString, rand_core::OsRng as PHOsRng};

use crate::models::TokenPair;

/// Login check for a dev-backend account. A record whose hash does not parse
/// never matches, so a bad seed cannot be logged into.
pub fn verify_password(password: &str, account_hash: &str) -> bool {
    PasswordHash::new(account_hash)
        .map(|phc| {
            Argon2::default()
                .verify_password(password.as_bytes(), &phc)
                .is_ok()
        })
        .unwrap_or(false)
}

/// Hash stored on the `UserRecord` of a seeded admin or a newly registered
/// account. Plain passwords are never kept in the store.
pub fn hash_password(password: &str) -> Result<String, String> {
    let salt = SaltString::generate(&mut PHOsRng);
    match Argon2::default().hash_password(password.as_bytes(), &salt) {
        Ok(phc) => Ok(phc.to_string()),
        Err(e) => Err(format!("cannot hash account password: {e}")),
    }
}

fn random_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Fresh opaque access and refresh tokens.
pub fn issue_token_pair() -> TokenPair {
    TokenPair {
        access: random_token(),
        refresh: random_token(),
    }
}

/// SHA-256 hex digest; the store is keyed by this, never by the token.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}
