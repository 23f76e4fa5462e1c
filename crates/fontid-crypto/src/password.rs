use base64::{Engine as _, engine::general_purpose::URL_SAFE as BASE64_URL};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Bytes of entropy in each generated salt.
pub const SALT_LEN: usize = 16;

const SEPARATOR: char = '$';

/// Generate a fresh salt: 16 bytes from the thread-local CSPRNG, URL-safe base64.
pub fn generate_salt() -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill_bytes(&mut salt);
    BASE64_URL.encode(salt)
}

/// Hash a password under a freshly generated salt.
pub fn hash_password(password: &str) -> String {
    hash_password_with_salt(password, &generate_salt())
}

/// `salt$hex(sha256(salt || password))`
pub fn hash_password_with_salt(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{}{}{}", salt, SEPARATOR, hex::encode(hasher.finalize()))
}

/// Recompute under the stored salt and compare the whole `salt$digest` string.
/// A value without a separator never verifies.
pub fn verify_password(password: &str, salted_hash: &str) -> bool {
    match salted_hash.split_once(SEPARATOR) {
        Some((salt, _)) => hash_password_with_salt(password, salt) == salted_hash,
        None => false,
    }
}
