/// FontID Crypto Library
///
/// Salted SHA-256 password hashing in the `salt$hexdigest` format stored by
/// the credential database.

pub mod password;

pub use password::{generate_salt, hash_password, hash_password_with_salt, verify_password};
