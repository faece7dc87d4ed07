//! Password hashing (bcrypt, fixed cost).

use thiserror::Error;

use warden_core::ServiceError;

/// bcrypt work factor. Changing it only affects newly created hashes.
pub const BCRYPT_COST: u32 = 10;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
}

impl From<PasswordError> for ServiceError {
    fn from(value: PasswordError) -> Self {
        ServiceError::internal(value.to_string())
    }
}

/// Hash a plaintext password with a fresh random salt.
pub fn hash_password(plaintext: &str) -> Result<String, PasswordError> {
    Ok(bcrypt::hash(plaintext, BCRYPT_COST)?)
}

/// Check a plaintext password against a stored digest.
///
/// Never fails: a mismatch and a malformed digest both return `false`.
pub fn verify_password(plaintext: &str, digest: &str) -> bool {
    match bcrypt::verify(plaintext, digest) {
        Ok(matches) => matches,
        Err(e) => {
            tracing::debug!(error = %e, "stored password digest could not be parsed");
            false
        }
    }
}
