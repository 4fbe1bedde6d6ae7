//! Credential validation and password hashing.
//!
//! Validation rules are enforced server-side regardless of what clients
//! check. Password hashing sits behind the [`CredentialHasher`] trait so
//! tests can swap in a cheap deterministic hasher; production uses Argon2
//! with per-password salts in PHC string format.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::error::DomainError;

/// Username length bounds (inclusive).
pub const USERNAME_LEN: std::ops::RangeInclusive<usize> = 3..=20;
/// Password length bounds (inclusive).
pub const PASSWORD_LEN: std::ops::RangeInclusive<usize> = 6..=50;
/// Full-name length bounds (inclusive).
pub const FULL_NAME_LEN: std::ops::RangeInclusive<usize> = 2..=50;

/// Validate a username: 3-20 characters, alphanumeric only.
pub fn validate_username(username: &str) -> Result<(), DomainError> {
    if !USERNAME_LEN.contains(&username.chars().count()) {
        return Err(DomainError::Validation(
            "username must be 3-20 characters".to_string(),
        ));
    }
    if !username.chars().all(char::is_alphanumeric) {
        return Err(DomainError::Validation(
            "username must contain only letters and digits".to_string(),
        ));
    }
    Ok(())
}

/// Validate a password: 6-50 characters.
pub fn validate_password(password: &str) -> Result<(), DomainError> {
    if !PASSWORD_LEN.contains(&password.chars().count()) {
        return Err(DomainError::Validation(
            "password must be 6-50 characters".to_string(),
        ));
    }
    Ok(())
}

/// Validate a display name: 2-50 characters.
pub fn validate_full_name(full_name: &str) -> Result<(), DomainError> {
    if !FULL_NAME_LEN.contains(&full_name.chars().count()) {
        return Err(DomainError::Validation(
            "full name must be 2-50 characters".to_string(),
        ));
    }
    Ok(())
}

/// Validate an optional email: when present, must contain '@' and '.'.
pub fn validate_email(email: Option<&str>) -> Result<(), DomainError> {
    match email {
        None => Ok(()),
        Some(addr) if addr.contains('@') && addr.contains('.') => Ok(()),
        Some(_) => Err(DomainError::Validation("invalid email address".to_string())),
    }
}

/// Password hashing collaborator.
///
/// Hashes are opaque strings; `verify` never reveals why a mismatch
/// occurred.
pub trait CredentialHasher: Clone + Send + Sync + 'static {
    /// Hash a plaintext password for storage.
    fn hash(&self, password: &str) -> Result<String, DomainError>;

    /// Check a plaintext password against a stored hash.
    fn verify(&self, password: &str, hash: &str) -> bool;
}

/// Production hasher: Argon2id with a random per-password salt,
/// PHC string format.
#[derive(Clone, Copy, Default)]
pub struct Argon2Hasher;

impl Argon2Hasher {
    /// Create a new Argon2 hasher with default parameters.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl CredentialHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> Result<String, DomainError> {
        let salt = SaltString::generate(&mut OsRng);

        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| DomainError::Internal(format!("password hashing failed: {e}")))?;

        Ok(hash.to_string())
    }

    fn verify(&self, password: &str, hash: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(hash) else {
            return false;
        };
        Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok()
    }
}
