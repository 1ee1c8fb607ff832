//! Argon2id password hashing.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use casefile_core::error::DomainError;

/// Hashes and verifies passwords as PHC strings.
#[derive(Clone)]
pub struct Passwords {
    argon2: Argon2<'static>,
}

impl std::fmt::Debug for Passwords {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Passwords").finish_non_exhaustive()
    }
}

impl Default for Passwords {
    fn default() -> Self {
        Self {
            argon2: Argon2::default(),
        }
    }
}

impl Passwords {
    /// Argon2id with explicit cost parameters.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the parameters are out of range.
    pub fn with_params(memory_kib: u32, iterations: u32) -> Result<Self, DomainError> {
        let params = Params::new(memory_kib, iterations, 1, None)
            .map_err(|e| DomainError::Validation(format!("invalid Argon2id parameters: {e}")))?;
        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    /// Hashes a password with a fresh random salt.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if hashing fails.
    pub fn hash(&self, password: &str) -> Result<String, DomainError> {
        let salt_bytes: [u8; 16] = rand::random();
        let salt = SaltString::encode_b64(&salt_bytes)
            .map_err(|e| DomainError::Infrastructure(format!("salt encoding failed: {e}")))?;
        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| DomainError::Infrastructure(format!("password hashing failed: {e}")))?;
        Ok(hash.to_string())
    }

    /// Whether `password` matches the stored PHC hash. Malformed hashes
    /// never match.
    #[must_use]
    pub fn verify(&self, password: &str, stored_hash: &str) -> bool {
        PasswordHash::new(stored_hash).is_ok_and(|parsed| {
            self.argon2
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
    }
}
