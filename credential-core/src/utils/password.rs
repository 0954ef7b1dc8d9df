use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::error::CoreError;

/// Newtype for a cleartext password to prevent accidental logging
#[derive(Clone)]
pub struct Password(String);

impl Password {
    pub fn new(password: String) -> Self {
        Self(password)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Password(***)")
    }
}

/// Newtype for a stored password hash
#[derive(Debug, Clone)]
pub struct PasswordHashString(String);

impl PasswordHashString {
    pub fn new(hash: String) -> Self {
        Self(hash)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// One-way password storage.
///
/// Argon2id with a random salt per call, so the same password never hashes
/// to the same string twice. Verification runs through the algorithm's own
/// comparison and never reconstructs the cleartext.
pub struct CredentialVault;

impl CredentialVault {
    pub fn hash(password: &Password) -> Result<PasswordHashString, CoreError> {
        let argon2 = Argon2::default();
        let salt = SaltString::generate(&mut OsRng);

        let password_hash = argon2
            .hash_password(password.as_str().as_bytes(), &salt)
            .map_err(|e| CoreError::Internal(anyhow::anyhow!("Failed to hash password: {}", e)))?
            .to_string();

        Ok(PasswordHashString::new(password_hash))
    }

    /// Returns `Ok(false)` on a mismatch; errors only on a malformed stored
    /// hash. A mismatch is an expected outcome, not a fault.
    pub fn verify(
        password: &Password,
        password_hash: &PasswordHashString,
    ) -> Result<bool, CoreError> {
        let parsed_hash = PasswordHash::new(password_hash.as_str()).map_err(|e| {
            CoreError::Internal(anyhow::anyhow!("Invalid password hash format: {}", e))
        })?;

        Ok(Argon2::default()
            .verify_password(password.as_str().as_bytes(), &parsed_hash)
            .is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_produces_argon2_string() {
        let password = Password::new("correct horse battery staple".to_string());
        let hash = CredentialVault::hash(&password).expect("Failed to hash password");

        assert!(!hash.as_str().is_empty());
        assert!(hash.as_str().starts_with("$argon2"));
    }

    #[test]
    fn test_verify_correct_password() {
        let password = Password::new("correct horse battery staple".to_string());
        let hash = CredentialVault::hash(&password).expect("Failed to hash password");

        assert!(CredentialVault::verify(&password, &hash).unwrap());
    }

    #[test]
    fn test_verify_wrong_password_returns_false() {
        let password = Password::new("correct horse battery staple".to_string());
        let hash = CredentialVault::hash(&password).expect("Failed to hash password");

        let wrong = Password::new("incorrect horse".to_string());
        assert!(!CredentialVault::verify(&wrong, &hash).unwrap());
    }

    #[test]
    fn test_malformed_hash_is_an_error() {
        let password = Password::new("whatever".to_string());
        let garbage = PasswordHashString::new("not-a-phc-string".to_string());
        assert!(CredentialVault::verify(&password, &garbage).is_err());
    }

    #[test]
    fn test_distinct_salts_for_same_password() {
        let password = Password::new("correct horse battery staple".to_string());
        let hash1 = CredentialVault::hash(&password).expect("Failed to hash password");
        let hash2 = CredentialVault::hash(&password).expect("Failed to hash password");

        assert_ne!(hash1.as_str(), hash2.as_str());
        assert!(CredentialVault::verify(&password, &hash1).unwrap());
        assert!(CredentialVault::verify(&password, &hash2).unwrap());
    }

    #[test]
    fn test_password_debug_is_redacted() {
        let password = Password::new("hunter2".to_string());
        assert_eq!(format!("{:?}", password), "Password(***)");
    }
}
