use crate::application_port::*;
use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};

/// Hashing runs on the blocking pool so a burst of logins does not stall
/// the executor.
pub struct Argon2PasswordHasher;

#[async_trait::async_trait]
impl CredentialHasher for Argon2PasswordHasher {
    async fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let password = password.to_owned();
        tokio::task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut OsRng);
            Argon2::default()
                .hash_password(password.as_bytes(), &salt)
                .map(|hash| hash.to_string())
                .map_err(|e| AuthError::InternalError(e.to_string()))
        })
        .await
        .map_err(|e| AuthError::InternalError(e.to_string()))?
    }

    async fn verify_password(
        &self,
        password: &str,
        password_hash: &str,
    ) -> Result<bool, AuthError> {
        let password = password.to_owned();
        let password_hash = password_hash.to_owned();
        tokio::task::spawn_blocking(move || {
            let parsed = PasswordHash::new(&password_hash)
                .map_err(|e| AuthError::InternalError(format!("invalid PHC hash: {e}")))?;

            match Argon2::default().verify_password(password.as_bytes(), &parsed) {
                Ok(_) => Ok(true),
                Err(argon2::password_hash::Error::Password) => Ok(false),
                Err(e) => Err(AuthError::InternalError(format!("verify error: {e}"))),
            }
        })
        .await
        .map_err(|e| AuthError::InternalError(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_then_verify() {
        let hasher = Argon2PasswordHasher;
        let hash = hasher.hash_password("hunter22").await.unwrap();

        assert_ne!(hash, "hunter22");
        assert!(hasher.verify_password("hunter22", &hash).await.unwrap());
        assert!(!hasher.verify_password("hunter23", &hash).await.unwrap());
    }

    #[tokio::test]
    async fn malformed_hash_is_an_internal_error() {
        let hasher = Argon2PasswordHasher;
        let result = hasher.verify_password("whatever", "not-a-phc-string").await;
        assert!(matches!(result, Err(AuthError::InternalError(_))));
    }
}
