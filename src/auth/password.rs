use argon2::{
    password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use tracing::error;

/// Argon2id hasher whose time cost comes from configuration.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    fn argon2(&self) -> anyhow::Result<Argon2<'static>> {
        let params = Params::new(
            Params::DEFAULT_M_COST,
            self.cost,
            Params::DEFAULT_P_COST,
            None,
        )
        .map_err(|e| anyhow::anyhow!("argon2 params: {e}"))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }

    pub fn hash(&self, plain: &str) -> anyhow::Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()?
            .hash_password(plain.as_bytes(), &salt)
            .map_err(|e| {
                error!(error = %e, "argon2 hash_password error");
                anyhow::anyhow!(e.to_string())
            })?
            .to_string();
        Ok(hash)
    }

    /// Parameters are read from the stored hash, so older costs still verify.
    pub fn verify(&self, plain: &str, hash: &str) -> anyhow::Result<bool> {
        let parsed = PasswordHash::new(hash).map_err(|e| {
            error!(error = %e, "argon2 parse hash error");
            anyhow::anyhow!(e.to_string())
        })?;
        Ok(Argon2::default()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok())
    }

    /// [`Self::hash`] on the blocking pool.
    pub async fn hash_async(&self, plain: String) -> anyhow::Result<String> {
        let hasher = *self;
        tokio::task::spawn_blocking(move || hasher.hash(&plain)).await?
    }

    /// [`Self::verify`] on the blocking pool.
    pub async fn verify_async(&self, plain: String, hash: String) -> anyhow::Result<bool> {
        let hasher = *self;
        tokio::task::spawn_blocking(move || hasher.verify(&plain, &hash)).await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let hasher = PasswordHasher::new(1);
        let password = "Secur3P@ssw0rd!";
        let hash = hasher.hash(password).expect("hashing should succeed");
        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify(password, &hash).expect("verify should succeed"));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let hasher = PasswordHasher::new(1);
        let hash = hasher.hash("correct-horse-battery-staple").expect("hash");
        assert!(!hasher.verify("wrong-password", &hash).expect("verify should not error"));
    }

    #[test]
    fn verify_errors_on_malformed_hash() {
        let err = PasswordHasher::new(1)
            .verify("anything", "not-a-valid-hash")
            .unwrap_err();
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn hashes_from_another_cost_still_verify() {
        let hash = PasswordHasher::new(2).hash("Password123").expect("hash");
        assert!(hash.contains("t=2"));
        assert!(PasswordHasher::new(1).verify("Password123", &hash).unwrap());
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        let hasher = PasswordHasher::new(1);
        let a = hasher.hash("Password123").unwrap();
        let b = hasher.hash("Password123").unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn async_wrappers_match_sync_behavior() {
        let hasher = PasswordHasher::new(1);
        let hash = hasher.hash_async("Password123".into()).await.unwrap();
        assert!(hasher
            .verify_async("Password123".into(), hash.clone())
            .await
            .unwrap());
        assert!(!hasher.verify_async("nope".into(), hash).await.unwrap());
    }
}
