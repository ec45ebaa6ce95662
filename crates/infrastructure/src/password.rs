//! bcrypt 密码哈希。计算放在阻塞线程池里，避免卡住异步运行时。

use async_trait::async_trait;
use bcrypt::{hash, verify, DEFAULT_COST};

use application::password::{PasswordHasher, PasswordHasherError};
use domain::PasswordHash;

#[derive(Clone)]
pub struct BcryptPasswordHasher {
    cost: u32,
}

impl BcryptPasswordHasher {
    pub fn new(cost: Option<u32>) -> Self {
        Self {
            cost: cost.unwrap_or(DEFAULT_COST),
        }
    }
}

impl Default for BcryptPasswordHasher {
    fn default() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl PasswordHasher for BcryptPasswordHasher {
    async fn hash(&self, plaintext: &str) -> Result<PasswordHash, PasswordHasherError> {
        let cost = self.cost;
        let plaintext = plaintext.to_owned();
        let hashed = tokio::task::spawn_blocking(move || hash(plaintext, cost))
            .await
            .map_err(|err| PasswordHasherError::new(err.to_string()))?
            .map_err(|err| PasswordHasherError::new(err.to_string()))?;

        PasswordHash::new(hashed).map_err(|err| PasswordHasherError::new(err.to_string()))
    }

    async fn verify(
        &self,
        plaintext: &str,
        hashed: &PasswordHash,
    ) -> Result<bool, PasswordHasherError> {
        let plaintext = plaintext.to_owned();
        let hashed = hashed.as_str().to_owned();
        tokio::task::spawn_blocking(move || verify(plaintext, &hashed))
            .await
            .map_err(|err| PasswordHasherError::new(err.to_string()))?
            .map_err(|err| PasswordHasherError::new(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_then_verify_round_trip() {
        let hasher = BcryptPasswordHasher::new(Some(4));
        let hashed = hasher.hash("correct horse battery").await.unwrap();

        assert!(hasher.verify("correct horse battery", &hashed).await.unwrap());
        assert!(!hasher.verify("wrong password", &hashed).await.unwrap());
    }
}
