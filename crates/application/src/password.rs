//! 密码哈希能力。
//!
//! 具体算法由基础设施层提供；这里只定义"能哈希、能校验"的注入点。
//! 哈希失败与校验失败对调用方没有区别，都不可恢复，统一为一种错误。

use async_trait::async_trait;
use domain::PasswordHash;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("password operation failed: {message}")]
pub struct PasswordHasherError {
    message: String,
}

impl PasswordHasherError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// 注入式密码哈希能力。实现负责把耗时计算移出异步调度器。
#[async_trait]
pub trait PasswordHasher: Send + Sync {
    /// 对明文做不可逆哈希。
    async fn hash(&self, plaintext: &str) -> Result<PasswordHash, PasswordHasherError>;

    /// 校验明文与既有哈希是否匹配。算法错误与"不匹配"是两回事，
    /// 后者通过 `Ok(false)` 返回。
    async fn verify(
        &self,
        plaintext: &str,
        hashed: &PasswordHash,
    ) -> Result<bool, PasswordHasherError>;
}
