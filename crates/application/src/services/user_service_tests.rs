//! 用户服务单元测试：注册唯一性、登录验证、资料缓存。

use std::sync::Arc;

use async_trait::async_trait;
use domain::PasswordHash;
use uuid::Uuid;

use super::test_support::*;
use crate::{
    cache::{Cache, CacheKey, MemoryCache},
    clock::SystemClock,
    error::ApplicationError,
    password::{PasswordHasher, PasswordHasherError},
    services::user_service::{
        AuthenticateUserRequest, RegisterUserRequest, UserService, UserServiceDependencies,
    },
};

/// 测试用明文"哈希"，避免 bcrypt 拖慢单测
struct PlainHasher;

#[async_trait]
impl PasswordHasher for PlainHasher {
    async fn hash(&self, plaintext: &str) -> Result<PasswordHash, PasswordHasherError> {
        PasswordHash::new(format!("plain:{}", plaintext))
            .map_err(|err| PasswordHasherError::new(err.to_string()))
    }

    async fn verify(
        &self,
        plaintext: &str,
        hashed: &PasswordHash,
    ) -> Result<bool, PasswordHasherError> {
        Ok(hashed.as_str() == format!("plain:{}", plaintext))
    }
}

struct Fixture {
    service: UserService,
    cache: Arc<dyn Cache>,
}

fn fixture() -> Fixture {
    let cache: Arc<dyn Cache> = Arc::new(MemoryCache::new());
    let service = UserService::new(UserServiceDependencies {
        user_repository: Arc::new(InMemoryUserRepository::new()),
        cache: cache.clone(),
        password_hasher: Arc::new(PlainHasher),
        clock: Arc::new(SystemClock),
    });
    Fixture { service, cache }
}

fn register_request(username: &str, email: &str) -> RegisterUserRequest {
    RegisterUserRequest {
        username: username.to_string(),
        email: email.to_string(),
        password: "hunter2-but-longer".to_string(),
    }
}

#[tokio::test]
async fn register_rejects_duplicate_email_and_username() {
    let fx = fixture();
    fx.service
        .register(register_request("alice", "alice@example.com"))
        .await
        .unwrap();

    let same_email = fx
        .service
        .register(register_request("alice2", "alice@example.com"))
        .await;
    assert!(matches!(
        same_email,
        Err(ApplicationError::Domain(domain::DomainError::UserAlreadyExists))
    ));

    let same_username = fx
        .service
        .register(register_request("alice", "other@example.com"))
        .await;
    assert!(matches!(
        same_username,
        Err(ApplicationError::Domain(domain::DomainError::UserAlreadyExists))
    ));
}

#[tokio::test]
async fn authenticate_accepts_valid_credentials_only() {
    let fx = fixture();
    let registered = fx
        .service
        .register(register_request("bob", "bob@example.com"))
        .await
        .unwrap();

    let ok = fx
        .service
        .authenticate(AuthenticateUserRequest {
            email: "bob@example.com".to_string(),
            password: "hunter2-but-longer".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(ok.id, registered.id);

    let wrong_password = fx
        .service
        .authenticate(AuthenticateUserRequest {
            email: "bob@example.com".to_string(),
            password: "wrong".to_string(),
        })
        .await;
    assert!(matches!(wrong_password, Err(ApplicationError::Authentication)));

    let unknown_user = fx
        .service
        .authenticate(AuthenticateUserRequest {
            email: "nobody@example.com".to_string(),
            password: "hunter2-but-longer".to_string(),
        })
        .await;
    assert!(matches!(unknown_user, Err(ApplicationError::Authentication)));
}

#[tokio::test]
async fn profile_reads_through_cache() {
    let fx = fixture();
    let registered = fx
        .service
        .register(register_request("carol", "carol@example.com"))
        .await
        .unwrap();

    let profile = fx.service.get_profile(registered.id).await.unwrap();
    assert_eq!(profile, registered);
    assert!(fx
        .cache
        .get(&CacheKey::User(registered.id))
        .await
        .unwrap()
        .is_some());

    let unknown = fx.service.get_profile(Uuid::new_v4()).await;
    assert!(matches!(
        unknown,
        Err(ApplicationError::Domain(domain::DomainError::UserNotFound))
    ));
}
