//! 用户用例服务：注册、登录验证、资料查询。

use std::sync::Arc;

use domain::{DomainError, User, UserEmail, UserId, Username};
use uuid::Uuid;

use crate::{
    cache::{self, Cache, CacheKey},
    clock::Clock,
    dto::UserDto,
    error::ApplicationError,
    password::PasswordHasher,
    repository::UserRepository,
};

#[derive(Debug, Clone)]
pub struct RegisterUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct AuthenticateUserRequest {
    pub email: String,
    pub password: String,
}

pub struct UserServiceDependencies {
    pub user_repository: Arc<dyn UserRepository>,
    pub cache: Arc<dyn Cache>,
    pub password_hasher: Arc<dyn PasswordHasher>,
    pub clock: Arc<dyn Clock>,
}

pub struct UserService {
    deps: UserServiceDependencies,
}

impl UserService {
    pub fn new(deps: UserServiceDependencies) -> Self {
        Self { deps }
    }

    pub async fn register(&self, request: RegisterUserRequest) -> Result<UserDto, ApplicationError> {
        let username = Username::parse(request.username)?;
        let email = UserEmail::parse(request.email)?;

        if self
            .deps
            .user_repository
            .find_by_email(email.clone())
            .await?
            .is_some()
        {
            return Err(DomainError::UserAlreadyExists.into());
        }

        if self
            .deps
            .user_repository
            .find_by_username(username.clone())
            .await?
            .is_some()
        {
            return Err(DomainError::UserAlreadyExists.into());
        }

        let password_hash = self.deps.password_hasher.hash(&request.password).await?;
        let user = User::register(
            UserId::from(Uuid::new_v4()),
            username,
            email,
            password_hash,
            self.deps.clock.now(),
        );

        let stored = self.deps.user_repository.create(user).await?;
        Ok(UserDto::from(&stored))
    }

    pub async fn authenticate(
        &self,
        request: AuthenticateUserRequest,
    ) -> Result<UserDto, ApplicationError> {
        let email = UserEmail::parse(request.email)?;
        let user = self
            .deps
            .user_repository
            .find_by_email(email)
            .await?
            .ok_or(ApplicationError::Authentication)?;

        let password_ok = self
            .deps
            .password_hasher
            .verify(&request.password, &user.password)
            .await?;
        if !password_ok {
            return Err(ApplicationError::Authentication);
        }

        Ok(UserDto::from(&user))
    }

    /// 用户资料，读穿透缓存（30 分钟 TTL）。
    pub async fn get_profile(&self, id: Uuid) -> Result<UserDto, ApplicationError> {
        let key = CacheKey::User(id);
        if let Some(dto) = cache::lookup_json::<UserDto>(self.deps.cache.as_ref(), &key).await {
            return Ok(dto);
        }

        let user = self
            .deps
            .user_repository
            .find_by_id(UserId::from(id))
            .await?
            .ok_or(DomainError::UserNotFound)?;

        let dto = UserDto::from(&user);
        cache::store_json(self.deps.cache.as_ref(), &key, &dto).await;
        Ok(dto)
    }
}
