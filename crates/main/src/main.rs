//! 主应用程序入口：装配各层并启动 Axum 服务。

use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use application::{
    Hub, MessageService, MessageServiceDependencies, PostService, PostServiceDependencies,
    SlidingWindowLimiter, SystemClock, TokenBucket, UserService, UserServiceDependencies,
};
use config::AppConfig;
use infrastructure::{
    create_pg_pool, create_redis_manager, BcryptPasswordHasher, PgMessageRepository,
    PgPostRepository, PgUserRepository, RedisCache, RedisCounterStore,
};
use web_api::{router, AppState, JwtService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = AppConfig::from_env_with_defaults();
    config.validate()?;

    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        "starting social media backend"
    );

    let pg_pool = Arc::new(
        create_pg_pool(&config.database.url, config.database.max_connections).await?,
    );
    sqlx::migrate!("../../migrations").run(pg_pool.as_ref()).await?;

    let redis_manager = create_redis_manager(&config.redis.url).await?;
    let cache: Arc<dyn application::Cache> = Arc::new(RedisCache::new(redis_manager.clone()));
    let counter_store = Arc::new(RedisCounterStore::new(redis_manager));

    let clock: Arc<dyn application::Clock> = Arc::new(SystemClock);
    let password_hasher: Arc<dyn application::PasswordHasher> =
        Arc::new(BcryptPasswordHasher::new(config.server.bcrypt_cost));
    let hub = Arc::new(Hub::new(config.hub.queue_capacity));

    let user_service = Arc::new(UserService::new(UserServiceDependencies {
        user_repository: Arc::new(PgUserRepository::new(pg_pool.clone())),
        cache: cache.clone(),
        password_hasher,
        clock: clock.clone(),
    }));
    let post_service = Arc::new(PostService::new(PostServiceDependencies {
        post_repository: Arc::new(PgPostRepository::new(pg_pool.clone())),
        cache: cache.clone(),
        clock: clock.clone(),
    }));
    let message_service = Arc::new(MessageService::new(MessageServiceDependencies {
        message_repository: Arc::new(PgMessageRepository::new(pg_pool)),
        cache,
        publisher: hub.clone(),
        clock: clock.clone(),
    }));

    let state = AppState {
        user_service,
        post_service,
        message_service,
        hub,
        jwt_service: JwtService::new(config.jwt.clone()),
        token_bucket: Arc::new(TokenBucket::new(
            config.rate_limit.global_capacity,
            config.rate_limit.global_refill_per_sec,
        )),
        rate_limiter: Arc::new(SlidingWindowLimiter::new(counter_store, clock)),
    };

    let app = router(state);
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");

    // 限流需要拿到客户端地址，保留 ConnectInfo
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
