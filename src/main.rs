use sea_orm_migration::MigratorTrait;
use signscribe::config::{
    auth::AuthConfig, database, jwt::JwtConfig, oauth::OAuthConfig, parse_bool_env,
    rate_limit::RateLimitConfig,
};
use signscribe::migration::Migrator;
use signscribe::services::{
    admin::AdminService,
    auth::AuthService,
    bootstrap_admin::{ensure_bootstrap_admin, BootstrapAdminConfig},
    email::EmailService,
    oauth::OAuthService,
    upload::UploadConfig,
    user::UserService,
};
use signscribe::store::{memory::MemoryUserStore, postgres::PgUserStore, SharedUserStore};
use signscribe::utils::{cookie::CookieConfig, SharedClock, SystemClock, TokenIssuer};
use signscribe::{create_app, AppServices};
use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    // Validate configuration before doing anything else
    let jwt_config = validate_config()?;

    tracing::info!("Starting SignScribe API v{}...", env!("CARGO_PKG_VERSION"));

    let store = build_store().await?;
    let clock: SharedClock = Arc::new(SystemClock);

    if let Some(cfg) = BootstrapAdminConfig::from_env() {
        ensure_bootstrap_admin(&store, &clock, cfg).await?;
    }

    let auth_config = AuthConfig::from_env();
    let email_service =
        EmailService::from_env(auth_config.frontend_url.clone(), auth_config.email_timeout);
    if email_service.is_configured() {
        tracing::info!("SMTP email service configured");
    } else {
        tracing::warn!("SMTP not configured, emails will be skipped");
    }

    let oauth_config = OAuthConfig::from_env();
    for (name, enabled) in [
        ("google", oauth_config.google.is_some()),
        ("facebook", oauth_config.facebook.is_some()),
    ] {
        tracing::info!(provider = name, enabled, "OAuth provider");
    }

    let services = AppServices {
        auth: AuthService::new(
            store.clone(),
            TokenIssuer::new(&jwt_config),
            auth_config,
            email_service,
            clock.clone(),
        ),
        users: UserService::new(store.clone(), clock.clone()),
        admin: AdminService::new(store.clone(), clock.clone()),
        oauth: OAuthService::new(oauth_config)?,
        upload: UploadConfig::from_env(),
        cookies: CookieConfig::from_env(),
        store,
    };

    let rate_limit = RateLimitConfig::from_env();
    if !rate_limit.enabled {
        tracing::warn!("Rate limiting is disabled");
    }

    let app = create_app(services, &rate_limit);

    let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port = env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("{}:{}", host, port);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui/", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server shut down gracefully");
    Ok(())
}

/// `LOG_FORMAT=json` switches to structured JSON lines.
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "signscribe=debug,tower_http=debug,axum=debug".into());

    let json = env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Validate all required configuration at startup (fail-fast).
fn validate_config() -> anyhow::Result<JwtConfig> {
    let jwt_config = JwtConfig::from_env()?;

    if !use_memory_store() && env::var("DATABASE_URL").is_err() {
        return Err(anyhow::anyhow!(
            "DATABASE_URL environment variable must be set"
        ));
    }

    let upload = UploadConfig::from_env();
    std::fs::create_dir_all(&upload.upload_dir).map_err(|e| {
        anyhow::anyhow!(
            "Failed to create upload directory '{}': {}",
            upload.upload_dir.display(),
            e
        )
    })?;

    Ok(jwt_config)
}

fn use_memory_store() -> bool {
    parse_bool_env("USE_MEMORY_STORE", false)
}

async fn build_store() -> anyhow::Result<SharedUserStore> {
    if use_memory_store() {
        tracing::warn!("USE_MEMORY_STORE is set, accounts will not survive a restart");
        return Ok(Arc::new(MemoryUserStore::new()));
    }

    let database_url = env::var("DATABASE_URL")?;
    let db = database::get_database(&database_url).await?;
    tracing::info!("Database connected successfully");

    Migrator::up(&db, None).await?;
    tracing::info!("Database migrations applied successfully");

    Ok(Arc::new(PgUserStore::new(db)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install CTRL+C signal handler: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, gracefully shutting down...");
}
