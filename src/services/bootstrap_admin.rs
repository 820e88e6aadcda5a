use crate::config::parse_bool_env;
use crate::error::AppResult;
use crate::models::{NewUser, Role};
use crate::services::auth::normalize_email;
use crate::store::SharedUserStore;
use crate::utils::{hash_password, SharedClock};
use std::env;

#[derive(Debug, Clone)]
pub struct BootstrapAdminConfig {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl BootstrapAdminConfig {
    pub fn from_env() -> Option<Self> {
        if !parse_bool_env("BOOTSTRAP_ADMIN_ENABLED", false) {
            return None;
        }

        Some(Self {
            name: env::var("BOOTSTRAP_ADMIN_NAME").unwrap_or_else(|_| "Administrator".to_string()),
            email: env::var("BOOTSTRAP_ADMIN_EMAIL").ok()?,
            password: env::var("BOOTSTRAP_ADMIN_PASSWORD").ok()?,
        })
    }
}

/// Runs at startup:
/// - any admin already present: nothing to do
/// - the configured email exists: promote it
/// - otherwise create a verified admin
pub async fn ensure_bootstrap_admin(
    store: &SharedUserStore,
    clock: &SharedClock,
    cfg: BootstrapAdminConfig,
) -> AppResult<()> {
    if store.has_admin().await? {
        return Ok(());
    }

    let email = normalize_email(&cfg.email);
    let now = clock.now();

    if let Some(user) = store.find_by_email(&email).await? {
        store.update_role(user.id, Role::Admin, now).await?;
        tracing::info!(user_id = user.id, "Promoted bootstrap admin");
        return Ok(());
    }

    let password_hash = hash_password(&cfg.password).await?;
    let mut new_user = NewUser::local(cfg.name, email, password_hash);
    new_user.role = Role::Admin;
    new_user.is_email_verified = true;

    let user = store.create(new_user, now).await?;
    tracing::info!(user_id = user.id, "Created bootstrap admin");
    Ok(())
}
