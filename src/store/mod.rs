//! Persistence for user accounts.
//!
//! Every mutation of lockout counters, refresh tokens and one-time tokens is
//! a single atomic operation in each backend; callers never read, modify and
//! write back.

pub mod memory;
pub mod postgres;

use crate::config::oauth::OAuthProvider;
use crate::error::AppResult;
use crate::models::{NewUser, ProfileUpdate, Role, UserModel};
use crate::services::lockout::LockoutPolicy;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::sync::Arc;

pub use memory::MemoryUserStore;
pub use postgres::PgUserStore;

pub const DUPLICATE_EMAIL_MESSAGE: &str = "User with this email already exists";

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn ping(&self) -> AppResult<()>;

    async fn find_by_id(&self, id: i32) -> AppResult<Option<UserModel>>;
    /// `email` must already be normalized.
    async fn find_by_email(&self, email: &str) -> AppResult<Option<UserModel>>;
    async fn find_by_provider(
        &self,
        provider: OAuthProvider,
        provider_id: &str,
    ) -> AppResult<Option<UserModel>>;
    async fn find_by_reset_token(&self, digest: &str) -> AppResult<Option<UserModel>>;
    /// All users ordered by id.
    async fn list(&self) -> AppResult<Vec<UserModel>>;
    async fn has_admin(&self) -> AppResult<bool>;

    /// Fails with a validation error when the email is taken.
    async fn create(&self, user: NewUser, now: NaiveDateTime) -> AppResult<UserModel>;

    async fn set_refresh_token(
        &self,
        id: i32,
        digest: Option<&str>,
        now: NaiveDateTime,
    ) -> AppResult<()>;

    /// Applies [`LockoutPolicy::register_failure`] to an unlocked account.
    /// Returns `None` when the account is missing or currently locked.
    async fn record_failed_login(
        &self,
        id: i32,
        policy: &LockoutPolicy,
        now: NaiveDateTime,
    ) -> AppResult<Option<UserModel>>;

    /// Resets lockout state, stamps `last_login` and stores the refresh digest.
    async fn record_successful_login(
        &self,
        id: i32,
        refresh_digest: &str,
        now: NaiveDateTime,
    ) -> AppResult<Option<UserModel>>;

    async fn set_reset_token(
        &self,
        id: i32,
        digest: &str,
        expires: NaiveDateTime,
        now: NaiveDateTime,
    ) -> AppResult<()>;
    async fn clear_reset_token(&self, id: i32, now: NaiveDateTime) -> AppResult<()>;

    /// Sets the new password only if the token is still present and unexpired.
    /// Clears the token, the stored refresh token and lockout state with it.
    async fn consume_reset_token(
        &self,
        digest: &str,
        password_hash: &str,
        now: NaiveDateTime,
    ) -> AppResult<Option<UserModel>>;

    async fn consume_verification_token(
        &self,
        digest: &str,
        now: NaiveDateTime,
    ) -> AppResult<Option<UserModel>>;

    /// Sets the provider id only when none is linked yet; `None` otherwise.
    async fn link_provider(
        &self,
        id: i32,
        provider: OAuthProvider,
        provider_id: &str,
        now: NaiveDateTime,
    ) -> AppResult<Option<UserModel>>;

    async fn update_profile(
        &self,
        id: i32,
        update: ProfileUpdate,
        now: NaiveDateTime,
    ) -> AppResult<Option<UserModel>>;

    async fn update_role(
        &self,
        id: i32,
        role: Role,
        now: NaiveDateTime,
    ) -> AppResult<Option<UserModel>>;
}

pub type SharedUserStore = Arc<dyn UserStore>;
