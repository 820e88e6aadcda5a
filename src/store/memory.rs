use super::{UserStore, DUPLICATE_EMAIL_MESSAGE};
use crate::config::oauth::OAuthProvider;
use crate::error::{AppError, AppResult};
use crate::models::{NewUser, ProfileUpdate, Role, UserModel};
use crate::services::lockout::LockoutPolicy;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicI32, Ordering};

/// Process-local store used by the test suite and database-less runs.
/// Each mutation happens under the map's per-entry write lock.
#[derive(Default)]
pub struct MemoryUserStore {
    users: DashMap<i32, UserModel>,
    by_email: DashMap<String, i32>,
    next_id: AtomicI32,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn find_id(&self, predicate: impl Fn(&UserModel) -> bool) -> Option<i32> {
        self.users
            .iter()
            .find(|entry| predicate(entry.value()))
            .map(|entry| *entry.key())
    }

    fn update<F>(&self, id: i32, apply: F) -> Option<UserModel>
    where
        F: FnOnce(&mut UserModel) -> bool,
    {
        let mut entry = self.users.get_mut(&id)?;
        apply(entry.value_mut()).then(|| entry.value().clone())
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }

    async fn find_by_id(&self, id: i32) -> AppResult<Option<UserModel>> {
        Ok(self.users.get(&id).map(|u| u.value().clone()))
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<UserModel>> {
        let id = self.by_email.get(email).map(|id| *id.value());
        match id {
            Some(id) => self.find_by_id(id).await,
            None => Ok(None),
        }
    }

    async fn find_by_provider(
        &self,
        provider: OAuthProvider,
        provider_id: &str,
    ) -> AppResult<Option<UserModel>> {
        let id = self.find_id(|u| {
            let linked = match provider {
                OAuthProvider::Google => u.google_id.as_deref(),
                OAuthProvider::Facebook => u.facebook_id.as_deref(),
            };
            linked == Some(provider_id)
        });
        match id {
            Some(id) => self.find_by_id(id).await,
            None => Ok(None),
        }
    }

    async fn find_by_reset_token(&self, digest: &str) -> AppResult<Option<UserModel>> {
        let id = self.find_id(|u| u.password_reset_token.as_deref() == Some(digest));
        match id {
            Some(id) => self.find_by_id(id).await,
            None => Ok(None),
        }
    }

    async fn list(&self) -> AppResult<Vec<UserModel>> {
        let mut users: Vec<UserModel> = self.users.iter().map(|u| u.value().clone()).collect();
        users.sort_by_key(|u| u.id);
        Ok(users)
    }

    async fn has_admin(&self) -> AppResult<bool> {
        Ok(self.find_id(|u| u.role == Role::Admin.as_str()).is_some())
    }

    async fn create(&self, new_user: NewUser, now: NaiveDateTime) -> AppResult<UserModel> {
        match self.by_email.entry(new_user.email.clone()) {
            Entry::Occupied(_) => Err(AppError::Validation(DUPLICATE_EMAIL_MESSAGE.to_string())),
            Entry::Vacant(slot) => {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
                let user = UserModel {
                    id,
                    name: new_user.name,
                    email: new_user.email,
                    password_hash: new_user.password_hash,
                    role: new_user.role.to_string(),
                    bio: None,
                    profile_picture: new_user.profile_picture,
                    google_id: new_user.google_id,
                    facebook_id: new_user.facebook_id,
                    refresh_token: None,
                    failed_login_attempts: 0,
                    lock_until: None,
                    password_reset_token: None,
                    password_reset_expires: None,
                    is_email_verified: new_user.is_email_verified,
                    email_verification_token: new_user.email_verification_token,
                    email_verification_expires: new_user.email_verification_expires,
                    created_at: now,
                    updated_at: now,
                    last_login: None,
                    last_password_change: None,
                };
                self.users.insert(id, user.clone());
                slot.insert(id);
                Ok(user)
            }
        }
    }

    async fn set_refresh_token(
        &self,
        id: i32,
        digest: Option<&str>,
        now: NaiveDateTime,
    ) -> AppResult<()> {
        self.update(id, |u| {
            u.refresh_token = digest.map(str::to_owned);
            u.updated_at = now;
            true
        });
        Ok(())
    }

    async fn record_failed_login(
        &self,
        id: i32,
        policy: &LockoutPolicy,
        now: NaiveDateTime,
    ) -> AppResult<Option<UserModel>> {
        Ok(self.update(id, |u| {
            if matches!(u.lock_until, Some(until) if now < until) {
                return false;
            }
            let outcome = policy.register_failure(u.failed_login_attempts, u.lock_until, now);
            u.failed_login_attempts = outcome.attempts;
            u.lock_until = outcome.lock_until;
            u.updated_at = now;
            true
        }))
    }

    async fn record_successful_login(
        &self,
        id: i32,
        refresh_digest: &str,
        now: NaiveDateTime,
    ) -> AppResult<Option<UserModel>> {
        Ok(self.update(id, |u| {
            u.failed_login_attempts = 0;
            u.lock_until = None;
            u.last_login = Some(now);
            u.refresh_token = Some(refresh_digest.to_owned());
            u.updated_at = now;
            true
        }))
    }

    async fn set_reset_token(
        &self,
        id: i32,
        digest: &str,
        expires: NaiveDateTime,
        now: NaiveDateTime,
    ) -> AppResult<()> {
        self.update(id, |u| {
            u.password_reset_token = Some(digest.to_owned());
            u.password_reset_expires = Some(expires);
            u.updated_at = now;
            true
        });
        Ok(())
    }

    async fn clear_reset_token(&self, id: i32, now: NaiveDateTime) -> AppResult<()> {
        self.update(id, |u| {
            u.password_reset_token = None;
            u.password_reset_expires = None;
            u.updated_at = now;
            true
        });
        Ok(())
    }

    async fn consume_reset_token(
        &self,
        digest: &str,
        password_hash: &str,
        now: NaiveDateTime,
    ) -> AppResult<Option<UserModel>> {
        let Some(id) = self.find_id(|u| u.password_reset_token.as_deref() == Some(digest)) else {
            return Ok(None);
        };

        // Re-checked under the entry lock; a concurrent reset may have won.
        Ok(self.update(id, |u| {
            let pending = u.password_reset_token.as_deref() == Some(digest)
                && matches!(u.password_reset_expires, Some(expires) if expires > now);
            if !pending {
                return false;
            }
            u.password_hash = password_hash.to_owned();
            u.password_reset_token = None;
            u.password_reset_expires = None;
            u.refresh_token = None;
            u.failed_login_attempts = 0;
            u.lock_until = None;
            u.last_password_change = Some(now);
            u.updated_at = now;
            true
        }))
    }

    async fn consume_verification_token(
        &self,
        digest: &str,
        now: NaiveDateTime,
    ) -> AppResult<Option<UserModel>> {
        let Some(id) = self.find_id(|u| u.email_verification_token.as_deref() == Some(digest))
        else {
            return Ok(None);
        };

        Ok(self.update(id, |u| {
            let pending = u.email_verification_token.as_deref() == Some(digest)
                && matches!(u.email_verification_expires, Some(expires) if expires > now);
            if !pending {
                return false;
            }
            u.is_email_verified = true;
            u.email_verification_token = None;
            u.email_verification_expires = None;
            u.updated_at = now;
            true
        }))
    }

    async fn link_provider(
        &self,
        id: i32,
        provider: OAuthProvider,
        provider_id: &str,
        now: NaiveDateTime,
    ) -> AppResult<Option<UserModel>> {
        Ok(self.update(id, |u| {
            let slot = match provider {
                OAuthProvider::Google => &mut u.google_id,
                OAuthProvider::Facebook => &mut u.facebook_id,
            };
            if slot.is_some() {
                return false;
            }
            *slot = Some(provider_id.to_owned());
            u.updated_at = now;
            true
        }))
    }

    async fn update_profile(
        &self,
        id: i32,
        update: ProfileUpdate,
        now: NaiveDateTime,
    ) -> AppResult<Option<UserModel>> {
        Ok(self.update(id, |u| {
            if let Some(name) = update.name {
                u.name = name;
            }
            if let Some(bio) = update.bio {
                u.bio = Some(bio);
            }
            if let Some(picture) = update.profile_picture {
                u.profile_picture = Some(picture);
            }
            u.updated_at = now;
            true
        }))
    }

    async fn update_role(
        &self,
        id: i32,
        role: Role,
        now: NaiveDateTime,
    ) -> AppResult<Option<UserModel>> {
        Ok(self.update(id, |u| {
            u.role = role.to_string();
            u.updated_at = now;
            true
        }))
    }
}
