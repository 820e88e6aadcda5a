use crate::{
    config::{auth::AuthConfig, oauth::OAuthProvider},
    error::{AppError, AppResult},
    models::{NewUser, UserModel},
    services::{
        email::EmailService,
        lockout::{minutes_remaining, LockState, LockoutPolicy},
        oauth::OAuthProfile,
    },
    store::SharedUserStore,
    utils::{
        hash_password,
        token::{digest, generate_token},
        validate_password_strength, verify_password, SharedClock, TokenIssuer,
    },
};
use std::sync::Arc;

pub const FORGOT_PASSWORD_MESSAGE: &str =
    "If an account with that email exists, a password reset link has been sent";

/// Fixed cost-10 bcrypt hash, verified against for unknown emails.
const DUMMY_PASSWORD_HASH: &str = "$2a$10$N9qo8uLOickgx2ZMRZoMyeIjZAgcfl7p92ldGxad68LJZdL17lhWy";

/// A freshly authenticated user and the tokens handed back to the client.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user: UserModel,
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Clone)]
pub struct AuthService {
    store: SharedUserStore,
    issuer: Arc<TokenIssuer>,
    policy: LockoutPolicy,
    config: Arc<AuthConfig>,
    email: EmailService,
    clock: SharedClock,
}

/// Emails are compared case-insensitively.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl AuthService {
    pub fn new(
        store: SharedUserStore,
        issuer: TokenIssuer,
        config: AuthConfig,
        email: EmailService,
        clock: SharedClock,
    ) -> Self {
        Self {
            store,
            issuer: Arc::new(issuer),
            policy: LockoutPolicy::from(&config),
            config: Arc::new(config),
            email,
            clock,
        }
    }

    pub fn store(&self) -> &SharedUserStore {
        &self.store
    }

    pub async fn signup(&self, name: &str, email: &str, password: &str) -> AppResult<AuthSession> {
        let email = normalize_email(email);

        if self.store.find_by_email(&email).await?.is_some() {
            return Err(AppError::Validation(
                crate::store::DUPLICATE_EMAIL_MESSAGE.to_string(),
            ));
        }
        validate_password_strength(password)?;

        let password_hash = hash_password(password).await?;
        let now = self.clock.now();
        let mut new_user = NewUser::local(name.trim().to_string(), email, password_hash);

        let verification_token = if self.config.send_verification_email {
            let token = generate_token()?;
            new_user.email_verification_token = Some(digest(&token));
            new_user.email_verification_expires = Some(now + self.config.email_verification_ttl);
            Some(token)
        } else {
            None
        };

        let user = self.store.create(new_user, now).await?;
        tracing::info!(user_id = user.id, "User signed up");

        let access_token = self.issuer.issue_access(&user)?;
        let refresh_token = self.issuer.issue_refresh(&user)?;
        self.store
            .set_refresh_token(user.id, Some(&digest(&refresh_token)), now)
            .await?;

        if let Some(token) = verification_token {
            self.email
                .dispatch(self.email.verification_email(&user.email, &token));
        }

        Ok(AuthSession {
            user,
            access_token,
            refresh_token,
        })
    }

    pub async fn login(&self, email: &str, password: &str) -> AppResult<AuthSession> {
        let email = normalize_email(email);
        let Some(user) = self.store.find_by_email(&email).await? else {
            // Same bcrypt cost as a wrong password.
            verify_password(password, DUMMY_PASSWORD_HASH).await;
            return Err(AppError::InvalidCredentials {
                attempts_remaining: None,
            });
        };

        let now = self.clock.now();
        self.ensure_unlocked(&user, now)?;

        if !verify_password(password, &user.password_hash).await {
            return Err(self.register_failed_login(user.id).await);
        }

        self.start_session(user).await
    }

    async fn register_failed_login(&self, user_id: i32) -> AppError {
        let now = self.clock.now();
        let updated = match self.store.record_failed_login(user_id, &self.policy, now).await {
            Ok(updated) => updated,
            Err(e) => return e,
        };

        match updated {
            Some(user) => match user.lock_until {
                Some(until) => {
                    tracing::warn!(
                        user_id,
                        attempts = user.failed_login_attempts,
                        "Account locked after repeated failed logins"
                    );
                    AppError::AccountLocked {
                        minutes_remaining: minutes_remaining(until, now),
                    }
                }
                None => {
                    tracing::info!(
                        user_id,
                        attempts = user.failed_login_attempts,
                        "Login failed"
                    );
                    AppError::InvalidCredentials {
                        attempts_remaining: Some(
                            self.policy.attempts_remaining(user.failed_login_attempts),
                        ),
                    }
                }
            },
            // Another request locked the account between our check and the update.
            None => match self.store.find_by_id(user_id).await {
                Ok(Some(user)) => match self.policy.state(&user, now) {
                    LockState::Locked { until } => AppError::AccountLocked {
                        minutes_remaining: minutes_remaining(until, now),
                    },
                    LockState::Unlocked => AppError::InvalidCredentials {
                        attempts_remaining: None,
                    },
                },
                Ok(None) => AppError::InvalidCredentials {
                    attempts_remaining: None,
                },
                Err(e) => e,
            },
        }
    }

    /// Issues both tokens and records a successful login, rotating the stored refresh digest.
    async fn start_session(&self, user: UserModel) -> AppResult<AuthSession> {
        let access_token = self.issuer.issue_access(&user)?;
        let refresh_token = self.issuer.issue_refresh(&user)?;

        let user = self
            .store
            .record_successful_login(user.id, &digest(&refresh_token), self.clock.now())
            .await?
            .ok_or(AppError::NotFound)?;
        tracing::info!(user_id = user.id, "User logged in");

        Ok(AuthSession {
            user,
            access_token,
            refresh_token,
        })
    }

    /// Mints a new access token. The refresh token itself is not rotated.
    pub async fn refresh(&self, refresh_token: &str) -> AppResult<String> {
        let user = self.authenticate_refresh_token(refresh_token).await?;
        self.issuer.issue_access(&user)
    }

    pub async fn logout(&self, user_id: i32) -> AppResult<()> {
        self.store
            .set_refresh_token(user_id, None, self.clock.now())
            .await?;
        tracing::info!(user_id, "User logged out");
        Ok(())
    }

    pub async fn authenticate_access_token(&self, token: &str) -> AppResult<UserModel> {
        let claims = self.issuer.verify_access(token)?;
        self.store
            .find_by_id(claims.id)
            .await?
            .ok_or(AppError::InvalidToken)
    }

    /// Valid signature is not enough: the token must also be the one last issued.
    pub async fn authenticate_refresh_token(&self, token: &str) -> AppResult<UserModel> {
        let claims = self.issuer.verify_refresh(token)?;
        let user = self
            .store
            .find_by_id(claims.id)
            .await?
            .ok_or(AppError::InvalidToken)?;

        match user.refresh_token.as_deref() {
            Some(stored) if stored == digest(token) => Ok(user),
            _ => {
                tracing::info!(user_id = user.id, "Refresh token does not match stored token");
                Err(AppError::InvalidToken)
            }
        }
    }

    /// Always succeeds for well-formed requests so callers cannot probe for accounts.
    pub async fn forgot_password(&self, email: &str) -> AppResult<()> {
        let email = normalize_email(email);
        let Some(user) = self.store.find_by_email(&email).await? else {
            tracing::debug!("Password reset requested for unknown email");
            return Ok(());
        };

        let token = match generate_token() {
            Ok(token) => token,
            Err(e) => {
                tracing::error!(user_id = user.id, "Failed to generate reset token: {e:#}");
                return Ok(());
            }
        };
        let now = self.clock.now();
        let expires = now + self.config.password_reset_ttl;

        if let Err(e) = self
            .store
            .set_reset_token(user.id, &digest(&token), expires, now)
            .await
        {
            tracing::error!(user_id = user.id, "Failed to store reset token: {e}");
            return Ok(());
        }

        tracing::info!(user_id = user.id, "Password reset requested");
        self.email
            .dispatch(self.email.password_reset_email(&user.email, &token));
        Ok(())
    }

    pub async fn reset_password(&self, token: &str, new_password: &str) -> AppResult<()> {
        let token_digest = digest(token);
        let user = self
            .store
            .find_by_reset_token(&token_digest)
            .await?
            .ok_or(AppError::InvalidResetToken)?;

        let now = self.clock.now();
        let expired = user.password_reset_expires.map_or(true, |expires| expires <= now);
        if expired {
            self.store.clear_reset_token(user.id, now).await?;
            return Err(AppError::InvalidResetToken);
        }

        validate_password_strength(new_password)?;
        let password_hash = hash_password(new_password).await?;

        let user = self
            .store
            .consume_reset_token(&token_digest, &password_hash, self.clock.now())
            .await?
            .ok_or(AppError::InvalidResetToken)?;
        tracing::info!(user_id = user.id, "Password reset completed");
        Ok(())
    }

    pub async fn verify_email(&self, token: &str) -> AppResult<UserModel> {
        let user = self
            .store
            .consume_verification_token(&digest(token), self.clock.now())
            .await?
            .ok_or_else(|| {
                AppError::Validation(
                    "Email verification token is invalid or has expired".to_string(),
                )
            })?;
        tracing::info!(user_id = user.id, "Email verified");
        Ok(user)
    }

    /// Finds the account by provider id, then by email (linking the provider
    /// when none is linked yet), and otherwise creates one. Locked accounts are
    /// rejected; a successful OAuth login clears lockout state.
    pub async fn login_with_oauth(
        &self,
        provider: OAuthProvider,
        profile: &OAuthProfile,
    ) -> AppResult<AuthSession> {
        let email = profile
            .email
            .as_deref()
            .map(normalize_email)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| {
                AppError::Validation(format!("{provider} profile did not include an email address"))
            })?;
        let now = self.clock.now();

        let user = match self.store.find_by_provider(provider, &profile.id).await? {
            Some(user) => {
                self.ensure_unlocked(&user, now)?;
                user
            }
            None => match self.store.find_by_email(&email).await? {
                Some(existing) => {
                    self.ensure_unlocked(&existing, now)?;
                    tracing::info!(user_id = existing.id, %provider, "Linking OAuth provider");
                    self.store
                        .link_provider(existing.id, provider, &profile.id, now)
                        .await?
                        .ok_or_else(|| {
                            tracing::warn!(
                                user_id = existing.id,
                                %provider,
                                "Account already linked to another provider identity"
                            );
                            AppError::Unauthorized
                        })?
                }
                None => {
                    let name = profile
                        .name
                        .clone()
                        .filter(|n| !n.trim().is_empty())
                        .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());
                    let mut new_user = NewUser::local(
                        name,
                        email,
                        provider.password_placeholder().to_string(),
                    );
                    new_user.is_email_verified = true;
                    new_user.profile_picture = profile.picture.clone();
                    match provider {
                        OAuthProvider::Google => new_user.google_id = Some(profile.id.clone()),
                        OAuthProvider::Facebook => new_user.facebook_id = Some(profile.id.clone()),
                    }
                    let user = self.store.create(new_user, now).await?;
                    tracing::info!(user_id = user.id, %provider, "User created via OAuth");
                    user
                }
            },
        };

        self.start_session(user).await
    }

    fn ensure_unlocked(&self, user: &UserModel, now: chrono::NaiveDateTime) -> AppResult<()> {
        match self.policy.state(user, now) {
            LockState::Locked { until } => {
                tracing::info!(user_id = user.id, "Login rejected, account locked");
                Err(AppError::AccountLocked {
                    minutes_remaining: minutes_remaining(until, now),
                })
            }
            LockState::Unlocked => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::jwt::JwtConfig;
    use crate::services::email::MemoryOutbox;
    use crate::store::MemoryUserStore;
    use crate::utils::ManualClock;
    use std::time::Duration;

    struct Harness {
        service: AuthService,
        clock: ManualClock,
        outbox: Arc<MemoryOutbox>,
    }

    fn harness() -> Harness {
        let jwt = JwtConfig::new(
            "access_secret_that_is_at_least_32_characters".into(),
            "refresh_secret_that_is_at_least_32_characters".into(),
            900,
            604800,
        )
        .unwrap();
        let clock = ManualClock::default();
        let outbox = Arc::new(MemoryOutbox::new());
        let email = EmailService::new(
            Some(outbox.clone()),
            "http://localhost:8080".into(),
            Duration::from_secs(1),
        );
        let service = AuthService::new(
            Arc::new(MemoryUserStore::new()),
            TokenIssuer::new(&jwt),
            AuthConfig::default(),
            email,
            Arc::new(clock.clone()),
        );
        Harness {
            service,
            clock,
            outbox,
        }
    }

    #[tokio::test]
    async fn signup_normalizes_email_and_stores_refresh_digest() {
        let h = harness();
        let session = h
            .service
            .signup("Alice", "  Alice@Example.com ", "Str0ng!Pass")
            .await
            .unwrap();
        assert_eq!(session.user.email, "alice@example.com");

        let stored = h.service.store().find_by_id(session.user.id).await.unwrap().unwrap();
        assert_eq!(stored.refresh_token, Some(digest(&session.refresh_token)));
        assert_ne!(stored.password_hash, "Str0ng!Pass");
    }

    #[tokio::test]
    async fn signup_rejects_weak_password_and_duplicates() {
        let h = harness();
        assert!(matches!(
            h.service.signup("Bob", "bob@example.com", "weak").await,
            Err(AppError::Validation(_))
        ));
        h.service.signup("Bob", "bob@example.com", "Str0ng!Pass").await.unwrap();
        assert!(matches!(
            h.service.signup("Bob", "BOB@example.com", "Str0ng!Pass").await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn unknown_email_and_wrong_password_share_error() {
        let h = harness();
        h.service.signup("Alice", "alice@example.com", "Str0ng!Pass").await.unwrap();

        let unknown = h.service.login("nobody@example.com", "Str0ng!Pass").await.unwrap_err();
        let wrong = h.service.login("alice@example.com", "Wr0ng!Pass").await.unwrap_err();
        assert_eq!(unknown.to_string(), wrong.to_string());
        assert!(matches!(
            wrong,
            AppError::InvalidCredentials {
                attempts_remaining: Some(4)
            }
        ));
    }

    #[tokio::test]
    async fn locked_account_rejects_correct_password_until_expiry() {
        let h = harness();
        h.service.signup("Alice", "alice@example.com", "Str0ng!Pass").await.unwrap();

        for _ in 0..4 {
            h.service.login("alice@example.com", "Wr0ng!Pass").await.unwrap_err();
        }
        let fifth = h.service.login("alice@example.com", "Wr0ng!Pass").await.unwrap_err();
        assert!(matches!(fifth, AppError::AccountLocked { minutes_remaining: 15 }));

        let while_locked = h.service.login("alice@example.com", "Str0ng!Pass").await.unwrap_err();
        assert!(matches!(while_locked, AppError::AccountLocked { .. }));

        h.clock.advance(chrono::Duration::minutes(16));
        let session = h.service.login("alice@example.com", "Str0ng!Pass").await.unwrap();
        assert_eq!(session.user.failed_login_attempts, 0);
        assert!(session.user.lock_until.is_none());
        assert!(session.user.last_login.is_some());
    }

    #[tokio::test]
    async fn refresh_requires_stored_token() {
        let h = harness();
        let session = h
            .service
            .signup("Alice", "alice@example.com", "Str0ng!Pass")
            .await
            .unwrap();
        assert!(h.service.refresh(&session.refresh_token).await.is_ok());

        // A newer login rotates the stored token.
        let second = h.service.login("alice@example.com", "Str0ng!Pass").await.unwrap();
        assert!(h.service.refresh(&session.refresh_token).await.is_err());
        assert!(h.service.refresh(&second.refresh_token).await.is_ok());

        h.service.logout(second.user.id).await.unwrap();
        assert!(matches!(
            h.service.refresh(&second.refresh_token).await,
            Err(AppError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn access_token_cannot_refresh() {
        let h = harness();
        let session = h
            .service
            .signup("Alice", "alice@example.com", "Str0ng!Pass")
            .await
            .unwrap();
        assert!(h.service.refresh(&session.access_token).await.is_err());
        assert!(h
            .service
            .authenticate_access_token(&session.refresh_token)
            .await
            .is_err());
    }

    async fn emailed_token(outbox: &MemoryOutbox, to: &str) -> String {
        for _ in 0..100 {
            if let Some(email) = outbox.last_to(to) {
                let link = email
                    .body
                    .lines()
                    .find(|l| l.contains("/reset-password/"))
                    .unwrap()
                    .trim();
                return link.rsplit('/').next().unwrap().to_string();
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("no email sent to {to}");
    }

    #[tokio::test]
    async fn reset_token_is_single_use_and_revokes_refresh() {
        let h = harness();
        let session = h
            .service
            .signup("Alice", "alice@example.com", "Str0ng!Pass")
            .await
            .unwrap();
        h.service.forgot_password("alice@example.com").await.unwrap();
        let token = emailed_token(&h.outbox, "alice@example.com").await;
        assert_eq!(token.len(), 64);

        assert!(matches!(
            h.service.reset_password(&token, "weak").await,
            Err(AppError::Validation(_))
        ));
        h.service.reset_password(&token, "N3w!Password").await.unwrap();
        assert!(matches!(
            h.service.reset_password(&token, "An0ther!Pass").await,
            Err(AppError::InvalidResetToken)
        ));

        assert!(h.service.refresh(&session.refresh_token).await.is_err());
        assert!(h.service.login("alice@example.com", "Str0ng!Pass").await.is_err());
        assert!(h.service.login("alice@example.com", "N3w!Password").await.is_ok());
    }

    #[tokio::test]
    async fn expired_reset_token_is_cleared() {
        let h = harness();
        let session = h
            .service
            .signup("Alice", "alice@example.com", "Str0ng!Pass")
            .await
            .unwrap();
        h.service.forgot_password("alice@example.com").await.unwrap();
        let token = emailed_token(&h.outbox, "alice@example.com").await;

        h.clock.advance(chrono::Duration::minutes(61));
        assert!(matches!(
            h.service.reset_password(&token, "N3w!Password").await,
            Err(AppError::InvalidResetToken)
        ));

        let stored = h.service.store().find_by_id(session.user.id).await.unwrap().unwrap();
        assert!(stored.password_reset_token.is_none());
        assert!(stored.password_reset_expires.is_none());
    }

    #[tokio::test]
    async fn forgot_password_for_unknown_email_sends_nothing() {
        let h = harness();
        h.service.forgot_password("ghost@example.com").await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(h.outbox.messages().is_empty());
    }

    #[tokio::test]
    async fn oauth_links_existing_account_by_email() {
        let h = harness();
        let local = h
            .service
            .signup("Alice", "alice@example.com", "Str0ng!Pass")
            .await
            .unwrap();

        let profile = OAuthProfile {
            id: "google-123".into(),
            email: Some("ALICE@example.com".into()),
            name: Some("Alice G".into()),
            picture: None,
        };
        let session = h
            .service
            .login_with_oauth(OAuthProvider::Google, &profile)
            .await
            .unwrap();
        assert_eq!(session.user.id, local.user.id);
        assert_eq!(session.user.google_id.as_deref(), Some("google-123"));

        // Second login resolves by provider id.
        let again = h
            .service
            .login_with_oauth(OAuthProvider::Google, &profile)
            .await
            .unwrap();
        assert_eq!(again.user.id, local.user.id);
    }

    #[tokio::test]
    async fn oauth_created_account_cannot_password_login() {
        let h = harness();
        let profile = OAuthProfile {
            id: "fb-9".into(),
            email: Some("carol@example.com".into()),
            name: None,
            picture: None,
        };
        let session = h
            .service
            .login_with_oauth(OAuthProvider::Facebook, &profile)
            .await
            .unwrap();
        assert!(session.user.is_email_verified);
        assert_eq!(session.user.name, "carol");

        let err = h
            .service
            .login("carol@example.com", OAuthProvider::Facebook.password_placeholder())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidCredentials { .. }));
    }

    #[tokio::test]
    async fn oauth_profile_without_email_fails() {
        let h = harness();
        let profile = OAuthProfile {
            id: "g-1".into(),
            email: None,
            name: Some("No Email".into()),
            picture: None,
        };
        assert!(h
            .service
            .login_with_oauth(OAuthProvider::Google, &profile)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn oauth_login_respects_lockout() {
        let h = harness();
        h.service.signup("Alice", "alice@example.com", "Str0ng!Pass").await.unwrap();
        for _ in 0..5 {
            h.service.login("alice@example.com", "Wr0ng!Pass").await.unwrap_err();
        }

        let profile = OAuthProfile {
            id: "g-alice".into(),
            email: Some("alice@example.com".into()),
            name: None,
            picture: None,
        };
        let err = h
            .service
            .login_with_oauth(OAuthProvider::Google, &profile)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AccountLocked { minutes_remaining: 15 }));

        let stored = h
            .service
            .store()
            .find_by_email("alice@example.com")
            .await
            .unwrap()
            .unwrap();
        assert!(stored.lock_until.is_some());
        assert_eq!(stored.failed_login_attempts, 5);
        assert!(stored.google_id.is_none());

        h.clock.advance(chrono::Duration::minutes(16));
        assert!(h
            .service
            .login_with_oauth(OAuthProvider::Google, &profile)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn oauth_email_match_does_not_replace_linked_subject() {
        let h = harness();
        let first = OAuthProfile {
            id: "g-original".into(),
            email: Some("alice@example.com".into()),
            name: Some("Alice".into()),
            picture: None,
        };
        let session = h
            .service
            .login_with_oauth(OAuthProvider::Google, &first)
            .await
            .unwrap();

        let second = OAuthProfile {
            id: "g-other".into(),
            ..first.clone()
        };
        assert!(matches!(
            h.service.login_with_oauth(OAuthProvider::Google, &second).await,
            Err(AppError::Unauthorized)
        ));

        let stored = h.service.store().find_by_id(session.user.id).await.unwrap().unwrap();
        assert_eq!(stored.google_id.as_deref(), Some("g-original"));
    }

    #[test]
    fn dummy_hash_is_a_valid_bcrypt_hash() {
        assert!(bcrypt::verify("not-the-password", DUMMY_PASSWORD_HASH).is_ok());
    }
}
