use super::{UserStore, DUPLICATE_EMAIL_MESSAGE};
use crate::config::oauth::OAuthProvider;
use crate::error::{AppError, AppResult};
use crate::models::{user, NewUser, ProfileUpdate, Role, User, UserModel};
use crate::services::lockout::LockoutPolicy;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseBackend, DatabaseConnection,
    EntityTrait, FromQueryResult, PaginatorTrait, QueryFilter, QueryOrder, Set, SqlErr,
    Statement, Value,
};

#[derive(Clone)]
pub struct PgUserStore {
    db: DatabaseConnection,
}

impl PgUserStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn returning_one(&self, sql: &str, values: Vec<Value>) -> AppResult<Option<UserModel>> {
        let user = UserModel::find_by_statement(Statement::from_sql_and_values(
            DatabaseBackend::Postgres,
            sql,
            values,
        ))
        .one(&self.db)
        .await?;
        Ok(user)
    }

    async fn execute(&self, sql: &str, values: Vec<Value>) -> AppResult<()> {
        self.db
            .execute(Statement::from_sql_and_values(
                DatabaseBackend::Postgres,
                sql,
                values,
            ))
            .await?;
        Ok(())
    }
}

fn provider_column(provider: OAuthProvider) -> &'static str {
    match provider {
        OAuthProvider::Google => "google_id",
        OAuthProvider::Facebook => "facebook_id",
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn ping(&self) -> AppResult<()> {
        self.db.ping().await?;
        Ok(())
    }

    async fn find_by_id(&self, id: i32) -> AppResult<Option<UserModel>> {
        Ok(User::find_by_id(id).one(&self.db).await?)
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<UserModel>> {
        Ok(User::find()
            .filter(user::Column::Email.eq(email))
            .one(&self.db)
            .await?)
    }

    async fn find_by_provider(
        &self,
        provider: OAuthProvider,
        provider_id: &str,
    ) -> AppResult<Option<UserModel>> {
        let column = match provider {
            OAuthProvider::Google => user::Column::GoogleId,
            OAuthProvider::Facebook => user::Column::FacebookId,
        };
        Ok(User::find()
            .filter(column.eq(provider_id))
            .one(&self.db)
            .await?)
    }

    async fn find_by_reset_token(&self, digest: &str) -> AppResult<Option<UserModel>> {
        Ok(User::find()
            .filter(user::Column::PasswordResetToken.eq(digest))
            .one(&self.db)
            .await?)
    }

    async fn list(&self) -> AppResult<Vec<UserModel>> {
        Ok(User::find()
            .order_by_asc(user::Column::Id)
            .all(&self.db)
            .await?)
    }

    async fn has_admin(&self) -> AppResult<bool> {
        let count = User::find()
            .filter(user::Column::Role.eq(Role::Admin.as_str()))
            .count(&self.db)
            .await?;
        Ok(count > 0)
    }

    async fn create(&self, new_user: NewUser, now: NaiveDateTime) -> AppResult<UserModel> {
        let model = user::ActiveModel {
            name: Set(new_user.name),
            email: Set(new_user.email),
            password_hash: Set(new_user.password_hash),
            role: Set(new_user.role.to_string()),
            bio: Set(None),
            profile_picture: Set(new_user.profile_picture),
            google_id: Set(new_user.google_id),
            facebook_id: Set(new_user.facebook_id),
            refresh_token: Set(None),
            failed_login_attempts: Set(0),
            lock_until: Set(None),
            password_reset_token: Set(None),
            password_reset_expires: Set(None),
            is_email_verified: Set(new_user.is_email_verified),
            email_verification_token: Set(new_user.email_verification_token),
            email_verification_expires: Set(new_user.email_verification_expires),
            created_at: Set(now),
            updated_at: Set(now),
            last_login: Set(None),
            last_password_change: Set(None),
            ..Default::default()
        };

        model.insert(&self.db).await.map_err(|e| match e.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => {
                AppError::Validation(DUPLICATE_EMAIL_MESSAGE.to_string())
            }
            _ => AppError::Database(e),
        })
    }

    async fn set_refresh_token(
        &self,
        id: i32,
        digest: Option<&str>,
        now: NaiveDateTime,
    ) -> AppResult<()> {
        self.execute(
            "UPDATE users SET refresh_token = $2, updated_at = $3 WHERE id = $1",
            vec![id.into(), digest.map(str::to_owned).into(), now.into()],
        )
        .await
    }

    async fn record_failed_login(
        &self,
        id: i32,
        policy: &LockoutPolicy,
        now: NaiveDateTime,
    ) -> AppResult<Option<UserModel>> {
        // SET expressions see the pre-update row, so the new count is spelled out twice.
        let sql = "UPDATE users SET \
                failed_login_attempts = CASE \
                    WHEN lock_until IS NOT NULL AND lock_until <= $2 THEN 1 \
                    ELSE failed_login_attempts + 1 END, \
                lock_until = CASE \
                    WHEN (CASE WHEN lock_until IS NOT NULL AND lock_until <= $2 THEN 1 \
                          ELSE failed_login_attempts + 1 END) >= $3 THEN $4 \
                    ELSE NULL END, \
                updated_at = $2 \
            WHERE id = $1 AND (lock_until IS NULL OR lock_until <= $2) \
            RETURNING *";

        self.returning_one(
            sql,
            vec![
                id.into(),
                now.into(),
                policy.threshold().into(),
                (now + policy.lock_duration).into(),
            ],
        )
        .await
    }

    async fn record_successful_login(
        &self,
        id: i32,
        refresh_digest: &str,
        now: NaiveDateTime,
    ) -> AppResult<Option<UserModel>> {
        self.returning_one(
            "UPDATE users SET failed_login_attempts = 0, lock_until = NULL, last_login = $2, \
                refresh_token = $3, updated_at = $2 \
             WHERE id = $1 RETURNING *",
            vec![id.into(), now.into(), refresh_digest.into()],
        )
        .await
    }

    async fn set_reset_token(
        &self,
        id: i32,
        digest: &str,
        expires: NaiveDateTime,
        now: NaiveDateTime,
    ) -> AppResult<()> {
        self.execute(
            "UPDATE users SET password_reset_token = $2, password_reset_expires = $3, \
                updated_at = $4 WHERE id = $1",
            vec![id.into(), digest.into(), expires.into(), now.into()],
        )
        .await
    }

    async fn clear_reset_token(&self, id: i32, now: NaiveDateTime) -> AppResult<()> {
        self.execute(
            "UPDATE users SET password_reset_token = NULL, password_reset_expires = NULL, \
                updated_at = $2 WHERE id = $1",
            vec![id.into(), now.into()],
        )
        .await
    }

    async fn consume_reset_token(
        &self,
        digest: &str,
        password_hash: &str,
        now: NaiveDateTime,
    ) -> AppResult<Option<UserModel>> {
        self.returning_one(
            "UPDATE users SET password_hash = $2, password_reset_token = NULL, \
                password_reset_expires = NULL, refresh_token = NULL, \
                failed_login_attempts = 0, lock_until = NULL, \
                last_password_change = $3, updated_at = $3 \
             WHERE password_reset_token = $1 AND password_reset_expires > $3 \
             RETURNING *",
            vec![digest.into(), password_hash.into(), now.into()],
        )
        .await
    }

    async fn consume_verification_token(
        &self,
        digest: &str,
        now: NaiveDateTime,
    ) -> AppResult<Option<UserModel>> {
        self.returning_one(
            "UPDATE users SET is_email_verified = TRUE, email_verification_token = NULL, \
                email_verification_expires = NULL, updated_at = $2 \
             WHERE email_verification_token = $1 AND email_verification_expires > $2 \
             RETURNING *",
            vec![digest.into(), now.into()],
        )
        .await
    }

    async fn link_provider(
        &self,
        id: i32,
        provider: OAuthProvider,
        provider_id: &str,
        now: NaiveDateTime,
    ) -> AppResult<Option<UserModel>> {
        let sql = format!(
            "UPDATE users SET {col} = $2, updated_at = $3 WHERE id = $1 AND {col} IS NULL RETURNING *",
            col = provider_column(provider)
        );
        self.returning_one(&sql, vec![id.into(), provider_id.into(), now.into()])
            .await
    }

    async fn update_profile(
        &self,
        id: i32,
        update: ProfileUpdate,
        now: NaiveDateTime,
    ) -> AppResult<Option<UserModel>> {
        self.returning_one(
            "UPDATE users SET name = COALESCE($2, name), bio = COALESCE($3, bio), \
                profile_picture = COALESCE($4, profile_picture), updated_at = $5 \
             WHERE id = $1 RETURNING *",
            vec![
                id.into(),
                update.name.into(),
                update.bio.into(),
                update.profile_picture.into(),
                now.into(),
            ],
        )
        .await
    }

    async fn update_role(
        &self,
        id: i32,
        role: Role,
        now: NaiveDateTime,
    ) -> AppResult<Option<UserModel>> {
        self.returning_one(
            "UPDATE users SET role = $2, updated_at = $3 WHERE id = $1 RETURNING *",
            vec![id.into(), role.as_str().into(), now.into()],
        )
        .await
    }
}
