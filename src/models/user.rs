use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    #[sea_orm(unique)]
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String,
    pub bio: Option<String>,
    pub profile_picture: Option<String>,
    pub google_id: Option<String>,
    pub facebook_id: Option<String>,
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing)]
    pub failed_login_attempts: i32,
    #[serde(skip_serializing)]
    pub lock_until: Option<DateTime>,
    #[serde(skip_serializing)]
    pub password_reset_token: Option<String>,
    #[serde(skip_serializing)]
    pub password_reset_expires: Option<DateTime>,
    pub is_email_verified: bool,
    #[serde(skip_serializing)]
    pub email_verification_token: Option<String>,
    #[serde(skip_serializing)]
    pub email_verification_expires: Option<DateTime>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
    pub last_login: Option<DateTime>,
    pub last_password_change: Option<DateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Unknown role strings degrade to the least privileged role.
    pub fn role(&self) -> Role {
        self.role.parse().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Moderator,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Moderator => "moderator",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "moderator" => Ok(Role::Moderator),
            "admin" => Ok(Role::Admin),
            _ => Err(format!(
                "Invalid role '{}'. Must be one of: user, moderator, admin",
                s
            )),
        }
    }
}

/// Fields supplied when inserting a user; ids and timestamps are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub is_email_verified: bool,
    pub google_id: Option<String>,
    pub facebook_id: Option<String>,
    pub profile_picture: Option<String>,
    pub email_verification_token: Option<String>,
    pub email_verification_expires: Option<DateTime>,
}

impl NewUser {
    pub fn local(name: String, email: String, password_hash: String) -> Self {
        Self {
            name,
            email,
            password_hash,
            role: Role::User,
            is_email_verified: false,
            google_id: None,
            facebook_id: None,
            profile_picture: None,
            email_verification_token: None,
            email_verification_expires: None,
        }
    }
}

/// `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub bio: Option<String>,
    pub profile_picture: Option<String>,
}

/// The user as it leaves the server: no hashes, tokens or lockout state.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub role: String,
    pub bio: Option<String>,
    pub profile_picture: Option<String>,
    pub is_email_verified: bool,
    pub created_at: chrono::NaiveDateTime,
    pub updated_at: chrono::NaiveDateTime,
    pub last_login: Option<chrono::NaiveDateTime>,
}

impl From<&Model> for UserResponse {
    fn from(user: &Model) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role.clone(),
            bio: user.bio.clone(),
            profile_picture: user.profile_picture.clone(),
            is_email_verified: user.is_email_verified,
            created_at: user.created_at,
            updated_at: user.updated_at,
            last_login: user.last_login,
        }
    }
}

impl From<Model> for UserResponse {
    fn from(user: Model) -> Self {
        Self::from(&user)
    }
}

#[cfg(test)]
pub(crate) fn test_user(id: i32, email: &str) -> Model {
    let now = chrono::Utc::now().naive_utc();
    Model {
        id,
        name: "Test User".into(),
        email: email.into(),
        password_hash: String::new(),
        role: Role::User.to_string(),
        bio: None,
        profile_picture: None,
        google_id: None,
        facebook_id: None,
        refresh_token: None,
        failed_login_attempts: 0,
        lock_until: None,
        password_reset_token: None,
        password_reset_expires: None,
        is_email_verified: false,
        email_verification_token: None,
        email_verification_expires: None,
        created_at: now,
        updated_at: now,
        last_login: None,
        last_password_change: None,
    }
}
