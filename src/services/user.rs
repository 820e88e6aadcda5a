use crate::{
    error::{AppError, AppResult},
    models::{ProfileUpdate, UserModel},
    store::SharedUserStore,
    utils::SharedClock,
};

#[derive(Clone)]
pub struct UserService {
    store: SharedUserStore,
    clock: SharedClock,
}

/// Blank strings mean "keep the current value".
fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl UserService {
    pub fn new(store: SharedUserStore, clock: SharedClock) -> Self {
        Self { store, clock }
    }

    pub async fn get_profile(&self, user_id: i32) -> AppResult<UserModel> {
        self.store
            .find_by_id(user_id)
            .await?
            .ok_or(AppError::NotFound)
    }

    pub async fn update_profile(
        &self,
        user_id: i32,
        update: ProfileUpdate,
    ) -> AppResult<UserModel> {
        let update = ProfileUpdate {
            name: non_empty(update.name),
            bio: non_empty(update.bio),
            profile_picture: non_empty(update.profile_picture),
        };

        if let Some(name) = &update.name {
            if name.chars().count() > 255 {
                return Err(AppError::Validation(
                    "Name must be at most 255 characters".to_string(),
                ));
            }
        }

        let user = self
            .store
            .update_profile(user_id, update, self.clock.now())
            .await?
            .ok_or(AppError::NotFound)?;
        tracing::info!(user_id, "Profile updated");
        Ok(user)
    }
}
