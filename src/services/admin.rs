use crate::{
    error::{AppError, AppResult},
    models::{Role, UserModel},
    store::SharedUserStore,
    utils::SharedClock,
};

#[derive(Clone)]
pub struct AdminService {
    store: SharedUserStore,
    clock: SharedClock,
}

impl AdminService {
    pub fn new(store: SharedUserStore, clock: SharedClock) -> Self {
        Self { store, clock }
    }

    pub async fn list_users(&self) -> AppResult<Vec<UserModel>> {
        self.store.list().await
    }

    /// The role is parsed before any lookup, so an invalid value never reaches the store.
    pub async fn update_user_role(&self, user_id: i32, role: &str) -> AppResult<UserModel> {
        let role: Role = role.trim().parse().map_err(AppError::Validation)?;

        let updated = self
            .store
            .update_role(user_id, role, self.clock.now())
            .await?
            .ok_or(AppError::NotFound)?;
        tracing::info!(user_id, %role, "User role updated");
        Ok(updated)
    }
}
