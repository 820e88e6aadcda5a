pub mod app;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod migration;
pub mod models;
pub mod routes;
pub mod services;
pub mod store;
pub mod utils;

pub use app::{create_app, AppServices};
pub use error::{AppError, AppResult};
pub use middleware::auth::AuthUser;
