pub mod auth;

pub use auth::{auth_middleware, authorize_roles, AuthUser};
