pub mod admin;
pub mod auth;
pub mod bootstrap_admin;
pub mod email;
pub mod lockout;
pub mod oauth;
pub mod upload;
pub mod user;
