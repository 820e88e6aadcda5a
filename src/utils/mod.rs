pub mod clock;
pub mod cookie;
pub mod jwt;
pub mod password;
pub mod token;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use jwt::TokenIssuer;
pub use password::{hash_password, validate_password_strength, verify_password};
