pub mod user;

pub use user::{Entity as User, Model as UserModel, NewUser, ProfileUpdate, Role, UserResponse};
