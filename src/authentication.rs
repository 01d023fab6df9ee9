mod middleware;
mod password;

pub use middleware::{reject_anonymous_user, UserId};
pub use password::{hash_password, validate_credential, AuthError, Credential};
