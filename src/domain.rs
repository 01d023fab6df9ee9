mod new_user;
mod plan;
mod user;
mod user_email;
mod user_name;

pub use new_user::NewUser;
pub use plan::Plan;
pub use user::User;
pub use user_email::UserEmail;
pub use user_name::UserName;
