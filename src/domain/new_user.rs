use secrecy::{ExposeSecret, SecretString};

use crate::routes::RegisterForm;

use super::{UserEmail, UserName};

const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_PASSWORD_LENGTH: usize = 128;

/// 注册表单校验后的新用户
#[derive(Debug)]
pub struct NewUser {
    pub first_name: UserName,
    pub last_name: UserName,
    pub email: UserEmail,
    pub password: SecretString,
}

impl TryFrom<RegisterForm> for NewUser {
    type Error = String;

    fn try_from(form: RegisterForm) -> Result<Self, Self::Error> {
        let first_name = UserName::parse(&form.first_name)?;
        let last_name = UserName::parse(&form.last_name)?;
        let email = UserEmail::parse(&form.email)?;

        let password = form.password.expose_secret();
        if password != form.verify_password.expose_secret() {
            return Err("Passwords do not match.".into());
        }
        let length = password.chars().count();
        if !(MIN_PASSWORD_LENGTH..=MAX_PASSWORD_LENGTH).contains(&length) {
            return Err(format!(
                "Password must be between {MIN_PASSWORD_LENGTH} and {MAX_PASSWORD_LENGTH} characters."
            ));
        }

        Ok(Self {
            first_name,
            last_name,
            email,
            password: form.password,
        })
    }
}
