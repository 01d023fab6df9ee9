use validator::ValidateEmail;

#[derive(Debug, Clone)]
pub struct UserEmail(String);

impl UserEmail {
    pub fn parse(s: &str) -> Result<UserEmail, String> {
        let s = s.trim();
        if s.validate_email() {
            Ok(Self(s.to_lowercase()))
        } else {
            Err(format!("`{s}` is not a valid email address."))
        }
    }
}

impl AsRef<str> for UserEmail {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
