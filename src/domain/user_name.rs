use unicode_segmentation::UnicodeSegmentation;

#[derive(Debug, Clone)]
pub struct UserName(String);

impl UserName {
    pub fn parse(s: &str) -> Result<UserName, String> {
        let is_empty = s.trim().is_empty();
        let is_too_long = s.graphemes(true).count() > 256;
        let forbidden_characters = ['/', '(', ')', '{', '}', '"', '<', '>', '\\'];
        let contain_fb_chars = s.chars().any(|c| forbidden_characters.contains(&c));

        if is_empty || is_too_long || contain_fb_chars {
            return Err(format!("`{s}` is not a valid name."));
        }
        Ok(Self(s.trim().into()))
    }
}

impl AsRef<str> for UserName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
