use std::fmt;

/// Username and password for the primary login call. Held in memory only.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// Both fields present. The server is the judge of everything else.
    pub fn is_complete(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_hides_password() {
        let creds = Credentials::new("admin", "hunter2");
        let rendered = format!("{:?}", creds);
        assert!(rendered.contains("admin"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_is_complete() {
        assert!(Credentials::new("admin", "pw").is_complete());
        assert!(!Credentials::new("", "pw").is_complete());
        assert!(!Credentials::new("admin", "").is_complete());
    }
}
