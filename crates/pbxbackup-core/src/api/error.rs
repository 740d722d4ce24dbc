use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Authentication failed: {reason}")]
    Auth {
        reason: String,
        status: Option<u16>,
    },

    #[error("Backup {operation} failed with HTTP {status}: {body}")]
    Backup {
        operation: &'static str,
        status: u16,
        body: String,
    },

    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid backup filename: {0}")]
    InvalidFilename(String),

    #[error("Invalid server address: {0}")]
    InvalidEndpoint(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    pub(crate) fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    pub(crate) fn auth(reason: impl Into<String>, status: Option<u16>) -> Self {
        ApiError::Auth {
            reason: reason.into(),
            status,
        }
    }

    pub(crate) fn backup(operation: &'static str, status: u16, body: &str) -> Self {
        ApiError::Backup {
            operation,
            status,
            body: Self::truncate_body(body),
        }
    }

    /// True for login and token-exchange failures.
    pub fn is_auth(&self) -> bool {
        matches!(self, ApiError::Auth { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ApiError::Transport(e) if e.is_timeout())
    }

    /// HTTP status reported by the server, if the failure carried one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Auth { status, .. } => *status,
            ApiError::Backup { status, .. } => Some(*status),
            ApiError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_body() {
        assert_eq!(ApiError::truncate_body("short"), "short");

        let long = "x".repeat(600);
        let truncated = ApiError::truncate_body(&long);
        assert!(truncated.starts_with(&"x".repeat(500)));
        assert!(truncated.ends_with("(truncated, 600 total bytes)"));
    }

    #[test]
    fn test_truncate_body_respects_char_boundary() {
        // 499 ASCII bytes followed by a 2-byte character straddling the limit
        let body = format!("{}é{}", "a".repeat(499), "b".repeat(10));
        let truncated = ApiError::truncate_body(&body);
        assert!(truncated.starts_with(&"a".repeat(499)));
        assert!(!truncated.contains('é'));
    }

    #[test]
    fn test_status_and_predicates() {
        let err = ApiError::auth("bad password", Some(401));
        assert!(err.is_auth());
        assert_eq!(err.status(), Some(401));
        assert!(!err.is_timeout());

        let err = ApiError::backup("delete", 404, "not found");
        assert!(!err.is_auth());
        assert_eq!(err.status(), Some(404));
        assert_eq!(
            err.to_string(),
            "Backup delete failed with HTTP 404: not found"
        );

        assert_eq!(ApiError::InvalidFilename("x".into()).status(), None);
    }
}
