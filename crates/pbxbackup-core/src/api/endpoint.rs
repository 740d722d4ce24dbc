//! Server address handling.
//!
//! A `ServerEndpoint` is fixed for the life of a client: the scheme comes
//! from the SSL flag and the host is the configured domain with surrounding
//! whitespace and any trailing slash removed.

use super::ApiError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerEndpoint {
    base_url: String,
}

impl ServerEndpoint {
    pub fn new(domain: &str, ssl: bool) -> Result<Self, ApiError> {
        let domain = domain.trim().trim_end_matches('/');
        if domain.is_empty() {
            return Err(ApiError::InvalidEndpoint("domain is empty".to_string()));
        }
        if domain.contains("://") {
            return Err(ApiError::InvalidEndpoint(format!(
                "expected a bare domain without scheme, got {}",
                domain
            )));
        }

        let scheme = if ssl { "https" } else { "http" };
        Ok(Self {
            base_url: format!("{}://{}", scheme, domain),
        })
    }

    /// Scheme and host, e.g. `https://pbx.example.com`.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Join a relative path onto the server, with exactly one slash between them.
    pub fn url(&self, relative: &str) -> String {
        format!("{}/{}", self.base_url, relative.trim_start_matches('/'))
    }

    /// Resolve a link handed out by the server. Absolute links pass through.
    pub fn resolve(&self, link: &str) -> String {
        if link.starts_with("http://") || link.starts_with("https://") {
            link.to_string()
        } else {
            self.url(link)
        }
    }

    /// Whether an absolute URL points back at this server.
    pub fn owns(&self, url: &str) -> bool {
        url.strip_prefix(&self.base_url)
            .map(|rest| rest.is_empty() || rest.starts_with('/') || rest.starts_with('?'))
            .unwrap_or(false)
    }
}
