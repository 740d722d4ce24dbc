//! Application configuration management.
//!
//! Settings come from `~/.config/pbxbackup/config.json` when it exists and
//! are then overridden by `PBX_*` environment variables (a `.env` file in the
//! working directory is loaded into the environment first). The bare
//! `DOMAIN`, `USERNAME` and `PASSWORD` names used by older `.env` files only
//! fill fields the config file left unset, since `USERNAME` is also the OS
//! login name on Windows and many desktops.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use pbxbackup_core::{ClientOptions, PollPolicy};
use serde::Deserialize;

/// Application name used for config directory paths
const APP_NAME: &str = "pbxbackup";

/// Config file name
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub domain: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub ssl: bool,
    pub poll_interval_secs: u64,
    pub max_poll_attempts: u32,
    pub request_timeout_secs: u64,
    pub output_dir: Option<PathBuf>,
    pub delete_after_download: bool,
    pub log_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            domain: None,
            username: None,
            password: None,
            ssl: true,
            poll_interval_secs: 2,
            max_poll_attempts: 150,
            request_timeout_secs: 30,
            output_dir: None,
            delete_after_download: false,
            log_dir: None,
        }
    }
}

impl Config {
    /// Load the config file (if any) and apply the process environment.
    pub fn load() -> Result<Self> {
        let mut config = match Self::config_path() {
            Some(path) if path.exists() => Self::load_file(&path)?,
            _ => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Override fields from environment-style lookups. Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        // Prefixed names override, bare names only fill gaps
        let overlay = |current: &mut Option<String>, key: &str, fallback: &str| {
            if let Some(value) = get(key) {
                *current = Some(value);
            } else if current.is_none() {
                *current = get(fallback);
            }
        };

        overlay(&mut self.domain, "PBX_DOMAIN", "DOMAIN");
        overlay(&mut self.username, "PBX_USERNAME", "USERNAME");

        // Passwords may legitimately carry surrounding spaces
        let password = |key: &str| lookup(key).filter(|v| !v.is_empty());
        if let Some(value) = password("PBX_PASSWORD") {
            self.password = Some(value);
        } else if self.password.is_none() {
            self.password = password("PASSWORD");
        }
        if let Some(ssl) = get("PBX_SSL") {
            self.ssl = parse_bool("PBX_SSL", &ssl)?;
        }
        if let Some(value) = get("PBX_POLL_INTERVAL_SECS") {
            self.poll_interval_secs = value
                .parse()
                .with_context(|| format!("PBX_POLL_INTERVAL_SECS is not a number: {}", value))?;
        }
        if let Some(value) = get("PBX_MAX_POLL_ATTEMPTS") {
            self.max_poll_attempts = value
                .parse()
                .with_context(|| format!("PBX_MAX_POLL_ATTEMPTS is not a number: {}", value))?;
        }
        if let Some(value) = get("PBX_REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = value
                .parse()
                .with_context(|| format!("PBX_REQUEST_TIMEOUT_SECS is not a number: {}", value))?;
        }
        if let Some(dir) = get("PBX_OUTPUT_DIR") {
            self.output_dir = Some(PathBuf::from(dir));
        }
        if let Some(value) = get("PBX_DELETE_AFTER_DOWNLOAD") {
            self.delete_after_download = parse_bool("PBX_DELETE_AFTER_DOWNLOAD", &value)?;
        }
        if let Some(dir) = get("PBX_LOG_DIR") {
            self.log_dir = Some(PathBuf::from(dir));
        }
        Ok(())
    }

    /// Reject settings that would make a run fail for reasons unrelated to the server.
    pub fn validate(&self) -> Result<()> {
        if self.max_poll_attempts == 0 {
            return Err(anyhow!("max_poll_attempts must be at least 1"));
        }
        if self.request_timeout_secs == 0 {
            return Err(anyhow!("request_timeout_secs must be at least 1"));
        }
        Ok(())
    }

    pub fn domain(&self) -> Result<&str> {
        self.domain
            .as_deref()
            .ok_or_else(|| anyhow!("No server configured: set PBX_DOMAIN or \"domain\" in the config file"))
    }

    pub fn username(&self) -> Result<&str> {
        self.username
            .as_deref()
            .ok_or_else(|| anyhow!("No username configured: set PBX_USERNAME or \"username\" in the config file"))
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_secs(self.poll_interval_secs),
            max_attempts: self.max_poll_attempts,
        }
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            ..ClientOptions::default()
        }
    }

    pub fn output_dir(&self) -> PathBuf {
        self.output_dir.clone().unwrap_or_else(|| PathBuf::from("."))
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(anyhow!("{} must be true or false, got {}", key, value)),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.ssl);
        assert_eq!(config.poll_policy().interval, Duration::from_secs(2));
        assert_eq!(config.poll_policy().max_attempts, 150);
        assert_eq!(config.client_options().request_timeout, Duration::from_secs(30));
        assert_eq!(config.output_dir(), PathBuf::from("."));
        assert!(config.domain().is_err());
    }

    #[test]
    fn test_prefixed_env_wins_over_bare_names() {
        let mut config = Config::default();
        config
            .apply_env(env(&[
                ("PBX_DOMAIN", "pbx.example.com"),
                ("DOMAIN", "other.example.com"),
                ("USERNAME", "admin"),
                ("PASSWORD", " spaced pw "),
            ]))
            .unwrap();

        assert_eq!(config.domain().unwrap(), "pbx.example.com");
        assert_eq!(config.username().unwrap(), "admin");
        assert_eq!(config.password.as_deref(), Some(" spaced pw "));
    }

    #[test]
    fn test_bare_names_do_not_override_config_file() {
        let mut config = Config {
            domain: Some("pbx.example.com".into()),
            username: Some("admin".into()),
            password: Some("from-file".into()),
            ..Config::default()
        };
        config
            .apply_env(env(&[
                ("DOMAIN", "corp.local"),
                ("USERNAME", "jdoe"),
                ("PASSWORD", "desktop"),
            ]))
            .unwrap();

        assert_eq!(config.domain().unwrap(), "pbx.example.com");
        assert_eq!(config.username().unwrap(), "admin");
        assert_eq!(config.password.as_deref(), Some("from-file"));
    }

    #[test]
    fn test_prefixed_names_override_config_file() {
        let mut config = Config {
            username: Some("admin".into()),
            ..Config::default()
        };
        config
            .apply_env(env(&[("PBX_USERNAME", "backup-bot"), ("USERNAME", "jdoe")]))
            .unwrap();
        assert_eq!(config.username().unwrap(), "backup-bot");
    }

    #[test]
    fn test_zero_poll_attempts_rejected() {
        let mut config = Config::default();
        config.apply_env(env(&[("PBX_MAX_POLL_ATTEMPTS", "0")])).unwrap();
        assert!(config.validate().is_err());

        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_env_tunables() {
        let mut config = Config::default();
        config
            .apply_env(env(&[
                ("PBX_SSL", "false"),
                ("PBX_POLL_INTERVAL_SECS", "5"),
                ("PBX_MAX_POLL_ATTEMPTS", "12"),
                ("PBX_REQUEST_TIMEOUT_SECS", "90"),
                ("PBX_OUTPUT_DIR", "/var/backups/pbx"),
                ("PBX_DELETE_AFTER_DOWNLOAD", "yes"),
                ("PBX_LOG_DIR", "/var/log/pbxbackup"),
            ]))
            .unwrap();

        assert!(!config.ssl);
        assert_eq!(config.poll_policy().interval, Duration::from_secs(5));
        assert_eq!(config.poll_policy().max_attempts, 12);
        assert_eq!(config.client_options().request_timeout, Duration::from_secs(90));
        assert_eq!(config.output_dir(), PathBuf::from("/var/backups/pbx"));
        assert!(config.delete_after_download);
        assert_eq!(config.log_dir, Some(PathBuf::from("/var/log/pbxbackup")));
    }

    #[test]
    fn test_bad_env_values() {
        let mut config = Config::default();
        assert!(config.apply_env(env(&[("PBX_SSL", "maybe")])).is_err());
        assert!(config.apply_env(env(&[("PBX_MAX_POLL_ATTEMPTS", "lots")])).is_err());
    }

    #[test]
    fn test_empty_env_values_are_ignored() {
        let mut config = Config {
            domain: Some("pbx.example.com".into()),
            ..Config::default()
        };
        config.apply_env(env(&[("PBX_DOMAIN", "  ")])).unwrap();
        assert_eq!(config.domain().unwrap(), "pbx.example.com");
    }

    #[test]
    fn test_load_file_partial() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"domain": "pbx.example.com", "username": "admin", "max_poll_attempts": 30}"#,
        )
        .unwrap();

        let config = Config::load_file(&path).unwrap();
        assert_eq!(config.domain().unwrap(), "pbx.example.com");
        assert_eq!(config.max_poll_attempts, 30);
        assert!(config.ssl);
        assert_eq!(config.poll_interval_secs, 2);
    }

    #[test]
    fn test_load_file_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(Config::load_file(&path).is_err());
    }
}
