//! Backup models.
//!
//! A backup job has no status endpoint of its own. It is observed through
//! the backup list: absent while the server is still producing it, present
//! once the artifact is ready to download.

use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

/// One backup artifact as reported by the list endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupRecord {
    #[serde(rename = "FileName")]
    pub file_name: String,
    #[serde(rename = "CreationTime", default)]
    pub creation_time: Option<String>,
    #[serde(rename = "Size", default)]
    pub size: Option<u64>,
    #[serde(rename = "DownloadLink")]
    pub download_link: String,
}

impl BackupRecord {
    /// Parse `CreationTime` when the server sent an RFC 3339 timestamp.
    pub fn created_at(&self) -> Option<DateTime<FixedOffset>> {
        self.creation_time
            .as_deref()
            .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
    }
}

/// Outcome of a backup trigger that the server accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupTrigger {
    /// A new backup job was started.
    Created(String),
    /// A backup with this name already exists or is in progress.
    AlreadyExists(String),
}

impl BackupTrigger {
    pub fn filename(&self) -> &str {
        match self {
            BackupTrigger::Created(name) | BackupTrigger::AlreadyExists(name) => name,
        }
    }

    pub fn into_filename(self) -> String {
        match self {
            BackupTrigger::Created(name) | BackupTrigger::AlreadyExists(name) => name,
        }
    }
}

/// Outcome of polling the backup list for a named artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupReadiness {
    Ready(BackupRecord),
    TimedOut { attempts: u32 },
}

/// How long `await_ready` keeps looking before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

/// Two seconds between list calls, five minutes in total.
impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_attempts: 150,
        }
    }
}

/// Content selection sent with every backup request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct BackupContents {
    pub recordings: bool,
    pub encrypt_backup: bool,
    #[serde(rename = "FQDN")]
    pub fqdn: bool,
    pub call_history: bool,
    pub license: bool,
    pub phone_provisioning: bool,
    pub prompts: bool,
    pub voice_mails: bool,
    pub disable_backup_compression: bool,
}

impl Default for BackupContents {
    fn default() -> Self {
        Self {
            recordings: false,
            encrypt_backup: false,
            fqdn: true,
            call_history: true,
            license: true,
            phone_provisioning: true,
            prompts: true,
            voice_mails: true,
            disable_backup_compression: false,
        }
    }
}

/// Backup name derived from a date, e.g. `CDRDump-2026-01-19.zip`.
pub fn default_backup_filename(date: NaiveDate) -> String {
    format!("CDRDump-{}.zip", date.format("%Y-%m-%d"))
}
