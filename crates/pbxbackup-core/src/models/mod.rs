//! Data models for the PBX backup API.
//!
//! - `BackupRecord`: one artifact from the backup list
//! - `BackupTrigger`, `BackupReadiness`: outcomes of the backup lifecycle calls
//! - `PollPolicy`: bounds for waiting on a backup

pub mod backup;

pub(crate) use backup::BackupContents;
pub use backup::{default_backup_filename, BackupReadiness, BackupRecord, BackupTrigger, PollPolicy};
