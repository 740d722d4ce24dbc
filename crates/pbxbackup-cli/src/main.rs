//! pbxbackup - download on-demand backups from a PBX management server.
//!
//! Logs in, triggers a backup, waits for the server to finish it, downloads
//! the archive and optionally removes it from the server.

mod cli;
mod config;

use std::io;
use std::path::Path;

use anyhow::{bail, Context, Result};
use pbxbackup_core::utils::{format_size, format_timestamp};
use pbxbackup_core::{
    ApiClient, AuthenticatedSession, BackupReadiness, BackupTrigger, Credentials, ServerEndpoint,
};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{BackupArgs, Cli, Command};
use config::Config;

/// Log file name prefix inside the configured log directory
const LOG_FILE_PREFIX: &str = "pbxbackup.log";

/// Initialize the tracing subscriber for logging.
/// The returned guard must live until exit so buffered file logs are flushed.
fn init_tracing(verbose: bool, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let default_filter = if verbose {
        "warn,pbxbackup=debug,pbxbackup_core=debug"
    } else {
        "warn,pbxbackup=info,pbxbackup_core=info"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = cli::parse(std::env::args().skip(1))?;
    if cli.command == Command::Help {
        println!("{}", cli::USAGE);
        return Ok(());
    }

    let mut config = Config::load()?;
    if cli.no_ssl {
        config.ssl = false;
    }

    let _log_guard = init_tracing(cli.verbose, config.log_dir.as_deref());
    info!("pbxbackup starting");

    let endpoint = ServerEndpoint::new(config.domain()?, config.ssl)?;
    let client = ApiClient::with_options(endpoint, config.client_options())?;
    let session = login(&client, &config).await?;

    match cli.command {
        Command::Backup(args) => run_backup(&client, &session, &config, args).await,
        Command::List { name } => run_list(&client, &session, name.as_deref()).await,
        Command::Delete { name } => {
            client
                .delete_backup(&session, &name)
                .await
                .with_context(|| format!("Failed to delete backup {}", name))?;
            println!("Deleted {}", name);
            Ok(())
        }
        Command::Help => Ok(()),
    }
}

async fn login(client: &ApiClient, config: &Config) -> Result<AuthenticatedSession> {
    let username = config.username()?;
    let password = match config.password.clone() {
        Some(password) => password,
        None => rpassword::prompt_password(format!("Password for {}: ", username))
            .context("Failed to read password")?,
    };

    let credentials = Credentials::new(username, password);
    if !credentials.is_complete() {
        bail!("Username and password required");
    }

    client
        .login(&credentials)
        .await
        .with_context(|| format!("Login to {} failed", client.endpoint().base_url()))
}

async fn run_backup(
    client: &ApiClient,
    session: &AuthenticatedSession,
    config: &Config,
    args: BackupArgs,
) -> Result<()> {
    let trigger = client
        .trigger_backup(session, args.name.as_deref())
        .await
        .context("Failed to start backup")?;

    if let BackupTrigger::AlreadyExists(ref name) = trigger {
        warn!(filename = %name, "Backup already exists on the server, reusing it");
    }
    let filename = trigger.into_filename();

    let policy = config.poll_policy();
    let record = match client
        .await_ready(session, &filename, policy)
        .await
        .with_context(|| format!("Failed while waiting for backup {}", filename))?
    {
        BackupReadiness::Ready(record) => record,
        BackupReadiness::TimedOut { attempts } => bail!(
            "Backup {} was not ready after {} checks {}s apart",
            filename,
            attempts,
            policy.interval.as_secs()
        ),
    };

    let output_dir = args.output.unwrap_or_else(|| config.output_dir());
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;
    let output = output_dir.join(&record.file_name);

    let bytes = client
        .download_backup(session, &record.download_link, &output)
        .await
        .with_context(|| format!("Failed to download backup {}", record.file_name))?;
    println!("{} ({})", output.display(), format_size(bytes));

    if args.delete.unwrap_or(config.delete_after_download) {
        client
            .delete_backup(session, &record.file_name)
            .await
            .with_context(|| format!("Downloaded but failed to delete backup {}", record.file_name))?;
        info!(filename = %record.file_name, "Removed backup from server");
    }

    Ok(())
}

async fn run_list(client: &ApiClient, session: &AuthenticatedSession, name: Option<&str>) -> Result<()> {
    let records = client
        .list_backups(session, name)
        .await
        .context("Failed to list backups")?;

    if records.is_empty() {
        eprintln!("No backups found");
        return Ok(());
    }

    for record in records {
        println!(
            "{:<40} {:>10}  {}",
            record.file_name,
            record.size.map(format_size).unwrap_or_else(|| "-".to_string()),
            record
                .creation_time
                .as_deref()
                .map(format_timestamp)
                .unwrap_or_default(),
        );
    }
    Ok(())
}
