//! Command-line argument parsing.

use std::path::PathBuf;

use anyhow::{anyhow, bail, Result};

pub const USAGE: &str = "\
Usage: pbxbackup [OPTIONS] [COMMAND]

Commands:
  backup            Trigger a backup, wait for it and download it (default)
  list              List backups stored on the server
  delete <NAME>     Delete a backup from the server
  help              Show this message

Options:
  --name <NAME>     Backup file name (backup, list)
  --output <DIR>    Directory to download into (backup)
  --delete          Delete the backup from the server after download (backup)
  --keep            Keep the backup on the server, overriding config (backup)
  --no-ssl          Talk plain HTTP to the server
  -v, --verbose     Debug logging

Configuration is read from the config file, then PBX_DOMAIN, PBX_USERNAME,
PBX_PASSWORD and friends in the environment or a .env file.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Backup(BackupArgs),
    List { name: Option<String> },
    Delete { name: String },
    Help,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackupArgs {
    pub name: Option<String>,
    pub output: Option<PathBuf>,
    /// `Some(true)` for --delete, `Some(false)` for --keep, `None` to follow config.
    pub delete: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cli {
    pub command: Command,
    pub no_ssl: bool,
    pub verbose: bool,
}

/// Parse arguments, excluding the program name.
pub fn parse<I>(args: I) -> Result<Cli>
where
    I: IntoIterator<Item = String>,
{
    let mut command: Option<String> = None;
    let mut positional: Vec<String> = Vec::new();
    let mut name = None;
    let mut output = None;
    let mut delete = None;
    let mut no_ssl = false;
    let mut verbose = false;

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--name" => name = Some(value_for(&arg, args.next())?),
            "--output" => output = Some(PathBuf::from(value_for(&arg, args.next())?)),
            "--delete" => delete = Some(true),
            "--keep" => delete = Some(false),
            "--no-ssl" => no_ssl = true,
            "-v" | "--verbose" => verbose = true,
            "-h" | "--help" => command = Some("help".to_string()),
            flag if flag.starts_with('-') => bail!("Unknown option: {}\n\n{}", flag, USAGE),
            word if command.is_none() => command = Some(word.to_string()),
            word => positional.push(word.to_string()),
        }
    }

    let command = match command.as_deref().unwrap_or("backup") {
        "backup" => {
            expect_no_positional("backup", &positional)?;
            Command::Backup(BackupArgs { name, output, delete })
        }
        "list" => {
            expect_no_positional("list", &positional)?;
            Command::List { name }
        }
        "delete" => {
            let mut positional = positional.into_iter();
            let name = positional
                .next()
                .or(name)
                .ok_or_else(|| anyhow!("delete needs a backup name\n\n{}", USAGE))?;
            if positional.next().is_some() {
                bail!("delete takes a single backup name");
            }
            Command::Delete { name }
        }
        "help" => Command::Help,
        other => bail!("Unknown command: {}\n\n{}", other, USAGE),
    };

    Ok(Cli {
        command,
        no_ssl,
        verbose,
    })
}

fn value_for(flag: &str, value: Option<String>) -> Result<String> {
    value
        .filter(|v| !v.starts_with('-'))
        .ok_or_else(|| anyhow!("{} needs a value", flag))
}

fn expect_no_positional(command: &str, positional: &[String]) -> Result<()> {
    match positional.first() {
        Some(extra) => bail!("Unexpected argument for {}: {}", command, extra),
        None => Ok(()),
    }
}
