//! CLI mode for folio - browse a photo site and download folders.

mod progress;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use console::style;

use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::session::Session;

pub use progress::BarProgress;
use progress::{print_listing, print_summary, print_tree};

const DEFAULT_DEPTH: usize = 1;

/// What to do once the session is set up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print the folder tree down to `depth`.
    Tree {
        /// Levels expanded below the root.
        depth: usize,
    },
    /// Print one folder's contents.
    Ls {
        /// Slash-separated folder names; empty for the root.
        folder: String,
    },
    /// Download each folder.
    Get {
        /// Slash-separated folder names, downloaded in order.
        folders: Vec<String>,
    },
    /// Expand down to `depth` and download everything loaded.
    All {
        /// Levels expanded below the root.
        depth: usize,
    },
}

/// Parsed command-line arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliArgs {
    /// Command to run.
    pub command: Command,
    /// Configuration file; the platform default when absent.
    pub config: Option<PathBuf>,
    /// Overrides `site.base_url`.
    pub base_url: Option<String>,
    /// Overrides `archive.concurrency_limit`.
    pub concurrency: Option<usize>,
    /// Overrides `paths.download_dir`.
    pub output: Option<PathBuf>,
    /// Overrides `archive.sequential_pause_ms`.
    pub pause_ms: Option<u64>,
    /// Disables archive building.
    pub no_archive: bool,
}

impl CliArgs {
    /// Applies command-line overrides on top of a loaded configuration.
    #[must_use]
    pub fn apply(&self, mut config: AppConfig) -> AppConfig {
        if let Some(base_url) = &self.base_url {
            config.site = config.site.with_base_url(base_url.clone());
        }
        if let Some(limit) = self.concurrency {
            config.archive = config.archive.with_concurrency_limit(limit);
        }
        if let Some(pause_ms) = self.pause_ms {
            config.archive = config.archive.with_sequential_pause_ms(pause_ms);
        }
        if self.no_archive {
            config.archive = config.archive.with_enabled(false);
        }
        if let Some(output) = &self.output {
            config.paths.download_dir.clone_from(output);
        }
        config
    }
}

/// Prints command-line help to stderr.
pub fn print_usage() {
    eprintln!("Usage: folio [OPTIONS] <COMMAND> [ARGS]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  tree [--depth N]       Show the folder tree (default depth: {DEFAULT_DEPTH})");
    eprintln!("  ls <folder>            List a folder's subfolders and files");
    eprintln!("  get <folder>...        Download folders as archives");
    eprintln!("  all [--depth N]        Download every folder down to depth N as one archive");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --base-url <URL>       Site base URL");
    eprintln!("  -j, --concurrency <N>  Files fetched at once while building an archive");
    eprintln!("  -o, --output <DIR>     Download directory");
    eprintln!("  --pause-ms <N>         Pause between one-by-one downloads");
    eprintln!("  --no-archive           Never build archives; save files one by one");
    eprintln!("  --config <FILE>        Configuration file");
    eprintln!("  -h, --help             Show this help");
    eprintln!();
    eprintln!("Folders are slash-separated names below the photo root, e.g. \"2024/Trip\".");
}

fn value<'a>(args: &'a [String], i: &mut usize, flag: &str) -> std::result::Result<&'a str, String> {
    *i += 1;
    args.get(*i)
        .map(String::as_str)
        .ok_or_else(|| format!("{flag} requires a value"))
}

fn number<T: std::str::FromStr>(raw: &str, flag: &str) -> std::result::Result<T, String> {
    raw.parse()
        .map_err(|_| format!("{flag} expects a number, got {raw:?}"))
}

/// Parses arguments (without the program name).
///
/// Returns `Ok(None)` when help was requested.
///
/// # Errors
///
/// Returns a message describing the first invalid argument.
pub fn parse_args(args: &[String]) -> std::result::Result<Option<CliArgs>, String> {
    let mut config = None;
    let mut base_url = None;
    let mut concurrency = None;
    let mut output = None;
    let mut pause_ms = None;
    let mut no_archive = false;
    let mut depth = DEFAULT_DEPTH;
    let mut positional = Vec::new();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => return Ok(None),
            "--config" => config = Some(PathBuf::from(value(args, &mut i, "--config")?)),
            "--base-url" => base_url = Some(value(args, &mut i, "--base-url")?.to_string()),
            "-j" | "--concurrency" => {
                concurrency = Some(number(value(args, &mut i, "--concurrency")?, "--concurrency")?);
            }
            "-o" | "--output" => output = Some(PathBuf::from(value(args, &mut i, "--output")?)),
            "--pause-ms" => pause_ms = Some(number(value(args, &mut i, "--pause-ms")?, "--pause-ms")?),
            "--no-archive" => no_archive = true,
            "--depth" => depth = number(value(args, &mut i, "--depth")?, "--depth")?,
            arg if !arg.starts_with('-') => positional.push(arg.to_string()),
            other => return Err(format!("Unknown option: {other}")),
        }
        i += 1;
    }

    let mut positional = positional.into_iter();
    let command = match positional.next().as_deref() {
        Some("tree") => Command::Tree { depth },
        Some("all") => Command::All { depth },
        Some("ls") => Command::Ls {
            folder: positional.next().unwrap_or_default(),
        },
        Some("get") => {
            let folders: Vec<String> = positional.by_ref().collect();
            if folders.is_empty() {
                return Err("get requires at least one folder".to_string());
            }
            Command::Get { folders }
        }
        Some(other) => return Err(format!("Unknown command: {other}")),
        None => return Err("No command given".to_string()),
    };
    if let Some(extra) = positional.next() {
        return Err(format!("Unexpected argument: {extra}"));
    }

    Ok(Some(CliArgs {
        command,
        config,
        base_url,
        concurrency,
        output,
        pause_ms,
        no_archive,
    }))
}

/// Prints an error the way the CLI reports failures.
pub fn report_error(err: &Error) {
    if err.is_user_facing() {
        eprintln!("{} {err}", style("✗").red().bold());
    } else {
        eprintln!("{} {err}", style("Error:").red().bold());
    }
}

/// Runs one command against a fresh session.
///
/// Returns how many requested folders failed; errors that stop the whole
/// command are returned instead.
async fn execute(cli: &CliArgs) -> Result<usize> {
    let path = cli.config.clone().unwrap_or_else(AppConfig::default_path);
    let config = cli.apply(AppConfig::load(&path)?);
    log::debug!("Using configuration from {}", path.display());

    let session = Session::new(config, Arc::new(BarProgress::new()))?;

    match &cli.command {
        Command::Tree { depth } => {
            session.expand_to_depth(*depth).await;
            print_tree(&session.snapshot().await);
        }
        Command::Ls { folder } => {
            let id = session.locate(folder).await?;
            session.expand(id).await;
            print_listing(&session.snapshot().await, id);
        }
        Command::Get { folders } => {
            let mut failed = 0;
            for folder in folders {
                let result = match session.locate(folder).await {
                    Ok(id) => session.download_folder(id).await,
                    Err(e) => Err(e),
                };
                match result {
                    Ok(outcome) => print_summary(&outcome),
                    Err(e) => {
                        report_error(&e);
                        failed += 1;
                    }
                }
            }
            return Ok(failed);
        }
        Command::All { depth } => {
            session.expand_to_depth(*depth).await;
            let outcome = session.download_all_visible().await?;
            print_summary(&outcome);
        }
    }

    Ok(0)
}

/// Runs the CLI with the given arguments (without the program name).
pub async fn run(args: &[String]) -> ExitCode {
    let cli = match parse_args(args) {
        Ok(Some(cli)) => cli,
        Ok(None) => {
            print_usage();
            return ExitCode::SUCCESS;
        }
        Err(msg) => {
            eprintln!("{} {msg}\n", style("Error:").red().bold());
            print_usage();
            return ExitCode::FAILURE;
        }
    };

    match execute(&cli).await {
        Ok(0) => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(e) => {
            report_error(&e);
            ExitCode::FAILURE
        }
    }
}
