//! stowage - cancellable file operations with collision handling and undo.
//!
//! Usage:
//!   stow copy SOURCE... DEST      Copy items into a folder
//!   stow move SOURCE... DEST      Move items into a folder
//!   stow delete PATH...           Send items to the trash
//!   stow restore TRASH_PATH...    Put trashed items back
//!   stow undo | redo              Walk the operation history
//!   stow trash list | usage       Inspect the trash
//!   stow --help                   Show help

mod terminal;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use chrono::Local;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Context, Result, bail};
use stowage_core::{
    EngineConfig, ItemReference, NameCollisionPolicy, OperationOptions, OperationOutcome,
    OperationRecord,
};
use stowage_ops::{
    BannerEvent, ClipboardPayload, Coordinator, FolderTrash, HistoryRecorder,
    HistorySnapshot, LocalExecutor, OperationFlags, Services, SystemTrash, TrashStore, summary,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use terminal::{ProcessLauncher, TerminalDialogs};

#[derive(Parser)]
#[command(
    name = "stowage",
    version,
    about = "Cancellable copy/move/delete/restore with collision handling and undo",
    long_about = "stowage runs file operations through one engine: name collisions are \
                  resolved once per batch, deletes go to the trash, and every operation \
                  can be undone with `stow undo`."
)]
struct Cli {
    /// Answer every prompt with its default
    #[arg(short = 'y', long, global = true)]
    yes: bool,

    /// Use a folder as the trash instead of the system recycle bin
    #[arg(long, global = true, value_name = "DIR")]
    trash_dir: Option<PathBuf>,

    /// Config file (defaults to the user config directory)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Copy items into a folder
    Copy {
        /// Items to copy
        #[arg(required = true)]
        sources: Vec<PathBuf>,

        /// Destination folder
        dest: PathBuf,

        /// Show the conflict prompt even when nothing collides
        #[arg(long)]
        ask: bool,
    },

    /// Move items into a folder
    Move {
        /// Items to move
        #[arg(required = true)]
        sources: Vec<PathBuf>,

        /// Destination folder
        dest: PathBuf,

        /// Show the conflict prompt even when nothing collides
        #[arg(long)]
        ask: bool,
    },

    /// Delete items (to the trash by default)
    Delete {
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Skip the trash
        #[arg(short, long)]
        permanent: bool,
    },

    /// Restore trashed items to where they were deleted from
    Restore {
        /// Paths inside the trash (see `stow trash list`)
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Restore into this folder instead of the original location
        #[arg(long, value_name = "DIR")]
        to: Option<PathBuf>,
    },

    /// Rename an item within its folder
    Rename {
        path: PathBuf,
        new_name: String,

        /// Replace an existing item with the new name
        #[arg(long, conflicts_with = "unique")]
        replace: bool,

        /// Pick a unique name if the new name is taken
        #[arg(long)]
        unique: bool,
    },

    /// Create an empty file or folder
    New {
        path: PathBuf,

        /// Create a folder
        #[arg(short, long)]
        dir: bool,
    },

    /// Create shortcuts to items inside a folder
    Link {
        #[arg(required = true)]
        sources: Vec<PathBuf>,

        /// Folder to create the shortcuts in
        folder: PathBuf,
    },

    /// Drop items onto a folder or program, like a drag and drop
    Drop {
        #[arg(required = true)]
        sources: Vec<PathBuf>,

        /// Drop target
        target: PathBuf,

        /// Allow copying
        #[arg(long)]
        copy: bool,

        /// Allow moving
        #[arg(long = "move")]
        move_: bool,

        /// Allow linking
        #[arg(long)]
        link: bool,
    },

    /// Undo the last operation
    Undo,

    /// Redo the last undone operation
    Redo,

    /// Inspect the trash
    Trash {
        #[command(subcommand)]
        command: TrashCommand,
    },

    /// Show recorded operations, newest first
    History,
}

#[derive(Subcommand)]
enum TrashCommand {
    /// List trashed items
    List,
    /// Show how much the trash holds
    Usage,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config_path = cli.config.clone().unwrap_or_else(EngineConfig::default_path);
    let config = EngineConfig::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    debug!(config = %config_path.display(), "Loaded config");

    let trash: Arc<dyn TrashStore> = match &cli.trash_dir {
        Some(dir) => Arc::new(FolderTrash::new(dir)),
        None => Arc::new(SystemTrash::new()),
    };

    let command = match cli.command {
        Command::Trash { command } => {
            run_trash(trash.as_ref(), command).await?;
            return Ok(ExitCode::SUCCESS);
        }
        Command::History => {
            run_history(&load_history()?.undo);
            return Ok(ExitCode::SUCCESS);
        }
        command => command,
    };

    let history = Arc::new(HistoryRecorder::from_snapshot(
        load_history()?,
        config.history_capacity,
    ));
    let dialogs = Arc::new(TerminalDialogs::new(cli.yes));
    let executor = Arc::new(
        LocalExecutor::new(Arc::clone(&trash)).with_channel_size(config.channel_size),
    );
    let services = Services::new(executor, trash, dialogs.clone(), dialogs)
        .with_launcher(Arc::new(ProcessLauncher));

    let (tx, rx) = mpsc::channel(config.channel_size);
    let banner = tokio::spawn(print_banner(rx, cli.verbose));
    let coordinator = Coordinator::new(services, config)
        .with_history(Arc::clone(&history))
        .with_progress(tx);

    let cancel = coordinator.cancellation_token();
    let interrupt = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("Cancelling...");
                cancel.cancel();
            }
        }
    });

    let outcome = run(&coordinator, command, &cancel).await;
    interrupt.abort();

    // Closes the banner channel.
    drop(coordinator);
    let _ = banner.await;
    let outcome = outcome?;
    save_history(&history.snapshot().await)?;

    Ok(if outcome.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn run(
    coordinator: &Coordinator,
    command: Command,
    cancel: &CancellationToken,
) -> Result<OperationOutcome> {
    let outcome = match command {
        Command::Copy { sources, dest, ask } => {
            let (items, targets) = pair_into(&sources, &dest)?;
            coordinator
                .copy(&items, &targets, ask, true, cancel)
                .await
        }
        Command::Move { sources, dest, ask } => {
            let (items, targets) = pair_into(&sources, &dest)?;
            coordinator
                .move_items(&items, &targets, ask, true, cancel)
                .await
        }
        Command::Delete { paths, permanent } => {
            let items = paths.iter().map(ItemReference::from_path).collect::<Vec<_>>();
            let options = OperationOptions {
                permanently: permanent,
                ..OperationOptions::default()
            };
            coordinator.delete(&items, options, cancel).await
        }
        Command::Restore { paths, to } => {
            let snapshot = coordinator.trash().snapshot();
            let mut items = Vec::with_capacity(paths.len());
            let mut targets = Vec::with_capacity(paths.len());
            for path in paths {
                let Some(original) = snapshot.original_path(&path).await else {
                    bail!("{} is not in the trash", path.display());
                };
                let target = match &to {
                    Some(dir) => dir.join(original.file_name().unwrap_or(path.as_os_str())),
                    None => original,
                };
                items.push(ItemReference::from_path(path));
                targets.push(target);
            }
            coordinator.restore(&items, &targets, true, cancel).await
        }
        Command::Rename {
            path,
            new_name,
            replace,
            unique,
        } => {
            let policy = if replace {
                NameCollisionPolicy::ReplaceExisting
            } else if unique {
                NameCollisionPolicy::GenerateUniqueName
            } else {
                NameCollisionPolicy::FailIfExists
            };
            coordinator
                .rename(&ItemReference::from_path(path), &new_name, policy, true, true, cancel)
                .await
        }
        Command::New { path, dir } => {
            let item = if dir {
                ItemReference::directory(path)
            } else {
                ItemReference::file(path)
            };
            let (outcome, created) = coordinator.create(&item, None, true, cancel).await;
            if let Some(created) = created {
                println!("{}", created.path.display());
            }
            outcome
        }
        Command::Link { sources, folder } => {
            let items = sources.iter().map(ItemReference::from_path).collect::<Vec<_>>();
            coordinator
                .create_shortcuts(&items, &folder, true, cancel)
                .await
        }
        Command::Drop {
            sources,
            target,
            copy,
            move_,
            link,
        } => {
            let mut flags = OperationFlags::NONE;
            for (allowed, flag) in [
                (copy, OperationFlags::COPY),
                (move_, OperationFlags::MOVE),
                (link, OperationFlags::LINK),
            ] {
                if allowed {
                    flags = flags | flag;
                }
            }
            let payload =
                ClipboardPayload::items(sources.iter().map(ItemReference::from_path).collect());
            let is_executable = is_executable(&target);
            coordinator
                .dispatch(flags, &payload, &target, false, true, is_executable, cancel)
                .await
        }
        Command::Undo => coordinator.undo(cancel).await,
        Command::Redo => coordinator.redo(cancel).await,
        // Answered without the engine.
        Command::Trash { .. } | Command::History => OperationOutcome::noop(),
    };
    Ok(outcome)
}

/// Pair each source with the same name inside `dest`.
fn pair_into(sources: &[PathBuf], dest: &Path) -> Result<(Vec<ItemReference>, Vec<PathBuf>)> {
    if !dest.is_dir() {
        bail!("{} is not a folder", dest.display());
    }
    let mut items = Vec::with_capacity(sources.len());
    let mut targets = Vec::with_capacity(sources.len());
    for source in sources {
        let Some(name) = source.file_name() else {
            bail!("{} has no file name", source.display());
        };
        targets.push(dest.join(name));
        items.push(ItemReference::from_path(source));
    }
    Ok((items, targets))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("exe"))
}

/// Print progress and the final summary of each operation.
async fn print_banner(mut rx: mpsc::Receiver<BannerEvent>, verbose: bool) {
    while let Some(event) = rx.recv().await {
        match event {
            BannerEvent::Started { kind, items_total } if verbose => {
                eprintln!("{kind}: {items_total} item(s)");
            }
            BannerEvent::Progress(progress) if verbose => {
                if let Some(current) = &progress.current {
                    eprintln!("[{:>5.1}%] {}", progress.percentage(), current.display());
                }
            }
            BannerEvent::Finished { kind, outcome } => {
                println!("{}", summary(kind, &outcome));
            }
            _ => {}
        }
    }
}

async fn run_trash(trash: &dyn TrashStore, command: TrashCommand) -> Result<()> {
    if !trash.has_trash() {
        bail!("No trash is available on this system");
    }

    match command {
        TrashCommand::List => {
            let entries = trash.enumerate().await.context("Failed to list the trash")?;
            if entries.is_empty() {
                println!("Trash is empty");
            }
            for entry in entries {
                let when = entry
                    .deleted_at
                    .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                println!(
                    "{}  {}\n    {}",
                    when,
                    entry.original_path.display(),
                    entry.trash_path.display()
                );
            }
        }
        TrashCommand::Usage => {
            let usage = trash.usage().await.context("Failed to read trash usage")?;
            println!("{} items, {}", usage.items, format_size(usage.bytes));
        }
    }
    Ok(())
}

fn run_history(records: &[OperationRecord]) {
    if records.is_empty() {
        println!("No recorded operations");
        return;
    }
    for record in records.iter().rev() {
        let when = record.created_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S");
        println!("{}  {}", when, record.description());
    }
}

fn history_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("stowage").join("history.json"))
}

fn load_history() -> Result<HistorySnapshot> {
    let Some(path) = history_path() else {
        return Ok(HistorySnapshot::default());
    };
    let json = match fs::read_to_string(&path) {
        Ok(json) => json,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HistorySnapshot::default()),
        Err(e) => return Err(e).with_context(|| format!("Failed to read {}", path.display())),
    };
    serde_json::from_str(&json).with_context(|| format!("Corrupt history file {}", path.display()))
}

fn save_history(snapshot: &HistorySnapshot) -> Result<()> {
    let Some(path) = history_path() else {
        return Ok(());
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create config directory")?;
    }
    let json = serde_json::to_string_pretty(snapshot)?;
    fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Format bytes as human-readable size.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}
