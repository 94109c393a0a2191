//! CCCopy - team synchronization between a Work tree and a shared Production tree
//!
//! A thin command-line wrapper over the synchronization engine: Download,
//! Upload and Save, plus the status and history views. Exit codes follow
//! the pipeline contract (0 ok, 2 lock timeout, 3 git error, 4 privilege
//! failure, 5 configuration error).

use clap::{Parser, Subcommand};
use console::style;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

use cccopy_config::ProjectConfig;
use cccopy_git::git_version;
use cccopy_sync::SyncEngine;
use cccopy_types::Error;

/// CCCopy - coordinated Git trees on a shared filesystem
#[derive(Parser)]
#[command(
    name = "cccopy",
    version = env!("CARGO_PKG_VERSION"),
    about = "Team collaboration over two coordinated Git working trees",
    long_about = "CCCopy synchronizes a per-user Work tree with a shared multi-user\n\
                  Production tree over a plain filesystem (e.g. NFS), without a Git\n\
                  server. Download pulls Production into Work, Upload publishes local\n\
                  changes under a coarse-grained lock, Save commits locally."
)]
struct Cli {
    /// Project template file (INI)
    #[arg(short, long)]
    template: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Quiet mode - minimal output
    #[arg(short, long)]
    quiet: bool,

    /// Verbose mode - detailed output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download updates from Production into the Work tree
    Download,
    /// Upload modified files from Work into Production
    Upload {
        /// Commit message for the Production commit
        #[arg(short, long, default_value = "Upload from work directory")]
        message: String,
    },
    /// Commit local changes in the Work repository
    Save {
        /// Commit message for the Work commit
        #[arg(short, long, default_value = "Work changes")]
        message: String,
    },
    /// Show the state of every project file
    Status,
    /// Show commit history
    History {
        /// Show the Work history instead of Production's
        #[arg(long)]
        work: bool,
        /// Number of commits to show
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    let config = match ProjectConfig::load(&cli.template) {
        Ok(config) => config,
        Err(e) => {
            let e = Error::from(e);
            eprintln!("{} {e}", style("✗").red().bold());
            return exit_code_of(&e);
        }
    };
    info!(
        template = %cli.template.display(),
        project_id = config.project_id,
        git = %git_version(),
        "cccopy v{} ready",
        env!("CARGO_PKG_VERSION")
    );
    let engine = SyncEngine::new(config);

    match run(&engine, cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {e}", style("✗").red().bold());
            if let Error::LockTimeout { lock_dir, .. } = &e {
                eprintln!(
                    "  another user may be working; a crashed holder can be cleared with: rm -rf {lock_dir}"
                );
            }
            exit_code_of(&e)
        }
    }
}

fn exit_code_of(e: &Error) -> ExitCode {
    ExitCode::from(u8::try_from(e.exit_code()).unwrap_or(1))
}

async fn run(engine: &SyncEngine, command: Commands) -> cccopy_types::Result<()> {
    match command {
        Commands::Download => download_command(engine).await,
        Commands::Upload { message } => upload_command(engine, &message).await,
        Commands::Save { message } => save_command(engine, &message).await,
        Commands::Status => status_command(engine).await,
        Commands::History { work, limit } => history_command(engine, work, limit).await,
    }
}

async fn download_command(engine: &SyncEngine) -> cccopy_types::Result<()> {
    let outcome = engine.download().await?;
    println!(
        "{} Download finished: {} updated, {} modified locally, {} unchanged",
        style("✓").green().bold(),
        outcome.stats.updated,
        outcome.stats.modified,
        outcome.stats.same,
    );
    if outcome.gitignore_refreshed {
        println!("  {} .gitignore refreshed from production", style("ℹ").yellow());
    }
    for path in &outcome.conflicts {
        println!(
            "  {} conflict: {} (resolve with your diff tool, then download again)",
            style("!").red().bold(),
            style(path).cyan()
        );
    }
    Ok(())
}

async fn upload_command(engine: &SyncEngine, message: &str) -> cccopy_types::Result<()> {
    let outcome = engine.upload(message).await?;
    if outcome.gitignore_violation {
        println!(
            "  {} work .gitignore differed and was restored from production",
            style("!").yellow().bold()
        );
    }
    if outcome.uploaded.is_empty() {
        println!("{} Nothing to upload", style("ℹ").yellow());
        return Ok(());
    }
    for path in &outcome.uploaded {
        println!("  {} {}", style("↑").green(), style(path).cyan());
    }
    println!(
        "{} Uploaded {} file(s)",
        style("✓").green().bold(),
        outcome.uploaded.len()
    );
    Ok(())
}

async fn save_command(engine: &SyncEngine, message: &str) -> cccopy_types::Result<()> {
    let outcome = engine.save(message).await?;
    for path in &outcome.skipped {
        println!(
            "  {} outside sources, not saved: {}",
            style("!").yellow(),
            path
        );
    }
    if outcome.committed.is_empty() {
        println!("{} Nothing to save", style("ℹ").yellow());
    } else {
        println!(
            "{} Saved {} file(s)",
            style("✓").green().bold(),
            outcome.committed.len()
        );
    }
    Ok(())
}

async fn status_command(engine: &SyncEngine) -> cccopy_types::Result<()> {
    let rows = engine.status().await?;
    if rows.is_empty() {
        println!("{} No project files found", style("ℹ").yellow());
        return Ok(());
    }
    for (path, state) in rows {
        let label = format!("[{state}]");
        let styled = match state.as_str() {
            "same" => style(label).dim(),
            "modified" => style(label).green(),
            "updated" => style(label).blue(),
            "conflicted" => style(label).red().bold(),
            "deleted" => style(label).magenta(),
            _ => style(label),
        };
        println!("{styled:>14} {path}");
    }
    Ok(())
}

async fn history_command(engine: &SyncEngine, work: bool, limit: usize) -> cccopy_types::Result<()> {
    let (title, commits) = if work {
        ("WORK HISTORY", engine.work_history(Some(limit)).await?)
    } else {
        ("PRODUCTION HISTORY", engine.production_history(Some(limit)).await?)
    };
    println!("=== {title} ===");
    if commits.is_empty() {
        println!("{} No commits yet", style("ℹ").yellow());
        return Ok(());
    }
    println!("{:<4} {:<10} {:<20} {:<16} Message", "No", "Hash", "Date", "Author");
    for (index, commit) in commits.iter().enumerate() {
        println!(
            "{:<4} {:<10} {:<20} {:<16} {}",
            index + 1,
            style(&commit.hash).cyan(),
            commit.date,
            commit.author,
            commit.message
        );
    }
    Ok(())
}

/// Set up tracing output for the session.
///
/// The flags pick a default directive set; `CCCOPY_LOG` (same family as
/// `CCCOPY_GIT_BIN_PATH`) overrides them entirely with standard
/// `tracing` filter syntax. The pipeline's own crates get one level more
/// detail than third-party noise.
fn init_logging(cli: &Cli) {
    use tracing_subscriber::EnvFilter;

    let default_directives = match (cli.debug, cli.verbose, cli.quiet) {
        (true, _, _) => "info,cccopy_sync=debug,cccopy_git=debug,cccopy_engine=debug",
        (false, true, _) => "warn,cccopy_sync=info,cccopy_git=info,cccopy_engine=info",
        (false, false, true) => "error",
        (false, false, false) => "warn",
    };
    let filter = std::env::var("CCCOPY_LOG")
        .ok()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(default_directives));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
