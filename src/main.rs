//! shipwright - Deploy files to pluggable targets.
//!
//! Usage:
//!   shipwright targets                       List configured targets
//!   shipwright deploy [PATH..] -t TARGET     Upload files
//!   shipwright pull FILE.. -t TARGET         Download files into the workspace
//!   shipwright delete FILE.. -t TARGET       Remove remote files
//!   shipwright list [DIR] -t TARGET          List a remote directory
//!   shipwright --help                        Show help

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Context, Result, bail, eyre};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use shipwright_core::{DeployResult, WorkspaceConfig};
use shipwright_ops::{
    ChannelObserver, DeployOperation, Dispatcher, FileSelection, TransferError, TransferEvent,
    TransferProgress, TransferSummary,
};
use shipwright_plugin::{
    BoxFuture, PluginContext, PluginRegistry, PromptRequest, Prompter, Workspace,
};

#[derive(Parser)]
#[command(
    name = "shipwright",
    version,
    about = "Deploy, pull, delete and list files across pluggable targets",
    long_about = "shipwright moves files between a local workspace and the targets \
                  configured in shipwright.toml.\n\n\
                  Meta-targets (batch, each, map, switch, prompt) expand into other \
                  targets, so one command can reach several destinations."
)]
struct Cli {
    /// Workspace configuration file (TOML or JSON)
    #[arg(short, long, global = true, default_value = "shipwright.toml")]
    config: PathBuf,

    /// Select a switch option (NAME=OPTION), may be repeated
    #[arg(short, long = "switch", global = true, value_name = "NAME=OPTION")]
    switches: Vec<String>,

    /// Package used to filter target visibility
    #[arg(short, long, global = true)]
    package: Option<String>,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show configured targets
    Targets {
        /// Include targets hidden for the current package
        #[arg(short, long)]
        all: bool,
    },

    /// Upload files or directories
    Deploy {
        /// Files or directories, relative to the workspace root
        #[arg(default_value = ".")]
        paths: Vec<PathBuf>,

        /// Target names
        #[arg(short, long = "target", required = true)]
        targets: Vec<String>,

        /// Extra glob patterns to skip
        #[arg(short, long)]
        exclude: Vec<String>,

        /// Include hidden files
        #[arg(long)]
        hidden: bool,
    },

    /// Download files into the workspace
    Pull {
        /// Remote paths, relative to the target directory
        #[arg(required = true)]
        files: Vec<String>,

        /// Target name
        #[arg(short, long)]
        target: String,
    },

    /// Delete remote files
    Delete {
        /// Remote paths, relative to the target directory
        #[arg(required = true)]
        files: Vec<String>,

        /// Target names
        #[arg(short, long = "target", required = true)]
        targets: Vec<String>,
    },

    /// List a remote directory
    List {
        /// Directory, relative to the target directory
        #[arg(default_value = "")]
        dir: String,

        /// Target name
        #[arg(short, long)]
        target: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config_path = &cli.config;
    let config = WorkspaceConfig::load(config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;
    let root = workspace_root(config_path)?;
    let exclude = config.exclude.clone();

    let (output_tx, output_rx) = mpsc::unbounded_channel();
    let output = spawn_output(output_rx);
    let registry = Arc::new(PluginRegistry::with_builtin(
        PluginContext::new().with_output(output_tx),
    ));

    let mut workspace = Workspace::from_config(config, &root, Arc::clone(&registry))
        .with_prompter(Arc::new(StdinPrompter));
    if let Some(package) = cli.package {
        workspace = workspace.with_package(package);
    }
    for switch in &cli.switches {
        let (name, option) = switch
            .split_once('=')
            .ok_or_else(|| eyre!("Invalid switch '{switch}', expected NAME=OPTION"))?;
        workspace.switches().select(name, option);
    }

    let cancel = CancellationToken::new();
    spawn_interrupt(cancel.clone());
    let dispatcher = Dispatcher::new(Arc::new(workspace)).with_cancellation(cancel);

    let result = run(&dispatcher, cli.command, &root, exclude).await;

    // Dropping the registry closes the plugin output channel.
    registry.dispose();
    drop(dispatcher);
    drop(registry);
    let _ = output.await;

    result
}

async fn run(
    dispatcher: &Dispatcher,
    command: Command,
    root: &Path,
    mut exclude: Vec<String>,
) -> Result<()> {
    match command {
        Command::Targets { all } => {
            show_targets(dispatcher.workspace(), all);
            Ok(())
        }
        Command::Deploy {
            paths,
            targets,
            exclude: extra,
            hidden,
        } => {
            exclude.extend(extra);
            let selection = FileSelection::builder()
                .root(root)
                .exclude(exclude)
                .include_hidden(hidden)
                .build()
                .map_err(|e| eyre!("{e}"))?;

            let files = {
                let selection = selection.clone();
                tokio::task::spawn_blocking(move || selection.collect(&paths)).await??
            };
            if files.is_empty() {
                eprintln!("Nothing to deploy.");
                return Ok(());
            }

            let (observer, rx) = ChannelObserver::channel();
            let events = spawn_events(rx, DeployOperation::Deploy, files.len() * targets.len());
            let uploads = selection.uploads(&files, observer)?;

            let result = dispatcher.deploy(uploads, &targets).await;
            finish(result, events, dispatcher).await
        }
        Command::Pull { files, target } => {
            let selection = FileSelection::new(root);
            let (observer, rx) = ChannelObserver::channel();
            let events = spawn_events(rx, DeployOperation::Pull, files.len());
            let downloads = selection.downloads(&files, observer);

            let result = dispatcher.pull(downloads, &target).await;
            finish(result, events, dispatcher).await
        }
        Command::Delete { files, targets } => {
            let selection = FileSelection::new(root);
            let (observer, rx) = ChannelObserver::channel();
            let events = spawn_events(rx, DeployOperation::Delete, files.len() * targets.len());
            let deletions = selection.deletions(&files, observer);

            let result = dispatcher.delete(deletions, &targets).await;
            finish(result, events, dispatcher).await
        }
        Command::List { dir, target } => {
            let listing = dispatcher.list_directory(&target, &dir).await?;

            println!();
            for entry in &listing.dirs {
                println!(" {:>10}  {}/", "", entry.name);
            }
            for entry in &listing.files {
                let size = entry.size.map(format_size).unwrap_or_default();
                println!(" {:>10}  {}", size, entry.name);
            }
            for entry in &listing.others {
                println!(" {:>10}  {}", "?", entry.name);
            }
            println!();
            println!(
                " {} directories, {} files",
                listing.dirs.len(),
                listing.files.len()
            );
            Ok(())
        }
    }
}

/// Wait for the event consumer and report the outcome.
async fn finish(
    result: DeployResult<()>,
    events: JoinHandle<TransferSummary>,
    dispatcher: &Dispatcher,
) -> Result<()> {
    // Every observer lives in the file list, which is gone by now.
    let summary = events.await?;

    println!();
    println!("{}", "─".repeat(60));
    println!(" {}", summary.summary());
    if summary.bytes_processed > 0 {
        println!(" {} received", format_size(summary.bytes_processed));
    }
    if dispatcher.is_cancelling() {
        println!(" Cancelled");
    }
    println!("{}", "─".repeat(60));

    if !summary.errors.is_empty() {
        println!();
        println!("{} error(s):", summary.errors.len());
        for error in &summary.errors {
            println!("   {error}");
        }
    }

    result.context(format!("{} failed", summary.operation))?;
    if !summary.is_success() {
        bail!("{} file(s) failed", summary.failed);
    }
    Ok(())
}

fn spawn_events(
    mut rx: mpsc::UnboundedReceiver<TransferEvent>,
    operation: DeployOperation,
    total: usize,
) -> JoinHandle<TransferSummary> {
    tokio::spawn(async move {
        let mut progress = TransferProgress::new(operation, total);
        while let Some(event) = rx.recv().await {
            match &event {
                TransferEvent::Started { file, destination } => {
                    tracing::debug!(
                        target: "cli",
                        file = %file,
                        destination = ?destination,
                        "started"
                    );
                }
                TransferEvent::Completed { file, .. } => {
                    if operation == DeployOperation::Pull {
                        if let Err(err) = event.save().await {
                            eprintln!(" ✗ {file}: {err}");
                            let failed = TransferError::new(file.clone(), err.to_string());
                            progress.apply(&TransferEvent::Failed(failed));
                            continue;
                        }
                    }
                    eprintln!(" ✓ {file}");
                }
                TransferEvent::Failed(error) => eprintln!(" ✗ {error}"),
            }
            progress.apply(&event);
        }
        progress.finish()
    })
}

fn spawn_output(mut rx: mpsc::UnboundedReceiver<String>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            eprintln!("{line}");
        }
    })
}

fn spawn_interrupt(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Cancelling...");
            cancel.cancel();
        }
    });
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_env("SHIPWRIGHT_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

/// Directory containing the config file.
fn workspace_root(config: &Path) -> Result<PathBuf> {
    let parent = config
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    parent.canonicalize().context("Invalid workspace directory")
}

fn show_targets(workspace: &Workspace, all: bool) {
    let targets: Vec<_> = if all {
        workspace.targets().iter().collect()
    } else {
        workspace.visible_targets()
    };

    println!();
    println!(" {} ({})", workspace.name(), workspace.root().display());
    println!("{}", "─".repeat(60));
    if targets.is_empty() {
        println!(" No targets configured.");
    }
    for target in targets {
        let known = workspace.registry().has_type(&target.kind);
        println!(
            " {:<30} {}{}",
            truncate(&target.display_name(), 30),
            target.kind,
            if known { "" } else { " (no plugin)" }
        );
    }
    println!();
}

/// Asks prompt targets' questions on the terminal.
struct StdinPrompter;

impl Prompter for StdinPrompter {
    fn prompt<'a>(&'a self, request: &'a PromptRequest) -> BoxFuture<'a, Option<String>> {
        // Empty answers fall back to the request's default.
        let question = match request.default_text() {
            Some(default) => format!("{} [{}]: ", request.text, default),
            None => format!("{}: ", request.text),
        };

        Box::pin(async move {
            tokio::task::spawn_blocking(move || {
                let mut stderr = std::io::stderr();
                let _ = write!(stderr, "{question}");
                let _ = stderr.flush();

                let mut line = String::new();
                match std::io::stdin().read_line(&mut line) {
                    // End of input dismisses the prompt.
                    Ok(0) | Err(_) => None,
                    Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
                }
            })
            .await
            .ok()
            .flatten()
        })
    }
}

fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

/// Truncate a string to max length.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}
