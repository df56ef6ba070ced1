// ABOUTME: Warren CLI entry point
// ABOUTME: Parses subcommands and dispatches to sandbox lifecycle handlers

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use colored::*;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{completion, init, sandbox};

#[derive(Parser)]
#[command(name = "warren")]
#[command(about = "Disposable devcontainer sandboxes for coding agents")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scaffold a devcontainer configuration for this project
    Init {
        /// Project path (default: current directory)
        #[arg(short, long)]
        path: Option<PathBuf>,
        /// Overwrite an existing devcontainer configuration
        #[arg(long)]
        force: bool,
    },
    /// Connect to a sandbox's shell, creating the sandbox if needed
    Connect {
        /// Sandbox name (generated when omitted)
        name: Option<String>,
        /// Shell to run (default: from config or /bin/bash)
        #[arg(short, long)]
        shell: Option<String>,
        /// Branch to create the sandbox on (default: sandbox/<name>)
        #[arg(short, long)]
        branch: Option<String>,
        /// Create the sandbox without prompting
        #[arg(short, long)]
        yes: bool,
    },
    /// List sandboxes and their observed state
    Ps,
    /// Stop a sandbox's container
    Stop {
        /// Sandbox name
        name: String,
    },
    /// Stop all running sandboxes of this project
    Stopall,
    /// Remove a sandbox: container, working copy and registry entry
    Rm {
        /// Sandbox name
        name: String,
        /// Carry on past individual cleanup failures
        #[arg(short, long)]
        force: bool,
    },
    /// Merge a sandbox's pushed changes into the current branch
    Merge {
        /// Sandbox name
        name: String,
        /// Branch to merge into (default: current branch)
        #[arg(short, long)]
        target: Option<String>,
    },
    /// Show a sandbox's port mappings
    Ports {
        /// Sandbox name
        name: String,
    },
    /// Show a sandbox's container logs
    Logs {
        /// Sandbox name
        name: String,
        /// Print existing logs and exit instead of following
        #[arg(long)]
        no_follow: bool,
    },
    /// Generate shell completion scripts
    Completion {
        /// The shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

async fn handle_command(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Init { path, force } => init::run(path, force),
        Commands::Connect {
            name,
            shell,
            branch,
            yes,
        } => sandbox::connect(name, shell, branch, yes).await,
        Commands::Ps => sandbox::list().await,
        Commands::Stop { name } => sandbox::stop(&name).await,
        Commands::Stopall => sandbox::stop_all().await,
        Commands::Rm { name, force } => sandbox::remove(&name, force).await,
        Commands::Merge { name, target } => sandbox::merge(&name, target.as_deref()).await,
        Commands::Ports { name } => sandbox::ports(&name).await,
        Commands::Logs { name, no_follow } => sandbox::logs(&name, !no_follow).await,
        Commands::Completion { shell } => {
            completion::run::<Cli>(shell);
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("WARREN_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match handle_command(cli.command).await {
        Ok(_) => {}
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            process::exit(1);
        }
    }
}
