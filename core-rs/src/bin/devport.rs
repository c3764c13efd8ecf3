//! devport - command-line front end
//!
//! Thin wrapper: argument parsing and output formatting only.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use devport_core::logging::{init_logging, LogFormat};
use devport_core::{DevportConfig, DevportContext, PortAssignment, ReconcileOutcome};

#[derive(Parser)]
#[command(name = "devport")]
#[command(version = devport_core::VERSION)]
#[command(about = "Collision-free host ports for workspace dev containers", long_about = None)]
struct Cli {
    /// Config file (YAML or JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log output format on stderr (human, json)
    #[arg(long, global = true, default_value = "human")]
    log_format: LogFormat,

    /// Print results as JSON on stdout
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reserve a port for a workspace (returns the existing one if already reserved)
    Allocate {
        /// Workspace directory
        workspace: PathBuf,
        /// Repository name
        #[arg(long)]
        repo: String,
        /// Branch name
        #[arg(long)]
        branch: String,
    },
    /// Drop a workspace's reservation
    Release {
        /// Workspace directory
        workspace: PathBuf,
    },
    /// Show all reservations
    List,
    /// Ask the container runtime which host port the workspace container published
    Query {
        /// Workspace directory
        workspace: PathBuf,
    },
    /// Overwrite the stored port of an existing reservation
    Update {
        /// Workspace directory
        workspace: PathBuf,
        /// Port the container actually bound
        port: u16,
    },
    /// Query the runtime and correct the stored port if it drifted
    Reconcile {
        /// Workspace directory
        workspace: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.log_format) {
        eprintln!("devport: failed to initialise logging: {}", e);
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("devport: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = DevportConfig::discover(cli.config.as_deref()).context("Failed to load config")?;
    let context = DevportContext::from_config(&config)?;
    let json = cli.json;

    match cli.command {
        Commands::Allocate {
            workspace,
            repo,
            branch,
        } => {
            let workspace = absolutize(&workspace)?;
            let assignment = context
                .allocator()
                .allocate(&workspace, &repo, &branch)
                .with_context(|| format!("Failed to allocate port for {}", workspace.display()))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&assignment_json(&assignment))?);
            } else {
                println!("{}", assignment.port);
            }
        }

        Commands::Release { workspace } => {
            let workspace = absolutize(&workspace)?;
            let released = context.allocator().release(&workspace)?;

            if json {
                println!("{}", serde_json::json!({ "released": released }));
            } else if released {
                println!("✓ Released {}", workspace.display());
            } else {
                println!("No reservation for {}", workspace.display());
            }
        }

        Commands::List => {
            let table = context.allocator().list();

            if json {
                println!("{}", serde_json::to_string_pretty(&table)?);
                return Ok(());
            }
            if table.is_empty() {
                println!("No ports reserved.");
                println!("\nTable location: {}", context.ports_file().display());
                return Ok(());
            }

            println!("{:<7} {:<20} {:<24} {:<26} WORKSPACE", "PORT", "REPO", "BRANCH", "STARTED");
            for a in table.iter() {
                println!(
                    "{:<7} {:<20} {:<24} {:<26} {}",
                    a.port,
                    a.repo,
                    a.branch,
                    a.started.format("%Y-%m-%d %H:%M:%S UTC"),
                    a.workspace.display()
                );
            }
            println!("\nTotal: {} reservation(s), range {}", table.len(), context.allocator().range());
        }

        Commands::Query { workspace } => {
            let workspace = absolutize(&workspace)?;
            let actual = context.reconciler().query_actual_port(&workspace);

            if json {
                println!("{}", serde_json::json!({ "port": actual }));
            } else {
                match actual {
                    Some(port) => println!("{}", port),
                    None => println!("unknown"),
                }
            }
        }

        Commands::Update { workspace, port } => {
            let workspace = absolutize(&workspace)?;
            let updated = context.reconciler().update(&workspace, port)?;

            if json {
                println!("{}", serde_json::json!({ "updated": updated }));
            } else if updated {
                println!("✓ {} now on port {}", workspace.display(), port);
            } else {
                println!("No reservation for {}", workspace.display());
            }
        }

        Commands::Reconcile { workspace } => {
            let workspace = absolutize(&workspace)?;
            let outcome = context.reconciler().reconcile(&workspace)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&outcome_json(&outcome))?);
            } else {
                println!("{}: {}", workspace.display(), outcome);
            }
        }
    }

    Ok(())
}

/// Workspaces are keyed by absolute path; resolve relative CLI arguments
/// against the current directory.
fn absolutize(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("Cannot determine current directory")?;
    Ok(cwd.join(path))
}

fn assignment_json(a: &PortAssignment) -> serde_json::Value {
    serde_json::json!({
        "workspace": a.workspace,
        "port": a.port,
        "repo": a.repo,
        "branch": a.branch,
        "started": a.started,
    })
}

fn outcome_json(outcome: &ReconcileOutcome) -> serde_json::Value {
    match outcome {
        ReconcileOutcome::Unknown => serde_json::json!({ "status": "unknown" }),
        ReconcileOutcome::NotAllocated => serde_json::json!({ "status": "not_allocated" }),
        ReconcileOutcome::InSync(port) => serde_json::json!({ "status": "in_sync", "port": port }),
        ReconcileOutcome::Corrected { from, to } => {
            serde_json::json!({ "status": "corrected", "from": from, "to": to })
        }
    }
}
