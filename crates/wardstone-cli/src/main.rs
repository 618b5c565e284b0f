//! Wardstone command line.
//!
//! One-shot access decisions, catalog exports, and a scripted walkthrough,
//! all against the in-memory engine.
//!
//! # Quick Start
//!
//! ```bash
//! # List the built-in role catalog
//! wardstone roles
//!
//! # Evaluate one request
//! wardstone check dr-chen record:mrn-1001 view --role physician --care-team dr-chen
//!
//! # Export the permission matrix
//! wardstone matrix --json
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Wardstone - access decisions and certification for healthcare records.
#[derive(Parser)]
#[command(name = "wardstone")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version information.
    Version,

    /// List the roles in the built-in catalog.
    Roles,

    /// Export the role-permission matrix.
    Matrix {
        /// Emit JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Evaluate one access request.
    Check(commands::check::CheckArgs),

    /// Run a scripted walkthrough of the engine.
    Demo,
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Version => {
            commands::version::run();
            Ok(())
        }
        Commands::Roles => commands::roles::run(),
        Commands::Matrix { json } => commands::matrix::run(json),
        Commands::Check(args) => commands::check::run(&args),
        Commands::Demo => commands::demo::run(),
    }
}
