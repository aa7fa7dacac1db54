//! Static test-report site builder.
//!
//! Runs the workspace unit suite, the property suite, and a coverage
//! pipeline as child processes, captures their output, and renders a small
//! static HTML site with an index page.

mod cli;
mod config;
mod exec;
mod process;
mod render;
mod report;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "reports", version, about = "Build static HTML test reports")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run all suites and coverage, then render the site.
    Build,
    /// Remove the generated site directory.
    Clean,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let repo_root = std::env::current_dir()?;
    match cli.command {
        Command::Build => cli::build(&repo_root),
        Command::Clean => cli::clean(&repo_root),
    }
}
