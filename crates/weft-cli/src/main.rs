//! Weft command-line tool
//!
//! Inspect pointcuts and validate aspect manifests without writing code:
//! `weft match` tests a pointcut against a call signature, `weft check`
//! validates a `weft.toml`, and `weft explain` shows how a pointcut is
//! parsed.

mod commands;
mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use weft_core::MANIFEST_FILE;

/// Environment variable holding the log filter
const LOG_ENV: &str = "WEFT_LOG";

#[derive(Parser)]
#[command(name = "weft")]
#[command(about = "Aspect weaving toolkit: pointcuts, advice and manifests", long_about = None)]
#[command(version)]
struct Cli {
    /// Color output: auto, always, never
    #[arg(long, global = true, default_value = "auto")]
    color: String,

    /// Log dispatch and parsing details to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether a pointcut covers a call signature
    Match {
        /// Pointcut (e.g. "public Shop\Cart->add*()")
        pointcut: String,
        /// Call signature (e.g. "Shop\Cart->addItem()")
        signature: String,
        /// Declared visibility of the called method
        #[arg(long, default_value = "public")]
        visibility: String,
    },

    /// Validate an aspect manifest and list its join points
    Check {
        /// Manifest file
        #[arg(default_value = MANIFEST_FILE)]
        manifest: PathBuf,
    },

    /// Show how a pointcut is parsed
    Explain {
        /// Pointcut to explain
        pointcut: String,
    },
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "weft_core=trace,debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(fallback)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Match {
            pointcut,
            signature,
            visibility,
        } => {
            let matched = commands::matching::execute(&pointcut, &signature, &visibility, &cli.color)?;
            if !matched {
                std::process::exit(1);
            }
        }

        Commands::Check { manifest } => {
            commands::check::execute(&manifest, &cli.color)?;
        }

        Commands::Explain { pointcut } => {
            commands::explain::execute(&pointcut, &cli.color)?;
        }
    }

    Ok(())
}
