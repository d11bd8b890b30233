//! hubtap binary entry point.
//!
//! Parses flags, loads the TOML config, initialises logging on stderr, and
//! hands control to the front-end driver in [`hubtap_cli::app`].
//!
//! # Usage
//!
//! ```text
//! hubtap [OPTIONS]
//!
//! Options:
//!   --script <FILE>   command file replayed before the prompt opens
//!   --quiet           suppress status output on stderr
//!   --exit-after <N>  close the session after N received invocations
//!   --verbose         raise the default log level to debug
//!   --config <FILE>   explicit config file location
//! ```
//!
//! Exit code 0 on an orderly quit, 1 on fatal startup errors (unreadable
//! script or config file).

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use hubtap_cli::app::{self, RunOptions};
use hubtap_cli::config;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Interactive tap for JSON hub connections.
///
/// Connects to a hub server, sends and invokes methods with positional
/// arguments, and prints every received invocation as JSON. Unmatched server
/// traffic prints too: a catch-all subscription is installed at startup.
#[derive(Debug, Parser)]
#[command(
    name = "hubtap",
    about = "Interactive tap for JSON hub connections: connect, listen, send, invoke",
    version
)]
struct Cli {
    /// Command file replayed line by line before the prompt opens.
    ///
    /// Blank lines and lines starting with `#` are skipped. The prompt
    /// follows unless the script ran quit.
    #[arg(long, value_name = "FILE")]
    script: Option<PathBuf>,

    /// Suppress status output on stderr.
    ///
    /// Received payloads and invoke results still print on stdout, so piped
    /// output stays pure JSON.
    #[arg(long)]
    quiet: bool,

    /// Close the session after this many received invocations.
    ///
    /// Zero means no auto-exit.
    #[arg(long, value_name = "N")]
    exit_after: Option<u64>,

    /// Raise the default log level from info to debug. `RUST_LOG` overrides
    /// both.
    #[arg(long)]
    verbose: bool,

    /// Explicit config file instead of the platform default location.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Log output shares stderr with status lines; stdout stays payload-only.
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let file = match &cli.config {
        Some(path) => config::load_config_from(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => config::load_config().context("failed to load config")?,
    };

    let options = RunOptions {
        session: file.session_config(),
        default_url: file.server.url.clone(),
        quiet: cli.quiet || file.output.quiet,
        exit_after: cli.exit_after,
        script: cli.script,
    };

    app::run(options).await
}

// ── Tests ─────────────────────────────────────────────────────────────────────
