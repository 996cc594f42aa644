//! `callguard`: replay recorded agent tool calls through the governor.
//!
//! # Examples
//!
//! ```sh
//! # Text report for a JSON-lines transcript
//! callguard replay session.jsonl --tier complex_refactor
//!
//! # Machine-readable summary with a custom config
//! callguard replay session.json --config callguard.json --json
//!
//! # List budget tiers
//! callguard tiers --config callguard.json
//! ```

use std::path::PathBuf;

use callguard::config::GovernorConfig;
use callguard_cli::replay::{ReplayOptions, replay};
use callguard_cli::{logging, transcript};
use clap::{Parser, Subcommand};
use tracing::debug;

/// Replay recorded agent tool calls through callguard.
#[derive(Parser)]
#[command(name = "callguard", version)]
struct Cli {
    /// Debug logging (overridden by RUST_LOG).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay a transcript (JSON array or JSON lines).
    Replay {
        transcript: PathBuf,

        /// Budget tier, overriding the config file.
        #[arg(long)]
        tier: Option<String>,

        /// JSON config file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Print a JSON summary instead of text.
        #[arg(long)]
        json: bool,

        /// Record exact duplicates instead of treating them as cache hits.
        #[arg(long)]
        record_duplicates: bool,
    },
    /// List known budget tiers.
    Tiers {
        /// JSON config file.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    if let Err(e) = run(cli.command) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<GovernorConfig, String> {
    match path {
        Some(p) => GovernorConfig::load(p),
        None => Ok(GovernorConfig::default()),
    }
}

fn run(command: Command) -> Result<(), String> {
    match command {
        Command::Replay {
            transcript: path,
            tier,
            config,
            json,
            record_duplicates,
        } => {
            let mut config = load_config(config.as_ref())?;
            if let Some(tier) = tier {
                config = config.with_tier(tier);
            }
            let entries = transcript::load(&path)?;
            debug!(entries = entries.len(), path = %path.display(), "Loaded transcript");
            let summary = replay(entries, config, ReplayOptions { record_duplicates });
            if json {
                let out = serde_json::to_string_pretty(&summary)
                    .map_err(|e| format!("failed to serialize summary: {e}"))?;
                println!("{out}");
            } else {
                print!("{}", summary.to_text());
            }
        }
        Command::Tiers { config } => {
            let config = load_config(config.as_ref())?;
            for (name, tier) in config.tier_registry().iter() {
                let marker = if name == config.tier { "*" } else { " " };
                println!(
                    "{marker} {name:<20} expected {:>3}  maximum {:>3}",
                    tier.expected_calls, tier.maximum_calls
                );
            }
        }
    }
    Ok(())
}
