//! Trawler CLI
//!
//! One subcommand per funnel stage, each a single batch pass. Stages catch
//! their own trouble and degrade; anything that still escapes is written
//! out as an error-status feed so downstream readers never face a missing
//! document, and the process exits 1 for the scheduler to alert on.

use clap::{Parser, Subcommand};
use log::error;
use std::path::PathBuf;

use trawler::config::Config;
use trawler::health::{self, RunMode};
use trawler::stages::{buffer, certify, discovery, momentum, opportunity, outcome};
use trawler::{feed, logger, paths};

#[derive(Parser)]
#[command(name = "trawler", version, about = "Staged candidate funnel over a DEX market snapshot source")]
struct Cli {
    /// Verbose console logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one discovery pass and rewrite the primary candidate feed
    Discover,
    /// Run one buffer pass over the young re-check window
    Buffer,
    /// Run one opportunity pass with rug-risk screening
    Opportunity,
    /// Run one momentum pass over the mid-horizon window
    Momentum,
    /// Evaluate certification checkpoints and update the certified feed
    Certify,
    /// Update the hall of fame from tracked price history
    Outcomes,
    /// Validate the discovery feed's freshness and content
    Health {
        /// Manually triggered run: an empty feed fails regardless of streak
        #[arg(long)]
        manual: bool,
    },
    /// Send alerts for the current discovery feed
    #[cfg(feature = "telegram")]
    Notify,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = paths::ensure_all_directories() {
        eprintln!("Failed to prepare data directories: {e}");
        std::process::exit(1);
    }
    if let Err(e) = logger::init(cli.debug) {
        eprintln!("Failed to initialize logging: {e:?}");
        std::process::exit(1);
    }

    let config = match Config::load(&paths::get_config_path()) {
        Ok(config) => config,
        Err(e) => {
            error!("[MAIN] Config error: {e:#}");
            std::process::exit(1);
        }
    };

    let exit_code = match cli.command {
        Command::Discover => finish(
            discovery::run(&config).await.map(|_| ()),
            Some((paths::get_discovery_feed_path(), discovery::DISCOVERY_SCHEMA)),
        ),
        Command::Buffer => finish(
            buffer::run(&config).map(|_| ()),
            Some((paths::get_buffer_feed_path(), buffer::BUFFER_SCHEMA)),
        ),
        Command::Opportunity => finish(
            opportunity::run(&config).map(|_| ()),
            Some((
                paths::get_opportunity_feed_path(),
                opportunity::OPPORTUNITY_SCHEMA,
            )),
        ),
        Command::Momentum => finish(
            momentum::run(&config).map(|_| ()),
            Some((paths::get_momentum_feed_path(), momentum::MOMENTUM_SCHEMA)),
        ),
        // the certified feed and hall of fame are durable documents; a failed
        // run must leave the previous state untouched rather than blank it
        Command::Certify => finish(certify::run(&config).map(|_| ()), None),
        Command::Outcomes => finish(outcome::run(&config).map(|_| ()), None),
        Command::Health { manual } => {
            let mode = if manual {
                RunMode::Manual
            } else {
                RunMode::Scheduled
            };
            match health::run(&config, mode) {
                Ok(code) => code,
                Err(e) => {
                    error!("[HEALTH] Run failed: {e:#}");
                    1
                }
            }
        }
        #[cfg(feature = "telegram")]
        Command::Notify => finish(trawler::notify::run(&config).await, None),
    };

    std::process::exit(exit_code);
}

/// Map a stage result to an exit code, writing an error feed when the stage
/// owns a replaceable output document
fn finish(result: anyhow::Result<()>, error_feed: Option<(PathBuf, &str)>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(e) => {
            error!("[MAIN] Stage failed: {e:#}");
            if let Some((path, schema)) = error_feed {
                feed::write_error_feed(&path, schema, &format!("{e:#}"));
            }
            1
        }
    }
}
