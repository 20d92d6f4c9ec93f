//! Logging setup for Trawler
//!
//! Dual output: colored console lines for the scheduler log, plus a
//! plain-text daily file under the logs directory. Stages log through the
//! standard `log` macros with a `[STAGE]` prefix, e.g.
//! `info!("[DISCOVERY] 12 candidates")`.

use colored::Colorize;
use log::LevelFilter;

use crate::paths;

/// Initialize the logger system
///
/// Must be called once at startup, before any logging occurs. Console
/// verbosity defaults to INFO and can be raised to DEBUG with `--debug`.
pub fn init(debug: bool) -> Result<(), fern::InitError> {
    let level = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let log_file = paths::get_logs_directory().join(format!(
        "trawler_{}.log",
        chrono::Utc::now().format("%Y-%m-%d")
    ));

    let console = fern::Dispatch::new()
        .format(|out, message, record| {
            let level = match record.level() {
                log::Level::Error => "ERROR".red().bold().to_string(),
                log::Level::Warn => "WARN".yellow().bold().to_string(),
                log::Level::Info => "INFO".green().to_string(),
                log::Level::Debug => "DEBUG".blue().to_string(),
                log::Level::Trace => "TRACE".dimmed().to_string(),
            };
            out.finish(format_args!(
                "{} {} {}",
                chrono::Utc::now().format("%H:%M:%S").to_string().dimmed(),
                level,
                message
            ))
        })
        .chain(std::io::stdout());

    let file = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} [{}] {}",
                chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ"),
                record.level(),
                message
            ))
        })
        .chain(fern::log_file(log_file)?);

    fern::Dispatch::new()
        .level(level)
        // reqwest internals are noisy at debug level
        .level_for("reqwest", LevelFilter::Warn)
        .level_for("hyper", LevelFilter::Warn)
        .chain(console)
        .chain(file)
        .apply()?;

    Ok(())
}
