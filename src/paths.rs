//! Centralized path resolution for Trawler
//!
//! All file and directory paths are resolved through this module so every
//! stage agrees on where feeds and registries live, regardless of the
//! working directory the scheduler launches from.
//!
//! ## Directory Structure
//!
//! ```text
//! ~/Trawler/
//! ├── data/
//! │ ├── config.toml
//! │ ├── feeds/      (one JSON document per stage)
//! │ └── state/      (registries, health, notified set)
//! └── logs/
//! └── trawler_*.log
//! ```

use once_cell::sync::Lazy;
use std::path::PathBuf;

// =============================================================================
// BASE DIRECTORY RESOLUTION
// =============================================================================

/// Lazy-initialized base directory (thread-safe)
static BASE_DIRECTORY: Lazy<PathBuf> = Lazy::new(resolve_base_directory);

/// Resolves the base directory for all Trawler data
///
/// Uses platform-specific application data locations:
/// - macOS: ~/Library/Application Support/Trawler
/// - Windows: %LOCALAPPDATA%\Trawler
/// - Linux: $XDG_DATA_HOME/Trawler (fallback ~/.local/share/Trawler)
fn resolve_base_directory() -> PathBuf {
    const APP_DIR: &str = "Trawler";

    if let Some(dir) = dirs::data_local_dir() {
        return dir.join(APP_DIR);
    }

    if let Some(dir) = dirs::data_dir() {
        return dir.join(APP_DIR);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(APP_DIR);
    }

    PathBuf::from(APP_DIR)
}

// =============================================================================
// PRIMARY DIRECTORY ACCESSORS
// =============================================================================

/// Returns the base directory for all Trawler data
pub fn get_base_directory() -> PathBuf {
    BASE_DIRECTORY.clone()
}

/// Returns the data directory path
pub fn get_data_directory() -> PathBuf {
    BASE_DIRECTORY.join("data")
}

/// Returns the feeds directory path
///
/// Each stage owns and rewrites exactly one document in here.
pub fn get_feeds_directory() -> PathBuf {
    get_data_directory().join("feeds")
}

/// Returns the state directory path
///
/// Contains the registries that give batch runs memory across invocations.
pub fn get_state_directory() -> PathBuf {
    get_data_directory().join("state")
}

/// Returns the logs directory path
pub fn get_logs_directory() -> PathBuf {
    BASE_DIRECTORY.join("logs")
}

// =============================================================================
// CONFIGURATION FILE PATHS
// =============================================================================

/// Returns the main configuration file path
pub fn get_config_path() -> PathBuf {
    get_data_directory().join("config.toml")
}

// =============================================================================
// FEED DOCUMENT PATHS
// =============================================================================

/// Returns the discovery feed path (primary candidate feed)
pub fn get_discovery_feed_path() -> PathBuf {
    get_feeds_directory().join("discovery_feed.json")
}

/// Returns the buffer feed path
pub fn get_buffer_feed_path() -> PathBuf {
    get_feeds_directory().join("buffer_feed.json")
}

/// Returns the opportunity feed path
pub fn get_opportunity_feed_path() -> PathBuf {
    get_feeds_directory().join("opportunity_feed.json")
}

/// Returns the momentum feed path
pub fn get_momentum_feed_path() -> PathBuf {
    get_feeds_directory().join("momentum_feed.json")
}

/// Returns the certified feed path
pub fn get_certified_feed_path() -> PathBuf {
    get_feeds_directory().join("certified_feed.json")
}

/// Returns the hall of fame document path
pub fn get_hall_of_fame_path() -> PathBuf {
    get_feeds_directory().join("hall_of_fame.json")
}

// =============================================================================
// STATE DOCUMENT PATHS
// =============================================================================

/// Returns the token registry path (first-seen + history store)
pub fn get_token_registry_path() -> PathBuf {
    get_state_directory().join("token_registry.json")
}

/// Returns the watch registry path (buffer-stage re-check counters)
pub fn get_watch_registry_path() -> PathBuf {
    get_state_directory().join("watch_registry.json")
}

/// Returns the health state path
pub fn get_health_state_path() -> PathBuf {
    get_state_directory().join("health_state.json")
}

/// Returns the notified-set path (outbound notification dedup)
pub fn get_notified_state_path() -> PathBuf {
    get_state_directory().join("notified_state.json")
}

// =============================================================================
// DIRECTORY CREATION
// =============================================================================

/// Ensures all required directories exist
///
/// Creates the base directory and all subdirectories needed for a run.
/// Called early by every stage entry point.
pub fn ensure_all_directories() -> Result<(), String> {
    let dirs_to_create = vec![
        ("base", get_base_directory()),
        ("data", get_data_directory()),
        ("feeds", get_feeds_directory()),
        ("state", get_state_directory()),
        ("logs", get_logs_directory()),
    ];

    for (name, dir) in dirs_to_create {
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| {
                format!(
                    "Failed to create {} directory at {}: {}",
                    name,
                    dir.display(),
                    e
                )
            })?;
        }
    }

    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
