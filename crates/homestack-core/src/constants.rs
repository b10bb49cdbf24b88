//! Constants and default values for Homestack

use std::path::PathBuf;

/// Default Homestack home directory name
pub const HOMESTACK_DIR: &str = ".homestack";

/// Default database file name
pub const DB_FILE: &str = "homestack.db";

/// Directory holding installed app definitions (compose file, manifest, data templates)
pub const APPS_DIR: &str = "apps";

/// Directory holding the upstream catalog copy of app definitions
pub const CATALOG_DIR: &str = "catalog";

/// Directory holding per-app live data
pub const APP_DATA_DIR: &str = "app-data";

/// Directory holding internal state (seed file, database)
pub const STATE_DIR: &str = "state";

/// Directory holding app backup archives
pub const BACKUPS_DIR: &str = "backups";

/// Manifest file name inside an app definition directory
pub const MANIFEST_FILE: &str = "manifest.json";

/// Per-app environment file name
pub const ENV_FILE: &str = "app.env";

/// Seed file name (root of all derived secrets)
pub const SEED_FILE: &str = "seed";

/// Settings file name searched for in the data root
pub const SETTINGS_FILE: &str = "homestack.toml";

/// Suffix marking a data file as a template to be rendered
pub const TEMPLATE_SUFFIX: &str = ".template";

/// Default number of dispatcher workers
pub const DEFAULT_WORKERS: usize = 4;

/// Default timeout for lifecycle dispatches in seconds
pub const DEFAULT_DISPATCH_TIMEOUT_SECS: u64 = 300;

/// Default timeout for backup and restore dispatches in seconds
pub const DEFAULT_BACKUP_TIMEOUT_SECS: u64 = 1800;

/// Default address apps bind to when not exposed
pub const DEFAULT_INTERNAL_IP: &str = "127.0.0.1";

/// Default length of derived random field values
pub const DEFAULT_RANDOM_FIELD_LENGTH: usize = 32;

/// Cadence of recurring catalog sync submissions in seconds
pub const CATALOG_SYNC_INTERVAL_SECS: u64 = 3600;

/// Cadence of recurring system snapshot submissions in seconds
pub const SYSTEM_INFO_INTERVAL_SECS: u64 = 60;

/// Get the Homestack home directory
pub fn homestack_home() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(HOMESTACK_DIR))
        .unwrap_or_else(|| PathBuf::from(HOMESTACK_DIR))
}
