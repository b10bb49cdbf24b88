//! Runtime settings for Homestack
//!
//! Settings are read from `homestack.toml` in the data root, with
//! `HOMESTACK_*` environment variables taking precedence. Everything has a
//! default so a bare data directory is enough to boot.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::*;
use crate::error::Result;
use crate::types::Arch;

/// Resolved runtime settings
#[derive(Debug, Clone)]
pub struct Settings {
    /// Root directory holding apps, catalog, app-data, and state
    pub data_root: PathBuf,
    /// Address apps bind to when not exposed
    pub internal_ip: String,
    /// Architecture apps are validated against
    pub architecture: Arch,
    /// Dispatcher worker count
    pub workers: usize,
    /// Timeout for ordinary lifecycle dispatches
    pub dispatch_timeout: Duration,
    /// Timeout for backup and restore dispatches
    pub backup_timeout: Duration,
}

/// Raw settings file shape; every field optional
#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    internal_ip: Option<String>,
    architecture: Option<String>,
    workers: Option<usize>,
    dispatch_timeout_secs: Option<u64>,
    backup_timeout_secs: Option<u64>,
}

impl Settings {
    /// Settings with defaults for the given data root
    pub fn for_root(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
            internal_ip: DEFAULT_INTERNAL_IP.to_string(),
            architecture: Arch::detect(),
            workers: DEFAULT_WORKERS,
            dispatch_timeout: Duration::from_secs(DEFAULT_DISPATCH_TIMEOUT_SECS),
            backup_timeout: Duration::from_secs(DEFAULT_BACKUP_TIMEOUT_SECS),
        }
    }

    /// Load settings for a data root: file first, then environment overrides
    pub fn load(data_root: impl Into<PathBuf>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut settings = Self::for_root(data_root);

        let path = settings.data_root.join(SETTINGS_FILE);
        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let file: SettingsFile = toml::from_str(&content)?;
            settings.apply_file(file)?;
        }

        settings.apply_env()?;
        Ok(settings)
    }

    fn apply_file(&mut self, file: SettingsFile) -> Result<()> {
        if let Some(ip) = file.internal_ip {
            self.internal_ip = ip;
        }
        if let Some(arch) = file.architecture {
            self.architecture = arch.parse()?;
        }
        if let Some(workers) = file.workers {
            self.workers = workers.max(1);
        }
        if let Some(secs) = file.dispatch_timeout_secs {
            self.dispatch_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = file.backup_timeout_secs {
            self.backup_timeout = Duration::from_secs(secs);
        }
        Ok(())
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(ip) = std::env::var("HOMESTACK_INTERNAL_IP") {
            self.internal_ip = ip;
        }
        if let Ok(arch) = std::env::var("HOMESTACK_ARCHITECTURE") {
            self.architecture = arch.parse()?;
        }
        if let Ok(workers) = std::env::var("HOMESTACK_WORKERS") {
            self.workers = workers
                .parse::<usize>()
                .map_err(|e| crate::Error::config(format!("HOMESTACK_WORKERS: {}", e)))?
                .max(1);
        }
        if let Ok(secs) = std::env::var("HOMESTACK_DISPATCH_TIMEOUT_SECS") {
            self.dispatch_timeout = Duration::from_secs(
                secs.parse()
                    .map_err(|e| crate::Error::config(format!("HOMESTACK_DISPATCH_TIMEOUT_SECS: {}", e)))?,
            );
        }
        if let Ok(secs) = std::env::var("HOMESTACK_BACKUP_TIMEOUT_SECS") {
            self.backup_timeout = Duration::from_secs(
                secs.parse()
                    .map_err(|e| crate::Error::config(format!("HOMESTACK_BACKUP_TIMEOUT_SECS: {}", e)))?,
            );
        }
        Ok(())
    }

    /// Directory of installed app definitions
    pub fn apps_dir(&self) -> PathBuf {
        self.data_root.join(APPS_DIR)
    }

    /// Directory of the upstream catalog copy
    pub fn catalog_dir(&self) -> PathBuf {
        self.data_root.join(CATALOG_DIR)
    }

    /// Directory of per-app live data
    pub fn app_data_dir(&self) -> PathBuf {
        self.data_root.join(APP_DATA_DIR)
    }

    /// Directory of internal state (database, seed)
    pub fn state_dir(&self) -> PathBuf {
        self.data_root.join(STATE_DIR)
    }

    /// Directory of backup archives
    pub fn backups_dir(&self) -> PathBuf {
        self.data_root.join(BACKUPS_DIR)
    }

    /// Database file path
    pub fn db_path(&self) -> PathBuf {
        self.state_dir().join(DB_FILE)
    }

    /// Seed file path
    pub fn seed_path(&self) -> PathBuf {
        self.state_dir().join(SEED_FILE)
    }

    /// Installed definition directory for one app
    pub fn app_dir(&self, app_id: &str) -> PathBuf {
        self.apps_dir().join(app_id)
    }

    /// Catalog definition directory for one app
    pub fn catalog_app_dir(&self, app_id: &str) -> PathBuf {
        self.catalog_dir().join(app_id)
    }

    /// Live data directory for one app
    pub fn app_data_for(&self, app_id: &str) -> PathBuf {
        self.app_data_dir().join(app_id)
    }

    /// Generated env file path for one app
    pub fn env_file(&self, app_id: &str) -> PathBuf {
        self.app_data_for(app_id).join(ENV_FILE)
    }

    /// Path helper for a backup archive
    pub fn backup_file(&self, app_id: &str, filename: &str) -> PathBuf {
        self.backups_dir().join(app_id).join(filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::Path;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let settings = Settings::for_root("/data");
        assert_eq!(settings.internal_ip, DEFAULT_INTERNAL_IP);
        assert_eq!(settings.workers, DEFAULT_WORKERS);
        assert_eq!(
            settings.dispatch_timeout,
            Duration::from_secs(DEFAULT_DISPATCH_TIMEOUT_SECS)
        );
        assert_eq!(
            settings.backup_timeout,
            Duration::from_secs(DEFAULT_BACKUP_TIMEOUT_SECS)
        );
    }

    #[test]
    fn test_path_helpers() {
        let settings = Settings::for_root("/data");
        assert_eq!(settings.app_dir("nextcloud"), Path::new("/data/apps/nextcloud"));
        assert_eq!(
            settings.catalog_app_dir("nextcloud"),
            Path::new("/data/catalog/nextcloud")
        );
        assert_eq!(
            settings.env_file("nextcloud"),
            Path::new("/data/app-data/nextcloud/app.env")
        );
        assert_eq!(settings.db_path(), Path::new("/data/state/homestack.db"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join(SETTINGS_FILE)).unwrap();
        writeln!(file, "internal_ip = \"192.168.1.10\"").unwrap();
        writeln!(file, "workers = 2").unwrap();
        writeln!(file, "dispatch_timeout_secs = 60").unwrap();

        let settings = Settings::load(dir.path()).unwrap();
        assert_eq!(settings.internal_ip, "192.168.1.10");
        assert_eq!(settings.workers, 2);
        assert_eq!(settings.dispatch_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_invalid_architecture_in_file() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(SETTINGS_FILE), "architecture = \"mips\"\n").unwrap();
        assert!(Settings::load(dir.path()).is_err());
    }
}
