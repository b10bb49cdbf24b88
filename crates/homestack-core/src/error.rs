//! Error types for Homestack

use std::path::PathBuf;

/// Homestack error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("App not found: {0}")]
    AppNotFound(String),

    #[error("App already installed: {0}")]
    AppAlreadyInstalled(String),

    #[error("Manifest not found for app: {0}")]
    ManifestNotFound(String),

    #[error("Backup not found: {0}")]
    BackupNotFound(String),

    #[error("Invalid app id: {0}")]
    InvalidAppId(String),

    #[error("App {id} cannot {command} while {status}")]
    InvalidStatus {
        id: String,
        command: String,
        status: String,
    },

    #[error("Another operation is already running for app: {0}")]
    AppBusy(String),

    #[error("Required field missing: {0}")]
    MissingField(String),

    #[error("Invalid domain: {0}")]
    InvalidDomain(String),

    #[error("A domain is required to expose app {0}")]
    DomainRequired(String),

    #[error("Domain {domain} is already in use by app {app_id}")]
    DomainInUse { domain: String, app_id: String },

    #[error("App {0} must be exposed")]
    ForceExposeRequired(String),

    #[error("App {0} cannot be exposed")]
    NotExposable(String),

    #[error("App {id} does not support architecture: {arch}")]
    UnsupportedArch { id: String, arch: String },

    #[error("Command failed: {output}")]
    ExecutionFailed { output: String },

    #[error("Timed out waiting for: {0}")]
    Timeout(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("Database error: {0}")]
    DbError(String),

    #[error("Dispatcher is shut down")]
    DispatcherClosed,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}

/// Result type alias for Homestack
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::ConfigError(msg.into())
    }

    pub fn db<S: Into<String>>(msg: S) -> Self {
        Error::DbError(msg.into())
    }

    pub fn execution<S: Into<String>>(output: S) -> Self {
        Error::ExecutionFailed {
            output: output.into(),
        }
    }

    pub fn invalid_status(id: &str, command: &str, status: impl std::fmt::Display) -> Self {
        Error::InvalidStatus {
            id: id.to_string(),
            command: command.to_string(),
            status: status.to_string(),
        }
    }

    /// Whether this error was raised before any state was mutated.
    pub fn is_validation(&self) -> bool {
        !matches!(
            self,
            Error::ExecutionFailed { .. } | Error::Timeout(_) | Error::DbError(_) | Error::IoError(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::AppNotFound("nextcloud".to_string());
        assert_eq!(err.to_string(), "App not found: nextcloud");

        let err = Error::invalid_status("nextcloud", "start", "installing");
        assert_eq!(err.to_string(), "App nextcloud cannot start while installing");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::IoError(_)));
    }

    #[test]
    fn test_is_validation() {
        assert!(Error::MissingField("PASSWORD".into()).is_validation());
        assert!(Error::AppNotFound("x".into()).is_validation());
        assert!(!Error::execution("boom").is_validation());
        assert!(!Error::Timeout("install".into()).is_validation());
    }
}
