//! Core types for Homestack

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{Error, Result};

/// User-supplied form values keyed by form-field name.
///
/// Values are kept as JSON so explicit booleans and numbers survive the
/// round trip to the database unchanged.
pub type FormValues = serde_json::Map<String, serde_json::Value>;

/// Regex pattern for valid app ids: lowercase slug, no path separators
static APP_ID_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9-]*$").expect("Invalid app id regex"));

/// Regex pattern for valid domains (at least one dot, alphanumeric labels)
static DOMAIN_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\.)+[a-z]{2,}$").expect("Invalid domain regex")
});

/// Validate an app id to prevent path traversal attacks.
/// App ids are used to build filesystem paths, so only a lowercase slug is allowed.
pub fn validate_app_id(id: &str) -> bool {
    !id.is_empty() && APP_ID_REGEX.is_match(id)
}

/// Validate a domain name for an exposed app
pub fn validate_domain(domain: &str) -> bool {
    !domain.is_empty() && DOMAIN_REGEX.is_match(domain)
}

/// Application lifecycle status
///
/// `Missing` is never stored; it stands for the absence of a row.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppStatus {
    Missing,
    Installing,
    Running,
    Starting,
    Stopping,
    Stopped,
    Updating,
    Uninstalling,
    BackingUp,
    Restoring,
}

impl AppStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppStatus::Missing => "missing",
            AppStatus::Installing => "installing",
            AppStatus::Running => "running",
            AppStatus::Starting => "starting",
            AppStatus::Stopping => "stopping",
            AppStatus::Stopped => "stopped",
            AppStatus::Updating => "updating",
            AppStatus::Uninstalling => "uninstalling",
            AppStatus::BackingUp => "backing_up",
            AppStatus::Restoring => "restoring",
        }
    }

    /// Whether this status means "operation in progress".
    /// A transitional status is never a valid resting state after a command returns.
    pub fn is_transitional(&self) -> bool {
        matches!(
            self,
            AppStatus::Installing
                | AppStatus::Starting
                | AppStatus::Stopping
                | AppStatus::Updating
                | AppStatus::Uninstalling
                | AppStatus::BackingUp
                | AppStatus::Restoring
        )
    }
}

impl std::fmt::Display for AppStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AppStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "missing" => Ok(AppStatus::Missing),
            "installing" => Ok(AppStatus::Installing),
            "running" => Ok(AppStatus::Running),
            "starting" => Ok(AppStatus::Starting),
            "stopping" => Ok(AppStatus::Stopping),
            "stopped" => Ok(AppStatus::Stopped),
            "updating" => Ok(AppStatus::Updating),
            "uninstalling" => Ok(AppStatus::Uninstalling),
            "backing_up" => Ok(AppStatus::BackingUp),
            "restoring" => Ok(AppStatus::Restoring),
            _ => Err(Error::config(format!("Invalid status: {}", s))),
        }
    }
}

/// Host CPU architecture
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    Amd64,
    Arm64,
}

impl Arch {
    /// Detect the architecture of the current host
    pub fn detect() -> Self {
        match std::env::consts::ARCH {
            "aarch64" => Arch::Arm64,
            _ => Arch::Amd64,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Arch::Amd64 => "amd64",
            Arch::Arm64 => "arm64",
        }
    }
}

impl std::fmt::Display for Arch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Arch {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "amd64" | "x86_64" => Ok(Arch::Amd64),
            "arm64" | "aarch64" => Ok(Arch::Arm64),
            _ => Err(Error::config(format!("Invalid architecture: {}", s))),
        }
    }
}

/// A persisted app row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppRecord {
    pub id: String,
    pub status: AppStatus,
    pub config: FormValues,
    pub exposed: bool,
    pub domain: Option<String>,
    pub open_port: bool,
    pub exposed_local: bool,
    /// Manifest revision at last successful install or update
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_opened: Option<DateTime<Utc>>,
    pub num_opened: u64,
}

/// Fields persisted when a row is first created by Install
#[derive(Debug, Clone)]
pub struct NewApp {
    pub id: String,
    pub status: AppStatus,
    pub config: FormValues,
    pub exposed: bool,
    pub domain: Option<String>,
    pub open_port: bool,
    pub exposed_local: bool,
    pub version: u64,
}

impl NewApp {
    pub fn installing(id: &str, config: FormValues, version: u64) -> Self {
        Self {
            id: id.to_string(),
            status: AppStatus::Installing,
            config,
            exposed: false,
            domain: None,
            open_port: false,
            exposed_local: false,
            version,
        }
    }

    pub fn with_exposure(mut self, exposed: bool, domain: Option<String>) -> Self {
        self.exposed = exposed;
        self.domain = domain;
        self
    }

    pub fn with_ports(mut self, open_port: bool, exposed_local: bool) -> Self {
        self.open_port = open_port;
        self.exposed_local = exposed_local;
        self
    }
}

/// A persisted backup row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupRecord {
    pub id: u64,
    pub app_id: String,
    pub filename: String,
    pub size: u64,
    /// App version at the time the backup was taken
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One page of backup rows
#[derive(Debug, Clone, Serialize)]
pub struct BackupPage {
    pub total: u64,
    pub page_count: u64,
    pub data: Vec<BackupRecord>,
}
