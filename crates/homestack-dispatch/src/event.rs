//! Event model - transient units of work submitted to the queue
//!
//! The command set is fixed, so events are a closed tagged union rather than
//! a name-to-handler registry. The serde representation is the wire format
//! workers consume.

use serde::{Deserialize, Serialize};

/// Container operation requested for one app
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppCommand {
    Install,
    Start,
    Stop,
    Uninstall,
    Update,
    Backup,
    Restore,
}

impl AppCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppCommand::Install => "install",
            AppCommand::Start => "start",
            AppCommand::Stop => "stop",
            AppCommand::Uninstall => "uninstall",
            AppCommand::Update => "update",
            AppCommand::Backup => "backup",
            AppCommand::Restore => "restore",
        }
    }
}

impl std::fmt::Display for AppCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Catalog repository operation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RepoCommand {
    Clone,
    Update,
}

/// System-level operation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SystemCommand {
    Info,
}

/// A unit of work for the queue; never persisted beyond it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    App {
        command: AppCommand,
        app_id: String,
        #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
        form: serde_json::Value,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        args: Vec<String>,
    },
    Repo {
        command: RepoCommand,
        url: String,
    },
    System {
        command: SystemCommand,
    },
}

impl Event {
    pub fn app(command: AppCommand, app_id: impl Into<String>) -> Self {
        Event::App {
            command,
            app_id: app_id.into(),
            form: serde_json::Value::Null,
            args: Vec::new(),
        }
    }

    pub fn app_with_args(
        command: AppCommand,
        app_id: impl Into<String>,
        args: Vec<String>,
    ) -> Self {
        Event::App {
            command,
            app_id: app_id.into(),
            form: serde_json::Value::Null,
            args,
        }
    }

    pub fn repo(command: RepoCommand, url: impl Into<String>) -> Self {
        Event::Repo {
            command,
            url: url.into(),
        }
    }

    pub fn system_info() -> Self {
        Event::System {
            command: SystemCommand::Info,
        }
    }

    /// The app this event targets, if any
    pub fn app_id(&self) -> Option<&str> {
        match self {
            Event::App { app_id, .. } => Some(app_id),
            _ => None,
        }
    }

    /// Stable label used for logging and timeout messages
    pub fn label(&self) -> String {
        match self {
            Event::App {
                command, app_id, ..
            } => format!("app:{}:{}", command, app_id),
            Event::Repo { command, .. } => match command {
                RepoCommand::Clone => "repo:clone".to_string(),
                RepoCommand::Update => "repo:update".to_string(),
            },
            Event::System { .. } => "system:info".to_string(),
        }
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}
