//! Job runners - the seam between queued events and actual side effects
//!
//! `ComposeRunner` shells out to the container tooling; it runs in worker
//! context, decoupled from the command layer, so a crashing container
//! operation never takes the orchestration logic down with it. Delivery is
//! at-least-once, so every operation here must be idempotent: `up` on a
//! running app, `stop` on a stopped one, and `down` on removed containers
//! are all no-ops for the tooling.

use async_trait::async_trait;
use homestack_core::Settings;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, info};

use crate::event::{AppCommand, Event, RepoCommand, SystemCommand};

/// Result of one executed job
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobOutcome {
    pub success: bool,
    pub stdout: String,
}

impl JobOutcome {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            stdout: stdout.into(),
        }
    }

    pub fn failure(stdout: impl Into<String>) -> Self {
        Self {
            success: false,
            stdout: stdout.into(),
        }
    }
}

/// Executes one event and reports its outcome
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn run(&self, event: &Event) -> JobOutcome;
}

/// Production runner: drives `docker compose`, `tar`, and `git`
pub struct ComposeRunner {
    settings: Arc<Settings>,
}

impl ComposeRunner {
    pub fn new(settings: Arc<Settings>) -> Self {
        Self { settings }
    }

    /// Run one external command from the data root, capturing all output
    async fn run_command(&self, program: &str, args: &[String]) -> JobOutcome {
        debug!("Running: {} {}", program, args.join(" "));

        let output = Command::new(program)
            .args(args)
            .current_dir(&self.settings.data_root)
            .stdin(Stdio::null())
            .output()
            .await;

        match output {
            Ok(output) => {
                let mut captured = String::from_utf8_lossy(&output.stdout).into_owned();
                captured.push_str(&String::from_utf8_lossy(&output.stderr));
                JobOutcome {
                    success: output.status.success(),
                    stdout: captured,
                }
            }
            Err(e) => JobOutcome::failure(format!("Failed to run {}: {}", program, e)),
        }
    }

    /// Run a sequence of commands, stopping at the first failure
    async fn run_all(&self, steps: &[(&str, Vec<String>)]) -> JobOutcome {
        let mut combined = String::new();
        for (program, args) in steps {
            let outcome = self.run_command(program, args).await;
            combined.push_str(&outcome.stdout);
            if !outcome.success {
                return JobOutcome::failure(combined);
            }
        }
        JobOutcome::success(combined)
    }

    fn compose_args(&self, app_id: &str, tail: &[&str]) -> Vec<String> {
        let compose_file = self.settings.app_dir(app_id).join("docker-compose.yml");
        let env_file = self.settings.env_file(app_id);
        let mut args = vec![
            "compose".to_string(),
            "--project-name".to_string(),
            app_id.to_string(),
            "-f".to_string(),
            compose_file.to_string_lossy().into_owned(),
            "--env-file".to_string(),
            env_file.to_string_lossy().into_owned(),
        ];
        args.extend(tail.iter().map(|s| s.to_string()));
        args
    }

    async fn run_app(&self, command: AppCommand, app_id: &str, args: &[String]) -> JobOutcome {
        info!("Executing {} for app {}", command, app_id);
        match command {
            AppCommand::Install | AppCommand::Start => {
                let args = self.compose_args(
                    app_id,
                    &["up", "--detach", "--remove-orphans", "--pull", "always"],
                );
                self.run_command("docker", &args).await
            }
            AppCommand::Stop => {
                let args = self.compose_args(app_id, &["stop"]);
                self.run_command("docker", &args).await
            }
            AppCommand::Uninstall => {
                let args = self.compose_args(
                    app_id,
                    &["down", "--remove-orphans", "--volumes", "--rmi", "all"],
                );
                self.run_command("docker", &args).await
            }
            AppCommand::Update => {
                // Recreate with the current definition, drop the old images,
                // then pull the fresh ones. The app is left stopped; the
                // caller starts it again explicitly.
                let recreate =
                    self.compose_args(app_id, &["up", "--detach", "--force-recreate"]);
                let teardown = self.compose_args(app_id, &["down", "--rmi", "all"]);
                let pull = self.compose_args(app_id, &["pull"]);
                self.run_all(&[
                    ("docker", recreate),
                    ("docker", teardown),
                    ("docker", pull),
                ])
                .await
            }
            AppCommand::Backup => {
                let Some(filename) = args.first() else {
                    return JobOutcome::failure("backup: missing archive filename");
                };
                let archive = self.settings.backup_file(app_id, filename);
                if let Some(parent) = archive.parent() {
                    if let Err(e) = std::fs::create_dir_all(parent) {
                        return JobOutcome::failure(format!("backup: {}", e));
                    }
                }
                let tar_args = vec![
                    "czf".to_string(),
                    archive.to_string_lossy().into_owned(),
                    "-C".to_string(),
                    self.settings.app_data_dir().to_string_lossy().into_owned(),
                    app_id.to_string(),
                ];
                self.run_command("tar", &tar_args).await
            }
            AppCommand::Restore => {
                let Some(filename) = args.first() else {
                    return JobOutcome::failure("restore: missing archive filename");
                };
                let archive = self.settings.backup_file(app_id, filename);
                if !archive.exists() {
                    return JobOutcome::failure(format!(
                        "restore: archive not found: {}",
                        archive.display()
                    ));
                }
                let tar_args = vec![
                    "xzf".to_string(),
                    archive.to_string_lossy().into_owned(),
                    "-C".to_string(),
                    self.settings.app_data_dir().to_string_lossy().into_owned(),
                ];
                self.run_command("tar", &tar_args).await
            }
        }
    }

    async fn run_repo(&self, command: RepoCommand, url: &str) -> JobOutcome {
        let catalog = self.settings.catalog_dir();
        match command {
            RepoCommand::Clone => {
                let args = vec![
                    "clone".to_string(),
                    "--depth".to_string(),
                    "1".to_string(),
                    url.to_string(),
                    catalog.to_string_lossy().into_owned(),
                ];
                self.run_command("git", &args).await
            }
            RepoCommand::Update => {
                if !catalog.join(".git").exists() {
                    return Box::pin(self.run_repo(RepoCommand::Clone, url)).await;
                }
                let args = vec![
                    "-C".to_string(),
                    catalog.to_string_lossy().into_owned(),
                    "pull".to_string(),
                    "--ff-only".to_string(),
                ];
                self.run_command("git", &args).await
            }
        }
    }
}

#[async_trait]
impl JobRunner for ComposeRunner {
    async fn run(&self, event: &Event) -> JobOutcome {
        match event {
            Event::App {
                command,
                app_id,
                args,
                ..
            } => self.run_app(*command, app_id, args).await,
            Event::Repo { command, url } => self.run_repo(*command, url).await,
            Event::System {
                command: SystemCommand::Info,
            } => {
                let args = vec![
                    "-k".to_string(),
                    self.settings.data_root.to_string_lossy().into_owned(),
                ];
                self.run_command("df", &args).await
            }
        }
    }
}

/// Scripted runner for tests: records every executed event and returns
/// queued outcomes per event label, succeeding by default.
#[derive(Default)]
pub struct MockRunner {
    outcomes: Mutex<HashMap<String, VecDeque<JobOutcome>>>,
    calls: Mutex<Vec<Event>>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an outcome for the next event with this label
    pub fn push_outcome(&self, label: &str, outcome: JobOutcome) {
        self.outcomes
            .lock()
            .entry(label.to_string())
            .or_default()
            .push_back(outcome);
    }

    /// Queue a failure for the next event with this label
    pub fn fail_next(&self, label: &str, output: &str) {
        self.push_outcome(label, JobOutcome::failure(output));
    }

    /// Every event executed so far, in order
    pub fn calls(&self) -> Vec<Event> {
        self.calls.lock().clone()
    }

    /// How many executed events carried this label
    pub fn count(&self, label: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|e| e.label() == label)
            .count()
    }
}

#[async_trait]
impl JobRunner for MockRunner {
    async fn run(&self, event: &Event) -> JobOutcome {
        self.calls.lock().push(event.clone());
        let scripted = self
            .outcomes
            .lock()
            .get_mut(&event.label())
            .and_then(|queue| queue.pop_front());
        scripted.unwrap_or_else(|| JobOutcome::success("ok"))
    }
}
