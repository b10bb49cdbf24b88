//! Homestack Apps - the lifecycle command layer
//!
//! One guarded state transition per command, composed from the manifest
//! resolver, env generator, persistence layer, and event dispatcher. The
//! `AppService` facade is the only surface external collaborators call; it
//! owns an explicit `AppContext` constructed once at process start.

pub mod catalog;
mod commands;
pub mod guard;
pub mod views;

#[cfg(test)]
pub(crate) mod testutil;

use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use homestack_core::{
    BackupPage, FormValues, ManifestResolver, Result, Settings, CATALOG_SYNC_INTERVAL_SECS,
    SYSTEM_INFO_INTERVAL_SECS,
};
use homestack_db::Database;
use homestack_dispatch::{Event, EventDispatcher, JobRunner, RepoCommand, ScheduledJob};
use homestack_env::EnvGenerator;

pub use guard::{AppGuard, AppLocks};
pub use views::AppView;

/// User-facing request payload for install and config updates
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppForm {
    #[serde(default)]
    pub config: FormValues,
    #[serde(default)]
    pub exposed: bool,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub open_port: bool,
    #[serde(default)]
    pub exposed_local: bool,
}

impl AppForm {
    pub fn with_config(config: FormValues) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn exposed_on(domain: impl Into<String>) -> Self {
        Self {
            exposed: true,
            domain: Some(domain.into()),
            ..Default::default()
        }
    }
}

/// Everything a lifecycle command needs, built once at process start
pub struct AppContext {
    pub settings: Arc<Settings>,
    pub db: Database,
    pub dispatcher: Arc<EventDispatcher>,
    pub resolver: ManifestResolver,
    pub envgen: EnvGenerator,
    pub locks: AppLocks,
}

impl AppContext {
    pub async fn new(settings: Arc<Settings>, runner: Arc<dyn JobRunner>) -> Result<Self> {
        let db = Database::new(&settings.db_path()).await?;
        let dispatcher = Arc::new(EventDispatcher::new(runner, settings.workers));
        let resolver = ManifestResolver::new(Arc::clone(&settings));
        let envgen = EnvGenerator::new(Arc::clone(&settings))?;

        Ok(Self {
            settings,
            db,
            dispatcher,
            resolver,
            envgen,
            locks: AppLocks::new(),
        })
    }
}

/// The full, closed set of lifecycle operations
#[derive(Debug, Clone)]
pub enum LifecycleCommand {
    Install { app_id: String, form: AppForm },
    Start { app_id: String },
    Stop { app_id: String },
    Restart { app_id: String },
    Reset { app_id: String },
    Update { app_id: String },
    UpdateConfig { app_id: String, form: AppForm },
    Uninstall { app_id: String },
    CreateBackup { app_id: String },
    RestoreBackup { app_id: String, filename: String },
}

/// Facade over the lifecycle command set
#[derive(Clone)]
pub struct AppService {
    ctx: Arc<AppContext>,
}

impl AppService {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &Arc<AppContext> {
        &self.ctx
    }

    /// Run one lifecycle command and return the resulting app view
    pub async fn execute(&self, command: LifecycleCommand) -> Result<AppView> {
        match command {
            LifecycleCommand::Install { app_id, form } => self.install(&app_id, form).await,
            LifecycleCommand::Start { app_id } => self.start(&app_id).await,
            LifecycleCommand::Stop { app_id } => self.stop(&app_id).await,
            LifecycleCommand::Restart { app_id } => self.restart(&app_id).await,
            LifecycleCommand::Reset { app_id } => self.reset(&app_id).await,
            LifecycleCommand::Update { app_id } => self.update(&app_id).await,
            LifecycleCommand::UpdateConfig { app_id, form } => {
                self.update_config(&app_id, form).await
            }
            LifecycleCommand::Uninstall { app_id } => self.uninstall(&app_id).await,
            LifecycleCommand::CreateBackup { app_id } => self.create_backup(&app_id).await,
            LifecycleCommand::RestoreBackup { app_id, filename } => {
                self.restore_backup(&app_id, &filename).await
            }
        }
    }

    pub async fn install(&self, app_id: &str, form: AppForm) -> Result<AppView> {
        commands::install::install(&self.ctx, app_id, &form).await?;
        self.get_app(app_id).await
    }

    pub async fn start(&self, app_id: &str) -> Result<AppView> {
        commands::start::start(&self.ctx, app_id).await?;
        self.get_app(app_id).await
    }

    pub async fn stop(&self, app_id: &str) -> Result<AppView> {
        commands::stop::stop(&self.ctx, app_id).await?;
        self.get_app(app_id).await
    }

    pub async fn restart(&self, app_id: &str) -> Result<AppView> {
        commands::restart::restart(&self.ctx, app_id).await?;
        self.get_app(app_id).await
    }

    pub async fn reset(&self, app_id: &str) -> Result<AppView> {
        commands::restart::reset(&self.ctx, app_id).await?;
        self.get_app(app_id).await
    }

    pub async fn update(&self, app_id: &str) -> Result<AppView> {
        commands::update::update(&self.ctx, app_id).await?;
        self.get_app(app_id).await
    }

    pub async fn update_config(&self, app_id: &str, form: AppForm) -> Result<AppView> {
        commands::update_config::update_config(&self.ctx, app_id, &form).await?;
        self.get_app(app_id).await
    }

    pub async fn uninstall(&self, app_id: &str) -> Result<AppView> {
        commands::uninstall::uninstall(&self.ctx, app_id).await?;
        self.get_app(app_id).await
    }

    pub async fn create_backup(&self, app_id: &str) -> Result<AppView> {
        commands::backup::create_backup(&self.ctx, app_id).await?;
        self.get_app(app_id).await
    }

    pub async fn restore_backup(&self, app_id: &str, filename: &str) -> Result<AppView> {
        commands::restore::restore_backup(&self.ctx, app_id, filename).await?;
        self.get_app(app_id).await
    }

    pub async fn list_backups(&self, app_id: &str, page: u64, page_size: u64) -> Result<BackupPage> {
        self.ctx.db.backups().list(app_id, page, page_size).await
    }

    pub async fn delete_backup(&self, app_id: &str, backup_id: u64) -> Result<()> {
        commands::backup::delete_backup(&self.ctx, app_id, backup_id).await
    }

    /// Pure read: merged row + manifest, `missing` when no row exists
    pub async fn get_app(&self, app_id: &str) -> Result<AppView> {
        views::get_app(&self.ctx, app_id).await
    }

    /// All installed apps merged with their manifests
    pub async fn list_apps(&self) -> Result<Vec<AppView>> {
        views::list_apps(&self.ctx).await
    }

    /// Record that the user opened an app
    pub async fn mark_opened(&self, app_id: &str) -> Result<()> {
        self.ctx.db.apps().mark_opened(app_id).await
    }

    /// Boot-time: restart every app that was running, independently
    pub async fn start_all(&self) -> Result<()> {
        commands::start_all::start_all(&self.ctx).await
    }

    /// Register recurring catalog sync and system snapshot submissions
    pub fn schedule_maintenance(&self, catalog_url: &str) -> Vec<ScheduledJob> {
        info!("Registering maintenance schedules");
        vec![
            self.ctx.dispatcher.schedule(
                Event::repo(RepoCommand::Update, catalog_url),
                std::time::Duration::from_secs(CATALOG_SYNC_INTERVAL_SECS),
            ),
            self.ctx.dispatcher.schedule(
                Event::system_info(),
                std::time::Duration::from_secs(SYSTEM_INFO_INTERVAL_SECS),
            ),
        ]
    }

    /// Stop accepting work and drain the dispatcher
    pub async fn shutdown(&self) {
        self.ctx.dispatcher.shutdown().await;
    }
}
