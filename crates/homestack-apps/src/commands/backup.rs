//! Backup: `running|stopped → backing_up → {prior status | stopped}`
//!
//! Backups may take tens of minutes, so they run under the extended timeout.
//! On success the prior status is restored, re-running Start when the app
//! was running, and exactly one backup row is persisted.

use chrono::Utc;
use tracing::{error, info};

use homestack_core::{AppStatus, Error, Result};
use homestack_dispatch::{AppCommand, Event};

use crate::commands::start;
use crate::AppContext;

pub(crate) async fn create_backup(ctx: &AppContext, app_id: &str) -> Result<()> {
    let _guard = ctx.locks.try_acquire(app_id)?;

    let app = ctx
        .db
        .apps()
        .get(app_id)
        .await?
        .ok_or_else(|| Error::AppNotFound(app_id.to_string()))?;
    let prior_status = app.status;

    if !ctx
        .db
        .apps()
        .try_transition(
            app_id,
            &[AppStatus::Running, AppStatus::Stopped],
            AppStatus::BackingUp,
        )
        .await?
    {
        return Err(Error::invalid_status(app_id, "backup", app.status));
    }

    let filename = format!("{}-{}.tar.gz", app_id, Utc::now().format("%Y%m%d%H%M%S"));
    info!("Backing up app {} to {}", app_id, filename);

    match ctx
        .dispatcher
        .dispatch_and_await(
            Event::app_with_args(AppCommand::Backup, app_id, vec![filename.clone()]),
            ctx.settings.backup_timeout,
        )
        .await
    {
        Ok(outcome) if outcome.success => {}
        Ok(outcome) => {
            error!("Backup of {} failed: {}", app_id, outcome.stdout.trim());
            ctx.db.apps().set_status(app_id, AppStatus::Stopped).await?;
            return Err(Error::execution(outcome.stdout));
        }
        Err(e) => {
            ctx.db.apps().set_status(app_id, AppStatus::Stopped).await?;
            return Err(e);
        }
    }

    let size = std::fs::metadata(ctx.settings.backup_file(app_id, &filename))
        .map(|m| m.len())
        .unwrap_or(0);
    let inserted = ctx
        .db
        .backups()
        .insert(app_id, &filename, size, app.version)
        .await;

    // Resolve the transitional status before surfacing any bookkeeping error
    ctx.db.apps().set_status(app_id, AppStatus::Stopped).await?;
    inserted?;

    // Restore the prior status; a previously running app is started again
    if prior_status == AppStatus::Running {
        start::start_locked(ctx, app_id).await?;
    }
    Ok(())
}

/// Delete one backup: the row and its archive file
pub(crate) async fn delete_backup(ctx: &AppContext, app_id: &str, backup_id: u64) -> Result<()> {
    let backup = ctx
        .db
        .backups()
        .get(backup_id)
        .await?
        .filter(|b| b.app_id == app_id)
        .ok_or_else(|| Error::BackupNotFound(format!("{} for app {}", backup_id, app_id)))?;

    let archive = ctx.settings.backup_file(app_id, &backup.filename);
    if archive.exists() {
        std::fs::remove_file(&archive)?;
    }
    ctx.db.backups().delete(backup_id).await?;
    info!("Deleted backup {} of {}", backup.filename, app_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::testutil::{add_catalog_app, basic_manifest, stack};
    use crate::AppForm;
    use homestack_core::{AppStatus, Error};

    #[tokio::test]
    async fn test_backup_running_app_round_trip() {
        let stack = stack().await;
        add_catalog_app(&stack, "app-z", basic_manifest("app-z", 1));
        stack
            .service
            .install("app-z", AppForm::default())
            .await
            .unwrap();

        let view = stack.service.create_backup("app-z").await.unwrap();
        // Back to running, through backing_up
        assert_eq!(view.status, AppStatus::Running);
        assert_eq!(stack.runner.count("app:backup:app-z"), 1);
        assert_eq!(stack.runner.count("app:start:app-z"), 1);

        // Exactly one backup row for this app
        let page = stack.service.list_backups("app-z", 1, 10).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.data[0].app_id, "app-z");
        assert_eq!(page.data[0].version, 1);
        assert!(page.data[0].filename.starts_with("app-z-"));
        stack.service.shutdown().await;
    }

    #[tokio::test]
    async fn test_backup_stopped_app_stays_stopped() {
        let stack = stack().await;
        add_catalog_app(&stack, "app-z", basic_manifest("app-z", 1));
        stack
            .service
            .install("app-z", AppForm::default())
            .await
            .unwrap();
        stack.service.stop("app-z").await.unwrap();

        let view = stack.service.create_backup("app-z").await.unwrap();
        assert_eq!(view.status, AppStatus::Stopped);
        // No start was issued for a stopped app
        assert_eq!(stack.runner.count("app:start:app-z"), 0);
        stack.service.shutdown().await;
    }

    #[tokio::test]
    async fn test_backup_failure_lands_stopped_without_row() {
        let stack = stack().await;
        add_catalog_app(&stack, "app-z", basic_manifest("app-z", 1));
        stack
            .service
            .install("app-z", AppForm::default())
            .await
            .unwrap();

        stack.runner.fail_next("app:backup:app-z", "disk full");
        let err = stack.service.create_backup("app-z").await.unwrap_err();
        assert!(matches!(err, Error::ExecutionFailed { .. }));

        let view = stack.service.get_app("app-z").await.unwrap();
        assert_eq!(view.status, AppStatus::Stopped);
        assert_eq!(stack.service.list_backups("app-z", 1, 10).await.unwrap().total, 0);
        stack.service.shutdown().await;
    }

    #[tokio::test]
    async fn test_delete_backup() {
        let stack = stack().await;
        add_catalog_app(&stack, "app-z", basic_manifest("app-z", 1));
        stack
            .service
            .install("app-z", AppForm::default())
            .await
            .unwrap();
        stack.service.create_backup("app-z").await.unwrap();

        let page = stack.service.list_backups("app-z", 1, 10).await.unwrap();
        let backup_id = page.data[0].id;
        stack.service.delete_backup("app-z", backup_id).await.unwrap();
        assert_eq!(stack.service.list_backups("app-z", 1, 10).await.unwrap().total, 0);

        // Deleting again reports not found
        assert!(stack.service.delete_backup("app-z", backup_id).await.is_err());
        stack.service.shutdown().await;
    }

    #[tokio::test]
    async fn test_delete_backup_checks_owner() {
        let stack = stack().await;
        add_catalog_app(&stack, "app-a", basic_manifest("app-a", 1));
        add_catalog_app(&stack, "app-b", basic_manifest("app-b", 1));
        stack
            .service
            .install("app-a", AppForm::default())
            .await
            .unwrap();
        stack
            .service
            .install("app-b", AppForm::default())
            .await
            .unwrap();
        stack.service.create_backup("app-a").await.unwrap();

        let page = stack.service.list_backups("app-a", 1, 10).await.unwrap();
        let backup_id = page.data[0].id;
        // Another app cannot delete it
        assert!(stack.service.delete_backup("app-b", backup_id).await.is_err());
        stack.service.shutdown().await;
    }
}
