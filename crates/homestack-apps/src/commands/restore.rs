//! Restore: `running|stopped → restoring → stopped`
//!
//! Terminal status is `stopped` whether the restore succeeds or not; the
//! user starts the restored app explicitly.

use tracing::{error, info};

use homestack_core::{AppStatus, Error, Result};
use homestack_dispatch::{AppCommand, Event};

use crate::AppContext;

pub(crate) async fn restore_backup(ctx: &AppContext, app_id: &str, filename: &str) -> Result<()> {
    let _guard = ctx.locks.try_acquire(app_id)?;

    let app = ctx
        .db
        .apps()
        .get(app_id)
        .await?
        .ok_or_else(|| Error::AppNotFound(app_id.to_string()))?;

    if !ctx
        .db
        .apps()
        .try_transition(
            app_id,
            &[AppStatus::Running, AppStatus::Stopped],
            AppStatus::Restoring,
        )
        .await?
    {
        return Err(Error::invalid_status(app_id, "restore", app.status));
    }

    info!("Restoring app {} from {}", app_id, filename);
    let result = ctx
        .dispatcher
        .dispatch_and_await(
            Event::app_with_args(AppCommand::Restore, app_id, vec![filename.to_string()]),
            ctx.settings.backup_timeout,
        )
        .await;

    ctx.db.apps().set_status(app_id, AppStatus::Stopped).await?;

    match result {
        Ok(outcome) if outcome.success => Ok(()),
        Ok(outcome) => {
            error!("Restore of {} failed: {}", app_id, outcome.stdout.trim());
            Err(Error::execution(outcome.stdout))
        }
        Err(e) => Err(e),
    }
}
