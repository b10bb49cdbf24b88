//! Uninstall: `running|stopped → uninstalling → {row deleted | stopped}`

use tracing::{error, info};

use homestack_core::{AppStatus, Error, Result};
use homestack_dispatch::{AppCommand, Event};

use crate::{catalog, AppContext};

pub(crate) async fn uninstall(ctx: &AppContext, app_id: &str) -> Result<()> {
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
            AppStatus::Uninstalling,
        )
        .await?
    {
        return Err(Error::invalid_status(app_id, "uninstall", app.status));
    }

    info!("Uninstalling app {}", app_id);
    match run_uninstall(ctx, app_id).await {
        Ok(()) => {
            ctx.db.apps().delete(app_id).await?;
            info!("Uninstalled app {}", app_id);
            Ok(())
        }
        Err(e) => {
            // The row stays, status stopped, so the user can retry the
            // uninstall; local files may already be partially removed.
            error!("Uninstall of {} failed: {}", app_id, e);
            ctx.db.apps().set_status(app_id, AppStatus::Stopped).await?;
            Err(e)
        }
    }
}

async fn run_uninstall(ctx: &AppContext, app_id: &str) -> Result<()> {
    let outcome = ctx
        .dispatcher
        .dispatch_and_await(
            Event::app(AppCommand::Uninstall, app_id),
            ctx.settings.dispatch_timeout,
        )
        .await?;
    if !outcome.success {
        return Err(Error::execution(outcome.stdout));
    }

    catalog::remove_app_dirs(&ctx.settings, app_id)?;
    catalog::remove_backup_dir(&ctx.settings, app_id);
    ctx.db.backups().delete_for_app(app_id).await?;
    Ok(())
}
