//! Update: `running|stopped → updating → stopped`
//!
//! Terminal status is `stopped` either way; the user starts the updated app
//! explicitly. The version is only bumped after a successful update.

use tracing::{error, info};

use homestack_core::{AppStatus, Error, Result};
use homestack_dispatch::{AppCommand, Event};

use crate::{catalog, AppContext};

pub(crate) async fn update(ctx: &AppContext, app_id: &str) -> Result<()> {
    let _guard = ctx.locks.try_acquire(app_id)?;

    let app = ctx
        .db
        .apps()
        .get(app_id)
        .await?
        .ok_or_else(|| Error::AppNotFound(app_id.to_string()))?;

    // The catalog copy carries the revision we are moving to
    let manifest = ctx.resolver.resolve_catalog(app_id)?;

    if !ctx
        .db
        .apps()
        .try_transition(
            app_id,
            &[AppStatus::Running, AppStatus::Stopped],
            AppStatus::Updating,
        )
        .await?
    {
        return Err(Error::invalid_status(app_id, "update", app.status));
    }

    info!(
        "Updating app {} from revision {} to {}",
        app_id, app.version, manifest.revision
    );

    // Whatever happens next, the app must land on `stopped` before any
    // error is surfaced.
    let result = run_update(ctx, app_id, manifest.revision).await;
    ctx.db.apps().set_status(app_id, AppStatus::Stopped).await?;
    if let Err(e) = &result {
        error!("Update of {} failed: {}", app_id, e);
    }
    result
}

async fn run_update(ctx: &AppContext, app_id: &str, revision: u64) -> Result<()> {
    let outcome = ctx
        .dispatcher
        .dispatch_and_await(
            Event::app(AppCommand::Update, app_id),
            ctx.settings.dispatch_timeout,
        )
        .await?;
    if !outcome.success {
        return Err(Error::execution(outcome.stdout));
    }

    catalog::refresh_app_definition(&ctx.settings, app_id)?;
    ctx.db.apps().set_version(app_id, revision).await?;
    Ok(())
}
