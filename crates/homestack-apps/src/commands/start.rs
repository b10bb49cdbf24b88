//! Start: `stopped → starting → {running | stopped}`

use tracing::{error, info};

use homestack_core::{AppStatus, Error, FormValues, Result};
use homestack_dispatch::{AppCommand, Event};
use homestack_env::render_data_templates;

use crate::AppContext;

pub(crate) async fn start(ctx: &AppContext, app_id: &str) -> Result<()> {
    let _guard = ctx.locks.try_acquire(app_id)?;
    start_locked(ctx, app_id).await
}

/// Start while the caller already holds the app guard (restart, backup)
pub(crate) async fn start_locked(ctx: &AppContext, app_id: &str) -> Result<()> {
    let app = ctx
        .db
        .apps()
        .get(app_id)
        .await?
        .ok_or_else(|| Error::AppNotFound(app_id.to_string()))?;

    if !ctx
        .db
        .apps()
        .try_transition(app_id, &[AppStatus::Stopped], AppStatus::Starting)
        .await?
    {
        return Err(Error::invalid_status(app_id, "start", app.status));
    }

    info!("Starting app {}", app_id);
    match run_start(ctx, app_id, &app.config, app.exposed, app.domain.as_deref()).await {
        Ok(()) => {
            ctx.db.apps().set_status(app_id, AppStatus::Running).await?;
            Ok(())
        }
        Err(e) => {
            error!("Start of {} failed: {}", app_id, e);
            ctx.db.apps().set_status(app_id, AppStatus::Stopped).await?;
            Err(e)
        }
    }
}

async fn run_start(
    ctx: &AppContext,
    app_id: &str,
    config: &FormValues,
    exposed: bool,
    domain: Option<&str>,
) -> Result<()> {
    // Regenerating is idempotent: random fields and VAPID keys are reused
    let manifest = ctx.resolver.resolve(app_id)?;
    let env = ctx.envgen.generate(&manifest, config, exposed, domain)?;
    render_data_templates(&ctx.settings, app_id, &env)?;

    let outcome = ctx
        .dispatcher
        .dispatch_and_await(
            Event::app(AppCommand::Start, app_id),
            ctx.settings.dispatch_timeout,
        )
        .await?;
    if !outcome.success {
        return Err(Error::execution(outcome.stdout));
    }
    Ok(())
}
