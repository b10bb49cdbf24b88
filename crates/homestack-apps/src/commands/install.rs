//! Install: `missing → installing → {running | row deleted}`

use tracing::{error, info};

use homestack_core::{validate_app_id, AppStatus, Error, Manifest, NewApp, Result};
use homestack_dispatch::{AppCommand, Event};
use homestack_env::render_data_templates;

use crate::commands::validate::validate_exposure;
use crate::{catalog, AppContext, AppForm};

pub(crate) async fn install(ctx: &AppContext, app_id: &str, form: &AppForm) -> Result<()> {
    if !validate_app_id(app_id) {
        return Err(Error::InvalidAppId(app_id.to_string()));
    }
    let _guard = ctx.locks.try_acquire(app_id)?;

    if ctx.db.apps().exists(app_id).await? {
        return Err(Error::AppAlreadyInstalled(app_id.to_string()));
    }

    let manifest = ctx.resolver.check_requirements(app_id)?;
    validate_exposure(ctx, app_id, &manifest, form).await?;

    info!("Installing app {}", app_id);
    let app = NewApp::installing(app_id, form.config.clone(), manifest.revision)
        .with_exposure(form.exposed, form.domain.clone())
        .with_ports(form.open_port, form.exposed_local);
    ctx.db.apps().insert(&app).await?;

    match run_install(ctx, app_id, &manifest, form).await {
        Ok(()) => {
            ctx.db.apps().set_status(app_id, AppStatus::Running).await?;
            info!("Installed app {}", app_id);
            Ok(())
        }
        Err(e) => {
            // The install never completed, so no state survives it: deleting
            // the row restores the pre-install absence.
            error!("Install of {} failed: {}", app_id, e);
            let _ = ctx.db.apps().delete(app_id).await;
            Err(e)
        }
    }
}

async fn run_install(
    ctx: &AppContext,
    app_id: &str,
    manifest: &Manifest,
    form: &AppForm,
) -> Result<()> {
    catalog::copy_app_definition(&ctx.settings, app_id)?;

    let env = ctx
        .envgen
        .generate(manifest, &form.config, form.exposed, form.domain.as_deref())?;
    render_data_templates(&ctx.settings, app_id, &env)?;

    let outcome = ctx
        .dispatcher
        .dispatch_and_await(
            Event::app(AppCommand::Install, app_id),
            ctx.settings.dispatch_timeout,
        )
        .await?;
    if !outcome.success {
        return Err(Error::execution(outcome.stdout));
    }
    Ok(())
}
