//! UpdateConfig - persist new config and exposure without touching containers
//!
//! Validation mirrors Install. No container event is dispatched; the caller
//! restarts the app to apply the new configuration.

use tracing::info;

use homestack_core::{Error, Result};

use crate::commands::validate::validate_exposure;
use crate::{AppContext, AppForm};

pub(crate) async fn update_config(ctx: &AppContext, app_id: &str, form: &AppForm) -> Result<()> {
    let _guard = ctx.locks.try_acquire(app_id)?;

    if !ctx.db.apps().exists(app_id).await? {
        return Err(Error::AppNotFound(app_id.to_string()));
    }

    let manifest = ctx.resolver.resolve(app_id)?;
    validate_exposure(ctx, app_id, &manifest, form).await?;

    ctx.db
        .apps()
        .update_config(
            app_id,
            &form.config,
            form.exposed,
            form.domain.as_deref(),
            form.open_port,
            form.exposed_local,
        )
        .await?;

    info!("Updated config for app {}; restart to apply", app_id);
    Ok(())
}
