//! Stop: `running → stopping → {stopped | running}`

use tracing::{error, info};

use homestack_core::{AppStatus, Error, Result};
use homestack_dispatch::{AppCommand, Event};

use crate::AppContext;

pub(crate) async fn stop(ctx: &AppContext, app_id: &str) -> Result<()> {
    let _guard = ctx.locks.try_acquire(app_id)?;
    stop_locked(ctx, app_id).await
}

/// Stop while the caller already holds the app guard (restart, reset)
pub(crate) async fn stop_locked(ctx: &AppContext, app_id: &str) -> Result<()> {
    let app = ctx
        .db
        .apps()
        .get(app_id)
        .await?
        .ok_or_else(|| Error::AppNotFound(app_id.to_string()))?;

    if !ctx
        .db
        .apps()
        .try_transition(app_id, &[AppStatus::Running], AppStatus::Stopping)
        .await?
    {
        return Err(Error::invalid_status(app_id, "stop", app.status));
    }

    info!("Stopping app {}", app_id);
    let outcome = match ctx
        .dispatcher
        .dispatch_and_await(
            Event::app(AppCommand::Stop, app_id),
            ctx.settings.dispatch_timeout,
        )
        .await
    {
        Ok(outcome) => outcome,
        Err(e) => {
            // Await failed (timeout or shutdown): the app keeps its previous state
            ctx.db.apps().set_status(app_id, AppStatus::Running).await?;
            return Err(e);
        }
    };

    if outcome.success {
        ctx.db.apps().set_status(app_id, AppStatus::Stopped).await?;
        Ok(())
    } else {
        error!("Stop of {} failed: {}", app_id, outcome.stdout.trim());
        ctx.db.apps().set_status(app_id, AppStatus::Running).await?;
        Err(Error::execution(outcome.stdout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{add_catalog_app, basic_manifest, stack};
    use crate::AppForm;

    #[tokio::test]
    async fn test_stop_failure_restores_running() {
        let stack = stack().await;
        add_catalog_app(&stack, "app-x", basic_manifest("app-x", 1));
        stack
            .service
            .install("app-x", AppForm::default())
            .await
            .unwrap();

        stack.runner.fail_next("app:stop:app-x", "container wedged");
        let err = stack.service.stop("app-x").await.unwrap_err();
        assert!(matches!(err, Error::ExecutionFailed { .. }));

        let view = stack.service.get_app("app-x").await.unwrap();
        assert_eq!(view.status, AppStatus::Running);
        stack.service.shutdown().await;
    }

    #[tokio::test]
    async fn test_stop_requires_running() {
        let stack = stack().await;
        add_catalog_app(&stack, "app-x", basic_manifest("app-x", 1));
        stack
            .service
            .install("app-x", AppForm::default())
            .await
            .unwrap();
        stack.service.stop("app-x").await.unwrap();

        let err = stack.service.stop("app-x").await.unwrap_err();
        assert!(matches!(err, Error::InvalidStatus { .. }));
        stack.service.shutdown().await;
    }

    #[tokio::test]
    async fn test_stop_unknown_app() {
        let stack = stack().await;
        let err = stack.service.stop("ghost").await.unwrap_err();
        assert!(matches!(err, Error::AppNotFound(_)));
        stack.service.shutdown().await;
    }
}
