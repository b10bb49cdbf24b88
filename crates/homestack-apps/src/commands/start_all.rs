//! Boot-time start of every previously running app
//!
//! Each app is restarted independently and concurrently; one failure leaves
//! that app stopped and never aborts the others.

use std::sync::Arc;
use tracing::{error, info};

use homestack_core::{AppStatus, Result};

use crate::commands::start;
use crate::AppContext;

pub(crate) async fn start_all(ctx: &Arc<AppContext>) -> Result<()> {
    let apps = ctx.db.apps().list_by_status(AppStatus::Running).await?;
    if apps.is_empty() {
        return Ok(());
    }
    info!("Starting {} previously running apps", apps.len());

    let mut handles = Vec::with_capacity(apps.len());
    for app in apps {
        let ctx = Arc::clone(ctx);
        handles.push(tokio::spawn(async move {
            // The row still says running from the previous boot; reset it so
            // the start transition can claim the app.
            if let Err(e) = ctx.db.apps().set_status(&app.id, AppStatus::Stopped).await {
                error!("Failed to reset status of {}: {}", app.id, e);
                return;
            }
            if let Err(e) = start::start(&ctx, &app.id).await {
                error!("Failed to start {} at boot: {}", app.id, e);
            }
        }));
    }

    for handle in handles {
        let _ = handle.await;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::testutil::{add_catalog_app, basic_manifest, stack};
    use crate::AppForm;
    use homestack_core::AppStatus;

    #[tokio::test]
    async fn test_start_all_restarts_running_apps() {
        let stack = stack().await;
        for id in ["app-a", "app-b", "app-c"] {
            add_catalog_app(&stack, id, basic_manifest(id, 1));
            stack.service.install(id, AppForm::default()).await.unwrap();
        }
        stack.service.stop("app-c").await.unwrap();

        // Simulate a reboot: statuses are as persisted, containers are gone
        stack.service.start_all().await.unwrap();

        assert_eq!(
            stack.service.get_app("app-a").await.unwrap().status,
            AppStatus::Running
        );
        assert_eq!(
            stack.service.get_app("app-b").await.unwrap().status,
            AppStatus::Running
        );
        // Stopped apps are left alone
        assert_eq!(
            stack.service.get_app("app-c").await.unwrap().status,
            AppStatus::Stopped
        );
        stack.service.shutdown().await;
    }

    #[tokio::test]
    async fn test_start_all_isolates_failures() {
        let stack = stack().await;
        for id in ["app-a", "app-b"] {
            add_catalog_app(&stack, id, basic_manifest(id, 1));
            stack.service.install(id, AppForm::default()).await.unwrap();
        }

        stack.runner.fail_next("app:start:app-a", "broken");
        stack.service.start_all().await.unwrap();

        assert_eq!(
            stack.service.get_app("app-a").await.unwrap().status,
            AppStatus::Stopped
        );
        assert_eq!(
            stack.service.get_app("app-b").await.unwrap().status,
            AppStatus::Running
        );
        stack.service.shutdown().await;
    }
}
