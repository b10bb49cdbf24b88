//! Shared fixtures for lifecycle command tests

use std::sync::Arc;
use std::time::Duration;
use tempfile::{tempdir, TempDir};

use homestack_core::{Arch, Settings};
use homestack_dispatch::MockRunner;

use crate::{AppContext, AppService};

pub(crate) struct TestStack {
    pub runner: Arc<MockRunner>,
    pub ctx: Arc<AppContext>,
    pub service: AppService,
    _dir: TempDir,
}

/// Build a full stack on a temp directory with a scripted runner
pub(crate) async fn stack() -> TestStack {
    let dir = tempdir().unwrap();

    let mut settings = Settings::for_root(dir.path());
    settings.workers = 2;
    settings.architecture = Arch::Amd64;
    settings.dispatch_timeout = Duration::from_secs(5);
    settings.backup_timeout = Duration::from_secs(5);

    let runner = Arc::new(MockRunner::new());
    let ctx = Arc::new(
        AppContext::new(Arc::new(settings), runner.clone())
            .await
            .unwrap(),
    );

    TestStack {
        runner,
        service: AppService::new(Arc::clone(&ctx)),
        ctx,
        _dir: dir,
    }
}

/// A minimal exposable manifest with one random field
pub(crate) fn basic_manifest(id: &str, revision: u64) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "name": "Test App",
        "port": 8080,
        "version": "1.0.0",
        "revision": revision,
        "exposable": true,
        "form_fields": [
            {"env_variable": "DB_PASSWORD", "type": "random", "min": 24}
        ]
    })
}

/// Write an app definition (manifest, compose file, data template) into the catalog
pub(crate) fn add_catalog_app(stack: &TestStack, id: &str, manifest: serde_json::Value) {
    let dir = stack.ctx.settings.catalog_app_dir(id);
    std::fs::create_dir_all(dir.join("data")).unwrap();
    std::fs::write(
        dir.join("manifest.json"),
        serde_json::to_string_pretty(&manifest).unwrap(),
    )
    .unwrap();
    std::fs::write(dir.join("docker-compose.yml"), "services: {}\n").unwrap();
    std::fs::write(dir.join("data/app.ini.template"), "port={{APP_PORT}}\n").unwrap();
}
