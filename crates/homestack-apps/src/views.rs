//! Read-side app views
//!
//! A view merges the persisted row (or manifest-derived defaults when no row
//! exists) with the manifest, and computes update availability from the
//! catalog revision. Views never mutate state.

use serde::Serialize;
use tracing::warn;

use homestack_core::{AppRecord, AppStatus, FormValues, Manifest, Result};

use crate::AppContext;

/// Merged row + manifest presented to callers
#[derive(Debug, Clone, Serialize)]
pub struct AppView {
    pub id: String,
    pub name: String,
    pub status: AppStatus,
    pub config: FormValues,
    pub exposed: bool,
    pub domain: Option<String>,
    pub open_port: bool,
    pub exposed_local: bool,
    pub port: u16,
    /// Manifest revision the app was installed or updated to
    pub version: u64,
    /// Latest revision available in the catalog
    pub latest_version: u64,
    pub update_available: bool,
    pub num_opened: u64,
    pub manifest: Manifest,
}

impl AppView {
    fn from_record(record: AppRecord, manifest: Manifest, latest_version: u64) -> Self {
        Self {
            id: record.id,
            name: manifest.name.clone(),
            status: record.status,
            config: record.config,
            exposed: record.exposed,
            domain: record.domain,
            open_port: record.open_port,
            exposed_local: record.exposed_local,
            port: manifest.port,
            version: record.version,
            latest_version,
            update_available: latest_version > record.version,
            num_opened: record.num_opened,
            manifest,
        }
    }

    fn missing(manifest: Manifest, latest_version: u64) -> Self {
        Self {
            id: manifest.id.clone(),
            name: manifest.name.clone(),
            status: AppStatus::Missing,
            config: FormValues::new(),
            exposed: false,
            domain: None,
            open_port: false,
            exposed_local: false,
            port: manifest.port,
            version: 0,
            latest_version,
            update_available: false,
            num_opened: 0,
            manifest,
        }
    }
}

/// Merge one app's row and manifest into a view
pub(crate) async fn get_app(ctx: &AppContext, app_id: &str) -> Result<AppView> {
    let manifest = ctx.resolver.resolve(app_id)?;
    let latest_version = ctx
        .resolver
        .resolve_catalog(app_id)
        .map(|m| m.revision)
        .unwrap_or(manifest.revision);

    match ctx.db.apps().get(app_id).await? {
        Some(record) => Ok(AppView::from_record(record, manifest, latest_version)),
        None => Ok(AppView::missing(manifest, latest_version)),
    }
}

/// Views for every installed app; rows without a readable manifest are
/// skipped so one bad definition never breaks the listing
pub(crate) async fn list_apps(ctx: &AppContext) -> Result<Vec<AppView>> {
    let mut views = Vec::new();
    for record in ctx.db.apps().list().await? {
        let app_id = record.id.clone();
        match ctx.resolver.resolve(&app_id) {
            Ok(manifest) => {
                let latest_version = ctx
                    .resolver
                    .resolve_catalog(&app_id)
                    .map(|m| m.revision)
                    .unwrap_or(manifest.revision);
                views.push(AppView::from_record(record, manifest, latest_version));
            }
            Err(e) => {
                warn!("Skipping {} in listing: {}", app_id, e);
            }
        }
    }
    Ok(views)
}
