//! App definition file management
//!
//! The catalog directory holds the upstream copy of every installable app
//! (manifest, compose file, data templates). Install copies a definition
//! into the live apps directory; Update refreshes it; Uninstall removes it
//! together with the app's data directory.

use std::path::Path;
use tracing::{debug, warn};

use homestack_core::{Error, Result, Settings};

/// Copy the catalog definition into the live apps directory if not present
pub fn copy_app_definition(settings: &Settings, app_id: &str) -> Result<()> {
    let dst = settings.app_dir(app_id);
    if dst.exists() {
        debug!("App definition for {} already present", app_id);
        return Ok(());
    }
    let src = settings.catalog_app_dir(app_id);
    if !src.exists() {
        return Err(Error::ManifestNotFound(app_id.to_string()));
    }
    copy_dir(&src, &dst)
}

/// Overwrite the live definition with the current catalog copy
pub fn refresh_app_definition(settings: &Settings, app_id: &str) -> Result<()> {
    let src = settings.catalog_app_dir(app_id);
    if !src.exists() {
        return Err(Error::ManifestNotFound(app_id.to_string()));
    }
    let dst = settings.app_dir(app_id);
    if dst.exists() {
        std::fs::remove_dir_all(&dst)?;
    }
    copy_dir(&src, &dst)
}

/// Remove the installed definition and the live data directory of an app
pub fn remove_app_dirs(settings: &Settings, app_id: &str) -> Result<()> {
    for dir in [settings.app_dir(app_id), settings.app_data_for(app_id)] {
        if dir.exists() {
            std::fs::remove_dir_all(&dir)?;
        }
    }
    Ok(())
}

/// Remove the backup archive directory of an app, tolerating absence
pub fn remove_backup_dir(settings: &Settings, app_id: &str) {
    let dir = settings.backups_dir().join(app_id);
    if dir.exists() {
        if let Err(e) = std::fs::remove_dir_all(&dir) {
            warn!("Failed to remove backups of {}: {}", app_id, e);
        }
    }
}

fn copy_dir(src: &Path, dst: &Path) -> Result<()> {
    std::fs::create_dir_all(dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let path = entry.path();
        let target = dst.join(entry.file_name());
        if path.is_dir() {
            copy_dir(&path, &target)?;
        } else {
            std::fs::copy(&path, &target)?;
        }
    }
    Ok(())
}
