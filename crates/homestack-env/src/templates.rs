//! Data directory template rendering
//!
//! App definitions ship a `data/` directory that seeds the live per-app data
//! directory. Files ending in the template marker get `{{KEY}}` placeholders
//! substituted from the generated env map and lose the marker suffix;
//! everything else is copied verbatim, structure preserved. Placeholder
//! files used to keep empty directories in version control are dropped.

use std::path::Path;
use tracing::debug;

use homestack_core::{Result, Settings, TEMPLATE_SUFFIX};

use crate::envfile::EnvMap;

/// Marker files kept only so empty directories survive version control
const KEEP_MARKERS: &[&str] = &[".gitkeep"];

/// Render the packaged data directory of an app into its live data directory
pub fn render_data_templates(settings: &Settings, app_id: &str, env: &EnvMap) -> Result<()> {
    let src = settings.app_dir(app_id).join("data");
    if !src.exists() {
        return Ok(());
    }
    let dst = settings.app_data_for(app_id).join("data");
    render_dir(&src, &dst, env)
}

fn render_dir(src: &Path, dst: &Path, env: &EnvMap) -> Result<()> {
    std::fs::create_dir_all(dst)?;

    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name();
        let name_str = name.to_string_lossy();

        if path.is_dir() {
            render_dir(&path, &dst.join(&name), env)?;
            continue;
        }

        if KEEP_MARKERS.contains(&name_str.as_ref()) {
            continue;
        }

        if let Some(stripped) = name_str.strip_suffix(TEMPLATE_SUFFIX) {
            let content = std::fs::read_to_string(&path)?;
            let rendered = substitute(&content, env);
            std::fs::write(dst.join(stripped), rendered)?;
            debug!("Rendered template {}", path.display());
        } else {
            std::fs::copy(&path, dst.join(&name))?;
        }
    }

    Ok(())
}

/// Replace every `{{KEY}}` placeholder with its env value
fn substitute(content: &str, env: &EnvMap) -> String {
    let mut rendered = content.to_string();
    for (key, value) in env {
        rendered = rendered.replace(&format!("{{{{{}}}}}", key), value);
    }
    rendered
}
