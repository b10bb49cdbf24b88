//! App manifest model and resolution
//!
//! A manifest is the read-only descriptor shipped with every installable app:
//! port, form fields, exposability flags, architecture support. It lives as
//! `manifest.json` in the app definition directory; this module only
//! validates and consumes it.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

use crate::config::Settings;
use crate::constants::MANIFEST_FILE;
use crate::error::{Error, Result};
use crate::types::{validate_app_id, Arch};

/// Form field value type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Password,
    Email,
    Url,
    Number,
    Boolean,
    Random,
}

/// One user-facing configuration field declared by a manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormField {
    /// Environment variable the resolved value is written to
    pub env_variable: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub required: bool,
    /// Minimum length; doubles as the derived length for `random` fields
    #[serde(default)]
    pub min: Option<usize>,
    #[serde(default)]
    pub max: Option<usize>,
    #[serde(default)]
    pub options: Option<Vec<String>>,
    #[serde(default)]
    pub placeholder: Option<String>,
}

/// Read-only app descriptor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub id: String,
    pub name: String,
    /// Port the app's main service listens on
    pub port: u16,
    /// Upstream image version
    pub version: String,
    /// Packaging revision; bumped on every definition change
    #[serde(default)]
    pub revision: u64,
    #[serde(default)]
    pub exposable: bool,
    /// App refuses to run without a public domain
    #[serde(default)]
    pub force_expose: bool,
    #[serde(default)]
    pub generate_vapid_keys: bool,
    /// None means every architecture is supported
    #[serde(default)]
    pub supported_architectures: Option<Vec<Arch>>,
    #[serde(default)]
    pub form_fields: Vec<FormField>,
}

impl Manifest {
    /// Parse a manifest file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let manifest: Manifest = serde_json::from_str(&content)?;
        Ok(manifest)
    }

    /// Whether the given architecture can run this app
    pub fn supports_arch(&self, arch: Arch) -> bool {
        match &self.supported_architectures {
            Some(archs) => archs.contains(&arch),
            None => true,
        }
    }
}

/// Resolves manifests from the installed copy or the upstream catalog copy
#[derive(Clone)]
pub struct ManifestResolver {
    settings: Arc<Settings>,
}

impl ManifestResolver {
    pub fn new(settings: Arc<Settings>) -> Self {
        Self { settings }
    }

    /// Load the manifest for an app.
    ///
    /// Prefers the installed copy so a running app keeps seeing the revision
    /// it was installed from; falls back to the catalog copy for apps that
    /// are not installed. Malformed manifests are logged and treated as
    /// absent so listing operations never fail on one bad file.
    pub fn resolve(&self, app_id: &str) -> Result<Manifest> {
        if !validate_app_id(app_id) {
            return Err(Error::InvalidAppId(app_id.to_string()));
        }

        let installed = self.settings.app_dir(app_id).join(MANIFEST_FILE);
        let catalog = self.settings.catalog_app_dir(app_id).join(MANIFEST_FILE);

        for path in [&installed, &catalog] {
            if !path.exists() {
                continue;
            }
            match Manifest::load(path) {
                Ok(manifest) => return Ok(manifest),
                Err(e) => {
                    warn!("Ignoring malformed manifest {}: {}", path.display(), e);
                }
            }
        }

        Err(Error::ManifestNotFound(app_id.to_string()))
    }

    /// Load the catalog copy only, ignoring an installed one.
    /// Used by Update to read the latest revision.
    pub fn resolve_catalog(&self, app_id: &str) -> Result<Manifest> {
        if !validate_app_id(app_id) {
            return Err(Error::InvalidAppId(app_id.to_string()));
        }

        let path = self.settings.catalog_app_dir(app_id).join(MANIFEST_FILE);
        if !path.exists() {
            return Err(Error::ManifestNotFound(app_id.to_string()));
        }
        Manifest::load(&path).map_err(|e| {
            warn!("Ignoring malformed manifest {}: {}", path.display(), e);
            Error::ManifestNotFound(app_id.to_string())
        })
    }

    /// Resolve the manifest and reject apps the host cannot run
    pub fn check_requirements(&self, app_id: &str) -> Result<Manifest> {
        let manifest = self.resolve(app_id)?;
        if !manifest.supports_arch(self.settings.architecture) {
            return Err(Error::UnsupportedArch {
                id: app_id.to_string(),
                arch: self.settings.architecture.to_string(),
            });
        }
        Ok(manifest)
    }
}
