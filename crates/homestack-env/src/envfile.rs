//! Per-app env file generation
//!
//! The env file is the single artifact the container invocation consumes:
//! newline-delimited `KEY=VALUE`, sorted by key so regeneration with
//! unchanged inputs is byte-identical. It is also where generated values
//! (random fields, VAPID keys) are persisted for reuse.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use homestack_core::{
    Error, FieldType, FormValues, Manifest, Result, Settings, DEFAULT_RANDOM_FIELD_LENGTH,
};

use crate::secrets::SecretStore;

/// Generated environment, sorted by key
pub type EnvMap = BTreeMap<String, String>;

/// Parse a `KEY=VALUE` env file. A missing file yields an empty map.
pub fn read_env_file(path: &Path) -> Result<EnvMap> {
    let mut env = EnvMap::new();
    if !path.exists() {
        return Ok(env);
    }

    let content = std::fs::read_to_string(path)?;
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(pos) = line.find('=') {
            let key = line[..pos].trim().to_string();
            let value = line[pos + 1..].trim();
            // Remove surrounding quotes if present
            let value = value
                .strip_prefix('"')
                .and_then(|s| s.strip_suffix('"'))
                .or_else(|| value.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')))
                .unwrap_or(value)
                .to_string();
            env.insert(key, value);
        }
    }
    Ok(env)
}

/// Write a `KEY=VALUE` env file, creating parent directories
pub fn write_env_file(path: &Path, env: &EnvMap) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut content = String::new();
    for (key, value) in env {
        content.push_str(key);
        content.push('=');
        content.push_str(value);
        content.push('\n');
    }
    std::fs::write(path, content)?;
    Ok(())
}

/// Builds the per-app environment from manifest, user config, and prior
/// generated values
pub struct EnvGenerator {
    settings: Arc<Settings>,
    secrets: SecretStore,
}

impl EnvGenerator {
    /// Create a generator, loading or creating the seed file
    pub fn new(settings: Arc<Settings>) -> Result<Self> {
        let secrets = SecretStore::load_or_create(&settings.seed_path())?;
        Ok(Self { settings, secrets })
    }

    #[cfg(test)]
    pub fn with_secrets(settings: Arc<Settings>, secrets: SecretStore) -> Self {
        Self { settings, secrets }
    }

    /// Generate and persist the env file for an app.
    ///
    /// Previously generated values are reused so random fields and VAPID
    /// keys stay stable across regenerations; explicit config values
    /// (including explicit `false`) always win.
    pub fn generate(
        &self,
        manifest: &Manifest,
        config: &FormValues,
        exposed: bool,
        domain: Option<&str>,
    ) -> Result<EnvMap> {
        let app_id = &manifest.id;
        let env_path = self.settings.env_file(app_id);
        let previous = read_env_file(&env_path)?;

        let mut env = EnvMap::new();
        env.insert("APP_ID".to_string(), app_id.clone());
        env.insert("APP_PORT".to_string(), manifest.port.to_string());
        env.insert(
            "APP_DATA_DIR".to_string(),
            self.settings.app_data_for(app_id).to_string_lossy().into_owned(),
        );

        if manifest.generate_vapid_keys {
            match (
                previous.get("VAPID_PUBLIC_KEY"),
                previous.get("VAPID_PRIVATE_KEY"),
            ) {
                (Some(public), Some(private)) => {
                    env.insert("VAPID_PUBLIC_KEY".to_string(), public.clone());
                    env.insert("VAPID_PRIVATE_KEY".to_string(), private.clone());
                }
                _ => {
                    let (public, private) = SecretStore::generate_vapid_keys();
                    env.insert("VAPID_PUBLIC_KEY".to_string(), public);
                    env.insert("VAPID_PRIVATE_KEY".to_string(), private);
                }
            }
        }

        for field in &manifest.form_fields {
            let key = &field.env_variable;
            match config.get(key).filter(|v| !v.is_null()) {
                Some(value) => {
                    env.insert(key.clone(), form_value_to_string(key, value)?);
                }
                None if field.field_type == FieldType::Random => {
                    let value = match previous.get(key) {
                        Some(existing) => existing.clone(),
                        None => {
                            let length = field.min.unwrap_or(DEFAULT_RANDOM_FIELD_LENGTH);
                            // Scope the label by app so two apps sharing a
                            // field name never share a secret
                            self.secrets.derive(&format!("{}:{}", app_id, key), length)
                        }
                    };
                    env.insert(key.clone(), value);
                }
                None if field.required => {
                    return Err(Error::MissingField(key.clone()));
                }
                None => {}
            }
        }

        match (exposed, domain) {
            (true, Some(domain)) => {
                env.insert("APP_EXPOSED".to_string(), "true".to_string());
                env.insert("APP_DOMAIN".to_string(), domain.to_string());
                env.insert("APP_HOST".to_string(), domain.to_string());
                env.insert("APP_PROTOCOL".to_string(), "https".to_string());
            }
            _ => {
                env.insert("APP_EXPOSED".to_string(), "false".to_string());
                env.insert(
                    "APP_DOMAIN".to_string(),
                    format!("{}:{}", self.settings.internal_ip, manifest.port),
                );
                env.insert("APP_HOST".to_string(), self.settings.internal_ip.clone());
                env.insert("APP_PROTOCOL".to_string(), "http".to_string());
            }
        }

        std::fs::create_dir_all(self.settings.app_data_for(app_id))?;
        write_env_file(&env_path, &env)?;
        debug!("Generated env file for {} ({} entries)", app_id, env.len());
        Ok(env)
    }
}

fn form_value_to_string(key: &str, value: &serde_json::Value) -> Result<String> {
    match value {
        serde_json::Value::String(s) => Ok(s.clone()),
        serde_json::Value::Bool(b) => Ok(b.to_string()),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        _ => Err(Error::config(format!(
            "Unsupported value for field {}: {}",
            key, value
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use homestack_core::FormField;
    use tempfile::tempdir;

    fn manifest(id: &str) -> Manifest {
        Manifest {
            id: id.to_string(),
            name: "Test App".to_string(),
            port: 8080,
            version: "1.0".to_string(),
            revision: 1,
            exposable: true,
            force_expose: false,
            generate_vapid_keys: false,
            supported_architectures: None,
            form_fields: vec![
                FormField {
                    env_variable: "ADMIN_EMAIL".to_string(),
                    field_type: FieldType::Email,
                    label: None,
                    required: true,
                    min: None,
                    max: None,
                    options: None,
                    placeholder: None,
                },
                FormField {
                    env_variable: "DB_PASSWORD".to_string(),
                    field_type: FieldType::Random,
                    label: None,
                    required: false,
                    min: Some(24),
                    max: None,
                    options: None,
                    placeholder: None,
                },
                FormField {
                    env_variable: "EXTRA_FLAG".to_string(),
                    field_type: FieldType::Boolean,
                    label: None,
                    required: false,
                    min: None,
                    max: None,
                    options: None,
                    placeholder: None,
                },
            ],
        }
    }

    fn generator(root: &Path) -> EnvGenerator {
        EnvGenerator::with_secrets(
            Arc::new(Settings::for_root(root)),
            SecretStore::from_seed(vec![9u8; 32]),
        )
    }

    fn config_with_email() -> FormValues {
        let mut config = FormValues::new();
        config.insert("ADMIN_EMAIL".to_string(), "admin@example.com".into());
        config
    }

    #[test]
    fn test_generate_basics() {
        let dir = tempdir().unwrap();
        let gen = generator(dir.path());

        let env = gen
            .generate(&manifest("testapp"), &config_with_email(), false, None)
            .unwrap();

        assert_eq!(env.get("APP_ID").unwrap(), "testapp");
        assert_eq!(env.get("APP_PORT").unwrap(), "8080");
        assert_eq!(env.get("ADMIN_EMAIL").unwrap(), "admin@example.com");
        assert_eq!(env.get("APP_EXPOSED").unwrap(), "false");
        assert_eq!(env.get("APP_DOMAIN").unwrap(), "127.0.0.1:8080");
        assert_eq!(env.get("DB_PASSWORD").unwrap().len(), 24);
        // Optional field without a value stays out of the env
        assert!(!env.contains_key("EXTRA_FLAG"));

        let on_disk = read_env_file(&Settings::for_root(dir.path()).env_file("testapp")).unwrap();
        assert_eq!(on_disk, env);
    }

    #[test]
    fn test_generate_is_idempotent() {
        let dir = tempdir().unwrap();
        let gen = generator(dir.path());
        let m = manifest("testapp");

        let first = gen.generate(&m, &config_with_email(), false, None).unwrap();
        let second = gen.generate(&m, &config_with_email(), false, None).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_random_field_survives_existing_env() {
        let dir = tempdir().unwrap();
        let settings = Settings::for_root(dir.path());
        // A value generated by an earlier version of the env file
        let mut previous = EnvMap::new();
        previous.insert("DB_PASSWORD".to_string(), "legacy-value".to_string());
        write_env_file(&settings.env_file("testapp"), &previous).unwrap();

        let gen = generator(dir.path());
        let env = gen
            .generate(&manifest("testapp"), &config_with_email(), false, None)
            .unwrap();
        assert_eq!(env.get("DB_PASSWORD").unwrap(), "legacy-value");
    }

    #[test]
    fn test_explicit_false_wins() {
        let dir = tempdir().unwrap();
        let gen = generator(dir.path());

        let mut config = config_with_email();
        config.insert("EXTRA_FLAG".to_string(), false.into());
        let env = gen
            .generate(&manifest("testapp"), &config, false, None)
            .unwrap();
        assert_eq!(env.get("EXTRA_FLAG").unwrap(), "false");
    }

    #[test]
    fn test_missing_required_field() {
        let dir = tempdir().unwrap();
        let gen = generator(dir.path());

        let err = gen
            .generate(&manifest("testapp"), &FormValues::new(), false, None)
            .unwrap_err();
        match err {
            Error::MissingField(field) => assert_eq!(field, "ADMIN_EMAIL"),
            other => panic!("Expected MissingField, got {:?}", other),
        }
    }

    #[test]
    fn test_exposed_env() {
        let dir = tempdir().unwrap();
        let gen = generator(dir.path());

        let env = gen
            .generate(
                &manifest("testapp"),
                &config_with_email(),
                true,
                Some("cloud.example.com"),
            )
            .unwrap();
        assert_eq!(env.get("APP_EXPOSED").unwrap(), "true");
        assert_eq!(env.get("APP_DOMAIN").unwrap(), "cloud.example.com");
        assert_eq!(env.get("APP_HOST").unwrap(), "cloud.example.com");
        assert_eq!(env.get("APP_PROTOCOL").unwrap(), "https");
    }

    #[test]
    fn test_vapid_keys_generated_once() {
        let dir = tempdir().unwrap();
        let gen = generator(dir.path());
        let mut m = manifest("testapp");
        m.generate_vapid_keys = true;

        let first = gen.generate(&m, &config_with_email(), false, None).unwrap();
        let second = gen.generate(&m, &config_with_email(), false, None).unwrap();
        assert!(first.contains_key("VAPID_PUBLIC_KEY"));
        assert_eq!(
            first.get("VAPID_PRIVATE_KEY"),
            second.get("VAPID_PRIVATE_KEY")
        );
    }

    #[test]
    fn test_random_labels_scoped_per_app() {
        let dir = tempdir().unwrap();
        let gen = generator(dir.path());

        let env_a = gen
            .generate(&manifest("app-a"), &config_with_email(), false, None)
            .unwrap();
        let env_b = gen
            .generate(&manifest("app-b"), &config_with_email(), false, None)
            .unwrap();
        assert_ne!(env_a.get("DB_PASSWORD"), env_b.get("DB_PASSWORD"));
    }

    #[test]
    fn test_read_env_file_parsing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.env");
        std::fs::write(
            &path,
            "# comment\nAPP_ID=testapp\nQUOTED=\"hello world\"\n\nEMPTY=\n",
        )
        .unwrap();

        let env = read_env_file(&path).unwrap();
        assert_eq!(env.get("APP_ID").unwrap(), "testapp");
        assert_eq!(env.get("QUOTED").unwrap(), "hello world");
        assert_eq!(env.get("EMPTY").unwrap(), "");
        assert!(!env.contains_key("# comment"));
    }
}
