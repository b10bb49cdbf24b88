//! Homestack Env - reproducible per-app environment generation
//!
//! Installs stay reproducible because every random-looking value is either
//! derived from one persisted seed or reused from the previously generated
//! env file. Regenerating with unchanged inputs yields identical bytes.

pub mod envfile;
pub mod secrets;
pub mod templates;

pub use envfile::{read_env_file, write_env_file, EnvGenerator, EnvMap};
pub use secrets::SecretStore;
pub use templates::render_data_templates;
