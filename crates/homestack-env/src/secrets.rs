//! Deterministic secret derivation
//!
//! One cryptographically random seed is generated on first use and persisted
//! with owner-only permissions; every derived secret is
//! `hex(HMAC-SHA256(seed, label))` truncated to the requested length. The
//! derived values are reproducible without being persisted themselves and
//! unguessable without the seed file. The seed is never rotated here.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use std::path::Path;
use tracing::info;

use homestack_core::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// Number of raw seed bytes
const SEED_LEN: usize = 32;

/// Holds the loaded seed and derives secrets from it
pub struct SecretStore {
    seed: Vec<u8>,
}

impl SecretStore {
    /// Load the seed file, creating it on first use
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let seed = from_hex(content.trim())
                .ok_or_else(|| Error::config(format!("Corrupt seed file: {}", path.display())))?;
            return Ok(Self { seed });
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut seed = vec![0u8; SEED_LEN];
        rand::rngs::OsRng.fill_bytes(&mut seed);
        std::fs::write(path, to_hex(&seed))?;

        // The seed is the root of all derived secrets; owner-only access
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        info!("Generated new secret seed at {}", path.display());
        Ok(Self { seed })
    }

    /// Build a store from raw seed bytes (tests)
    pub fn from_seed(seed: Vec<u8>) -> Self {
        Self { seed }
    }

    /// Derive a reproducible secret for a label, truncated to `length` hex chars
    pub fn derive(&self, label: &str, length: usize) -> String {
        let mut mac =
            HmacSha256::new_from_slice(&self.seed).expect("HMAC can take key of any size");
        mac.update(label.as_bytes());
        let digest = mac.finalize().into_bytes();

        let mut hex = to_hex(&digest);
        hex.truncate(length);
        hex
    }

    /// Generate a fresh VAPID key pair, base64url-encoded.
    /// Pairs are persisted via the env file and reused on regeneration.
    pub fn generate_vapid_keys() -> (String, String) {
        let mut public = [0u8; 65];
        let mut private = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut public);
        rand::rngs::OsRng.fill_bytes(&mut private);
        (
            URL_SAFE_NO_PAD.encode(public),
            URL_SAFE_NO_PAD.encode(private),
        )
    }
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn from_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}
