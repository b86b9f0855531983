/// Key Management Module
///
/// Generates, stores and loads the secp256k1 signing keypair used by the bridge transport's
/// key-pair authentication mode (§4.1, §6). Keys are stored as a pair of files per name: a
/// binary secret-key file and a JSON metadata sidecar, mirroring how the bridge transport's
/// own request-signing identity is meant to be reused across runs rather than regenerated
/// per request.
use chrono::{DateTime, Local};
use secp256k1::{PublicKey, Secp256k1, SecretKey};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{DfsError, DfsResult};

/// Metadata about a signing key pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyInfo {
    pub name: String,
    pub created: DateTime<Local>,
    pub public_key_hex: String,
}

/// Holds a secret key and its metadata.
#[derive(Debug, Clone)]
pub struct KeyManager {
    pub secret: SecretKey,
    pub public: PublicKey,
    pub info: KeyInfo,
}

impl KeyManager {
    pub fn new(secret: SecretKey, name: String) -> Self {
        let secp = Secp256k1::new();
        let public = PublicKey::from_secret_key(&secp, &secret);
        let info = KeyInfo {
            name,
            created: Local::now(),
            public_key_hex: hex::encode(public.serialize()),
        };

        Self {
            secret,
            public,
            info,
        }
    }

    /// Generate a fresh random key pair.
    pub fn generate(name: String) -> Self {
        let secp = Secp256k1::new();
        let (secret, public) = secp.generate_keypair(&mut rand::thread_rng());
        let info = KeyInfo {
            name,
            created: Local::now(),
            public_key_hex: hex::encode(public.serialize()),
        };
        Self {
            secret,
            public,
            info,
        }
    }

    pub fn save_to_file(&self, keys_dir: &Path) -> DfsResult<()> {
        fs::create_dir_all(keys_dir)?;

        let key_file = keys_dir.join(format!("{}.key", self.info.name));
        let info_file = keys_dir.join(format!("{}.info", self.info.name));

        fs::write(&key_file, self.secret.secret_bytes())?;

        let info_json = serde_json::to_string_pretty(&self.info)?;
        fs::write(&info_file, info_json)?;

        Ok(())
    }

    pub fn load_from_file(keys_dir: &Path, name: &str) -> DfsResult<Self> {
        let key_file = keys_dir.join(format!("{}.key", name));
        let info_file = keys_dir.join(format!("{}.info", name));

        let key_bytes = fs::read(&key_file)?;
        let secret = SecretKey::from_slice(&key_bytes)
            .map_err(|e| DfsError::Crypto(format!("invalid secret key: {}", e)))?;

        let info_json = fs::read_to_string(&info_file)?;
        let info: KeyInfo = serde_json::from_str(&info_json)?;

        let secp = Secp256k1::new();
        let public = PublicKey::from_secret_key(&secp, &secret);

        Ok(Self {
            secret,
            public,
            info,
        })
    }

    pub fn list_keys(keys_dir: &Path) -> DfsResult<Vec<String>> {
        if !keys_dir.exists() {
            return Ok(Vec::new());
        }

        let mut key_names = Vec::new();
        for entry in fs::read_dir(keys_dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().map_or(false, |ext| ext == "key") {
                if let Some(stem) = path.file_stem() {
                    if let Some(name) = stem.to_str() {
                        let info_file = keys_dir.join(format!("{}.info", name));
                        if info_file.exists() {
                            key_names.push(name.to_string());
                        }
                    }
                }
            }
        }

        Ok(key_names)
    }

    /// Hex-encoded secp256k1 public key, as sent in the `x-pubkey` header (§4.1).
    pub fn public_key_hex(&self) -> &str {
        &self.info.public_key_hex
    }
}

pub fn get_default_keys_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".bridgefs").join("keys"))
        .unwrap_or_else(|| PathBuf::from("./keys"))
}

fn generate_default_key_name() -> String {
    let now = Local::now();
    format!("bridgefs_key_{}", now.format("%Y%m%d_%H%M%S"))
}

/// Load the named key if it exists, or generate and persist a new one under `keys_dir`.
pub fn load_or_generate(keys_dir: &Path, name: Option<&str>) -> DfsResult<KeyManager> {
    if let Some(name) = name {
        if let Ok(manager) = KeyManager::load_from_file(keys_dir, name) {
            return Ok(manager);
        }
        let manager = KeyManager::generate(name.to_string());
        manager.save_to_file(keys_dir)?;
        return Ok(manager);
    }

    let existing = KeyManager::list_keys(keys_dir)?;
    if let Some(first) = existing.first() {
        return KeyManager::load_from_file(keys_dir, first);
    }

    let manager = KeyManager::generate(generate_default_key_name());
    manager.save_to_file(keys_dir)?;
    Ok(manager)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn key_round_trips_through_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let keys_dir = temp_dir.path();

        let manager = KeyManager::generate("test_key".to_string());
        manager.save_to_file(keys_dir).unwrap();

        let loaded = KeyManager::load_from_file(keys_dir, "test_key").unwrap();

        assert_eq!(manager.secret.secret_bytes(), loaded.secret.secret_bytes());
        assert_eq!(manager.info.name, loaded.info.name);
        assert_eq!(manager.info.public_key_hex, loaded.info.public_key_hex);
    }

    #[test]
    fn lists_only_keys_with_matching_info_sidecar() {
        let temp_dir = TempDir::new().unwrap();
        let keys_dir = temp_dir.path();

        let key1 = KeyManager::generate("key1".to_string());
        let key2 = KeyManager::generate("key2".to_string());

        key1.save_to_file(keys_dir).unwrap();
        key2.save_to_file(keys_dir).unwrap();

        let keys = KeyManager::list_keys(keys_dir).unwrap();
        assert_eq!(keys.len(), 2);
        assert!(keys.contains(&"key1".to_string()));
        assert!(keys.contains(&"key2".to_string()));
    }

    #[test]
    fn load_or_generate_creates_key_when_missing() {
        let temp_dir = TempDir::new().unwrap();
        let keys_dir = temp_dir.path();

        let manager = load_or_generate(keys_dir, Some("fresh")).unwrap();
        assert_eq!(manager.info.name, "fresh");
        assert!(keys_dir.join("fresh.key").exists());
    }

    #[test]
    fn load_or_generate_reuses_existing_key() {
        let temp_dir = TempDir::new().unwrap();
        let keys_dir = temp_dir.path();

        let first = load_or_generate(keys_dir, Some("stable")).unwrap();
        let second = load_or_generate(keys_dir, Some("stable")).unwrap();

        assert_eq!(first.secret.secret_bytes(), second.secret.secret_bytes());
    }
}
