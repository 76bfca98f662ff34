use std::path::Path;

use argon2::{Algorithm, Argon2, Params, Version};
use base64::{Engine, engine::general_purpose::STANDARD};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tokio::fs;
use zeroize::Zeroize;

use crate::crypto::{EncryptionKey, SigningKey};
use crate::errors::{Result, SessionError};

const SALT_LEN: usize = 32;

/// Metadata for key derivation, persisted next to the session store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyMeta {
    pub version: u32,
    pub created_at: chrono::DateTime<chrono::Utc>,
    /// Base64-encoded salt for Argon2id
    pub salt: String,
}

/// The two keys this crate needs: one signs cookie envelopes, one encrypts
/// session rows at rest.
pub struct KeyMaterial {
    signing: SigningKey,
    encryption: EncryptionKey,
}

impl KeyMaterial {
    /// Derive both keys from a deployment secret with Argon2id (m=64MB,
    /// t=3, p=1, 64-byte output split in two).
    pub fn derive(secret: &str, salt: &[u8]) -> Result<Self> {
        let params = Params::new(65536, 3, 1, Some(64))
            .map_err(|e| SessionError::Crypto(format!("Invalid Argon2 params: {}", e)))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let mut output = [0u8; 64];
        argon2
            .hash_password_into(secret.as_bytes(), salt, &mut output)
            .map_err(|e| SessionError::Crypto(format!("Key derivation failed: {}", e)))?;

        let mut signing = [0u8; 32];
        signing.copy_from_slice(&output[..32]);
        let mut encryption = [0u8; 32];
        encryption.copy_from_slice(&output[32..]);
        output.zeroize();

        Ok(Self {
            signing: SigningKey::from_bytes(signing),
            encryption: EncryptionKey::from_bytes(encryption),
        })
    }

    /// Random keys, for tests and throwaway deployments
    pub fn generate() -> Self {
        Self {
            signing: SigningKey::generate(),
            encryption: EncryptionKey::generate(),
        }
    }

    pub fn signing(&self) -> &SigningKey {
        &self.signing
    }

    pub fn encryption(&self) -> &EncryptionKey {
        &self.encryption
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("KeyMaterial([REDACTED])")
    }
}

/// Loads or initializes the persisted salt and derives [`KeyMaterial`].
///
/// The salt lives in `meta.json` inside the storage directory so the same
/// secret re-derives the same keys across restarts.
pub struct KeyManager {
    meta: KeyMeta,
    material: KeyMaterial,
}

impl KeyManager {
    pub async fn load_or_init(storage_dir: &Path, secret: &str) -> Result<Self> {
        fs::create_dir_all(storage_dir).await?;
        let meta_path = storage_dir.join("meta.json");

        let meta: KeyMeta = if meta_path.exists() {
            let content = fs::read_to_string(&meta_path).await?;
            serde_json::from_str(&content)
                .map_err(|e| SessionError::Crypto(format!("Invalid meta.json: {}", e)))?
        } else {
            let mut salt = vec![0u8; SALT_LEN];
            rand::rngs::OsRng.fill_bytes(&mut salt);
            let meta = KeyMeta {
                version: 1,
                created_at: chrono::Utc::now(),
                salt: STANDARD.encode(&salt),
            };
            let meta_json = serde_json::to_string_pretty(&meta)?;
            fs::write(&meta_path, meta_json).await?;
            meta
        };

        let salt = STANDARD
            .decode(&meta.salt)
            .map_err(|_| SessionError::CorruptedStore)?;
        let material = KeyMaterial::derive(secret, &salt)?;

        Ok(Self { meta, material })
    }

    pub fn material(&self) -> &KeyMaterial {
        &self.material
    }

    pub fn meta(&self) -> &KeyMeta {
        &self.meta
    }
}

impl std::fmt::Debug for KeyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyManager")
            .field("meta", &self.meta)
            .field("material", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn derivation_is_deterministic_per_salt() {
        let salt_a = [1u8; 32];
        let salt_b = [2u8; 32];

        let first = KeyMaterial::derive("secret", &salt_a).unwrap();
        let second = KeyMaterial::derive("secret", &salt_a).unwrap();
        let other = KeyMaterial::derive("secret", &salt_b).unwrap();

        assert_eq!(first.signing().as_bytes(), second.signing().as_bytes());
        assert_eq!(
            first.encryption().as_bytes(),
            second.encryption().as_bytes()
        );
        assert_ne!(first.signing().as_bytes(), other.signing().as_bytes());
    }

    #[test]
    fn signing_and_encryption_keys_differ() {
        let material = KeyMaterial::derive("secret", &[3u8; 32]).unwrap();
        assert_ne!(
            material.signing().as_bytes(),
            material.encryption().as_bytes()
        );
    }

    #[tokio::test]
    async fn manager_persists_salt_across_loads() {
        let temp = TempDir::new().unwrap();

        let first = KeyManager::load_or_init(temp.path(), "secret").await.unwrap();
        let second = KeyManager::load_or_init(temp.path(), "secret").await.unwrap();

        assert_eq!(first.meta().salt, second.meta().salt);
        assert_eq!(
            first.material().signing().as_bytes(),
            second.material().signing().as_bytes()
        );
    }
}
