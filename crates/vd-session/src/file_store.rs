use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use fs2::FileExt;
use tokio::fs;
use tokio::sync::RwLock;

use crate::crypto::{self, EncryptedBlob, EncryptionKey};
use crate::data::SessionData;
use crate::errors::{Result, SessionError};
use crate::store::SessionStore;

/// File-based encrypted session store.
///
/// Sessions must survive process restart (they last up to 30 days), so each
/// row lives in its own file with the payload encrypted under the store key
/// and the session id bound in as AAD.
///
/// # Directory Structure
/// ```text
/// <storage_dir>/
/// ├── meta.json              # Key derivation metadata (see KeyManager)
/// ├── lock                   # Advisory lock file
/// └── sessions/
///     ├── <session-id>.json  # {expires_at, payload: EncryptedBlob}
///     └── ...
/// ```
#[derive(Debug)]
pub struct FileSessionStore {
    sessions_dir: PathBuf,
    lock_file: PathBuf,
    encryption: EncryptionKey,
    /// In-memory cache for recently accessed rows
    cache: Arc<RwLock<HashMap<String, CachedRow>>>,
}

#[derive(Debug, Clone)]
struct CachedRow {
    data: SessionData,
    expires_at: DateTime<Utc>,
}

/// On-disk row shape; `expires_at` stays in the clear so the TTL sweep can
/// run without decrypting payloads
#[derive(serde::Serialize, serde::Deserialize)]
struct DiskRow {
    expires_at: DateTime<Utc>,
    payload: EncryptedBlob,
}

const LOCK_RETRY_DELAY: std::time::Duration = std::time::Duration::from_millis(50);
const LOCK_MAX_WAIT: std::time::Duration = std::time::Duration::from_secs(5);

impl FileSessionStore {
    /// Create a store rooted at `storage_dir`, creating directories with
    /// owner-only permissions.
    pub async fn new(storage_dir: impl AsRef<Path>, encryption: EncryptionKey) -> Result<Self> {
        let storage_dir = storage_dir.as_ref().to_path_buf();
        let sessions_dir = storage_dir.join("sessions");
        let lock_file = storage_dir.join("lock");

        fs::create_dir_all(&storage_dir).await?;
        fs::create_dir_all(&sessions_dir).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o700);
            std::fs::set_permissions(&storage_dir, perms.clone())?;
            std::fs::set_permissions(&sessions_dir, perms)?;
        }

        Ok(Self {
            sessions_dir,
            lock_file,
            encryption,
            cache: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// Default storage directory for the current platform
    pub fn default_storage_dir() -> Result<PathBuf> {
        let project_dirs =
            directories::ProjectDirs::from("", "", "valdash").ok_or(SessionError::NoStorageDir)?;
        Ok(project_dirs.config_dir().join("session-store"))
    }

    fn session_path(&self, session_id: &str) -> PathBuf {
        self.sessions_dir.join(format!("{}.json", session_id))
    }

    /// Acquire the advisory lock. Writers therefore serialize and the last
    /// write wins.
    ///
    /// The guard stays held across the awaits of a single small file write,
    /// so contenders must not park the runtime thread in a blocking flock:
    /// they poll `try_lock_exclusive` and yield to the executor between
    /// attempts, letting the current holder resume and release.
    async fn acquire_lock(&self) -> Result<std::fs::File> {
        let lock_file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&self.lock_file)?;

        let deadline = std::time::Instant::now() + LOCK_MAX_WAIT;
        loop {
            match lock_file.try_lock_exclusive() {
                Ok(()) => return Ok(lock_file),
                Err(e) if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => {
                    if std::time::Instant::now() >= deadline {
                        return Err(SessionError::LockTimeout);
                    }
                    tokio::time::sleep(LOCK_RETRY_DELAY).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn load_from_disk(&self, session_id: &str) -> Result<Option<CachedRow>> {
        let path = self.session_path(session_id);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path).await?;
        let row: DiskRow = serde_json::from_str(&content)
            .map_err(|e| SessionError::Crypto(format!("Invalid session row: {}", e)))?;

        let plaintext = crypto::decrypt(&self.encryption, &row.payload, session_id)?;
        let data: SessionData = serde_json::from_slice(&plaintext)
            .map_err(|e| SessionError::Crypto(format!("Invalid session data: {}", e)))?;

        Ok(Some(CachedRow {
            data,
            expires_at: row.expires_at,
        }))
    }

    async fn save_to_disk(
        &self,
        session_id: &str,
        data: &SessionData,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let path = self.session_path(session_id);

        let plaintext = serde_json::to_vec(data)?;
        let payload = crypto::encrypt(&self.encryption, &plaintext, session_id)?;
        let row_json = serde_json::to_string_pretty(&DiskRow {
            expires_at,
            payload,
        })?;

        // Atomic write: temp file, sync, rename
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, row_json).await?;
        let file = std::fs::File::open(&temp_path)?;
        file.sync_all()?;
        fs::rename(&temp_path, &path).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&path, perms)?;
        }

        Ok(())
    }

    async fn remove_row(&self, session_id: &str) -> Result<()> {
        let path = self.session_path(session_id);
        if path.exists() {
            fs::remove_file(&path).await?;
        }
        self.cache.write().await.remove(session_id);
        Ok(())
    }
}

/// Generated ids are base64url; anything else never touches the filesystem
fn valid_session_id(session_id: &str) -> bool {
    !session_id.is_empty()
        && session_id.len() <= 64
        && session_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'))
}

#[async_trait::async_trait]
impl SessionStore for FileSessionStore {
    async fn save(
        &self,
        session_id: &str,
        data: &SessionData,
        max_age: chrono::Duration,
    ) -> Result<()> {
        if !valid_session_id(session_id) {
            return Err(SessionError::InvalidSessionId);
        }

        let _lock = self.acquire_lock().await?;
        let expires_at = Utc::now() + max_age;
        self.save_to_disk(session_id, data, expires_at).await?;

        self.cache.write().await.insert(
            session_id.to_string(),
            CachedRow {
                data: data.clone(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn get(&self, session_id: &str) -> Option<SessionData> {
        if !valid_session_id(session_id) {
            return None;
        }

        {
            let cache = self.cache.read().await;
            if let Some(row) = cache.get(session_id) {
                if row.expires_at > Utc::now() {
                    return Some(row.data.clone());
                }
            }
        }

        match self.load_from_disk(session_id).await {
            Ok(Some(row)) if row.expires_at > Utc::now() => {
                self.cache
                    .write()
                    .await
                    .insert(session_id.to_string(), row.clone());
                Some(row.data)
            }
            Ok(Some(_)) => {
                // Lazy expiry: the row dies on first read past its TTL
                if let Err(e) = self.remove_row(session_id).await {
                    tracing::warn!("Failed to delete expired session {}: {}", session_id, e);
                }
                None
            }
            Ok(None) => {
                self.cache.write().await.remove(session_id);
                None
            }
            Err(e) => {
                tracing::error!("Failed to load session {}: {}", session_id, e);
                None
            }
        }
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        if !valid_session_id(session_id) {
            return Ok(());
        }
        let _lock = self.acquire_lock().await?;
        self.remove_row(session_id).await
    }

    async fn cleanup_expired(&self) -> Result<usize> {
        let _lock = self.acquire_lock().await?;
        let mut removed = 0;

        let mut entries = fs::read_dir(&self.sessions_dir).await?;
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }

            let content = match fs::read_to_string(&path).await {
                Ok(content) => content,
                Err(_) => continue,
            };
            let row: DiskRow = match serde_json::from_str(&content) {
                Ok(row) => row,
                Err(e) => {
                    tracing::warn!("Skipping unreadable session row {:?}: {}", path, e);
                    continue;
                }
            };

            if row.expires_at <= Utc::now() && fs::remove_file(&path).await.is_ok() {
                removed += 1;
            }
        }

        self.cache
            .write()
            .await
            .retain(|_, row| row.expires_at > Utc::now());

        Ok(removed)
    }
}
