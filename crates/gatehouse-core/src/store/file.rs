// # File Provider
//
// Durable file-backed implementation of Provider.
//
// ## Durability
//
// Both keyspaces live in one JSON document at a configurable path.
// Every mutation rewrites the document with write-then-rename, so a
// crash never leaves a half-written file behind, and a `.backup` of the
// last known good document is kept for corruption recovery. Committed
// writes survive process restart.
//
// ## Locking
//
// The store is a single process-wide resource. `initialize_database`
// takes an exclusive `.lock` file next to the document, waiting a
// bounded time before giving up, so two processes cannot mutate the
// same document. In-process, one RwLock linearizes all operations; a
// mutation holds the write guard across the file rewrite.
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "users": { "5e8848": { ... } },
//   "acls": { "203.0.113.5": { ... } }
// }
// ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};

use crate::entity::{Acl, User};
use crate::error::{Error, Result};
use crate::store::{ip_key, validate_id, validate_user};
use crate::traits::Provider;

/// Document format version, kept for future migration
const DOCUMENT_VERSION: &str = "1.0";

/// How long to wait for the exclusive lock file before giving up
const LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Poll interval while waiting for the lock file
const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(250);

/// Durable file-backed provider
pub struct FileProvider {
    path: PathBuf,
    state: Arc<RwLock<Keyspaces>>,
    lock: Mutex<Option<LockFile>>,
}

#[derive(Debug, Default)]
struct Keyspaces {
    users: HashMap<String, User>,
    acls: HashMap<String, Acl>,
}

/// Serializable document layout
#[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
struct DocumentFormat {
    version: String,
    #[serde(default)]
    users: HashMap<String, User>,
    #[serde(default)]
    acls: HashMap<String, Acl>,
}

/// Exclusive lock file, removed again on drop
#[derive(Debug)]
struct LockFile {
    path: PathBuf,
}

impl Drop for LockFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!("failed to remove lock file {}: {}", self.path.display(), e);
        }
    }
}

impl FileProvider {
    /// Create a provider for the document at `path`.
    ///
    /// No I/O happens here; call [`Provider::initialize_database`]
    /// before any other operation.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            state: Arc::new(RwLock::new(Keyspaces::default())),
            lock: Mutex::new(None),
        }
    }

    /// Acquire the exclusive lock file, waiting up to [`LOCK_TIMEOUT`].
    async fn acquire_lock(&self) -> Result<LockFile> {
        let lock_path = {
            let mut p = self.path.clone();
            p.set_extension("lock");
            p
        };

        let deadline = tokio::time::Instant::now() + LOCK_TIMEOUT;
        loop {
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&lock_path)
                .await
            {
                Ok(_) => {
                    return Ok(LockFile { path: lock_path });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if tokio::time::Instant::now() >= deadline {
                        return Err(Error::storage(format!(
                            "timed out waiting for lock file {}",
                            lock_path.display()
                        )));
                    }
                    tokio::time::sleep(LOCK_RETRY_INTERVAL).await;
                }
                Err(e) => {
                    return Err(Error::storage(format!(
                        "failed to create lock file {}: {}",
                        lock_path.display(),
                        e
                    )));
                }
            }
        }
    }

    /// Load the document, recovering from the backup when the main file
    /// is corrupted. A missing file yields an empty document.
    async fn load_with_recovery(path: &Path) -> Result<DocumentFormat> {
        match Self::load(path).await {
            Ok(doc) => Ok(doc),
            Err(Error::Json(e)) => {
                tracing::warn!(
                    "store file appears corrupted: {}. attempting recovery from backup",
                    e
                );
                let backup = Self::backup_path(path);
                if !backup.exists() {
                    tracing::warn!("no backup file found, starting with an empty store");
                    return Ok(DocumentFormat::default());
                }
                match Self::load(&backup).await {
                    Ok(doc) => {
                        tracing::info!(
                            "recovered store from backup: {} user(s), {} acl(s)",
                            doc.users.len(),
                            doc.acls.len()
                        );
                        Ok(doc)
                    }
                    Err(backup_err) => {
                        tracing::error!(
                            "backup also unreadable: {}. starting with an empty store",
                            backup_err
                        );
                        Ok(DocumentFormat::default())
                    }
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn load(path: &Path) -> Result<DocumentFormat> {
        if !path.exists() {
            tracing::debug!("store file does not exist: {}", path.display());
            return Ok(DocumentFormat::default());
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            Error::storage(format!("failed to read store file {}: {}", path.display(), e))
        })?;

        let doc: DocumentFormat = serde_json::from_str(&content)?;
        if doc.version != DOCUMENT_VERSION {
            tracing::warn!(
                "store file version mismatch: expected {}, got {}. loading anyway",
                DOCUMENT_VERSION,
                doc.version
            );
        }
        Ok(doc)
    }

    /// Rewrite the document atomically while the caller holds the write
    /// guard, keeping a backup of the previous good state.
    async fn persist(&self, keyspaces: &Keyspaces) -> Result<()> {
        let doc = DocumentFormat {
            version: DOCUMENT_VERSION.to_string(),
            users: keyspaces.users.clone(),
            acls: keyspaces.acls.clone(),
        };
        let json = serde_json::to_string_pretty(&doc)?;

        let temp_path = {
            let mut p = self.path.clone();
            p.set_extension("tmp");
            p
        };
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::storage(format!(
                    "failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            file.write_all(json.as_bytes()).await.map_err(|e| {
                Error::storage(format!(
                    "failed to write temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            file.flush().await.map_err(|e| {
                Error::storage(format!(
                    "failed to flush temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        if self.path.exists() {
            let backup = Self::backup_path(&self.path);
            if let Err(e) = fs::copy(&self.path, &backup).await {
                tracing::warn!("failed to create backup: {}", e);
            }
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::storage(format!(
                "failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::trace!("store written to {}", self.path.display());
        Ok(())
    }

    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }
}

#[async_trait]
impl Provider for FileProvider {
    async fn initialize_database(&self) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::storage(format!(
                    "failed to create store directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let lock_file = self.acquire_lock().await?;
        let doc = Self::load_with_recovery(&self.path).await?;
        tracing::info!(
            "file store opened: {} user(s), {} acl(s)",
            doc.users.len(),
            doc.acls.len()
        );

        let mut guard = self.state.write().await;
        guard.users = doc.users;
        guard.acls = doc.acls;
        *self.lock.lock().await = Some(lock_file);
        Ok(())
    }

    async fn check_availability(&self) -> Result<()> {
        if self.lock.lock().await.is_none() {
            return Err(Error::storage("store has not been initialized"));
        }
        Ok(())
    }

    async fn add_ip(&self, ip: &str, acl: &Acl) -> Result<()> {
        let key = ip_key(ip)?;
        let mut guard = self.state.write().await;
        guard.acls.insert(key, acl.clone());
        self.persist(&guard).await
    }

    async fn remove_ip(&self, ip: &str) -> Result<()> {
        let key = ip_key(ip)?;
        let mut guard = self.state.write().await;
        if guard.acls.remove(&key).is_some() {
            self.persist(&guard).await?;
        }
        Ok(())
    }

    async fn get_acl(&self, ip: &str) -> Result<Option<Acl>> {
        let key = ip_key(ip)?;
        {
            let guard = self.state.read().await;
            match guard.acls.get(&key) {
                None => return Ok(None),
                Some(acl) if !acl.is_expired() => return Ok(Some(acl.clone())),
                Some(_) => {}
            }
        }

        // expired: remove the record as a side effect of the read. The
        // entry may have been replaced between the guards, so re-check
        // expiry before deleting.
        let mut guard = self.state.write().await;
        match guard.acls.get(&key) {
            Some(acl) if acl.is_expired() => {
                tracing::info!(ip = %key, "ACL TTL has expired, removing from store");
                guard.acls.remove(&key);
                self.persist(&guard).await?;
                Ok(None)
            }
            found => Ok(found.cloned()),
        }
    }

    async fn update_acl(&self, ip: &str, acl: &Acl) -> Result<()> {
        let key = ip_key(ip)?;
        let mut guard = self.state.write().await;
        match guard.acls.get(&key) {
            Some(existing) if !existing.is_expired() => {
                guard.acls.insert(key, acl.clone());
                self.persist(&guard).await
            }
            Some(_) => {
                guard.acls.remove(&key);
                self.persist(&guard).await?;
                Err(Error::AclNotFound(key))
            }
            None => Err(Error::AclNotFound(key)),
        }
    }

    async fn add_user(&self, user: &User) -> Result<()> {
        validate_user(user)?;
        let mut guard = self.state.write().await;
        if guard.users.contains_key(&user.id) {
            return Err(Error::UserExists);
        }
        guard.users.insert(user.id.clone(), user.clone());
        self.persist(&guard).await
    }

    async fn remove_user(&self, user: &User) -> Result<()> {
        validate_user(user)?;
        let mut guard = self.state.write().await;
        if guard.users.remove(&user.id).is_some() {
            self.persist(&guard).await?;
        }
        Ok(())
    }

    async fn get_user(&self, id: &str) -> Result<Option<User>> {
        validate_id(id)?;
        let guard = self.state.read().await;
        Ok(guard.users.get(id).cloned())
    }

    async fn update_user(&self, user: &User) -> Result<()> {
        validate_user(user)?;
        let mut guard = self.state.write().await;
        let Some(existing) = guard.users.get(&user.id) else {
            return Err(Error::UserNotFound);
        };
        // keep the stored audit trail, never the caller's copy
        let mut updated = user.clone();
        updated.ips = existing.ips.clone();
        guard.users.insert(updated.id.clone(), updated);
        self.persist(&guard).await
    }

    async fn append_user_ip(&self, id: &str, ip: &str) -> Result<()> {
        validate_id(id)?;
        let key = ip_key(ip)?;
        let mut guard = self.state.write().await;
        let Some(user) = guard.users.get_mut(id) else {
            return Err(Error::UserNotFound);
        };
        if user.contains_ip(&key) {
            return Ok(());
        }
        user.add_ip(&key)?;
        self.persist(&guard).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};
    use tempfile::tempdir;

    async fn open(path: &Path) -> FileProvider {
        let provider = FileProvider::new(path);
        provider.initialize_database().await.unwrap();
        provider
    }

    #[tokio::test]
    async fn writes_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");

        let user = User::new("hunter2", "persisted").unwrap();
        let mut acl = Acl::default();
        acl.add_host("git.example.com").unwrap();

        {
            let provider = open(&path).await;
            provider.add_user(&user).await.unwrap();
            provider.add_ip("203.0.113.5", &acl).await.unwrap();
        }

        let provider = open(&path).await;
        assert_eq!(provider.get_user(&user.id).await.unwrap(), Some(user));
        assert_eq!(
            provider.get_acl("203.0.113.5").await.unwrap(),
            Some(acl)
        );
    }

    #[tokio::test]
    async fn expired_acl_removal_is_durable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");

        {
            let provider = open(&path).await;
            let acl = Acl {
                ttl: Some(Utc::now() - ChronoDuration::minutes(5)),
                ..Default::default()
            };
            provider.add_ip("203.0.113.5", &acl).await.unwrap();
            assert_eq!(provider.get_acl("203.0.113.5").await.unwrap(), None);
        }

        // the deletion hit the disk, not just the in-memory image
        let provider = open(&path).await;
        assert_eq!(provider.get_acl("203.0.113.5").await.unwrap(), None);
    }

    #[tokio::test]
    async fn fresh_grant_survives_racing_expiry_removal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        let provider = Arc::new(open(&path).await);

        let expired = Acl {
            ttl: Some(Utc::now() - ChronoDuration::minutes(5)),
            ..Default::default()
        };
        let fresh = Acl {
            allow_all: true,
            ..Default::default()
        };

        // race the expiry-triggered delete against an upsert of a fresh
        // grant for the same IP; the fresh grant must never be lost
        for _ in 0..50 {
            provider.add_ip("203.0.113.5", &expired).await.unwrap();

            let reader = Arc::clone(&provider);
            let writer = Arc::clone(&provider);
            let fresh_acl = fresh.clone();
            let (read, written) = tokio::join!(
                tokio::spawn(async move { reader.get_acl("203.0.113.5").await }),
                tokio::spawn(async move { writer.add_ip("203.0.113.5", &fresh_acl).await }),
            );
            read.unwrap().unwrap();
            written.unwrap().unwrap();

            assert_eq!(
                provider.get_acl("203.0.113.5").await.unwrap(),
                Some(fresh.clone())
            );
        }
    }

    #[tokio::test]
    async fn corrupted_file_recovers_from_backup() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");

        let user = User::new("hunter2", "").unwrap();
        {
            let provider = open(&path).await;
            provider.add_user(&user).await.unwrap();
            // second write creates the backup of the first good state
            provider.add_ip("203.0.113.5", &Acl::default()).await.unwrap();
        }

        fs::write(&path, b"corrupted json data").await.unwrap();

        let provider = open(&path).await;
        assert_eq!(provider.get_user(&user.id).await.unwrap(), Some(user));
    }

    #[tokio::test]
    async fn lock_file_blocks_second_instance() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");

        let first = open(&path).await;

        let second = FileProvider::new(&path);
        let result = tokio::time::timeout(
            std::time::Duration::from_secs(10),
            second.initialize_database(),
        )
        .await
        .expect("lock acquisition must give up within its bounded wait");
        assert!(matches!(result, Err(Error::Storage(_))));

        drop(first);
        // lock released on drop, a new instance can initialize
        let third = FileProvider::new(&path);
        third.initialize_database().await.unwrap();
    }

    #[tokio::test]
    async fn duplicate_user_and_missing_update_errors() {
        let dir = tempdir().unwrap();
        let provider = open(&dir.path().join("store.json")).await;

        let user = User::new("hunter2", "").unwrap();
        provider.add_user(&user).await.unwrap();
        assert!(matches!(
            provider.add_user(&user).await,
            Err(Error::UserExists)
        ));

        let stranger = User::new("another-secret", "").unwrap();
        assert!(matches!(
            provider.update_user(&stranger).await,
            Err(Error::UserNotFound)
        ));
    }

    #[tokio::test]
    async fn update_user_preserves_audit_trail_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");

        let mut user = User::new("hunter2", "").unwrap();
        user.add_ip("203.0.113.5").unwrap();
        {
            let provider = open(&path).await;
            provider.add_user(&user).await.unwrap();

            let mut modified = user.clone();
            modified.ips = vec!["198.51.100.99".to_string()];
            modified.ttl_minutes = 15;
            provider.update_user(&modified).await.unwrap();
        }

        let provider = open(&path).await;
        let stored = provider.get_user(&user.id).await.unwrap().unwrap();
        assert_eq!(stored.ttl_minutes, 15);
        assert_eq!(stored.ips, vec!["203.0.113.5"]);
    }
}
