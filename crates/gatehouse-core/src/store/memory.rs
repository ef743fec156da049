// # Memory Provider
//
// In-memory implementation of Provider.
//
// ## Purpose
//
// Provides a fast provider with no persistence across restarts.
// Intended for tests and non-production deployments.
//
// ## Concurrency
//
// Both keyspaces live behind a single RwLock; every logical operation
// runs under one critical section, so no two operations interleave
// observably.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::entity::{Acl, User};
use crate::error::{Error, Result};
use crate::store::{ip_key, validate_id, validate_user};
use crate::traits::Provider;

/// In-memory provider implementation
#[derive(Debug, Clone, Default)]
pub struct MemoryProvider {
    inner: Arc<RwLock<Keyspaces>>,
}

#[derive(Debug, Default)]
struct Keyspaces {
    users: HashMap<String, User>,
    acls: HashMap<String, Acl>,
}

impl MemoryProvider {
    /// Create an empty memory provider
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Provider for MemoryProvider {
    async fn initialize_database(&self) -> Result<()> {
        let mut guard = self.inner.write().await;
        guard.users.clear();
        guard.acls.clear();
        tracing::info!("memory provider has been initialized");
        Ok(())
    }

    async fn check_availability(&self) -> Result<()> {
        Ok(())
    }

    async fn add_ip(&self, ip: &str, acl: &Acl) -> Result<()> {
        let key = ip_key(ip)?;
        let mut guard = self.inner.write().await;
        guard.acls.insert(key, acl.clone());
        Ok(())
    }

    async fn remove_ip(&self, ip: &str) -> Result<()> {
        let key = ip_key(ip)?;
        let mut guard = self.inner.write().await;
        guard.acls.remove(&key);
        Ok(())
    }

    async fn get_acl(&self, ip: &str) -> Result<Option<Acl>> {
        let key = ip_key(ip)?;
        let mut guard = self.inner.write().await;
        match guard.acls.get(&key) {
            Some(acl) if acl.is_expired() => {
                tracing::info!(ip = %key, "ACL TTL has expired, removing record");
                guard.acls.remove(&key);
                Ok(None)
            }
            found => Ok(found.cloned()),
        }
    }

    async fn update_acl(&self, ip: &str, acl: &Acl) -> Result<()> {
        let key = ip_key(ip)?;
        let mut guard = self.inner.write().await;
        match guard.acls.get(&key) {
            Some(existing) if !existing.is_expired() => {
                guard.acls.insert(key, acl.clone());
                Ok(())
            }
            Some(_) => {
                guard.acls.remove(&key);
                Err(Error::AclNotFound(key))
            }
            None => Err(Error::AclNotFound(key)),
        }
    }

    async fn add_user(&self, user: &User) -> Result<()> {
        validate_user(user)?;
        let mut guard = self.inner.write().await;
        if guard.users.contains_key(&user.id) {
            return Err(Error::UserExists);
        }
        guard.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn remove_user(&self, user: &User) -> Result<()> {
        validate_user(user)?;
        let mut guard = self.inner.write().await;
        guard.users.remove(&user.id);
        Ok(())
    }

    async fn get_user(&self, id: &str) -> Result<Option<User>> {
        validate_id(id)?;
        let guard = self.inner.read().await;
        Ok(guard.users.get(id).cloned())
    }

    async fn update_user(&self, user: &User) -> Result<()> {
        validate_user(user)?;
        let mut guard = self.inner.write().await;
        let Some(existing) = guard.users.get(&user.id) else {
            return Err(Error::UserNotFound);
        };
        // keep the stored audit trail, never the caller's copy
        let mut updated = user.clone();
        updated.ips = existing.ips.clone();
        guard.users.insert(updated.id.clone(), updated);
        Ok(())
    }

    async fn append_user_ip(&self, id: &str, ip: &str) -> Result<()> {
        validate_id(id)?;
        let key = ip_key(ip)?;
        let mut guard = self.inner.write().await;
        let Some(user) = guard.users.get_mut(id) else {
            return Err(Error::UserNotFound);
        };
        user.add_ip(&key)
    }
}
