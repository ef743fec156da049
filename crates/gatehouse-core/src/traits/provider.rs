// # Storage Provider Trait
//
// Defines the persistence contract for users and per-IP ACL grants.
//
// ## Implementations
//
// - File-backed: `store::FileProvider` (durable, single JSON document)
// - In-memory: `store::MemoryProvider` (tests and non-production use)
//
// Every backend implements the same contract; callers never depend on
// which one is behind the trait object.

use async_trait::async_trait;

use crate::entity::{Acl, User};
use crate::error::Result;

/// Trait for storage provider implementations.
///
/// Providers persist two independent keyspaces: users keyed by their
/// 6-character id, and ACL grants keyed by the canonical textual form
/// of an IP address. No operation spans both keyspaces.
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently from multiple tasks.
/// Within one backend, operations on the same key are linearized; a
/// concurrent reader never observes a half-written record.
///
/// # Expiry
///
/// Expiry is enforced lazily inside [`Provider::get_acl`]: reading an
/// expired grant returns `None` and removes the underlying record as a
/// side effect. There is no background sweep, and callers must never
/// observe an expired ACL as valid.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Open or create the backing store and ensure both keyspaces exist.
    ///
    /// Fails with [`crate::Error::Storage`] on I/O or lock-acquisition
    /// failure; the durable backend waits a bounded time for the lock
    /// before giving up.
    async fn initialize_database(&self) -> Result<()>;

    /// Cheap liveness check against the backing store.
    async fn check_availability(&self) -> Result<()>;

    /// Upsert the ACL grant for an IP.
    ///
    /// Always overwrites an existing record for the same IP; a repeated
    /// grant refreshes, it does not accumulate.
    async fn add_ip(&self, ip: &str, acl: &Acl) -> Result<()>;

    /// Remove the ACL grant for an IP. Removing a non-existent grant is
    /// not an error.
    async fn remove_ip(&self, ip: &str) -> Result<()>;

    /// Look up the ACL grant for an IP.
    ///
    /// Returns `None` if absent. If the stored grant has expired it is
    /// deleted and `None` is returned.
    async fn get_acl(&self, ip: &str) -> Result<Option<Acl>>;

    /// Overwrite the ACL for an IP that already has one.
    ///
    /// Fails with [`crate::Error::AclNotFound`] when no (unexpired)
    /// record exists for that IP.
    async fn update_acl(&self, ip: &str, acl: &Acl) -> Result<()>;

    /// Insert a new user. Fails with [`crate::Error::UserExists`] when a
    /// user with the same id is already stored.
    async fn add_user(&self, user: &User) -> Result<()>;

    /// Remove a user. Removing a non-existent user is not an error.
    async fn remove_user(&self, user: &User) -> Result<()>;

    /// Look up a user by id. Returns `None` if absent.
    async fn get_user(&self, id: &str) -> Result<Option<User>>;

    /// Overwrite an existing user record.
    ///
    /// Fails with [`crate::Error::UserNotFound`] when no record exists.
    /// The caller-supplied IP audit list is discarded and replaced with
    /// the previously stored one; the audit trail is append-only via
    /// [`Provider::append_user_ip`], not settable via update.
    async fn update_user(&self, user: &User) -> Result<()>;

    /// Append an IP to the stored user's audit list.
    ///
    /// This is the only write path into the list. The append happens
    /// atomically on the stored record; appending an already-recorded
    /// IP is a no-op. Fails with [`crate::Error::UserNotFound`] when no
    /// record exists.
    async fn append_user_ip(&self, id: &str, ip: &str) -> Result<()>;
}
