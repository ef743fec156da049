//! Dynamic-DNS ACL resolver
//!
//! Keeps a live, read-only snapshot mapping resolved IP -> ACL for
//! users who registered DNS names, so clients behind dynamic-IP
//! connections do not need to re-challenge after an address change.
//!
//! ## Event Flow
//!
//! 1. User CRUD registers/unregisters the user's DNS names
//! 2. Each mutation triggers an immediate resolution pass
//! 3. A periodic task re-resolves every registered name
//! 4. The decision engine consults the snapshot on every authorize
//!
//! The registry and the snapshot share one mutex; a resolution pass
//! computes into a local map before installing it, so lookup latency is
//! bounded by the critical section, never by DNS latency.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, oneshot};
use tracing::{debug, info, warn};

use crate::entity::{Acl, User, is_valid_dns_name};
use crate::error::Result;
use crate::traits::{HostLookup, SystemLookup};

/// Interval between periodic resolution passes.
pub const RESOLVE_INTERVAL_MINUTES: u64 = 120;

/// Resolver state: the fqdn registry and the derived IP snapshot.
#[derive(Debug, Default)]
struct ResolverState {
    /// fqdn -> ACL template of the owning user (no TTL; last writer wins)
    fqdns: HashMap<String, Acl>,
    /// resolved canonical IP -> ACL template
    snapshot: HashMap<String, Acl>,
}

/// Dynamic-DNS ACL resolver.
///
/// Cheap to clone; all clones share the same registry and snapshot.
/// The periodic task is driven by [`DdnsResolver::run_with_shutdown`];
/// `process_user`/`delete_user` may run concurrently with it and with
/// each other, and an explicit resolution pass races harmlessly with
/// the periodic one (both recompute and install a snapshot, last write
/// wins).
#[derive(Clone)]
pub struct DdnsResolver {
    state: Arc<Mutex<ResolverState>>,
    lookup: Arc<dyn HostLookup>,
}

impl DdnsResolver {
    /// Create a resolver backed by the system DNS resolver.
    pub fn new() -> Self {
        Self::with_lookup(Arc::new(SystemLookup))
    }

    /// Create a resolver with an explicit lookup implementation.
    pub fn with_lookup(lookup: Arc<dyn HostLookup>) -> Self {
        debug!("ddns resolver has been initialized");
        Self {
            state: Arc::new(Mutex::new(ResolverState::default())),
            lookup,
        }
    }

    /// Register the DNS names of several users, then resolve once.
    pub async fn process_users(&self, users: &[User]) {
        debug!("processing {} user(s)", users.len());
        for user in users {
            self.register(user).await;
        }
        self.update_acls().await;
    }

    /// Register a user's DNS names and trigger a resolution pass.
    ///
    /// Syntactically invalid names are skipped. A name registered by an
    /// earlier user is silently taken over (last writer wins). No-op for
    /// users without DNS names.
    pub async fn process_user(&self, user: &User) {
        if user.dns_names.is_empty() {
            return;
        }
        debug!("user {} has {} DNS name(s)", user.id, user.dns_names.len());
        self.register(user).await;
        self.update_acls().await;
    }

    /// Remove a user's DNS names from the registry, then resolve once.
    pub async fn delete_user(&self, user: &User) {
        if user.dns_names.is_empty() {
            return;
        }
        {
            let mut state = self.state.lock().await;
            for fqdn in &user.dns_names {
                state.fqdns.remove(fqdn);
            }
        }
        self.update_acls().await;
    }

    /// Read-only lookup into the current resolved snapshot.
    pub async fn get_acl(&self, ip: &str) -> Option<Acl> {
        let state = self.state.lock().await;
        state.snapshot.get(ip).cloned()
    }

    async fn register(&self, user: &User) {
        let template = Acl {
            allow_all: user.acl_allow_all,
            allowed_hosts: user.acl_allowed_hosts.clone(),
            ttl: None,
        };
        let mut state = self.state.lock().await;
        for fqdn in &user.dns_names {
            if is_valid_dns_name(fqdn) {
                state.fqdns.insert(fqdn.clone(), template.clone());
            } else {
                warn!("skipping invalid DNS name for user {}: {}", user.id, fqdn);
            }
        }
    }

    /// Rebuild the resolved snapshot from the registry.
    ///
    /// When the registry is empty this is a no-op: the last-known
    /// snapshot is deliberately preserved rather than emptied. A lookup
    /// failure for one name is logged and skipped; it never aborts the
    /// pass for the others.
    pub async fn update_acls(&self) {
        let registry: Vec<(String, Acl)> = {
            let state = self.state.lock().await;
            if state.fqdns.is_empty() {
                return;
            }
            state
                .fqdns
                .iter()
                .map(|(fqdn, acl)| (fqdn.clone(), acl.clone()))
                .collect()
        };

        // resolve into a local map; the lock is not held across lookups
        let mut snapshot = HashMap::new();
        for (fqdn, acl) in registry {
            let ips = match self.lookup.resolve(&fqdn).await {
                Ok(ips) => ips,
                Err(e) => {
                    warn!("unable to perform a DNS lookup for {}: {}", fqdn, e);
                    continue;
                }
            };
            let Some(first) = ips.first() else {
                continue;
            };
            // only the first address is used, the rest are ignored
            if ips.len() > 1 {
                warn!(
                    "DNS lookup for {} returned {} addresses, only using the first one ({})",
                    fqdn,
                    ips.len(),
                    first
                );
            }
            snapshot.insert(first.to_string(), acl);
        }

        debug!("installing {} resolved ACL(s)", snapshot.len());
        let mut state = self.state.lock().await;
        state.snapshot = snapshot;
    }

    /// Periodic resolution loop; exits when the shutdown signal fires.
    ///
    /// An in-flight resolution pass is never interrupted; the signal is
    /// observed before the next wait cycle begins.
    pub async fn run_with_shutdown(&self, mut shutdown_rx: oneshot::Receiver<()>) -> Result<()> {
        let period = std::time::Duration::from_secs(RESOLVE_INTERVAL_MINUTES * 60);
        let mut ticker = tokio::time::interval(period);
        // the immediate first tick would duplicate the pass already
        // triggered by registration
        ticker.tick().await;
        info!(
            "interval of periodic updates for DNS based ACLs is set to {} minute(s)",
            RESOLVE_INTERVAL_MINUTES
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.update_acls().await;
                    debug!("periodic update for DNS based ACLs completed");
                }
                _ = &mut shutdown_rx => {
                    warn!("stop signal received, DNS based ACLs will stop being updated");
                    return Ok(());
                }
            }
        }
    }
}

impl Default for DdnsResolver {
    fn default() -> Self {
        Self::new()
    }
}
