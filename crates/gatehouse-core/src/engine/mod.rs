//! Access-control decision engine
//!
//! The engine answers the two questions the system exists to serve:
//!
//! - [`Engine::authorize`]: may this IP access this host right now?
//! - [`Engine::challenge`]: grant this IP an ACL in exchange for a secret
//!
//! ## Decision Flow
//!
//! ```text
//! authorize(ip, host)
//!     ├── durable provider ACL (expiry enforced inside the provider)
//!     ├── DDNS snapshot ACL
//!     └── deny
//! ```
//!
//! User CRUD pass-throughs keep the DDNS registry in step with durable
//! state. That dual write is not transactional; the snapshot may lag
//! durable state until the next resolution trigger.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, error, info, warn};

use crate::ddns::DdnsResolver;
use crate::entity::{Acl, User, canonical_ip, derive_id};
use crate::error::{Error, MIN_SECRET_LENGTH, Result};
use crate::traits::Provider;

/// Outcome of an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        self == Decision::Allow
    }
}

/// A successful challenge: the ACL granted to the presenting IP.
#[derive(Debug, Clone, PartialEq)]
pub struct Grant {
    /// Id of the user whose secret was presented
    pub user_id: String,
    /// Canonical IP the grant is bound to
    pub ip: String,
    /// The granted ACL, including any computed expiry
    pub acl: Acl,
}

/// The decision engine, wired to one provider and one DDNS resolver.
///
/// Cheap to clone; both handles are shared. Constructed once at startup
/// and passed into the request-handling layer (no ambient globals).
#[derive(Clone)]
pub struct Engine {
    provider: Arc<dyn Provider>,
    ddns: DdnsResolver,
}

impl Engine {
    pub fn new(provider: Arc<dyn Provider>, ddns: DdnsResolver) -> Self {
        Self { provider, ddns }
    }

    /// Decide whether `client_ip` may access `requested_host`.
    ///
    /// Malformed input is treated as unauthenticated and denied, never
    /// surfaced as an error. Storage failures during lookup are logged
    /// and likewise fall through to deny.
    pub async fn authorize(&self, client_ip: &str, requested_host: &str) -> Decision {
        let Some(ip) = canonical_ip(client_ip) else {
            error!("client IP is malformed or missing, denying access");
            debug!(
                "client IP is of length {} with value: {}",
                client_ip.len(),
                client_ip
            );
            return Decision::Deny;
        };

        let acl = match self.provider.get_acl(&ip).await {
            Ok(found) => found,
            Err(e) => {
                warn!("error during provider ACL lookup: {}", e);
                None
            }
        };
        // fall back to the dynamic DNS snapshot
        let acl = match acl {
            Some(acl) => Some(acl),
            None => self.ddns.get_acl(&ip).await,
        };
        let Some(acl) = acl else {
            debug!("client ({}) is unknown", ip);
            return Decision::Deny;
        };

        if acl.allow_all {
            debug!("client ({}) has allow-all privileges", ip);
            return Decision::Allow;
        }
        if acl.contains_host(requested_host) {
            debug!("client ({}) allowed access to host {}", ip, requested_host);
            return Decision::Allow;
        }

        debug!("client ({}) denied access to host {}", ip, requested_host);
        Decision::Deny
    }

    /// Whitelist `client_ip` in exchange for a pre-shared secret.
    ///
    /// The candidate user id is derived from the presented secret, the
    /// same derivation used at user creation. A short secret, an unknown
    /// id and a disabled user are all rejected with the same
    /// [`Error::ChallengeDenied`], so callers cannot probe which secrets
    /// exist. A malformed IP is a bad request ([`Error::InvalidIp`]);
    /// persistence failures surface as storage errors.
    pub async fn challenge(&self, client_ip: &str, secret: &str) -> Result<Grant> {
        let ip = canonical_ip(client_ip).ok_or_else(|| {
            error!("client IP is malformed or missing, rejecting challenge");
            Error::invalid_ip(client_ip)
        })?;

        if secret.len() < MIN_SECRET_LENGTH {
            info!("client ({}) denied due to challenge failure", ip);
            return Err(Error::ChallengeDenied);
        }
        let user_id = derive_id(secret);

        let Some(user) = self.provider.get_user(&user_id).await? else {
            info!("client ({}) denied due to incorrect secret", ip);
            return Err(Error::ChallengeDenied);
        };
        if !user.enabled {
            info!("client ({}) denied due to being disabled", ip);
            return Err(Error::ChallengeDenied);
        }

        let mut acl = Acl {
            allow_all: user.acl_allow_all,
            allowed_hosts: user.acl_allowed_hosts.clone(),
            ttl: None,
        };
        if user.ttl_minutes > 0 {
            let ttl = Utc::now() + Duration::minutes(user.ttl_minutes as i64);
            info!("set client IP ({}) TTL to: {}", ip, ttl);
            acl.ttl = Some(ttl);
        }

        self.provider.add_ip(&ip, &acl).await?;

        // keep the audit trail on the user record; best effort only
        if let Err(e) = self.record_granted_ip(&user, &ip).await {
            warn!("unable to record granted IP on user {}: {}", user.id, e);
        }

        info!("user {} with IP ({}) has been added to ACL", user.id, ip);
        Ok(Grant {
            user_id: user.id,
            ip,
            acl,
        })
    }

    async fn record_granted_ip(&self, user: &User, ip: &str) -> Result<()> {
        if user.contains_ip(ip) {
            return Ok(());
        }
        self.provider.append_user_ip(&user.id, ip).await
    }

    /// Register a new user and enroll its DNS names with the resolver.
    pub async fn add_user(&self, user: &User) -> Result<()> {
        self.provider.add_user(user).await?;
        self.ddns.process_user(user).await;
        info!("new user has been added: {}", user.id);
        Ok(())
    }

    /// Update an existing user and re-enroll its DNS names.
    ///
    /// Names the stored record carried but the update no longer lists
    /// are withdrawn from the resolver registry first.
    pub async fn update_user(&self, user: &User) -> Result<()> {
        let previous = self.provider.get_user(&user.id).await?;
        self.provider.update_user(user).await?;
        if let Some(previous) = &previous {
            self.ddns.delete_user(previous).await;
        }
        self.ddns.process_user(user).await;
        info!("user has been updated: {}", user.id);
        Ok(())
    }

    /// Look up a user by id.
    pub async fn get_user(&self, id: &str) -> Result<Option<User>> {
        self.provider.get_user(id).await
    }

    /// Remove a user and withdraw its DNS names from the resolver.
    pub async fn remove_user(&self, user: &User) -> Result<()> {
        self.provider.remove_user(user).await?;
        self.ddns.delete_user(user).await;
        info!("user has been removed: {}", user.id);
        Ok(())
    }
}
