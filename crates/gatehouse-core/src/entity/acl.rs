//! ACL records: per-IP access grants

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::validate::is_valid_dns_name;
use crate::error::{Error, Result};

/// An access grant bound to one IP address.
///
/// ACLs are always looked up keyed by the canonical textual form of the
/// IP they were granted to. Expiry is evaluated lazily at read time by
/// the storage providers; there is no background sweep.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Acl {
    /// When true, the client is allowed to access every host
    #[serde(default)]
    pub allow_all: bool,
    /// Hosts the client is allowed to access, stored lowercase
    #[serde(default)]
    pub allowed_hosts: Vec<String>,
    /// Absolute expiry instant; `None` means the grant is permanent
    #[serde(default)]
    pub ttl: Option<DateTime<Utc>>,
}

impl Acl {
    /// Check if a host is in the allowed set (case insensitive)
    pub fn contains_host(&self, host: &str) -> bool {
        self.allowed_hosts
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(host))
    }

    /// Add a host to the allowed set; no-op if already present
    pub fn add_host(&mut self, host: &str) -> Result<()> {
        if self.contains_host(host) {
            return Ok(());
        }
        if !is_valid_dns_name(host) {
            return Err(Error::invalid_dns_name(host));
        }
        self.allowed_hosts.push(host.to_ascii_lowercase());
        Ok(())
    }

    /// Remove a host from the allowed set; no-op if absent
    pub fn remove_host(&mut self, host: &str) {
        self.allowed_hosts
            .retain(|allowed| !allowed.eq_ignore_ascii_case(host));
    }

    /// True iff a TTL is set and lies in the past
    pub fn is_expired(&self) -> bool {
        self.ttl.is_some_and(|ttl| ttl < Utc::now())
    }

    /// Encode this record for storage
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}
