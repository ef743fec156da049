// # Host Lookup Trait
//
// Defines the DNS resolution seam used by the DDNS resolver.
//
// The resolver only cares about "name -> addresses"; putting that
// behind a trait keeps resolution passes testable without touching the
// network. Production uses the system resolver via tokio.

use async_trait::async_trait;
use std::net::IpAddr;

use crate::error::{Error, Result};

/// Trait for resolving a DNS name to its addresses.
///
/// Implementations must be thread-safe and usable across async tasks.
/// A failed lookup for one name must not affect lookups for others.
#[async_trait]
pub trait HostLookup: Send + Sync {
    /// Resolve a DNS name to the addresses it currently points at.
    ///
    /// Returns the addresses in resolver order; the caller decides how
    /// many of them to use.
    async fn resolve(&self, fqdn: &str) -> Result<Vec<IpAddr>>;
}

/// System resolver backed by `tokio::net::lookup_host`.
#[derive(Debug, Clone, Default)]
pub struct SystemLookup;

#[async_trait]
impl HostLookup for SystemLookup {
    async fn resolve(&self, fqdn: &str) -> Result<Vec<IpAddr>> {
        // lookup_host requires a port; it is irrelevant to the result.
        let addrs = tokio::net::lookup_host((fqdn, 0))
            .await
            .map_err(|e| Error::Other(format!("DNS lookup for {fqdn} failed: {e}")))?;
        Ok(addrs.map(|sock| sock.ip()).collect())
    }
}
