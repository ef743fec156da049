//! Capability traits that define the seams of the system
//!
//! - [`Provider`]: persistent storage for users and per-IP ACL grants
//! - [`HostLookup`]: DNS resolution used by the DDNS resolver

pub mod lookup;
pub mod provider;

pub use lookup::{HostLookup, SystemLookup};
pub use provider::Provider;
