// # gatehouse-core
//
// Core library for the gatehouse IP access-control engine.
//
// Given a client IP and a requested host, the engine decides allow or
// deny, and lets clients earn temporary or permanent whitelisting of
// their IP by presenting a pre-shared secret. It is designed to sit
// behind a reverse proxy that forwards the real client IP and the
// requested host for a yes/no decision.
//
// ## Architecture Overview
//
// - **entity**: `User` and `Acl` value types with validation rules
// - **Provider**: trait for persistent User/ACL storage, implemented by
//   a durable file-backed store and an in-memory store
// - **DdnsResolver**: background task mapping registered DNS names to
//   the ACLs of their owning users
// - **Engine**: the authorize/challenge decision logic combining the
//   provider and the resolver snapshot
//
// The HTTP layer in front of the engine is deliberately not part of
// this crate; it only consumes `Engine` and the provider CRUD surface.

pub mod config;
pub mod ddns;
pub mod engine;
pub mod entity;
pub mod error;
pub mod store;
pub mod traits;

// Re-export core types for convenience
pub use config::{Config, StoreConfig};
pub use ddns::DdnsResolver;
pub use engine::{Decision, Engine, Grant};
pub use entity::{Acl, User};
pub use error::{Error, Result};
pub use store::{FileProvider, MemoryProvider};
pub use traits::{HostLookup, Provider, SystemLookup};
