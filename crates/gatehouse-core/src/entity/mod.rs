//! Entity model: users, ACLs, and their validation rules
//!
//! A [`User`] is a registered principal identified by a short id derived
//! from its secret. An [`Acl`] is an access grant bound to a single IP
//! address. Both are stored as self-describing JSON by the storage
//! providers.

mod acl;
mod secret;
mod user;
mod validate;

pub use acl::Acl;
pub use secret::{derive_id, hash_secret, verify_secret};
pub use user::User;
pub use validate::{canonical_ip, is_valid_dns_name, is_valid_ip};
