//! Storage provider implementations

pub mod file;
pub mod memory;

pub use file::FileProvider;
pub use memory::MemoryProvider;

use crate::entity::{User, canonical_ip};
use crate::error::{Error, MIN_SECRET_LENGTH, Result};

/// Canonicalize an IP key, rejecting malformed literals.
pub(crate) fn ip_key(ip: &str) -> Result<String> {
    canonical_ip(ip).ok_or_else(|| Error::invalid_ip(ip))
}

/// Validate a user object before any storage access.
pub(crate) fn validate_user(user: &User) -> Result<()> {
    if user.id.len() < MIN_SECRET_LENGTH {
        return Err(Error::InvalidUser);
    }
    Ok(())
}

/// Validate a user id before any storage access.
pub(crate) fn validate_id(id: &str) -> Result<()> {
    if id.len() < MIN_SECRET_LENGTH {
        return Err(Error::InvalidUserId(id.to_string()));
    }
    Ok(())
}
