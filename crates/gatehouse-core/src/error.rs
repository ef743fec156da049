//! Error types for the access-control core
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Minimum number of characters a client secret must contain.
pub const MIN_SECRET_LENGTH: usize = 6;

/// Result type alias for gatehouse operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the access-control engine
#[derive(Error, Debug)]
pub enum Error {
    /// Secret below the minimum length
    #[error("secret does not contain enough characters (minimum is {MIN_SECRET_LENGTH})")]
    SecretTooShort,

    /// Malformed IP address literal
    #[error("validation error for IP address: {0}")]
    InvalidIp(String),

    /// Malformed DNS name
    #[error("validation error for DNS name: {0}")]
    InvalidDnsName(String),

    /// User object failed validation (missing or malformed id)
    #[error("validation error for user")]
    InvalidUser,

    /// User id below the minimum length
    #[error("user id is invalid: {0}")]
    InvalidUserId(String),

    /// Attempted to add a user that already exists
    #[error("user already exists")]
    UserExists,

    /// Attempted to modify a user that does not exist
    #[error("user was not found")]
    UserNotFound,

    /// Attempted to update an ACL with no existing record
    #[error("no ACL found for IP: {0}")]
    AclNotFound(String),

    /// Challenge rejected. Deliberately covers unknown secrets and
    /// disabled users alike so callers cannot tell which secrets exist.
    #[error("challenge denied")]
    ChallengeDenied,

    /// Secret hashing failure
    #[error("secret hashing error: {0}")]
    SecretHash(String),

    /// Storage backend failure (I/O, lock acquisition, corruption)
    #[error("storage error: {0}")]
    Storage(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an invalid-IP error
    pub fn invalid_ip(ip: impl Into<String>) -> Self {
        Self::InvalidIp(ip.into())
    }

    /// Create an invalid-DNS-name error
    pub fn invalid_dns_name(name: impl Into<String>) -> Self {
        Self::InvalidDnsName(name.into())
    }

    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }
}
