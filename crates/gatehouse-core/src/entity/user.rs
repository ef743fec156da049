//! User records: registered principals identified by a secret

use serde::{Deserialize, Serialize};

use crate::entity::secret::{derive_id, hash_secret};
use crate::entity::validate::{is_valid_dns_name, is_valid_ip};
use crate::error::{Error, MIN_SECRET_LENGTH, Result};

/// A user/client registered by the admin.
///
/// A user is identified by a secret, which is hashed into a short id.
/// When a user has one or more `dns_names`, the IPs those names resolve
/// to are whitelisted automatically (with unlimited TTL) by the DDNS
/// resolver, without requiring a challenge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Determines if this user is enabled
    #[serde(default)]
    pub enabled: bool,
    /// A brief description of this user
    #[serde(default)]
    pub description: String,
    /// Unique identifier, always re-derived from the secret
    #[serde(default)]
    pub id: String,
    /// One-way hash of the challenge secret
    #[serde(rename = "secret", default, skip_serializing_if = "String::is_empty")]
    pub secret_hash: String,
    /// Determines if this user is allowed to access ALL resources
    #[serde(default)]
    pub acl_allow_all: bool,
    /// Hosts (FQDN) this user is allowed to access, stored lowercase
    #[serde(default)]
    pub acl_allowed_hosts: Vec<String>,
    /// DNS names that resolve to this user's IPs, whitelisted without a challenge
    #[serde(default)]
    pub dns_names: Vec<String>,
    /// Minutes the user's IP stays whitelisted after a successful challenge;
    /// 0 means the grant is permanent
    #[serde(default)]
    pub ttl_minutes: u64,
    /// IPs that have been associated with this user (audit trail)
    #[serde(rename = "ip_addresses", default)]
    pub ips: Vec<String>,
}

impl User {
    /// Create a user with safe defaults from a plaintext secret.
    ///
    /// Fails with [`Error::SecretTooShort`] when the secret is below the
    /// minimum length. The id is derived deterministically from the
    /// secret; the secret itself is only kept as a one-way hash.
    pub fn new(secret: &str, description: &str) -> Result<Self> {
        if secret.len() < MIN_SECRET_LENGTH {
            return Err(Error::SecretTooShort);
        }
        Ok(Self {
            enabled: true,
            description: description.to_string(),
            id: derive_id(secret),
            secret_hash: hash_secret(secret)?,
            ..Default::default()
        })
    }

    /// Decode an untrusted payload into a user.
    ///
    /// The payload must carry a plaintext `secret`; identity is always
    /// re-derived from it, so a caller-supplied `id` is never trusted.
    /// The remaining ACL-related fields are copied over as-is; host and
    /// DNS-name syntax is validated at the point a name is added to a
    /// set, not here. The caller-supplied IP audit list is discarded.
    pub fn decode(data: &[u8]) -> Result<Self> {
        #[derive(Deserialize)]
        struct Payload {
            #[serde(default)]
            secret: String,
            #[serde(default)]
            description: String,
            #[serde(default)]
            enabled: bool,
            #[serde(default)]
            acl_allow_all: bool,
            #[serde(default)]
            acl_allowed_hosts: Vec<String>,
            #[serde(default)]
            dns_names: Vec<String>,
            #[serde(default)]
            ttl_minutes: u64,
        }

        let payload: Payload = serde_json::from_slice(data)?;
        let mut user = Self::new(&payload.secret, &payload.description)?;
        user.acl_allow_all = payload.acl_allow_all;
        user.acl_allowed_hosts = payload.acl_allowed_hosts;
        user.dns_names = payload.dns_names;
        user.ttl_minutes = payload.ttl_minutes;
        user.enabled = payload.enabled;
        Ok(user)
    }

    /// Encode this record for storage
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Check if a host is in the allowed set (case insensitive)
    pub fn contains_host(&self, host: &str) -> bool {
        self.acl_allowed_hosts
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
        self.acl_allowed_hosts.push(host.to_ascii_lowercase());
        Ok(())
    }

    /// Remove a host from the allowed set; no-op if absent
    pub fn remove_host(&mut self, host: &str) {
        self.acl_allowed_hosts
            .retain(|allowed| !allowed.eq_ignore_ascii_case(host));
    }

    /// Check if an IP has been associated with this user
    pub fn contains_ip(&self, ip: &str) -> bool {
        self.ips.iter().any(|known| known.eq_ignore_ascii_case(ip))
    }

    /// Record an IP as associated with this user; no-op if already known
    pub fn add_ip(&mut self, ip: &str) -> Result<()> {
        if self.contains_ip(ip) {
            return Ok(());
        }
        if !is_valid_ip(ip) {
            return Err(Error::invalid_ip(ip));
        }
        self.ips.push(ip.to_ascii_lowercase());
        Ok(())
    }

    /// Remove an IP from the audit list; no-op if absent
    pub fn remove_ip(&mut self, ip: &str) {
        self.ips.retain(|known| !known.eq_ignore_ascii_case(ip));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::secret::verify_secret;

    #[test]
    fn new_user_derives_identity() {
        let user = User::new("hunter2", "Cloud Strife").unwrap();
        assert_eq!(user.id.len(), 6);
        assert!(user.enabled);
        assert_eq!(user.description, "Cloud Strife");
        assert!(user.acl_allowed_hosts.is_empty());
        assert!(user.dns_names.is_empty());
        assert!(user.ips.is_empty());
        assert_eq!(user.ttl_minutes, 0);

        // same secret, same id
        let again = User::new("hunter2", "").unwrap();
        assert_eq!(again.id, user.id);
        // different salt, different hash
        assert_ne!(again.secret_hash, user.secret_hash);
        assert!(verify_secret("hunter2", &user.secret_hash));
    }

    #[test]
    fn new_user_rejects_short_secret() {
        assert!(matches!(User::new("short", ""), Err(Error::SecretTooShort)));
        assert!(matches!(User::new("", ""), Err(Error::SecretTooShort)));
    }

    #[test]
    fn decode_rederives_id_from_secret() {
        let payload = serde_json::json!({
            "secret": "supersecret",
            "description": "laptop",
            "enabled": true,
            "id": "forged",
            "acl_allow_all": false,
            "acl_allowed_hosts": ["git.example.com"],
            "dns_names": ["home.example.net"],
            "ttl_minutes": 60,
            "ip_addresses": ["203.0.113.9"]
        });
        let user = User::decode(payload.to_string().as_bytes()).unwrap();

        assert_eq!(user.id, derive_id("supersecret"));
        assert_ne!(user.id, "forged");
        assert_eq!(user.acl_allowed_hosts, vec!["git.example.com"]);
        assert_eq!(user.dns_names, vec!["home.example.net"]);
        assert_eq!(user.ttl_minutes, 60);
        // the audit list is never taken from untrusted input
        assert!(user.ips.is_empty());
    }

    #[test]
    fn decode_rejects_short_or_missing_secret() {
        let short = serde_json::json!({ "secret": "abc" });
        assert!(matches!(
            User::decode(short.to_string().as_bytes()),
            Err(Error::SecretTooShort)
        ));

        let missing = serde_json::json!({ "description": "no secret" });
        assert!(matches!(
            User::decode(missing.to_string().as_bytes()),
            Err(Error::SecretTooShort)
        ));
    }

    #[test]
    fn stored_encoding_round_trips() {
        let mut user = User::new("supersecret", "nas box").unwrap();
        user.add_host("Wiki.Example.com").unwrap();
        user.add_ip("203.0.113.9").unwrap();
        user.ttl_minutes = 30;

        let decoded: User = serde_json::from_slice(&user.encode().unwrap()).unwrap();
        assert_eq!(decoded, user);
    }

    #[test]
    fn ip_list_is_validated_and_deduplicated() {
        let mut user = User::new("supersecret", "").unwrap();
        user.add_ip("203.0.113.9").unwrap();
        user.add_ip("203.0.113.9").unwrap();
        assert_eq!(user.ips.len(), 1);

        assert!(matches!(
            user.add_ip("not-an-ip"),
            Err(Error::InvalidIp(_))
        ));

        user.remove_ip("203.0.113.9");
        assert!(user.ips.is_empty());
    }
}
