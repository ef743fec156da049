//! Test doubles and helpers shared by the integration tests

use async_trait::async_trait;
use std::collections::HashMap;
use std::net::IpAddr;

use gatehouse_core::error::{Error, Result};
use gatehouse_core::{HostLookup, User};

/// Scripted lookup double: answers from a fixed name -> addresses map,
/// fails for anything else.
pub struct ScriptedLookup {
    answers: HashMap<String, Vec<IpAddr>>,
}

impl ScriptedLookup {
    pub fn new(answers: &[(&str, &[&str])]) -> Self {
        let answers = answers
            .iter()
            .map(|(fqdn, ips)| {
                (
                    fqdn.to_string(),
                    ips.iter().map(|ip| ip.parse().unwrap()).collect(),
                )
            })
            .collect();
        Self { answers }
    }
}

#[async_trait]
impl HostLookup for ScriptedLookup {
    async fn resolve(&self, fqdn: &str) -> Result<Vec<IpAddr>> {
        self.answers
            .get(fqdn)
            .cloned()
            .ok_or_else(|| Error::Other(format!("no such host: {fqdn}")))
    }
}

/// Build an enabled user with the given allowed hosts.
pub fn user_with_hosts(secret: &str, hosts: &[&str]) -> User {
    let mut user = User::new(secret, "integration test user").unwrap();
    for host in hosts {
        user.add_host(host).unwrap();
    }
    user
}
