//! End-to-end decision flows
//!
//! Exercises the engine against a real provider and resolver: the
//! challenge-then-authorize path and the DDNS path that whitelists an
//! IP with no challenge at all.

mod common;

use std::sync::Arc;

use common::{ScriptedLookup, user_with_hosts};
use gatehouse_core::error::Error;
use gatehouse_core::{Decision, DdnsResolver, Engine, MemoryProvider, User};

fn engine_with_lookup(lookup: ScriptedLookup) -> Engine {
    Engine::new(
        Arc::new(MemoryProvider::new()),
        DdnsResolver::with_lookup(Arc::new(lookup)),
    )
}

#[tokio::test]
async fn permanent_grant_scenario() {
    // user with secret "hunter2", allowed host git.example.com,
    // ttl_minutes = 0 (permanent)
    let engine = engine_with_lookup(ScriptedLookup::new(&[]));
    engine
        .add_user(&user_with_hosts("hunter2", &["git.example.com"]))
        .await
        .unwrap();

    // before the challenge, the IP is unknown
    assert_eq!(
        engine.authorize("203.0.113.5", "git.example.com").await,
        Decision::Deny
    );

    let grant = engine.challenge("203.0.113.5", "hunter2").await.unwrap();
    assert_eq!(grant.acl.ttl, None);

    assert_eq!(
        engine.authorize("203.0.113.5", "git.example.com").await,
        Decision::Allow
    );
    assert_eq!(
        engine.authorize("203.0.113.5", "wiki.example.com").await,
        Decision::Deny
    );
}

#[tokio::test]
async fn ddns_scenario_whitelists_without_challenge() {
    // user with dns_names = ["home.example.net"], allow-all, the name
    // currently resolving to 198.51.100.7
    let engine = engine_with_lookup(ScriptedLookup::new(&[(
        "home.example.net",
        &["198.51.100.7"] as &[&str],
    )]));

    let mut user = User::new("supersecret", "home connection").unwrap();
    user.acl_allow_all = true;
    user.dns_names = vec!["home.example.net".to_string()];
    // registering the user triggers an immediate resolution pass
    engine.add_user(&user).await.unwrap();

    assert_eq!(
        engine.authorize("198.51.100.7", "anything.example.org").await,
        Decision::Allow
    );
    // other IPs gained nothing
    assert_eq!(
        engine.authorize("198.51.100.8", "anything.example.org").await,
        Decision::Deny
    );
}

#[tokio::test]
async fn ddns_entry_is_withdrawn_when_name_moves() {
    let engine = engine_with_lookup(ScriptedLookup::new(&[(
        "home.example.net",
        &["198.51.100.7"] as &[&str],
    )]));

    let mut user = User::new("supersecret", "").unwrap();
    user.acl_allow_all = true;
    user.dns_names = vec!["home.example.net".to_string()];
    engine.add_user(&user).await.unwrap();
    assert_eq!(
        engine.authorize("198.51.100.7", "x").await,
        Decision::Allow
    );

    // the user keeps a registered name, so the rebuild is not a no-op;
    // the old address disappears from the fresh snapshot
    let mut moved = user.clone();
    moved.dns_names = vec!["elsewhere.example.net".to_string()];
    engine.update_user(&moved).await.unwrap();

    assert_eq!(engine.authorize("198.51.100.7", "x").await, Decision::Deny);
}

#[tokio::test]
async fn durable_grant_wins_over_ddns_snapshot() {
    let engine = engine_with_lookup(ScriptedLookup::new(&[(
        "home.example.net",
        &["198.51.100.7"] as &[&str],
    )]));

    // DDNS gives the IP an allow-all grant
    let mut ddns_user = User::new("supersecret", "").unwrap();
    ddns_user.acl_allow_all = true;
    ddns_user.dns_names = vec!["home.example.net".to_string()];
    engine.add_user(&ddns_user).await.unwrap();

    // a challenge from the same IP stores a narrower durable grant
    engine
        .add_user(&user_with_hosts("hunter2", &["git.example.com"]))
        .await
        .unwrap();
    engine.challenge("198.51.100.7", "hunter2").await.unwrap();

    // the durable store is consulted first
    assert_eq!(
        engine.authorize("198.51.100.7", "git.example.com").await,
        Decision::Allow
    );
    assert_eq!(
        engine.authorize("198.51.100.7", "wiki.example.com").await,
        Decision::Deny
    );
}

#[tokio::test]
async fn disabled_user_is_denied_like_an_unknown_one() {
    let engine = engine_with_lookup(ScriptedLookup::new(&[]));
    let mut user = user_with_hosts("hunter2", &["git.example.com"]);
    user.enabled = false;
    engine.add_user(&user).await.unwrap();

    let denied = engine.challenge("203.0.113.5", "hunter2").await;
    let unknown = engine.challenge("203.0.113.5", "no-such-secret").await;
    assert!(matches!(denied, Err(Error::ChallengeDenied)));
    assert!(matches!(unknown, Err(Error::ChallengeDenied)));
    // and the error text leaks nothing either
    assert_eq!(
        denied.unwrap_err().to_string(),
        unknown.unwrap_err().to_string()
    );
}
