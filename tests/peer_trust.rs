#![forbid(unsafe_code)]

use sdn_node::trust::rate_limit::PeerRateLimiter;
use sdn_node::trust::{PeerTrustEntry, TrustLevel, TrustRegistry};

fn open(strict_mode: bool, trusted_peers: &[String]) -> (tempfile::TempDir, sled::Db, TrustRegistry) {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = sled::open(dir.path().join("peers.db")).expect("open sled db");
    let registry = TrustRegistry::open(&db, strict_mode, trusted_peers).expect("open registry");
    (dir, db, registry)
}

#[test]
fn unknown_peer_classifies_by_strict_mode() {
    let (_dir, _db, strict) = open(true, &[]);
    assert_eq!(strict.classify("stranger").unwrap(), TrustLevel::Untrusted);

    let (_dir, _db, permissive) = open(false, &[]);
    assert_eq!(permissive.classify("stranger").unwrap(), TrustLevel::Standard);
}

#[test]
fn trusted_peers_are_seeded_at_open_and_not_duplicated_on_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("peers.db");
    let seed = vec!["peerA".to_string()];
    {
        let db = sled::open(&db_path).unwrap();
        let registry = TrustRegistry::open(&db, true, &seed).unwrap();
        assert_eq!(registry.classify("peerA").unwrap(), TrustLevel::Trusted);
    }

    // Downgrade peerA, then reopen with the same seed list: the existing
    // entry must not be clobbered back to Trusted.
    {
        let db = sled::open(&db_path).unwrap();
        let registry = TrustRegistry::open(&db, true, &seed).unwrap();
        registry
            .upsert(PeerTrustEntry {
                peer_id: "peerA".to_string(),
                level: TrustLevel::Limited,
                added_at: 0,
                last_seen: 0,
                notes: "demoted".to_string(),
                reputation: -10,
            })
            .unwrap();
    }
    let db = sled::open(&db_path).unwrap();
    let registry = TrustRegistry::open(&db, true, &seed).unwrap();
    assert_eq!(registry.classify("peerA").unwrap(), TrustLevel::Limited);
    assert_eq!(registry.list().unwrap().len(), 1);
}

#[test]
fn upsert_get_remove_round_trip() {
    let (_dir, _db, registry) = open(false, &[]);
    let entry = PeerTrustEntry {
        peer_id: "peerB".to_string(),
        level: TrustLevel::Trusted,
        added_at: 1000,
        last_seen: 1000,
        notes: "manually added".to_string(),
        reputation: 5,
    };
    registry.upsert(entry.clone()).unwrap();
    assert_eq!(registry.get("peerB").unwrap(), Some(entry));

    registry.remove("peerB").unwrap();
    assert_eq!(registry.get("peerB").unwrap(), None);
    // Removed, permissive mode: falls back to Standard, not NotFound.
    assert_eq!(registry.classify("peerB").unwrap(), TrustLevel::Standard);
}

#[test]
fn observe_nudges_reputation_and_last_seen_for_a_new_peer() {
    let (_dir, _db, registry) = open(false, &[]);
    registry.observe("peerC", true).unwrap();
    let entry = registry.get("peerC").unwrap().expect("observe creates an entry");
    assert_eq!(entry.level, TrustLevel::Standard);
    assert_eq!(entry.reputation, 1);

    registry.observe("peerC", false).unwrap();
    registry.observe("peerC", false).unwrap();
    let entry = registry.get("peerC").unwrap().unwrap();
    assert_eq!(entry.reputation, 1 - 5 - 5);
}

#[test]
fn rate_limiter_scales_burst_by_trust_level() {
    let limiter = PeerRateLimiter::new(10, 4);

    // Untrusted never gets a token, regardless of burst.
    assert!(!limiter.allow("untrusted-peer", TrustLevel::Untrusted, 1));

    // Limited peer gets floor(4 * 0.25).max(1) = 1 burst token up front.
    assert!(limiter.allow("limited-peer", TrustLevel::Limited, 1));
    assert!(!limiter.allow("limited-peer", TrustLevel::Limited, 1));

    // Standard peer gets the full base burst of 4 tokens up front.
    for _ in 0..4 {
        assert!(limiter.allow("standard-peer", TrustLevel::Standard, 1));
    }
    assert!(!limiter.allow("standard-peer", TrustLevel::Standard, 1));

    // Trusted peer gets 4x the base burst (16 tokens).
    for _ in 0..16 {
        assert!(limiter.allow("trusted-peer", TrustLevel::Trusted, 1));
    }
    assert!(!limiter.allow("trusted-peer", TrustLevel::Trusted, 1));

    // Admin is always allowed and never depletes a bucket.
    for _ in 0..1000 {
        assert!(limiter.allow("admin-peer", TrustLevel::Admin, 1));
    }
}

#[test]
fn sweep_drops_idle_buckets() {
    let limiter = PeerRateLimiter::new(10, 1);
    assert!(limiter.allow("peerD", TrustLevel::Standard, 1));
    limiter.sweep(std::time::Duration::from_secs(0));
    // Bucket was evicted, so a fresh one is minted with a full burst.
    assert!(limiter.allow("peerD", TrustLevel::Standard, 1));
}
