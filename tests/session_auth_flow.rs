#![forbid(unsafe_code)]

use ed25519_dalek::{Signer, SigningKey};
use rand::rngs::OsRng;
use sdn_node::audit::{AuditLog, Severity};
use sdn_node::auth::{ChallengeError, ChallengeStore, SessionStore};
use sdn_node::identity::{serialize_xpub, KeyManager};
use sdn_node::identity::xpub::Xpub;
use sdn_node::trust::{TrustLevel, TrustRegistry};
use std::time::Duration;

fn node_xpub(public_key: [u8; 32]) -> String {
    serialize_xpub(&Xpub {
        depth: 0,
        parent_fingerprint: [0u8; 4],
        child_number: 0,
        chain_code: [0u8; 32],
        public_key,
    })
}

#[test]
fn challenge_response_succeeds_and_logs_one_admin_login() {
    let dir = tempfile::tempdir().unwrap();
    let peers_db = sled::open(dir.path().join("peers.db")).unwrap();
    let audit_db = sled::open(dir.path().join("audit.db")).unwrap();

    let signing = SigningKey::generate(&mut OsRng);
    let xpub = node_xpub(signing.verifying_key().to_bytes());

    let trust = TrustRegistry::open(&peers_db, false, &[]).unwrap();
    trust
        .upsert(sdn_node::trust::PeerTrustEntry {
            peer_id: xpub.clone(),
            level: TrustLevel::Admin,
            added_at: 0,
            last_seen: 0,
            notes: "test".to_string(),
            reputation: 0,
        })
        .unwrap();

    let audit = AuditLog::open(&audit_db).unwrap();
    let challenges = ChallengeStore::new();
    let sessions = SessionStore::new(Duration::from_secs(86_400));

    let challenge = challenges.create(&xpub, [0xAA; 32]);
    let signature = signing.sign(&challenge.challenge_bytes);

    let taken = challenges.take_for_xpub(&challenge.id, &xpub).expect("challenge present");
    assert!(KeyManager::verify(&signing.verifying_key().to_bytes(), &taken.challenge_bytes, &signature.to_bytes()));

    let level = trust.classify(&xpub).unwrap();
    assert_eq!(level, TrustLevel::Admin);
    let session = sessions.create(&xpub, level, "127.0.0.1", "test-agent");
    audit
        .append(
            sdn_node::audit::event_types::ADMIN_LOGIN,
            Severity::Info,
            &xpub,
            "127.0.0.1",
            "session",
            &session.token,
            "admin login via challenge/response",
            "{}",
        )
        .unwrap();

    assert_eq!(audit.len(), 1);
    let entries = audit
        .query(&sdn_node::audit::log::AuditQuery { event_type: Some(sdn_node::audit::event_types::ADMIN_LOGIN.to_string()), ..Default::default() })
        .unwrap();
    assert_eq!(entries.len(), 1);

    // S2: replaying the same (already-consumed) challenge id is rejected.
    let err = challenges.take_for_xpub(&challenge.id, &xpub).unwrap_err();
    assert_eq!(err, ChallengeError::NotFound);
}
