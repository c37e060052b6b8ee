#![forbid(unsafe_code)]

use sdn_node::audit::log::AuditEntry;
use sdn_node::audit::{AuditLog, AuditLogError, Severity};
use sdn_node::codec::{decode_canonical_limited, encode_canonical};

fn open() -> (tempfile::TempDir, sled::Db, AuditLog) {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = sled::open(dir.path().join("audit.db")).expect("open sled db");
    let log = AuditLog::open(&db).expect("open audit log");
    (dir, db, log)
}

#[test]
fn a_freshly_appended_chain_verifies() {
    let (_dir, _db, log) = open();
    log.append("peer.add", Severity::Info, "system", "", "peer", "peer-1", "added", "{}").unwrap();
    log.append("peer.add", Severity::Info, "system", "", "peer", "peer-2", "added", "{}").unwrap();
    log.append("peer.add", Severity::Info, "system", "", "peer", "peer-3", "added", "{}").unwrap();
    assert!(log.verify_chain().is_ok());
    assert_eq!(log.len(), 3);
}

#[test]
fn reopening_the_store_continues_the_same_chain() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("audit.db");
    {
        let db = sled::open(&db_path).unwrap();
        let log = AuditLog::open(&db).unwrap();
        log.append("server.start", Severity::Info, "system", "", "node", "n1", "started", "{}").unwrap();
    }
    let db = sled::open(&db_path).unwrap();
    let log = AuditLog::open(&db).unwrap();
    let entry = log.append("server.stop", Severity::Info, "system", "", "node", "n1", "stopped", "{}").unwrap();
    assert_eq!(entry.id, 2);
    assert!(log.verify_chain().is_ok());
}

#[test]
fn overwriting_entry_two_s_description_is_caught_by_verify_chain() {
    let (_dir, db, log) = open();
    log.append("peer.add", Severity::Info, "system", "", "peer", "peer-1", "added", "{}").unwrap();
    log.append("peer.add", Severity::Info, "system", "", "peer", "peer-2", "added", "{}").unwrap();
    log.append("peer.add", Severity::Info, "system", "", "peer", "peer-3", "added", "{}").unwrap();

    let tree = db.open_tree("audit_log").unwrap();
    let key = 2u64.to_be_bytes();
    let raw = tree.get(key).unwrap().expect("entry 2 exists");
    let mut entry: AuditEntry = decode_canonical_limited(&raw, 16 * 1024).unwrap();
    entry.description = "tampered".to_string();
    tree.insert(key, encode_canonical(&entry).unwrap()).unwrap();

    let err = log.verify_chain().unwrap_err();
    assert!(matches!(err, AuditLogError::Tampered(2)));
}
