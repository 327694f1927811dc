mod common;

use common::{Node, meeting, serve};
use pretty_assertions::assert_eq;
use spanningtree_crypto::{Signature, SigningKeypair, seal};
use spanningtree_storage::Database;
use spanningtree_sync::{
    EnvelopeBuilder, SealedEnvelope, SyncPayload, SyncResponse, SyncSummary,
};
use spanningtree_types::{Role, Timestamp};
use tempfile::TempDir;

async fn post(base: &str, body: Vec<u8>) -> (u16, SyncResponse) {
    let resp = reqwest::Client::new()
        .post(format!("{base}/sync"))
        .header("content-type", "application/octet-stream")
        .body(body)
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

/// A (national) sending to B (statal, region "ny"), with B serving.
async fn pair() -> (Node, Node, String) {
    let a = Node::new("a@example.org", Role::National, None);
    let b = Node::new("b@example.org", Role::Statal, Some("ny"));
    let b_url = serve(&b.service).await;
    a.knows(&b, &b_url).await;
    b.knows(&a, "http://127.0.0.1:9").await;
    (a, b, b_url)
}

// ── Acceptance ──────────────────────────────────────────────────

#[tokio::test]
async fn valid_envelope_merges_and_replay_skips() {
    let (a, b, b_url) = pair().await;
    a.db.insert_meeting(&meeting("nyc", "ny", 1, 100)).unwrap();

    let (_, envelope, export) = a.service.build_envelope_for(&b.email).await.unwrap();
    assert_eq!(export.records.len(), 1);

    let (status, body) = post(&b_url, envelope.clone()).await;
    assert_eq!(status, 200);
    assert!(body.is_success());
    assert_eq!(
        body.summary,
        Some(SyncSummary { inserted: 1, updated: 0, skipped: 0 })
    );
    assert_eq!(b.db.meeting(&export.records[0].id).unwrap().as_ref(), Some(&export.records[0]));

    let (status, body) = post(&b_url, envelope).await;
    assert_eq!(status, 200);
    assert_eq!(
        body.summary,
        Some(SyncSummary { inserted: 0, updated: 0, skipped: 1 })
    );
}

#[tokio::test]
async fn accepted_batch_is_audited() {
    let (a, b, _) = pair().await;
    a.db.insert_meeting(&meeting("nyc", "ny", 1, 100)).unwrap();
    let (_, envelope, _) = a.service.build_envelope_for(&b.email).await.unwrap();

    b.service.receive(&envelope).await.unwrap();
    let log = b.db.load_audit_log(10, 0).unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].action, "merge");
    assert_eq!(log[0].performed_by, Some(a.identity.id));
    spanningtree_sync::verify_audit_record(&log[0], &b.service.verify_key()).unwrap();
}

#[tokio::test]
async fn corrupt_record_is_skipped_rest_merges() {
    let (a, b, b_url) = pair().await;
    let good = meeting("nyc", "ny", 1, 100);

    // A correctly signed payload whose second record lacks required fields.
    let data = serde_json::json!({
        "records": [serde_json::to_value(&good).unwrap(), {"id": "not-a-meeting"}],
        "sender_id": a.identity.id,
        "timestamp": 100,
    });
    let canonical = spanningtree_types::value_to_canonical_bytes(&data).unwrap();
    let keypair = spanningtree_crypto::KeyStore::new(a.dir.path()).load().unwrap();
    let signed = serde_json::json!({
        "data": data,
        "public_key": keypair.verify_key().to_hex(),
        "signature": keypair.sign(&canonical).to_hex(),
    });
    let sealed = seal(
        &serde_json::to_vec(&signed).unwrap(),
        &b.service.verify_key(),
        &keypair,
    )
    .unwrap();
    let frame = SealedEnvelope {
        sender: keypair.verify_key(),
        sealed,
    };

    let (status, body) = post(&b_url, frame.encode()).await;
    assert_eq!(status, 200);
    assert_eq!(
        body.summary,
        Some(SyncSummary { inserted: 1, updated: 0, skipped: 1 })
    );
    assert!(b.db.meeting(&good.id).unwrap().is_some());
}

// ── Rejection ───────────────────────────────────────────────────

#[tokio::test]
async fn flipped_signature_byte_is_forbidden_and_store_unchanged() {
    let (a, b, b_url) = pair().await;
    let m = meeting("nyc", "ny", 1, 100);

    let mut bundle = a
        .builder
        .build(SyncPayload {
            records: vec![m.clone()],
            sender_id: a.identity.id,
            timestamp: Timestamp::now(),
        })
        .unwrap();
    let mut sig = bundle.signature.to_bytes();
    sig[0] ^= 0x01;
    bundle.signature = Signature::from_bytes(&sig);
    let envelope = a.builder.seal(&bundle, &b.service.verify_key()).unwrap();

    let (status, body) = post(&b_url, envelope).await;
    assert_eq!(status, 403);
    assert_eq!(body.status, "error");
    assert!(body.summary.is_none());
    assert_eq!(b.db.meeting_count().unwrap(), 0);
    assert!(b.db.load_audit_log(10, 0).unwrap().is_empty());
}

#[tokio::test]
async fn tampered_record_after_signing_is_forbidden() {
    let (a, b, b_url) = pair().await;
    let mut bundle = a
        .builder
        .build(SyncPayload {
            records: vec![meeting("nyc", "ny", 1, 100)],
            sender_id: a.identity.id,
            timestamp: Timestamp::now(),
        })
        .unwrap();
    bundle.data.records[0].last_modified = Some(Timestamp::from_secs(999_999));
    let envelope = a.builder.seal(&bundle, &b.service.verify_key()).unwrap();

    let (status, _) = post(&b_url, envelope).await;
    assert_eq!(status, 403);
    assert_eq!(b.db.meeting_count().unwrap(), 0);
}

#[tokio::test]
async fn unknown_sender_is_forbidden() {
    let (_, b, b_url) = pair().await;
    let stranger_dir = TempDir::new().unwrap();
    spanningtree_crypto::KeyStore::new(stranger_dir.path())
        .generate_and_store()
        .unwrap();
    let stranger = EnvelopeBuilder::from_key_dir(stranger_dir.path()).unwrap();
    let bundle = stranger
        .build(SyncPayload {
            records: vec![meeting("nyc", "ny", 1, 100)],
            sender_id: spanningtree_types::UserId::new(42),
            timestamp: Timestamp::now(),
        })
        .unwrap();
    let envelope = stranger.seal(&bundle, &b.service.verify_key()).unwrap();

    let (status, body) = post(&b_url, envelope).await;
    assert_eq!(status, 403);
    assert!(body.message.contains("unknown sender"));
    assert_eq!(b.db.meeting_count().unwrap(), 0);
}

#[tokio::test]
async fn envelope_for_someone_else_is_forbidden() {
    let (a, b, b_url) = pair().await;
    let other = SigningKeypair::generate();
    let bundle = a
        .builder
        .build(SyncPayload {
            records: vec![meeting("nyc", "ny", 1, 100)],
            sender_id: a.identity.id,
            timestamp: Timestamp::now(),
        })
        .unwrap();
    let envelope = a.builder.seal(&bundle, &other.verify_key()).unwrap();

    let (status, _) = post(&b_url, envelope).await;
    assert_eq!(status, 403);
    assert_eq!(b.db.meeting_count().unwrap(), 0);
}

#[tokio::test]
async fn garbage_body_is_forbidden() {
    let (_, b, b_url) = pair().await;
    let (status, body) = post(&b_url, b"definitely not an envelope".to_vec()).await;
    assert_eq!(status, 403);
    assert_eq!(body.status, "error");
    assert_eq!(b.db.meeting_count().unwrap(), 0);
}

#[tokio::test]
async fn oversized_body_is_refused() {
    let (_, b, b_url) = pair().await;
    let limit = b.service.config().max_envelope_bytes;
    let resp = reqwest::Client::new()
        .post(format!("{b_url}/sync"))
        .body(vec![0u8; limit + 1])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 413);
}

// ── Storage failure ─────────────────────────────────────────────

#[tokio::test]
async fn storage_failure_rolls_back_with_500() {
    let db_dir = TempDir::new().unwrap();
    let db_path = db_dir.path().join("b.db");
    let a = Node::new("a@example.org", Role::National, None);
    let b = Node::with_db(
        "b@example.org",
        Role::Statal,
        Some("ny"),
        Database::open(&db_path).unwrap(),
    );
    let b_url = serve(&b.service).await;
    a.knows(&b, &b_url).await;
    b.knows(&a, "http://127.0.0.1:9").await;
    a.db.insert_meeting(&meeting("nyc", "ny", 1, 100)).unwrap();

    // The audit insert is the last statement of the merge transaction.
    rusqlite::Connection::open(&db_path)
        .unwrap()
        .execute_batch("DROP TABLE audit_log;")
        .unwrap();

    let (_, envelope, _) = a.service.build_envelope_for(&b.email).await.unwrap();
    let (status, body) = post(&b_url, envelope).await;
    assert_eq!(status, 500);
    assert!(body.summary.is_none());
    assert_eq!(b.db.meeting_count().unwrap(), 0);
}

#[tokio::test]
async fn receive_is_usable_without_http() {
    let (a, b, _) = pair().await;
    a.db.insert_meeting(&meeting("albany", "ny", 1, 5)).unwrap();
    let (_, envelope, _) = a.service.build_envelope_for(&b.email).await.unwrap();
    let summary = b.service.receive(&envelope).await.unwrap();
    assert_eq!(summary, SyncSummary { inserted: 1, updated: 0, skipped: 0 });
}
