use jn_core::FlatStore;
use jn_storage::{
    DraftStatus, FinalizeDraftRequest, ListDraftsRequest, SaveDraftRequest, SqliteStore,
    StoreError,
};
use rusqlite::Connection;
use serde_json::{Value, json};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_storage_dir(label: &str) -> PathBuf {
    let mut path = std::env::temp_dir();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock should be monotonic enough for tests")
        .as_nanos();
    path.push(format!(
        "jn-storage-{label}-{}-{nanos}",
        std::process::id()
    ));
    std::fs::create_dir_all(&path).expect("temp storage dir must be creatable");
    path
}

fn document(value: Value) -> jn_core::Document {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

fn new_draft(title: &str, payload: Value, saved_at_ms: i64) -> SaveDraftRequest {
    SaveDraftRequest {
        id: None,
        title: title.to_string(),
        document: document(payload),
        expected_revision: None,
        saved_at_ms,
    }
}

#[test]
fn save_and_load_round_trip() {
    let dir = temp_storage_dir("round-trip");
    let mut store = SqliteStore::open(&dir).expect("fresh storage should open");

    let payload = json!({
        "projectInfo": {"projectName": "Vrtec Vrhnika"},
        "clientInfo": {"clients": [{"name": "A"}, {"name": "B"}]}
    });
    let row = store
        .save_draft(new_draft("Vrtec", payload.clone(), 1_000))
        .expect("draft should be saved");
    assert_eq!(row.revision, 1);
    assert_eq!(row.status, DraftStatus::Draft);
    assert_eq!(row.payload_sha256.len(), 64);
    assert_eq!(row.created_at_ms, 1_000);
    assert_eq!(row.updated_at_rfc3339(), "1970-01-01T00:00:01Z");

    let loaded = store.load_draft(row.id).expect("draft should load");
    assert_eq!(loaded.row, row);
    assert_eq!(Value::Object(loaded.document), payload);
}

#[test]
fn revision_moves_only_on_change() {
    let dir = temp_storage_dir("revision");
    let mut store = SqliteStore::open(&dir).expect("fresh storage should open");

    let created = store
        .save_draft(new_draft("Ceste", json!({"a": 1}), 10))
        .expect("draft should be saved");

    let mut same = new_draft("Ceste", json!({"a": 1}), 20);
    same.id = Some(created.id);
    same.expected_revision = Some(1);
    let unchanged = store.save_draft(same).expect("no-op save succeeds");
    assert_eq!(unchanged, created);

    let mut edit = new_draft("Ceste", json!({"a": 2}), 30);
    edit.id = Some(created.id);
    edit.expected_revision = Some(1);
    let edited = store.save_draft(edit).expect("edit succeeds");
    assert_eq!(edited.revision, 2);
    assert_eq!(edited.updated_at_ms, 30);
    assert_ne!(edited.payload_sha256, created.payload_sha256);

    let mut stale = new_draft("Ceste", json!({"a": 3}), 40);
    stale.id = Some(created.id);
    stale.expected_revision = Some(1);
    let err = store.save_draft(stale).expect_err("stale revision must be rejected");
    assert!(matches!(
        err,
        StoreError::RevisionMismatch {
            expected: 1,
            actual: 2
        }
    ));

    let mut retitle = new_draft("Ceste 2026", json!({"a": 2}), 50);
    retitle.id = Some(created.id);
    assert_eq!(store.save_draft(retitle).expect("retitle").revision, 3);
}

#[test]
fn unknown_and_invalid_requests_are_rejected() {
    let dir = temp_storage_dir("invalid");
    let mut store = SqliteStore::open(&dir).expect("fresh storage should open");

    let mut missing = new_draft("X", json!({}), 1);
    missing.id = Some(42);
    assert!(matches!(
        store.save_draft(missing).expect_err("unknown id"),
        StoreError::UnknownId
    ));
    assert!(matches!(
        store.load_draft(42).expect_err("unknown id"),
        StoreError::UnknownId
    ));
    assert!(matches!(
        store.delete_draft(42).expect_err("unknown id"),
        StoreError::UnknownId
    ));

    let err = store
        .save_draft(new_draft("   ", json!({}), 1))
        .expect_err("blank title");
    assert_eq!(err.code(), "INVALID_INPUT");
}

#[test]
fn finalized_drafts_are_read_only() {
    let dir = temp_storage_dir("finalize");
    let mut store = SqliteStore::open(&dir).expect("fresh storage should open");
    let created = store
        .save_draft(new_draft("Vozila", json!({"orderType": {"orderType": "blago"}}), 5))
        .expect("draft should be saved");

    let finalized = store
        .finalize_draft(FinalizeDraftRequest {
            id: created.id,
            expected_revision: Some(1),
            finalized_at_ms: 9,
        })
        .expect("finalize succeeds");
    assert!(finalized.is_final());
    assert_eq!(finalized.revision, 2);
    assert_eq!(finalized.updated_at_ms, 9);

    let mut edit = new_draft("Vozila", json!({}), 10);
    edit.id = Some(created.id);
    let err = store.save_draft(edit).expect_err("final drafts reject saves");
    assert_eq!(err.code(), "DRAFT_FINALIZED");

    let err = store
        .finalize_draft(FinalizeDraftRequest {
            id: created.id,
            expected_revision: None,
            finalized_at_ms: 11,
        })
        .expect_err("already final");
    assert!(matches!(err, StoreError::DraftFinalized { .. }));
}

#[test]
fn list_is_newest_first_and_filters_by_status() {
    let dir = temp_storage_dir("list");
    let mut store = SqliteStore::open(&dir).expect("fresh storage should open");
    let a = store
        .save_draft(new_draft("A", json!({"n": 1}), 100))
        .expect("save a");
    let b = store
        .save_draft(new_draft("B", json!({"n": 2}), 100))
        .expect("save b");
    let c = store
        .save_draft(new_draft("C", json!({"n": 3}), 50))
        .expect("save c");
    store
        .finalize_draft(FinalizeDraftRequest {
            id: c.id,
            expected_revision: None,
            finalized_at_ms: 200,
        })
        .expect("finalize c");

    let all = store
        .list_drafts(ListDraftsRequest {
            status: None,
            limit: 10,
            offset: 0,
        })
        .expect("list");
    let ids = all.iter().map(|row| row.id).collect::<Vec<_>>();
    assert_eq!(ids, vec![c.id, b.id, a.id]);

    let drafts = store
        .list_drafts(ListDraftsRequest {
            status: Some(DraftStatus::Draft),
            limit: 1,
            offset: 1,
        })
        .expect("list");
    assert_eq!(drafts.len(), 1);
    assert_eq!(drafts[0].id, a.id);

    store.delete_draft(b.id).expect("delete b");
    let remaining = store
        .list_drafts(ListDraftsRequest {
            status: Some(DraftStatus::Draft),
            limit: 10,
            offset: 0,
        })
        .expect("list");
    assert_eq!(remaining.iter().map(|row| row.id).collect::<Vec<_>>(), vec![a.id]);
}

#[test]
fn session_store_survives_save_and_reopen() {
    let dir = temp_storage_dir("session");
    let mut session = FlatStore::new();
    for (key, value) in [
        ("projectInfo.projectName", json!("Vzdrževanje cest")),
        ("lotsInfo.hasLots", json!(true)),
        ("lot_0.selectionCriteria.price", json!(true)),
        ("lot_1.selectionCriteria.priceRatio", json!(40)),
        ("widget_current_step", json!(3)),
    ] {
        session.insert(key, value).expect("valid key");
    }

    let id = {
        let mut store = SqliteStore::open(&dir).expect("fresh storage should open");
        let request = SaveDraftRequest::from_store(None, "Ceste", &session, 1)
            .expect("session exports");
        assert!(request.document.contains_key("lots"));
        store.save_draft(request).expect("draft should be saved").id
    };

    let store = SqliteStore::open(&dir).expect("existing storage should reopen");
    let reopened = store.load_into_store(id).expect("draft should load");
    session.remove("widget_current_step");
    assert_eq!(reopened, session);
}

#[test]
fn open_is_fail_closed_on_foreign_schema() {
    let dir = temp_storage_dir("foreign");
    let conn = Connection::open(dir.join("javna_narocila.db")).expect("db must open");
    conn.execute("CREATE TABLE legacy_forms(id TEXT PRIMARY KEY)", [])
        .expect("legacy table should be created");
    drop(conn);

    let err = SqliteStore::open(&dir).expect_err("foreign storage must be rejected");
    assert_eq!(err.code(), "RESET_REQUIRED");
    assert!(matches!(
        err,
        StoreError::InvalidInput(message) if message.starts_with("RESET_REQUIRED")
    ));
}

#[test]
fn open_rejects_unknown_schema_version() {
    let dir = temp_storage_dir("version");
    drop(SqliteStore::open(&dir).expect("fresh storage should open"));

    let conn = Connection::open(dir.join("javna_narocila.db")).expect("db must open");
    conn.execute("UPDATE store_state SET schema_version=99 WHERE singleton=1", [])
        .expect("version should be rewritten");
    drop(conn);

    let err = SqliteStore::open(&dir).expect_err("future schema must be rejected");
    assert_eq!(err.code(), "RESET_REQUIRED");
}

#[test]
fn tampered_payload_is_detected() {
    let dir = temp_storage_dir("tamper");
    let id = {
        let mut store = SqliteStore::open(&dir).expect("fresh storage should open");
        store
            .save_draft(new_draft("T", json!({"a": 1}), 1))
            .expect("draft should be saved")
            .id
    };

    let conn = Connection::open(dir.join("javna_narocila.db")).expect("db must open");
    conn.execute(
        "UPDATE drafts SET payload_json='{\"a\":2}' WHERE id=?1",
        [id],
    )
    .expect("payload should be rewritten");
    drop(conn);

    let store = SqliteStore::open(&dir).expect("storage should reopen");
    let err = store.load_draft(id).expect_err("digest mismatch");
    assert_eq!(err.code(), "INVALID_INPUT");
}
