#![forbid(unsafe_code)]

mod error;
mod requests;
mod rows;
mod support;

pub use error::StoreError;
pub use requests::*;
pub use rows::{DraftRow, DraftStatus, LoadedDraft};
pub use support::now_ms;

use jn_core::{Document, FlatStore, import_document};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::{Path, PathBuf};
use std::time::Duration;
use support::sha256_hex;

const DB_FILE: &str = "javna_narocila.db";
const SCHEMA_VERSION: i64 = 1;
const DRAFT_TABLES: [&str; 2] = ["drafts", "store_state"];
const DRAFT_COLUMNS: &str =
    "id, title, status, revision, payload_sha256, created_at_ms, updated_at_ms";

///
/// SqliteStore
///
/// Saved procurement drafts. Payloads are nested documents stored as JSON
/// next to their SHA-256 digest; `revision` moves only when the content or the
/// title actually changes.
///

#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
    storage_dir: PathBuf,
}

impl SqliteStore {
    pub fn open(storage_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let storage_dir = storage_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&storage_dir)?;

        let db_path = storage_dir.join(DB_FILE);
        let conn = Connection::open(db_path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;",
        )?;

        check_existing_schema(&conn)?;
        install_schema(&conn)?;

        tracing::debug!(dir = %storage_dir.display(), "opened draft store");
        Ok(Self { conn, storage_dir })
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    pub fn save_draft(&mut self, request: SaveDraftRequest) -> Result<DraftRow, StoreError> {
        let title = request.title.trim();
        if title.is_empty() {
            return Err(StoreError::InvalidInput("title must not be empty"));
        }
        let payload_json = serde_json::to_string(&request.document)?;
        let payload_sha256 = sha256_hex(payload_json.as_bytes());

        let tx = self.conn.transaction()?;
        let row = match request.id {
            None => {
                if request.expected_revision.is_some() {
                    return Err(StoreError::InvalidInput(
                        "expected_revision requires an existing draft id",
                    ));
                }
                tx.execute(
                    "INSERT INTO drafts(title, status, revision, payload_json, payload_sha256, created_at_ms, updated_at_ms) \
                     VALUES (?1, ?2, 1, ?3, ?4, ?5, ?5)",
                    params![
                        title,
                        DraftStatus::Draft.as_str(),
                        payload_json,
                        payload_sha256,
                        request.saved_at_ms,
                    ],
                )?;
                let id = tx.last_insert_rowid();
                draft_row(&tx, id)?
            }
            Some(id) => {
                let current = draft_row(&tx, id)?;
                check_revision(&current, request.expected_revision)?;
                if current.is_final() {
                    return Err(StoreError::DraftFinalized { id });
                }
                if current.payload_sha256 == payload_sha256 && current.title == title {
                    current
                } else {
                    tx.execute(
                        "UPDATE drafts \
                         SET title=?2, payload_json=?3, payload_sha256=?4, revision=revision+1, updated_at_ms=?5 \
                         WHERE id=?1",
                        params![id, title, payload_json, payload_sha256, request.saved_at_ms],
                    )?;
                    draft_row(&tx, id)?
                }
            }
        };
        tx.commit()?;

        tracing::info!(draft_id = row.id, revision = row.revision, "saved draft");
        Ok(row)
    }

    pub fn load_draft(&self, id: i64) -> Result<LoadedDraft, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {DRAFT_COLUMNS}, payload_json FROM drafts WHERE id=?1"
        ))?;
        let mut rows = stmt.query(params![id])?;
        let Some(found) = rows.next()? else {
            return Err(StoreError::UnknownId);
        };

        let row = draft_from_row(found)?;
        let payload_json = found.get::<_, String>(7)?;
        if sha256_hex(payload_json.as_bytes()) != row.payload_sha256 {
            return Err(StoreError::InvalidInput("draft payload does not match its digest"));
        }
        let document: Document = serde_json::from_str(&payload_json)?;

        tracing::debug!(draft_id = row.id, revision = row.revision, "loaded draft");
        Ok(LoadedDraft { row, document })
    }

    /// Loads a draft and re-keys it into a fresh session store, lots included.
    pub fn load_into_store(&self, id: i64) -> Result<FlatStore, StoreError> {
        let loaded = self.load_draft(id)?;
        Ok(import_document(&loaded.document))
    }

    pub fn list_drafts(&self, request: ListDraftsRequest) -> Result<Vec<DraftRow>, StoreError> {
        let limit = to_sqlite_i64(request.limit)?;
        let offset = to_sqlite_i64(request.offset)?;
        let status = request.status.map(DraftStatus::as_str);

        let mut stmt = self.conn.prepare(&format!(
            "SELECT {DRAFT_COLUMNS} FROM drafts \
             WHERE (?1 IS NULL OR status=?1) \
             ORDER BY updated_at_ms DESC, id DESC \
             LIMIT ?2 OFFSET ?3"
        ))?;
        let mut rows = stmt.query(params![status, limit, offset])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(draft_from_row(row)?);
        }
        Ok(out)
    }

    /// Marks a draft final. Final drafts no longer accept saves.
    pub fn finalize_draft(&mut self, request: FinalizeDraftRequest) -> Result<DraftRow, StoreError> {
        let tx = self.conn.transaction()?;
        let current = draft_row(&tx, request.id)?;
        check_revision(&current, request.expected_revision)?;
        if current.is_final() {
            return Err(StoreError::DraftFinalized { id: request.id });
        }
        tx.execute(
            "UPDATE drafts SET status=?2, revision=revision+1, updated_at_ms=?3 WHERE id=?1",
            params![
                request.id,
                DraftStatus::Final.as_str(),
                request.finalized_at_ms
            ],
        )?;
        let row = draft_row(&tx, request.id)?;
        tx.commit()?;

        tracing::info!(draft_id = row.id, revision = row.revision, "finalized draft");
        Ok(row)
    }

    pub fn delete_draft(&mut self, id: i64) -> Result<(), StoreError> {
        let deleted = self
            .conn
            .execute("DELETE FROM drafts WHERE id=?1", params![id])?;
        if deleted == 0 {
            return Err(StoreError::UnknownId);
        }
        tracing::info!(draft_id = id, "deleted draft");
        Ok(())
    }
}

fn draft_row(conn: &Connection, id: i64) -> Result<DraftRow, StoreError> {
    let mut stmt = conn.prepare(&format!("SELECT {DRAFT_COLUMNS} FROM drafts WHERE id=?1"))?;
    let mut rows = stmt.query(params![id])?;
    let row = match rows.next()? {
        Some(row) => draft_from_row(row)?,
        None => return Err(StoreError::UnknownId),
    };
    Ok(row)
}

fn draft_from_row(row: &Row<'_>) -> Result<DraftRow, StoreError> {
    let status = row.get::<_, String>(2)?;
    Ok(DraftRow {
        id: row.get::<_, i64>(0)?,
        title: row.get::<_, String>(1)?,
        status: DraftStatus::parse(&status)
            .ok_or(StoreError::InvalidInput("invalid draft status"))?,
        revision: row.get::<_, i64>(3)?,
        payload_sha256: row.get::<_, String>(4)?,
        created_at_ms: row.get::<_, i64>(5)?,
        updated_at_ms: row.get::<_, i64>(6)?,
    })
}

fn check_revision(current: &DraftRow, expected: Option<i64>) -> Result<(), StoreError> {
    match expected {
        Some(expected) if expected != current.revision => Err(StoreError::RevisionMismatch {
            expected,
            actual: current.revision,
        }),
        _ => Ok(()),
    }
}

/// A fresh file has no tables. Anything else must hold exactly the draft
/// tables at the current schema version.
fn check_existing_schema(conn: &Connection) -> Result<(), StoreError> {
    let tables = conn
        .prepare(
            "SELECT name FROM sqlite_master
             WHERE type='table' AND name NOT LIKE 'sqlite_%'
             ORDER BY name",
        )?
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    if tables.is_empty() {
        return Ok(());
    }
    if tables != DRAFT_TABLES {
        tracing::warn!(?tables, "database was not created by the draft store");
        return Err(StoreError::InvalidInput(
            "RESET_REQUIRED: database holds tables the draft store does not own",
        ));
    }

    let version = conn
        .query_row(
            "SELECT schema_version FROM store_state WHERE singleton=1",
            [],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    if version != Some(SCHEMA_VERSION) {
        tracing::warn!(?version, expected = SCHEMA_VERSION, "draft schema version is not supported");
        return Err(StoreError::InvalidInput(
            "RESET_REQUIRED: draft schema version is not supported",
        ));
    }
    Ok(())
}

fn install_schema(conn: &Connection) -> Result<(), StoreError> {
    let now_ms = now_ms();

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS store_state (
          singleton INTEGER PRIMARY KEY CHECK(singleton = 1),
          schema_version INTEGER NOT NULL,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS drafts (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          title TEXT NOT NULL,
          status TEXT NOT NULL CHECK(status IN ('draft', 'final')),
          revision INTEGER NOT NULL CHECK(revision >= 1),
          payload_json TEXT NOT NULL,
          payload_sha256 TEXT NOT NULL,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_drafts_status_updated
          ON drafts(status, updated_at_ms, id);
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO store_state(singleton, schema_version, created_at_ms, updated_at_ms) \
         VALUES (1, ?1, ?2, ?2)",
        params![SCHEMA_VERSION, now_ms],
    )?;

    Ok(())
}

fn to_sqlite_i64(value: usize) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::InvalidInput("numeric overflow"))
}
