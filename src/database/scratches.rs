//! Scratch record store
//!
//! CRUD over note records with optimistic concurrency control. Every
//! mutation is a single conditional statement matching both the record id
//! and the caller's last-known version token; a zero-row result means the
//! token went stale (or the record vanished) and surfaces as
//! [`StoreError::VersionMismatch`]. The store holds no locks across calls
//! and issues no explicit transactions, relying on per-statement atomicity.
//!
//! Tags are persisted as one comma-joined text column and normalized on
//! read: segments are trimmed and empties dropped, order preserved.

use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};
use serde::{Deserialize, Deserializer, Serialize};

use crate::database::pool::{SqlitePool, SqlitePooledConnection};
use crate::database::schema::TableSchema;
use crate::error::{StoreError, StoreResult};

/// Descriptor for the `scratches` table, reconciled at startup.
///
/// The version column defaults to `'initial'` so rows carried over from a
/// pre-versioning table immediately satisfy conditional writes.
pub(crate) fn scratches_table() -> TableSchema {
    TableSchema::new("scratches")
        .primary("id", "INTEGER", "AUTOINCREMENT")
        .column("title", "TEXT", "")
        .column("body", "TEXT", "")
        .column("tags", "TEXT", "")
        .column("version", "TEXT", "NOT NULL DEFAULT 'initial'")
        .column("updated_at", "INTEGER", "")
        .column("created_at", "INTEGER", "")
}

/// A stored note, as returned by single-record lookups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scratch {
    pub id: i64,
    pub title: String,
    pub body: String,
    /// Byte length of `body`.
    pub size: i64,
    pub tags: Vec<String>,
    /// Opaque version token, equality-comparable only.
    pub version: String,
    pub updated_at: i64,
    pub created_at: i64,
}

/// A listing entry: everything but the body, plus its byte size.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScratchSummary {
    pub id: i64,
    pub title: String,
    pub size: i64,
    pub tags: Vec<String>,
    pub version: String,
    pub updated_at: i64,
    pub created_at: i64,
}

/// Payload for creating a record. Absent fields default to empty.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScratchDraft {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Per-field instruction in a partial update.
///
/// `Keep` and `Set("")` are distinct: an empty string is a real write,
/// not an omission. In JSON, an absent field and an explicit `null` both
/// decode to `Keep`; any present value decodes to `Set`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldUpdate<T> {
    Keep,
    Set(T),
}

impl<T> FieldUpdate<T> {
    pub fn is_set(&self) -> bool {
        matches!(self, FieldUpdate::Set(_))
    }
}

impl<T> Default for FieldUpdate<T> {
    fn default() -> Self {
        FieldUpdate::Keep
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for FieldUpdate<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(value) => FieldUpdate::Set(value),
            None => FieldUpdate::Keep,
        })
    }
}

/// Partial update over a record's mutable fields.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScratchPatch {
    #[serde(default)]
    pub title: FieldUpdate<String>,
    #[serde(default)]
    pub body: FieldUpdate<String>,
    #[serde(default)]
    pub tags: FieldUpdate<Vec<String>>,
}

impl ScratchPatch {
    /// True when no field carries a write.
    pub fn is_empty(&self) -> bool {
        !self.title.is_set() && !self.body.is_set() && !self.tags.is_set()
    }
}

/// Generate a fresh version token: hex of four random bytes. Opaque,
/// compared only for equality, and always scoped to one record id.
fn version_token() -> String {
    hex::encode(rand::random::<[u8; 4]>())
}

/// Encode tags for storage. Segments are stored as given; normalization
/// happens on decode so a dirty stored string still reads back clean.
fn join_tags(tags: &[String]) -> String {
    tags.join(",")
}

/// Decode a stored tag string: split, trim, drop empties, keep order.
fn split_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Store handle for scratch records
///
/// Cheap to construct; checks a connection out of the shared pool per
/// call, so one handle may serve many concurrent workers.
pub struct ScratchStore<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ScratchStore<'a> {
    /// Create a new store over the shared connection pool
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> StoreResult<SqlitePooledConnection> {
        Ok(self.pool.get()?)
    }

    /// Insert a new record and return its assigned id and version token.
    /// `created_at` and `updated_at` start equal.
    pub fn create(&self, draft: &ScratchDraft) -> StoreResult<(i64, String)> {
        let conn = self.conn()?;
        let now = Utc::now().timestamp();
        let version = version_token();

        conn.execute(
            "INSERT INTO scratches (title, body, tags, version, updated_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![draft.title, draft.body, join_tags(&draft.tags), version, now, now],
        )?;

        Ok((conn.last_insert_rowid(), version))
    }

    /// Look up one record. Absence is `Ok(None)`, not an error.
    pub fn find(&self, id: i64) -> StoreResult<Option<Scratch>> {
        let conn = self.conn()?;
        let record = conn
            .query_row(
                "SELECT id, title, body, tags, version, updated_at, created_at
                 FROM scratches WHERE id = ?1 LIMIT 1",
                [id],
                scratch_from_row,
            )
            .optional()?;
        Ok(record)
    }

    /// List every record, newest first by creation time.
    ///
    /// The result is fully materialized before returning; any row failure
    /// discards the partial scan and surfaces as an error.
    pub fn find_all(&self) -> StoreResult<Vec<ScratchSummary>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, title, LENGTH(CAST(body AS BLOB)), tags, version, updated_at, created_at
             FROM scratches ORDER BY created_at DESC",
        )?;
        let rows = stmt.query_map([], summary_from_row)?;
        let summaries = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(summaries)
    }

    /// Apply a partial update conditioned on the caller's version token.
    ///
    /// Only `Set` fields are written. An all-`Keep` patch is a no-op that
    /// returns `expected_version` without touching storage. Otherwise the
    /// record gets a fresh token and `updated_at`, written by a single
    /// conditional statement; zero affected rows is a version mismatch
    /// (stale token or vanished record, indistinguishable here).
    pub fn update(
        &self,
        id: i64,
        expected_version: &str,
        patch: &ScratchPatch,
    ) -> StoreResult<String> {
        if patch.is_empty() {
            return Ok(expected_version.to_string());
        }

        let mut assignments: Vec<&str> = Vec::new();
        let mut args: Vec<Value> = Vec::new();

        if let FieldUpdate::Set(title) = &patch.title {
            assignments.push("title = ?");
            args.push(Value::Text(title.clone()));
        }
        if let FieldUpdate::Set(body) = &patch.body {
            assignments.push("body = ?");
            args.push(Value::Text(body.clone()));
        }
        if let FieldUpdate::Set(tags) = &patch.tags {
            assignments.push("tags = ?");
            args.push(Value::Text(join_tags(tags)));
        }

        let version = version_token();
        assignments.push("version = ?");
        args.push(Value::Text(version.clone()));
        assignments.push("updated_at = ?");
        args.push(Value::Integer(Utc::now().timestamp()));

        args.push(Value::Integer(id));
        args.push(Value::Text(expected_version.to_string()));

        let sql = format!(
            "UPDATE scratches SET {} WHERE id = ? AND version = ?",
            assignments.join(", ")
        );

        let conn = self.conn()?;
        let affected = conn.execute(&sql, params_from_iter(args))?;
        if affected == 0 {
            return Err(StoreError::VersionMismatch);
        }

        Ok(version)
    }

    /// Delete conditioned on the caller's version token, with the same
    /// zero-row semantics as [`update`](Self::update).
    pub fn delete(&self, id: i64, expected_version: &str) -> StoreResult<()> {
        let conn = self.conn()?;
        let affected = conn.execute(
            "DELETE FROM scratches WHERE id = ?1 AND version = ?2",
            params![id, expected_version],
        )?;
        if affected == 0 {
            return Err(StoreError::VersionMismatch);
        }
        Ok(())
    }
}

/// Map a full row. Columns added by later migrations may hold NULL in old
/// rows, so text and integer fields scan through Option.
fn scratch_from_row(row: &Row) -> rusqlite::Result<Scratch> {
    let body: String = row.get::<_, Option<String>>(2)?.unwrap_or_default();
    let tags: Option<String> = row.get(3)?;
    Ok(Scratch {
        id: row.get(0)?,
        title: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        size: body.len() as i64,
        body,
        tags: split_tags(tags.as_deref().unwrap_or_default()),
        version: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        updated_at: row.get::<_, Option<i64>>(5)?.unwrap_or_default(),
        created_at: row.get::<_, Option<i64>>(6)?.unwrap_or_default(),
    })
}

fn summary_from_row(row: &Row) -> rusqlite::Result<ScratchSummary> {
    let tags: Option<String> = row.get(3)?;
    Ok(ScratchSummary {
        id: row.get(0)?,
        title: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        size: row.get::<_, Option<i64>>(2)?.unwrap_or_default(),
        tags: split_tags(tags.as_deref().unwrap_or_default()),
        version: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        updated_at: row.get::<_, Option<i64>>(5)?.unwrap_or_default(),
        created_at: row.get::<_, Option<i64>>(6)?.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::pool::build_pool;
    use crate::database::schema::SchemaManager;
    use tempfile::TempDir;

    fn create_test_pool() -> (SqlitePool, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scratch.db");
        let pool = build_pool(path.to_str().unwrap()).unwrap();
        {
            let conn = pool.get().unwrap();
            SchemaManager::new(&conn)
                .reconcile(&scratches_table())
                .unwrap();
        }
        (pool, dir)
    }

    fn draft(title: &str, body: &str, tags: &[&str]) -> ScratchDraft {
        ScratchDraft {
            title: title.to_string(),
            body: body.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[test]
    fn test_create_then_find_round_trips() {
        let (pool, _dir) = create_test_pool();
        let store = ScratchStore::new(&pool);

        let (id, version) = store
            .create(&draft("groceries", "milk and eggs", &["home", "todo"]))
            .unwrap();
        assert!(id > 0);
        assert_eq!(version.len(), 8);

        let found = store.find(id).unwrap().unwrap();
        assert_eq!(found.id, id);
        assert_eq!(found.title, "groceries");
        assert_eq!(found.body, "milk and eggs");
        assert_eq!(found.size, "milk and eggs".len() as i64);
        assert_eq!(found.tags, vec!["home", "todo"]);
        assert_eq!(found.version, version);
        assert_eq!(found.created_at, found.updated_at);
    }

    #[test]
    fn test_create_assigns_unique_ids() {
        let (pool, _dir) = create_test_pool();
        let store = ScratchStore::new(&pool);

        let (first, _) = store.create(&draft("a", "", &[])).unwrap();
        let (second, _) = store.create(&draft("b", "", &[])).unwrap();
        assert!(second > first);
    }

    #[test]
    fn test_find_absent_returns_none() {
        let (pool, _dir) = create_test_pool();
        let store = ScratchStore::new(&pool);

        assert!(store.find(12345).unwrap().is_none());
    }

    #[test]
    fn test_size_counts_bytes_not_chars() {
        let (pool, _dir) = create_test_pool();
        let store = ScratchStore::new(&pool);

        let (id, _) = store.create(&draft("", "héllo", &[])).unwrap();

        let found = store.find(id).unwrap().unwrap();
        assert_eq!(found.size, 6);

        let listed = store.find_all().unwrap();
        assert_eq!(listed[0].size, 6);
    }

    #[test]
    fn test_dirty_tags_normalize_on_read() {
        let (pool, _dir) = create_test_pool();
        let store = ScratchStore::new(&pool);

        let (id, _) = store
            .create(&draft("", "", &["a", "", "  b  "]))
            .unwrap();
        let found = store.find(id).unwrap().unwrap();
        assert_eq!(found.tags, vec!["a", "b"]);

        let (id, _) = store.create(&draft("", "", &[])).unwrap();
        let found = store.find(id).unwrap().unwrap();
        assert!(found.tags.is_empty());
    }

    #[test]
    fn test_update_rotates_version_and_writes_fields() {
        let (pool, _dir) = create_test_pool();
        let store = ScratchStore::new(&pool);

        let (id, v1) = store.create(&draft("draft", "text", &["x"])).unwrap();
        let before = store.find(id).unwrap().unwrap();

        let patch = ScratchPatch {
            title: FieldUpdate::Set("final".to_string()),
            ..Default::default()
        };
        let v2 = store.update(id, &v1, &patch).unwrap();
        assert_ne!(v2, v1);

        let after = store.find(id).unwrap().unwrap();
        assert_eq!(after.title, "final");
        assert_eq!(after.body, "text");
        assert_eq!(after.tags, vec!["x"]);
        assert_eq!(after.version, v2);
        assert!(after.updated_at >= before.updated_at);
        assert_eq!(after.created_at, before.created_at);
    }

    #[test]
    fn test_update_with_stale_version_is_rejected() {
        let (pool, _dir) = create_test_pool();
        let store = ScratchStore::new(&pool);

        let (id, v1) = store.create(&draft("a", "", &[])).unwrap();
        let patch = ScratchPatch {
            title: FieldUpdate::Set("b".to_string()),
            ..Default::default()
        };
        store.update(id, &v1, &patch).unwrap();

        let stale = ScratchPatch {
            title: FieldUpdate::Set("c".to_string()),
            ..Default::default()
        };
        let err = store.update(id, &v1, &stale).unwrap_err();
        assert!(err.is_version_mismatch());

        // The rejected write left nothing behind.
        assert_eq!(store.find(id).unwrap().unwrap().title, "b");
    }

    #[test]
    fn test_empty_patch_is_a_no_op() {
        let (pool, _dir) = create_test_pool();
        let store = ScratchStore::new(&pool);

        let (id, v1) = store.create(&draft("a", "b", &[])).unwrap();
        let before = store.find(id).unwrap().unwrap();

        let out = store.update(id, &v1, &ScratchPatch::default()).unwrap();
        assert_eq!(out, v1);

        let after = store.find(id).unwrap().unwrap();
        assert_eq!(after.updated_at, before.updated_at);
        assert_eq!(after.version, v1);
    }

    #[test]
    fn test_setting_empty_string_is_a_real_write() {
        let (pool, _dir) = create_test_pool();
        let store = ScratchStore::new(&pool);

        let (id, v1) = store.create(&draft("something", "", &[])).unwrap();
        let patch = ScratchPatch {
            title: FieldUpdate::Set(String::new()),
            ..Default::default()
        };
        let v2 = store.update(id, &v1, &patch).unwrap();
        assert_ne!(v2, v1);
        assert_eq!(store.find(id).unwrap().unwrap().title, "");
    }

    #[test]
    fn test_delete_requires_current_version() {
        let (pool, _dir) = create_test_pool();
        let store = ScratchStore::new(&pool);

        let (id, version) = store.create(&draft("a", "", &[])).unwrap();

        let err = store.delete(id, "deadbeef").unwrap_err();
        assert!(err.is_version_mismatch());
        assert!(store.find(id).unwrap().is_some());

        store.delete(id, &version).unwrap();
        assert!(store.find(id).unwrap().is_none());
    }

    #[test]
    fn test_find_all_orders_newest_first() {
        let (pool, _dir) = create_test_pool();
        let store = ScratchStore::new(&pool);

        let (id_a, _) = store.create(&draft("oldest", "", &[])).unwrap();
        let (id_b, _) = store.create(&draft("middle", "", &[])).unwrap();
        let (id_c, _) = store.create(&draft("newest", "", &[])).unwrap();

        // Force distinct creation times; back-to-back inserts land in the
        // same second.
        let conn = pool.get().unwrap();
        for (id, ts) in [(id_a, 1000), (id_b, 2000), (id_c, 3000)] {
            conn.execute(
                "UPDATE scratches SET created_at = ?1 WHERE id = ?2",
                params![ts, id],
            )
            .unwrap();
        }

        let ids: Vec<i64> = store.find_all().unwrap().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![id_c, id_b, id_a]);
    }

    #[test]
    fn test_tag_codec() {
        assert_eq!(split_tags(""), Vec::<String>::new());
        assert_eq!(split_tags("a,b"), vec!["a", "b"]);
        assert_eq!(split_tags("a,,  b  "), vec!["a", "b"]);
        assert_eq!(split_tags(" , ,"), Vec::<String>::new());
        assert_eq!(join_tags(&[]), "");
        assert_eq!(
            join_tags(&["a".to_string(), "b".to_string()]),
            "a,b"
        );
    }

    #[test]
    fn test_version_tokens_are_short_hex() {
        let token = version_token();
        assert_eq!(token.len(), 8);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(version_token(), token);
    }

    #[test]
    fn test_patch_decodes_absent_null_and_empty_distinctly() {
        let patch: ScratchPatch = serde_json::from_str("{}").unwrap();
        assert!(patch.is_empty());

        let patch: ScratchPatch = serde_json::from_str(r#"{"title": null}"#).unwrap();
        assert_eq!(patch.title, FieldUpdate::Keep);

        let patch: ScratchPatch = serde_json::from_str(r#"{"title": ""}"#).unwrap();
        assert_eq!(patch.title, FieldUpdate::Set(String::new()));

        let patch: ScratchPatch =
            serde_json::from_str(r#"{"tags": [], "body": "x"}"#).unwrap();
        assert_eq!(patch.tags, FieldUpdate::Set(Vec::new()));
        assert_eq!(patch.body, FieldUpdate::Set("x".to_string()));
        assert_eq!(patch.title, FieldUpdate::Keep);
    }
}
