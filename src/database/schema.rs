//! Schema declaration and reconciliation
//!
//! Tables are declared as descriptors (name, primary column, additional
//! columns) and reconciled against the live database at startup: a missing
//! table is created, a present table gains any declared columns it lacks.
//! Reconciliation is strictly additive. Existing columns are never altered
//! or dropped, and columns outside the declared set are left alone, so a
//! database touched by older or newer builds keeps its data.

use std::collections::HashSet;

use rusqlite::Connection;

use crate::error::{StoreError, StoreResult};

/// A single column declaration: name, storage type, and an optional
/// extra clause (default, NOT NULL, AUTOINCREMENT, ...).
#[derive(Debug, Clone)]
pub struct TableColumn {
    pub name: String,
    pub kind: String,
    pub extra: String,
}

impl TableColumn {
    pub fn new(name: &str, kind: &str, extra: &str) -> Self {
        TableColumn {
            name: name.to_string(),
            kind: kind.to_string(),
            extra: extra.to_string(),
        }
    }

    /// Render the column for a CREATE TABLE or ADD COLUMN statement.
    /// The PRIMARY KEY marker is only emitted at table creation; ALTER
    /// statements carry just the type and extra clause.
    fn definition(&self, primary: bool) -> String {
        let mut parts = vec![self.name.clone(), self.kind.clone()];
        if primary {
            parts.push("PRIMARY KEY".to_string());
        }
        if !self.extra.is_empty() {
            parts.push(self.extra.clone());
        }
        parts.join(" ")
    }
}

/// Declarative shape of one table. Built once at process start, handed to
/// [`SchemaManager::reconcile`], then discarded.
///
/// When no primary column is declared, an auto-incrementing integer `id`
/// is assumed.
#[derive(Debug, Clone)]
pub struct TableSchema {
    pub name: String,
    pub primary: Option<TableColumn>,
    pub columns: Vec<TableColumn>,
}

impl TableSchema {
    pub fn new(name: &str) -> Self {
        TableSchema {
            name: name.to_string(),
            primary: None,
            columns: Vec::new(),
        }
    }

    /// Declare the primary column. `PRIMARY KEY` is implied and must not
    /// appear in `extra`.
    pub fn primary(mut self, name: &str, kind: &str, extra: &str) -> Self {
        self.primary = Some(TableColumn::new(name, kind, extra));
        self
    }

    /// Append an additional column. Declaration order is preserved in the
    /// created table.
    pub fn column(mut self, name: &str, kind: &str, extra: &str) -> Self {
        self.columns.push(TableColumn::new(name, kind, extra));
        self
    }

    fn primary_or_default(&self) -> TableColumn {
        self.primary
            .clone()
            .unwrap_or_else(|| TableColumn::new("id", "INTEGER", "AUTOINCREMENT"))
    }
}

/// Outcome of one reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// The table did not exist and was created from the descriptor.
    Created,

    /// The table existed; `added` declared columns were appended
    /// (zero when the schema was already up to date).
    Migrated { added: usize },
}

/// Schema manager over a borrowed connection
///
/// Runs once, single-threaded, before any concurrent traffic is accepted.
pub struct SchemaManager<'a> {
    conn: &'a Connection,
}

impl<'a> SchemaManager<'a> {
    /// Create a new schema manager for the given connection
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Reconcile the live database against one table descriptor.
    ///
    /// Stops at the first failing statement. A partially migrated table is
    /// safe to reconcile again: every add-column statement targets only a
    /// still-missing column.
    pub fn reconcile(&self, table: &TableSchema) -> StoreResult<Reconciliation> {
        if self.table_exists(&table.name).map_err(|e| {
            StoreError::Schema(format!("failed to inspect table {}: {}", table.name, e))
        })? {
            let added = self.add_missing_columns(table)?;
            Ok(Reconciliation::Migrated { added })
        } else {
            self.create_table(table)?;
            Ok(Reconciliation::Created)
        }
    }

    fn table_exists(&self, name: &str) -> rusqlite::Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
            [name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn create_table(&self, table: &TableSchema) -> StoreResult<()> {
        let mut definitions = vec![table.primary_or_default().definition(true)];
        definitions.extend(table.columns.iter().map(|c| c.definition(false)));

        let sql = format!("CREATE TABLE {} ({})", table.name, definitions.join(", "));
        self.conn.execute(&sql, []).map_err(|e| {
            StoreError::Schema(format!("failed to create table {}: {}", table.name, e))
        })?;
        Ok(())
    }

    /// Append every declared column (primary first, then the rest in
    /// declaration order) that the live table does not already have.
    fn add_missing_columns(&self, table: &TableSchema) -> StoreResult<usize> {
        let existing = self.existing_columns(&table.name).map_err(|e| {
            StoreError::Schema(format!("failed to list columns of {}: {}", table.name, e))
        })?;

        let mut declared = vec![table.primary_or_default()];
        declared.extend(table.columns.iter().cloned());

        let mut added = 0;
        for column in &declared {
            if existing.contains(&column.name) {
                continue;
            }
            let sql = format!(
                "ALTER TABLE {} ADD COLUMN {}",
                table.name,
                column.definition(false)
            );
            self.conn.execute(&sql, []).map_err(|e| {
                StoreError::Schema(format!(
                    "failed to add column {} to {}: {}",
                    column.name, table.name, e
                ))
            })?;
            added += 1;
        }

        Ok(added)
    }

    fn existing_columns(&self, name: &str) -> rusqlite::Result<HashSet<String>> {
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({})", name))?;
        let names = stmt.query_map([], |row| row.get::<_, String>(1))?;
        names.collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn create_test_db() -> Connection {
        Connection::open_in_memory().unwrap()
    }

    fn notes_table() -> TableSchema {
        TableSchema::new("notes")
            .column("title", "TEXT", "")
            .column("body", "TEXT", "")
            .column("version", "TEXT", "")
    }

    fn column_names(conn: &Connection, table: &str) -> Vec<String> {
        let mut stmt = conn
            .prepare(&format!("PRAGMA table_info({})", table))
            .unwrap();
        let names = stmt.query_map([], |row| row.get::<_, String>(1)).unwrap();
        names.collect::<Result<Vec<_>, _>>().unwrap()
    }

    #[test]
    fn test_creates_missing_table() {
        let conn = create_test_db();
        let manager = SchemaManager::new(&conn);

        let outcome = manager.reconcile(&notes_table()).unwrap();
        assert_eq!(outcome, Reconciliation::Created);

        // Default primary comes first, declared columns follow in order.
        assert_eq!(
            column_names(&conn, "notes"),
            vec!["id", "title", "body", "version"]
        );
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let conn = create_test_db();
        let manager = SchemaManager::new(&conn);

        manager.reconcile(&notes_table()).unwrap();
        let outcome = manager.reconcile(&notes_table()).unwrap();
        assert_eq!(outcome, Reconciliation::Migrated { added: 0 });
    }

    #[test]
    fn test_adds_missing_columns_preserving_data() {
        let conn = create_test_db();
        conn.execute(
            "CREATE TABLE notes (id INTEGER PRIMARY KEY AUTOINCREMENT, title TEXT)",
            [],
        )
        .unwrap();
        conn.execute("INSERT INTO notes (title) VALUES ('keep me')", [])
            .unwrap();

        let manager = SchemaManager::new(&conn);
        let outcome = manager.reconcile(&notes_table()).unwrap();
        assert_eq!(outcome, Reconciliation::Migrated { added: 2 });

        let title: String = conn
            .query_row("SELECT title FROM notes WHERE id = 1", [], |row| row.get(0))
            .unwrap();
        assert_eq!(title, "keep me");
        assert_eq!(
            column_names(&conn, "notes"),
            vec!["id", "title", "body", "version"]
        );
    }

    #[test]
    fn test_declared_primary_column() {
        let conn = create_test_db();
        let manager = SchemaManager::new(&conn);

        let table = TableSchema::new("kv")
            .primary("key", "TEXT", "")
            .column("value", "TEXT", "");
        manager.reconcile(&table).unwrap();

        let pk: i64 = conn
            .query_row("SELECT pk FROM pragma_table_info('kv') WHERE name='key'", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(pk, 1);
    }

    #[test]
    fn test_leaves_undeclared_columns_alone() {
        let conn = create_test_db();
        let manager = SchemaManager::new(&conn);
        manager.reconcile(&notes_table()).unwrap();

        conn.execute("ALTER TABLE notes ADD COLUMN custom TEXT", [])
            .unwrap();
        let outcome = manager.reconcile(&notes_table()).unwrap();
        assert_eq!(outcome, Reconciliation::Migrated { added: 0 });
        assert!(column_names(&conn, "notes").contains(&"custom".to_string()));
    }
}
