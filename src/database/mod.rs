//! Database module
//!
//! Persistence for the scratch service, organized into:
//!
//! ```text
//! database/
//! ├── pool       # Bounded r2d2 pool of pragma-configured connections
//! ├── schema     # Declarative table descriptors and additive reconciliation
//! └── scratches  # Record store with optimistic concurrency
//! ```
//!
//! [`Database`] is the composition root: it builds the pool, reconciles
//! the `scratches` table once before any traffic, and hands out store
//! handles. Construct it once at startup and inject it where needed; no
//! process-wide database state exists.
//!
//! # Usage
//!
//! ```rust,ignore
//! use scratch::database::Database;
//!
//! let db = Database::open_in_dir("/var/lib/scratch")?;
//! let store = db.scratches();
//! let (id, version) = store.create(&draft)?;
//! ```

pub mod pool;
pub mod schema;
pub mod scratches;

pub use pool::{SqlitePool, SqlitePooledConnection};
pub use schema::{Reconciliation, SchemaManager, TableColumn, TableSchema};
pub use scratches::{
    FieldUpdate, Scratch, ScratchDraft, ScratchPatch, ScratchStore, ScratchSummary,
};

use tracing::info;

use crate::error::StoreResult;

/// Database file name inside the data directory.
pub const DATABASE_FILE: &str = "scratch.db";

/// Handle to the scratch database
///
/// Open it once, share it (cheap behind an `Arc`), and use
/// [`scratches`](Database::scratches) for record operations. Opening runs
/// schema reconciliation; a reconciliation failure means the process must
/// not start serving.
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open the database at the given file path, creating and migrating
    /// the schema as needed.
    pub fn open(path: &str) -> StoreResult<Self> {
        let pool = pool::build_pool(path)?;

        {
            let conn = pool.get()?;
            let manager = SchemaManager::new(&conn);
            match manager.reconcile(&scratches::scratches_table())? {
                Reconciliation::Created => {
                    info!("Created scratches table at {}", path);
                }
                Reconciliation::Migrated { added: 0 } => {
                    info!("Scratch database schema is current");
                }
                Reconciliation::Migrated { added } => {
                    info!("Migrated scratches table: {} column(s) added", added);
                }
            }
        }

        Ok(Self { pool })
    }

    /// Open the database from a data directory
    ///
    /// Uses the standard file path: `{data_dir}/scratch.db`
    pub fn open_in_dir(data_dir: &str) -> StoreResult<Self> {
        let path = format!("{}/{}", data_dir, DATABASE_FILE);
        Self::open(&path)
    }

    /// Get a store handle for scratch records
    pub fn scratches(&self) -> ScratchStore<'_> {
        ScratchStore::new(&self.pool)
    }

    /// Check a raw connection out of the pool (for advanced queries)
    pub fn conn(&self) -> StoreResult<SqlitePooledConnection> {
        Ok(self.pool.get()?)
    }
}
