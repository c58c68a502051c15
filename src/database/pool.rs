//! Bounded SQLite connection pool
//!
//! Every connection is initialized with the same pragmas at checkout
//! creation: WAL journaling for concurrent readers during writes, a
//! multi-second busy timeout so contending writers queue instead of
//! failing immediately, NORMAL synchronous mode, and foreign keys on.
//!
//! The pool keeps a fixed set of warm connections and recycles each one
//! after a maximum lifetime. When all connections are busy, callers block
//! up to the acquire timeout and then fail with a storage-busy error
//! instead of hanging.

use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::error::StoreResult;

pub type SqlitePool = r2d2::Pool<r2d2_sqlite::SqliteConnectionManager>;
pub type SqlitePooledConnection = r2d2::PooledConnection<r2d2_sqlite::SqliteConnectionManager>;

/// Maximum simultaneously open connections.
const MAX_OPEN_CONNS: u32 = 16;

/// Recycle each connection after an hour.
const CONN_MAX_LIFETIME: Duration = Duration::from_secs(3600);

/// How long an acquire blocks on an exhausted pool before failing.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

/// SQLite busy handler timeout, milliseconds.
const BUSY_TIMEOUT_MS: i64 = 5000;

/// Build the connection pool for the database file at `path`.
///
/// The file is created on first connection if it does not exist.
pub fn build_pool(path: &str) -> StoreResult<SqlitePool> {
    let manager = SqliteConnectionManager::file(path).with_init(|c| {
        c.pragma_update(None, "journal_mode", &"WAL")?;
        c.pragma_update(None, "busy_timeout", &BUSY_TIMEOUT_MS)?;
        c.pragma_update(None, "synchronous", &"NORMAL")?;
        c.pragma_update(None, "foreign_keys", &"ON")?;
        Ok(())
    });

    let pool = Pool::builder()
        .max_size(MAX_OPEN_CONNS)
        .min_idle(Some(MAX_OPEN_CONNS))
        .max_lifetime(Some(CONN_MAX_LIFETIME))
        .connection_timeout(ACQUIRE_TIMEOUT)
        .build(manager)?;

    Ok(pool)
}
