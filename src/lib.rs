#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

//! Scratch - a self-hosted note storage service
//!
//! Scratch stores short notes ("scratches") in SQLite and exposes them
//! over a token-protected HTTP API. It can be used as a ready-to-run
//! server binary or as a library embedding just the storage layer.
//!
//! # Feature Flags
//!
//! | Feature | Description | Key Dependencies |
//! |---------|-------------|------------------|
//! | (none)  | Storage layer: pool, schema reconciliation, record store | `rusqlite`, `r2d2` |
//! | `cli`   | Full server binary with HTTP API and static serving | `clap`, `axum`, `tokio` |
//!
//! ```toml
//! # Storage layer only
//! scratch = { version = "0.4", default-features = false }
//!
//! # Default (server binary)
//! scratch = "0.4"
//! ```
//!
//! # Architecture
//!
//! - **[`database`]**: connection pool, additive schema reconciliation,
//!   and the record store with optimistic concurrency (always available)
//! - **[`config`]**: TOML + environment configuration
//! - **[`server`]**: axum HTTP adapter (requires `cli`)
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use scratch::{Database, ScratchDraft, ScratchPatch, FieldUpdate};
//!
//! let db = Database::open_in_dir("/var/lib/scratch")?;
//! let store = db.scratches();
//!
//! // Create a note
//! let (id, version) = store.create(&ScratchDraft {
//!     title: "groceries".to_string(),
//!     body: "milk, eggs".to_string(),
//!     tags: vec!["home".to_string()],
//! })?;
//!
//! // Update it, conditioned on the version we hold
//! let patch = ScratchPatch {
//!     body: FieldUpdate::Set("milk, eggs, butter".to_string()),
//!     ..Default::default()
//! };
//! let version = store.update(id, &version, &patch)?;
//!
//! // A stale token is rejected, never silently overwritten
//! assert!(store.update(id, "stale", &patch).is_err());
//! ```

pub mod config;
pub mod database;
pub mod error;

// Server module - requires CLI feature
#[cfg(feature = "cli")]
pub mod server;

/// Crate version, reported by the `/-/verify` endpoint.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// Re-exports of commonly used types
// =============================================================================

pub use config::ScratchConfig;

pub use database::{
    Database, FieldUpdate, Reconciliation, SchemaManager, Scratch, ScratchDraft, ScratchPatch,
    ScratchStore, ScratchSummary, TableColumn, TableSchema,
};

pub use error::{StoreError, StoreResult};

#[cfg(feature = "cli")]
pub use server::{create_router, start_server};
