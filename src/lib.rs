//! fileshare - small file sharing with like/dislike reactions
//!
//! This crate provides:
//! - A reaction state machine that keeps per-user reactions and per-file counters consistent
//! - Interchangeable record stores: SQLite (sqlx), an offline redb store, and a remote HTTP store
//! - An availability selector that prefers the remote store and falls back to the local one
//! - A REST API serving the SQLite store, plus JSON snapshots for moving data between stores

pub mod api;
pub mod config;
pub mod engine;
pub mod snapshot;
pub mod state_machine;
pub mod storage;
#[cfg(test)]
pub mod testutil;

use config::Config;
use storage::SqlStore;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub store: SqlStore,
}
