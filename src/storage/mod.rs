pub mod db;
mod local;
pub mod models;
mod remote;
mod sql;
mod tables;

pub use db::{LocalDatabase, LocalError};
pub use local::{LocalStore, StorageUsage, DEFAULT_LOCAL_QUOTA};
pub use remote::RemoteStore;
pub use sql::{PurgeStats, SqlStore};
pub use tables::*;

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use models::{AggregateStats, FileRecord, NewFile, Reaction, ReactionOutcome};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Connection failure: {0}")]
    ConnectionFailure(String),
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
    #[error("Storage quota exceeded: {required} bytes required, quota is {quota} bytes")]
    QuotaExceeded { required: u64, quota: u64 },
    #[error("Transaction failure: {0}")]
    TransactionFailure(String),
    #[error(transparent)]
    Local(#[from] LocalError),
}

impl StoreError {
    /// Failures that say nothing about the request itself, only about the backend
    /// that served it. These are the ones worth retrying on another backend.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            StoreError::ConnectionFailure(_)
                | StoreError::TransactionFailure(_)
                | StoreError::Local(_)
        )
    }
}

/// Persistence of file records and reaction records.
///
/// Every implementation applies `apply_reaction` as one atomic unit: the reaction
/// record change and both counter changes commit together or not at all.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Cheap read used to decide whether the store is reachable.
    async fn ping(&self) -> Result<(), StoreError>;

    /// All files, newest upload first.
    async fn get_all_files(&self) -> Result<Vec<FileRecord>, StoreError>;

    async fn get_file(&self, id: &str) -> Result<Option<FileRecord>, StoreError>;

    /// Store a new file and return its generated id.
    async fn insert_file(&self, file: NewFile, uploader_id: &str) -> Result<String, StoreError>;

    /// Remove a file together with every reaction placed on it.
    async fn delete_file(&self, id: &str) -> Result<(), StoreError>;

    /// Count one view and return the new total.
    async fn increment_views(&self, id: &str) -> Result<u64, StoreError>;

    async fn get_reactions_for_user(
        &self,
        user_id: &str,
    ) -> Result<HashMap<String, Reaction>, StoreError>;

    async fn apply_reaction(
        &self,
        file_id: &str,
        user_id: &str,
        reaction: Reaction,
    ) -> Result<ReactionOutcome, StoreError>;

    async fn get_aggregate_stats(&self) -> Result<AggregateStats, StoreError>;

    /// Keep copies of records another backend served, so later operations on them can
    /// fall back to this store. Returns how many records were newly stored. Stores
    /// that never serve as a fallback ignore the records.
    async fn mirror_files(&self, _files: &[FileRecord]) -> Result<usize, StoreError> {
        Ok(0)
    }
}
