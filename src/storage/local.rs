use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use async_trait::async_trait;
use redb::{ReadableTable, WriteTransaction};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::db::LocalDatabase;
use super::models::{
    AggregateStats, FileRecord, NewFile, Reaction, ReactionOutcome, ReactionRecord,
};
use super::tables::*;
use super::{RecordStore, StoreError};
use crate::snapshot::{Snapshot, SnapshotStore};
use crate::state_machine::{transition, ReactionState};

/// Default local storage quota (5MB)
pub const DEFAULT_LOCAL_QUOTA: u64 = 5 * 1024 * 1024;

/// Both persisted structures, loaded and written together.
#[derive(Debug, Default)]
struct LocalState {
    files: BTreeMap<String, FileRecord>,
    /// user id -> file id -> reaction
    reactions: BTreeMap<String, BTreeMap<String, Reaction>>,
}

/// Bytes used by the local store, per persisted key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageUsage {
    pub files_bytes: u64,
    pub reactions_bytes: u64,
    pub other_bytes: u64,
    pub total_bytes: u64,
    pub quota_bytes: u64,
    pub percentage_used: f64,
}

/// Offline record store kept in an embedded key-value database.
///
/// Every mutation reads both structures inside one write transaction, computes the
/// complete new state in memory and writes both keys before committing. A failed
/// computation or quota check aborts the transaction, so nothing partial is ever
/// visible to readers.
///
/// The `RecordStore` methods do blocking redb I/O on the calling task. That suits the
/// single-threaded CLI runtime; a multi-threaded server sharing this store should move
/// the calls onto `tokio::task::spawn_blocking`.
pub struct LocalStore {
    db: LocalDatabase,
    quota_bytes: u64,
}

impl LocalStore {
    pub fn new(db: LocalDatabase, quota_bytes: u64) -> Self {
        Self { db, quota_bytes }
    }

    pub fn open<P: AsRef<Path>>(data_dir: P, quota_bytes: u64) -> Result<Self, StoreError> {
        Ok(Self::new(LocalDatabase::open(data_dir)?, quota_bytes))
    }

    /// Read a standalone value such as the local user id.
    pub fn load_value<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        Ok(self.db.get(key)?)
    }

    pub fn store_value<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        Ok(self.db.put(key, value)?)
    }

    pub fn usage(&self) -> Result<StorageUsage, StoreError> {
        let sizes = self.db.entry_sizes()?;
        let files_bytes = sizes.get(FILES_KEY).copied().unwrap_or(0);
        let reactions_bytes = sizes.get(USER_REACTIONS_KEY).copied().unwrap_or(0);
        let total_bytes: u64 = sizes.values().sum();

        Ok(StorageUsage {
            files_bytes,
            reactions_bytes,
            other_bytes: total_bytes - files_bytes - reactions_bytes,
            total_bytes,
            quota_bytes: self.quota_bytes,
            percentage_used: if self.quota_bytes == 0 {
                0.0
            } else {
                total_bytes as f64 / self.quota_bytes as f64 * 100.0
            },
        })
    }

    /// Remove all application data, including the stored user id.
    pub fn clear(&self) -> Result<u64, StoreError> {
        let removed = self.db.purge_all()?;
        tracing::warn!(keys = removed, "Cleared local storage");
        Ok(removed)
    }

    fn load(&self) -> Result<LocalState, StoreError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(LOCAL_STORAGE)?;

        let files = match table.get(FILES_KEY)? {
            Some(data) => rmp_serde::from_slice(data.value())?,
            None => BTreeMap::new(),
        };
        let reactions = match table.get(USER_REACTIONS_KEY)? {
            Some(data) => rmp_serde::from_slice(data.value())?,
            None => BTreeMap::new(),
        };

        Ok(LocalState { files, reactions })
    }

    /// Run `f` against the current state and persist the result atomically.
    fn update<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut LocalState) -> Result<T, StoreError>,
    {
        let write_txn = self.db.begin_write()?;
        match self.mutate(&write_txn, f) {
            Ok(value) => {
                write_txn.commit()?;
                Ok(value)
            }
            Err(e) => {
                write_txn.abort()?;
                Err(e)
            }
        }
    }

    fn mutate<T, F>(&self, write_txn: &WriteTransaction, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut LocalState) -> Result<T, StoreError>,
    {
        let mut table = write_txn.open_table(LOCAL_STORAGE)?;

        let mut state = LocalState::default();
        let mut other_bytes = 0u64;
        for result in table.iter()? {
            let (key, value) = result?;
            match key.value() {
                FILES_KEY => state.files = rmp_serde::from_slice(value.value())?,
                USER_REACTIONS_KEY => state.reactions = rmp_serde::from_slice(value.value())?,
                _ => other_bytes += value.value().len() as u64,
            }
        }

        let value = f(&mut state)?;

        let files = rmp_serde::to_vec_named(&state.files)?;
        let reactions = rmp_serde::to_vec_named(&state.reactions)?;
        let required = other_bytes + files.len() as u64 + reactions.len() as u64;
        if required > self.quota_bytes {
            return Err(StoreError::QuotaExceeded {
                required,
                quota: self.quota_bytes,
            });
        }

        table.insert(FILES_KEY, files.as_slice())?;
        table.insert(USER_REACTIONS_KEY, reactions.as_slice())?;
        Ok(value)
    }
}

fn not_found(id: &str) -> StoreError {
    StoreError::NotFound(format!("file '{id}'"))
}

#[async_trait]
impl RecordStore for LocalStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.db.begin_read()?;
        Ok(())
    }

    async fn get_all_files(&self) -> Result<Vec<FileRecord>, StoreError> {
        let mut files: Vec<FileRecord> = self.load()?.files.into_values().collect();
        files.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        Ok(files)
    }

    async fn get_file(&self, id: &str) -> Result<Option<FileRecord>, StoreError> {
        Ok(self.load()?.files.remove(id))
    }

    async fn insert_file(&self, file: NewFile, uploader_id: &str) -> Result<String, StoreError> {
        let record = FileRecord::from_upload(file, uploader_id);
        let id = record.id.clone();
        self.update(|state| {
            state.files.insert(record.id.clone(), record);
            Ok(())
        })?;

        tracing::debug!(file_id = %id, "Stored file locally");
        Ok(id)
    }

    async fn delete_file(&self, id: &str) -> Result<(), StoreError> {
        self.update(|state| {
            state.files.remove(id).ok_or_else(|| not_found(id))?;
            for user_reactions in state.reactions.values_mut() {
                user_reactions.remove(id);
            }
            state.reactions.retain(|_, user_reactions| !user_reactions.is_empty());
            Ok(())
        })?;

        tracing::debug!(file_id = %id, "Deleted local file");
        Ok(())
    }

    async fn increment_views(&self, id: &str) -> Result<u64, StoreError> {
        self.update(|state| {
            let file = state.files.get_mut(id).ok_or_else(|| not_found(id))?;
            file.views = file.views.saturating_add(1);
            Ok(file.views)
        })
    }

    async fn get_reactions_for_user(
        &self,
        user_id: &str,
    ) -> Result<HashMap<String, Reaction>, StoreError> {
        Ok(self
            .load()?
            .reactions
            .remove(user_id)
            .map(|reactions| reactions.into_iter().collect())
            .unwrap_or_default())
    }

    async fn apply_reaction(
        &self,
        file_id: &str,
        user_id: &str,
        reaction: Reaction,
    ) -> Result<ReactionOutcome, StoreError> {
        let outcome = self.update(|state| {
            let file = state
                .files
                .get_mut(file_id)
                .ok_or_else(|| not_found(file_id))?;
            let user_reactions = state.reactions.entry(user_id.to_string()).or_default();

            let current = ReactionState::from_reaction(user_reactions.get(file_id).copied());
            let step = transition(current, reaction);
            let (likes, dislikes) = step.apply_to(file.likes, file.dislikes)?;
            file.likes = likes;
            file.dislikes = dislikes;

            match step.next.reaction() {
                Some(next) => {
                    user_reactions.insert(file_id.to_string(), next);
                }
                None => {
                    user_reactions.remove(file_id);
                }
            }
            if user_reactions.is_empty() {
                state.reactions.remove(user_id);
            }

            Ok(ReactionOutcome {
                state: step.next,
                like_delta: step.like_delta,
                dislike_delta: step.dislike_delta,
                likes,
                dislikes,
            })
        })?;

        tracing::debug!(
            file_id,
            user_id,
            reaction = %reaction,
            state = ?outcome.state,
            "Applied local reaction"
        );
        Ok(outcome)
    }

    async fn get_aggregate_stats(&self) -> Result<AggregateStats, StoreError> {
        Ok(AggregateStats::from_files(self.load()?.files.values()))
    }

    /// Records already held locally keep their local counters, since local reaction
    /// records were counted against them.
    async fn mirror_files(&self, files: &[FileRecord]) -> Result<usize, StoreError> {
        let known = self.load()?.files;
        if files.iter().all(|file| known.contains_key(&file.id)) {
            return Ok(0);
        }

        let added = self.update(|state| {
            let mut added = 0;
            for file in files {
                if !state.files.contains_key(&file.id) {
                    state.files.insert(file.id.clone(), file.clone());
                    added += 1;
                }
            }
            Ok(added)
        })?;

        tracing::debug!(files = added, "Mirrored remote files locally");
        Ok(added)
    }
}

#[async_trait]
impl SnapshotStore for LocalStore {
    async fn export_snapshot(&self) -> Result<Snapshot, StoreError> {
        let state = self.load()?;

        let mut files: Vec<FileRecord> = state.files.into_values().collect();
        files.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));

        let reactions = state
            .reactions
            .into_iter()
            .flat_map(|(user_id, reactions)| {
                reactions
                    .into_iter()
                    .map(move |(file_id, reaction)| ReactionRecord {
                        user_id: user_id.clone(),
                        file_id,
                        reaction,
                    })
            })
            .collect();

        Ok(Snapshot::new(files, reactions))
    }

    async fn import_snapshot(&self, snapshot: Snapshot) -> Result<(), StoreError> {
        snapshot.validate()?;

        let file_count = snapshot.files.len();
        let reaction_count = snapshot.reactions.len();
        self.update(move |state| {
            state.files = snapshot
                .files
                .into_iter()
                .map(|file| (file.id.clone(), file))
                .collect();
            state.reactions = BTreeMap::new();
            for record in snapshot.reactions {
                state
                    .reactions
                    .entry(record.user_id)
                    .or_default()
                    .insert(record.file_id, record.reaction);
            }
            Ok(())
        })?;

        tracing::info!(
            files = file_count,
            reactions = reaction_count,
            "Imported snapshot into local store"
        );
        Ok(())
    }
}
