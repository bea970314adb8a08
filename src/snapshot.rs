//! Export and import of every file record and reaction record.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::models::{AggregateStats, FileRecord, Reaction, ReactionRecord};
use crate::storage::StoreError;

pub const SNAPSHOT_VERSION: &str = "1.0";

/// Full contents of a record store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub files: Vec<FileRecord>,
    pub reactions: Vec<ReactionRecord>,
}

impl Snapshot {
    pub fn new(files: Vec<FileRecord>, reactions: Vec<ReactionRecord>) -> Self {
        Self {
            version: SNAPSHOT_VERSION.to_string(),
            exported_at: Utc::now(),
            files,
            reactions,
        }
    }

    pub fn to_json(&self) -> Result<String, StoreError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| StoreError::InvalidArgument(format!("cannot encode snapshot: {e}")))
    }

    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        serde_json::from_str(json)
            .map_err(|e| StoreError::InvalidArgument(format!("invalid snapshot: {e}")))
    }

    /// Reject snapshots that would break record uniqueness, reference missing files, or
    /// hold fewer likes or dislikes on a file than its reaction records account for.
    ///
    /// Counters may exceed the records: a local store mirrors remote counters that
    /// include reactions from users it has no records for.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.version != SNAPSHOT_VERSION {
            return Err(StoreError::InvalidArgument(format!(
                "unsupported snapshot version '{}'",
                self.version
            )));
        }

        let mut file_ids = HashSet::new();
        for file in &self.files {
            if !file_ids.insert(file.id.as_str()) {
                return Err(StoreError::ConstraintViolation(format!(
                    "duplicate file id '{}'",
                    file.id
                )));
            }
        }

        let mut pairs = HashSet::new();
        let mut counted: HashMap<&str, (u64, u64)> = HashMap::new();
        for record in &self.reactions {
            if !file_ids.contains(record.file_id.as_str()) {
                return Err(StoreError::InvalidArgument(format!(
                    "reaction references unknown file '{}'",
                    record.file_id
                )));
            }
            if !pairs.insert((record.user_id.as_str(), record.file_id.as_str())) {
                return Err(StoreError::ConstraintViolation(format!(
                    "duplicate reaction for user '{}' on file '{}'",
                    record.user_id, record.file_id
                )));
            }

            let entry = counted.entry(record.file_id.as_str()).or_default();
            match record.reaction {
                Reaction::Like => entry.0 += 1,
                Reaction::Dislike => entry.1 += 1,
            }
        }

        for file in &self.files {
            let (likes, dislikes) = counted.get(file.id.as_str()).copied().unwrap_or_default();
            if file.likes < likes || file.dislikes < dislikes {
                return Err(StoreError::ConstraintViolation(format!(
                    "file '{}' has {} likes and {} dislikes but {likes} like and {dislikes} dislike records",
                    file.id, file.likes, file.dislikes
                )));
            }
        }

        Ok(())
    }

    pub fn reactions_for(&self, user_id: &str) -> HashMap<String, Reaction> {
        self.reactions
            .iter()
            .filter(|r| r.user_id == user_id)
            .map(|r| (r.file_id.clone(), r.reaction))
            .collect()
    }

    pub fn stats(&self) -> AggregateStats {
        AggregateStats::from_files(&self.files)
    }
}

/// Stores that can dump and replace their whole contents.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn export_snapshot(&self) -> Result<Snapshot, StoreError>;

    /// Replace the store's contents with `snapshot` in one atomic unit.
    async fn import_snapshot(&self, snapshot: Snapshot) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(id: &str) -> FileRecord {
        counted_file(id, 0, 0)
    }

    fn counted_file(id: &str, likes: u64, dislikes: u64) -> FileRecord {
        FileRecord {
            id: id.to_string(),
            name: format!("{id}.txt"),
            mime_type: "text/plain".to_string(),
            size_bytes: 5,
            content: "hello".to_string(),
            text_content: Some("hello".to_string()),
            caption: None,
            uploaded_at: Utc::now(),
            views: 3,
            likes,
            dislikes,
            uploader_id: "user_a".to_string(),
        }
    }

    fn like(user_id: &str, file_id: &str) -> ReactionRecord {
        ReactionRecord {
            user_id: user_id.to_string(),
            file_id: file_id.to_string(),
            reaction: Reaction::Like,
        }
    }

    #[test]
    fn test_validate_accepts_consistent_snapshot() {
        let snapshot = Snapshot::new(
            vec![counted_file("f1", 1, 0), file("f2")],
            vec![like("u1", "f1")],
        );
        snapshot.validate().unwrap();
        assert_eq!(snapshot.stats().total_files, 2);
        assert_eq!(snapshot.stats().total_views, 6);
        assert_eq!(snapshot.reactions_for("u1").get("f1"), Some(&Reaction::Like));
    }

    #[test]
    fn test_validate_rejects_duplicate_pair() {
        let snapshot = Snapshot::new(
            vec![counted_file("f1", 2, 0)],
            vec![like("u1", "f1"), like("u1", "f1")],
        );
        assert!(matches!(
            snapshot.validate(),
            Err(StoreError::ConstraintViolation(_))
        ));
    }

    #[test]
    fn test_validate_rejects_unknown_file() {
        let snapshot = Snapshot::new(vec![file("f1")], vec![like("u1", "missing")]);
        assert!(matches!(
            snapshot.validate(),
            Err(StoreError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_validate_rejects_duplicate_file() {
        let snapshot = Snapshot::new(vec![file("f1"), file("f1")], vec![]);
        assert!(matches!(
            snapshot.validate(),
            Err(StoreError::ConstraintViolation(_))
        ));
    }

    #[test]
    fn test_validate_rejects_counters_below_records() {
        let snapshot = Snapshot::new(vec![file("f1")], vec![like("u1", "f1")]);
        assert!(matches!(
            snapshot.validate(),
            Err(StoreError::ConstraintViolation(_))
        ));

        let dislike = ReactionRecord {
            reaction: Reaction::Dislike,
            ..like("u2", "f1")
        };
        let snapshot = Snapshot::new(vec![counted_file("f1", 1, 0)], vec![dislike]);
        assert!(matches!(
            snapshot.validate(),
            Err(StoreError::ConstraintViolation(_))
        ));
    }

    #[test]
    fn test_validate_accepts_counters_from_unrecorded_users() {
        let snapshot = Snapshot::new(vec![counted_file("f1", 4, 2)], vec![like("u1", "f1")]);
        snapshot.validate().unwrap();
    }

    #[test]
    fn test_json_round_trip() {
        let snapshot = Snapshot::new(vec![counted_file("f1", 1, 0)], vec![like("u1", "f1")]);
        let parsed = Snapshot::from_json(&snapshot.to_json().unwrap()).unwrap();
        assert_eq!(parsed, snapshot);
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(matches!(
            Snapshot::from_json("{\"files\": 3}"),
            Err(StoreError::InvalidArgument(_))
        ));
    }
}
