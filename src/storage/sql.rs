use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{FromRow, SqliteConnection};

use super::models::{
    AggregateStats, FileRecord, NewFile, Reaction, ReactionOutcome, ReactionRecord,
};
use super::{RecordStore, StoreError};
use crate::snapshot::{Snapshot, SnapshotStore};
use crate::state_machine::{transition, ReactionState};

const CREATE_FILES: &str = r#"
CREATE TABLE IF NOT EXISTS files (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    file_id TEXT UNIQUE NOT NULL,
    name TEXT NOT NULL,
    mime_type TEXT NOT NULL,
    size_bytes INTEGER NOT NULL,
    content TEXT NOT NULL,
    text_content TEXT,
    caption TEXT,
    upload_date TEXT NOT NULL,
    views INTEGER NOT NULL DEFAULT 0 CHECK (views >= 0),
    likes INTEGER NOT NULL DEFAULT 0 CHECK (likes >= 0),
    dislikes INTEGER NOT NULL DEFAULT 0 CHECK (dislikes >= 0),
    uploader_id TEXT NOT NULL
)
"#;

const CREATE_USER_REACTIONS: &str = r#"
CREATE TABLE IF NOT EXISTS user_reactions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    file_id TEXT NOT NULL REFERENCES files(file_id) ON DELETE CASCADE,
    reaction TEXT NOT NULL CHECK (reaction IN ('like', 'dislike')),
    created_at TEXT NOT NULL,
    UNIQUE (user_id, file_id)
)
"#;

const CREATE_REACTIONS_FILE_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_user_reactions_file ON user_reactions(file_id)";

const FILE_COLUMNS: &str = "file_id, name, mime_type, size_bytes, content, text_content, \
                            caption, upload_date, views, likes, dislikes, uploader_id";

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db)
                if db.is_unique_violation()
                    || db.is_check_violation()
                    || db.is_foreign_key_violation() =>
            {
                StoreError::ConstraintViolation(db.message().to_string())
            }
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => StoreError::ConnectionFailure(e.to_string()),
            _ => StoreError::TransactionFailure(e.to_string()),
        }
    }
}

#[derive(Debug, FromRow)]
struct FileRow {
    file_id: String,
    name: String,
    mime_type: String,
    size_bytes: i64,
    content: String,
    text_content: Option<String>,
    caption: Option<String>,
    upload_date: DateTime<Utc>,
    views: i64,
    likes: i64,
    dislikes: i64,
    uploader_id: String,
}

impl TryFrom<FileRow> for FileRecord {
    type Error = StoreError;

    fn try_from(row: FileRow) -> Result<Self, StoreError> {
        Ok(FileRecord {
            size_bytes: counter(row.size_bytes)?,
            views: counter(row.views)?,
            likes: counter(row.likes)?,
            dislikes: counter(row.dislikes)?,
            id: row.file_id,
            name: row.name,
            mime_type: row.mime_type,
            content: row.content,
            text_content: row.text_content,
            caption: row.caption,
            uploaded_at: row.upload_date,
            uploader_id: row.uploader_id,
        })
    }
}

fn counter(value: i64) -> Result<u64, StoreError> {
    u64::try_from(value)
        .map_err(|_| StoreError::ConstraintViolation(format!("negative counter {value}")))
}

fn column(value: u64) -> Result<i64, StoreError> {
    i64::try_from(value)
        .map_err(|_| StoreError::InvalidArgument(format!("value {value} is out of range")))
}

fn not_found(id: &str) -> StoreError {
    StoreError::NotFound(format!("file '{id}'"))
}

/// Statistics from a purge operation
#[derive(Debug, Default)]
pub struct PurgeStats {
    pub files: u64,
    pub reactions: u64,
}

/// Relational record store on SQLite.
///
/// `user_reactions` carries `UNIQUE(user_id, file_id)`, so the database itself
/// refuses a second reaction record for the same pair regardless of how many
/// writers are active.
#[derive(Clone)]
pub struct SqlStore {
    pool: SqlitePool,
}

impl SqlStore {
    /// Open or create `fileshare.db` inside `data_dir`
    pub async fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self, StoreError> {
        std::fs::create_dir_all(data_dir.as_ref()).map_err(|e| {
            StoreError::ConnectionFailure(format!("cannot create data directory: {e}"))
        })?;
        let options = SqliteConnectOptions::new().filename(data_dir.as_ref().join("fileshare.db"));
        Self::connect_with(options).await
    }

    /// Connect using a `sqlite://` URL
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)?;
        Self::connect_with(options).await
    }

    async fn connect_with(options: SqliteConnectOptions) -> Result<Self, StoreError> {
        let options = options
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5))
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.initialize().await?;
        Ok(store)
    }

    async fn initialize(&self) -> Result<(), StoreError> {
        for statement in [
            CREATE_FILES,
            CREATE_USER_REACTIONS,
            CREATE_REACTIONS_FILE_INDEX,
        ] {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Purge all data - for testing only
    pub async fn purge_all(&self) -> Result<PurgeStats, StoreError> {
        let mut tx = self.pool.begin().await?;
        let reactions = sqlx::query("DELETE FROM user_reactions")
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let files = sqlx::query("DELETE FROM files")
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;

        Ok(PurgeStats { files, reactions })
    }

    async fn insert_record(conn: &mut SqliteConnection, file: &FileRecord) -> Result<(), StoreError> {
        sqlx::query(&format!(
            "INSERT INTO files ({FILE_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(&file.id)
        .bind(&file.name)
        .bind(&file.mime_type)
        .bind(column(file.size_bytes)?)
        .bind(&file.content)
        .bind(&file.text_content)
        .bind(&file.caption)
        .bind(file.uploaded_at)
        .bind(column(file.views)?)
        .bind(column(file.likes)?)
        .bind(column(file.dislikes)?)
        .bind(&file.uploader_id)
        .execute(conn)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for SqlStore {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_all_files(&self) -> Result<Vec<FileRecord>, StoreError> {
        let rows = sqlx::query_as::<_, FileRow>(&format!(
            "SELECT {FILE_COLUMNS} FROM files ORDER BY upload_date DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(FileRecord::try_from).collect()
    }

    async fn get_file(&self, id: &str) -> Result<Option<FileRecord>, StoreError> {
        let row = sqlx::query_as::<_, FileRow>(&format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE file_id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(FileRecord::try_from).transpose()
    }

    async fn insert_file(&self, file: NewFile, uploader_id: &str) -> Result<String, StoreError> {
        let record = FileRecord::from_upload(file, uploader_id);
        let mut conn = self.pool.acquire().await?;
        Self::insert_record(&mut conn, &record).await?;

        tracing::debug!(file_id = %record.id, name = %record.name, "Stored file");
        Ok(record.id)
    }

    async fn delete_file(&self, id: &str) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM user_reactions WHERE file_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM files WHERE file_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if deleted == 0 {
            return Err(not_found(id));
        }
        tx.commit().await?;

        tracing::debug!(file_id = %id, "Deleted file");
        Ok(())
    }

    async fn increment_views(&self, id: &str) -> Result<u64, StoreError> {
        let views: Option<i64> =
            sqlx::query_scalar("UPDATE files SET views = views + 1 WHERE file_id = ? RETURNING views")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        counter(views.ok_or_else(|| not_found(id))?)
    }

    async fn get_reactions_for_user(
        &self,
        user_id: &str,
    ) -> Result<HashMap<String, Reaction>, StoreError> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT file_id, reaction FROM user_reactions WHERE user_id = ?")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter()
            .map(|(file_id, reaction)| -> Result<(String, Reaction), StoreError> {
                Ok((file_id, reaction.parse()?))
            })
            .collect()
    }

    async fn apply_reaction(
        &self,
        file_id: &str,
        user_id: &str,
        reaction: Reaction,
    ) -> Result<ReactionOutcome, StoreError> {
        // Dropping `tx` on any early return rolls the whole unit back.
        let mut tx = self.pool.begin().await?;

        // Write to the file row before reading anything so this transaction holds
        // the database write lock and concurrent reactions queue behind it.
        let touched = sqlx::query("UPDATE files SET likes = likes WHERE file_id = ?")
            .bind(file_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if touched == 0 {
            return Err(not_found(file_id));
        }

        let current: Option<String> = sqlx::query_scalar(
            "SELECT reaction FROM user_reactions WHERE user_id = ? AND file_id = ?",
        )
        .bind(user_id)
        .bind(file_id)
        .fetch_optional(&mut *tx)
        .await?;
        let current = current.as_deref().map(Reaction::from_str).transpose()?;

        let step = transition(ReactionState::from_reaction(current), reaction);
        match (current, step.next.reaction()) {
            (None, Some(next)) => {
                sqlx::query(
                    "INSERT INTO user_reactions (user_id, file_id, reaction, created_at) \
                     VALUES (?, ?, ?, ?)",
                )
                .bind(user_id)
                .bind(file_id)
                .bind(next.as_str())
                .bind(Utc::now())
                .execute(&mut *tx)
                .await?;
            }
            (Some(_), Some(next)) => {
                sqlx::query(
                    "UPDATE user_reactions SET reaction = ? WHERE user_id = ? AND file_id = ?",
                )
                .bind(next.as_str())
                .bind(user_id)
                .bind(file_id)
                .execute(&mut *tx)
                .await?;
            }
            (Some(_), None) => {
                sqlx::query("DELETE FROM user_reactions WHERE user_id = ? AND file_id = ?")
                    .bind(user_id)
                    .bind(file_id)
                    .execute(&mut *tx)
                    .await?;
            }
            (None, None) => {}
        }

        // Both counters move through bound deltas; column names are never built
        // from the reaction value.
        let (likes, dislikes): (i64, i64) = sqlx::query_as(
            "UPDATE files SET likes = likes + ?, dislikes = dislikes + ? \
             WHERE file_id = ? RETURNING likes, dislikes",
        )
        .bind(step.like_delta)
        .bind(step.dislike_delta)
        .bind(file_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(
            file_id,
            user_id,
            reaction = %reaction,
            state = ?step.next,
            "Applied reaction"
        );

        Ok(ReactionOutcome {
            state: step.next,
            like_delta: step.like_delta,
            dislike_delta: step.dislike_delta,
            likes: counter(likes)?,
            dislikes: counter(dislikes)?,
        })
    }

    async fn get_aggregate_stats(&self) -> Result<AggregateStats, StoreError> {
        let (total_files, total_views, total_likes): (i64, i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(views), 0), COALESCE(SUM(likes), 0) FROM files",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(AggregateStats {
            total_files: counter(total_files)?,
            total_views: counter(total_views)?,
            total_likes: counter(total_likes)?,
        })
    }
}

#[async_trait]
impl SnapshotStore for SqlStore {
    async fn export_snapshot(&self) -> Result<Snapshot, StoreError> {
        let files = self.get_all_files().await?;

        let rows: Vec<(String, String, String)> = sqlx::query_as(
            "SELECT user_id, file_id, reaction FROM user_reactions ORDER BY user_id, file_id",
        )
        .fetch_all(&self.pool)
        .await?;
        let reactions = rows
            .into_iter()
            .map(|(user_id, file_id, reaction)| -> Result<ReactionRecord, StoreError> {
                Ok(ReactionRecord {
                    user_id,
                    file_id,
                    reaction: reaction.parse()?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Snapshot::new(files, reactions))
    }

    async fn import_snapshot(&self, snapshot: Snapshot) -> Result<(), StoreError> {
        snapshot.validate()?;

        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM user_reactions")
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM files").execute(&mut *tx).await?;

        // Oldest first so autoincrement ids keep the upload order as a tie-breaker.
        // Exports list files newest first, so equal timestamps keep that order reversed.
        let mut files: Vec<&FileRecord> = snapshot.files.iter().rev().collect();
        files.sort_by_key(|file| file.uploaded_at);
        for file in files {
            Self::insert_record(&mut tx, file).await?;
        }
        for record in &snapshot.reactions {
            sqlx::query(
                "INSERT INTO user_reactions (user_id, file_id, reaction, created_at) \
                 VALUES (?, ?, ?, ?)",
            )
            .bind(&record.user_id)
            .bind(&record.file_id)
            .bind(record.reaction.as_str())
            .bind(snapshot.exported_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        tracing::info!(
            files = snapshot.files.len(),
            reactions = snapshot.reactions.len(),
            "Imported snapshot"
        );
        Ok(())
    }
}
