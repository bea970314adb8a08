use std::sync::Arc;

use super::selector::{AvailabilitySelector, Backend, Served};
use super::session::Session;
use crate::storage::models::{AggregateStats, FileCategory, FileRecord, NewFile};
use crate::storage::StoreError;

/// File creation, removal and browsing, independent of reactions.
pub struct FileEngine {
    selector: Arc<AvailabilitySelector>,
    max_file_size: u64,
}

impl FileEngine {
    pub fn new(selector: Arc<AvailabilitySelector>, max_file_size: u64) -> Self {
        Self {
            selector,
            max_file_size,
        }
    }

    /// All files, newest first, optionally narrowed to one category. Files served by
    /// the remote are mirrored into the local store before filtering.
    pub async fn list_files(
        &self,
        category: Option<FileCategory>,
    ) -> Result<Served<Vec<FileRecord>>, StoreError> {
        let mut served = self
            .selector
            .execute("get_all_files", |store| async move {
                store.get_all_files().await
            })
            .await?;

        if served.backend == Backend::Remote {
            self.selector.mirror_locally(&served.value).await;
        }
        if let Some(category) = category {
            served.value.retain(|f| f.category() == Some(category));
        }
        Ok(served)
    }

    pub async fn get_file(&self, id: &str) -> Result<Served<FileRecord>, StoreError> {
        let served = self
            .selector
            .execute("get_file", move |store| async move { store.get_file(id).await })
            .await?;

        match served.value {
            Some(file) => {
                if served.backend == Backend::Remote {
                    self.selector
                        .mirror_locally(std::slice::from_ref(&file))
                        .await;
                }
                Ok(Served {
                    backend: served.backend,
                    value: file,
                })
            }
            None => Err(StoreError::NotFound(format!("file '{id}'"))),
        }
    }

    /// Validate an upload against the allow-list and store it. Returns the new id.
    pub async fn create_file(
        &self,
        session: &Session,
        mut file: NewFile,
    ) -> Result<Served<String>, StoreError> {
        file.resolve_mime_type();
        file.validate(self.max_file_size)?;

        let uploader_id = session.user_id();
        let file = &file;
        let served = self
            .selector
            .execute("insert_file", move |store| async move {
                store.insert_file(file.clone(), uploader_id).await
            })
            .await?;

        tracing::debug!(file_id = %served.value, backend = ?served.backend, "File created");
        Ok(served)
    }

    pub async fn delete_file(&self, id: &str) -> Result<Served<()>, StoreError> {
        let served = self
            .selector
            .execute("delete_file", move |store| async move {
                store.delete_file(id).await
            })
            .await?;

        if served.backend == Backend::Remote {
            self.selector.forget_locally(id).await;
        }
        tracing::debug!(file_id = %id, backend = ?served.backend, "File deleted");
        Ok(served)
    }

    /// Count one view of a file and return the new total.
    pub async fn record_view(&self, id: &str) -> Result<Served<u64>, StoreError> {
        self.selector
            .execute("increment_views", move |store| async move {
                store.increment_views(id).await
            })
            .await
    }

    pub async fn stats(&self) -> Result<Served<AggregateStats>, StoreError> {
        self.selector
            .execute("get_aggregate_stats", |store| async move {
                store.get_aggregate_stats().await
            })
            .await
    }
}
