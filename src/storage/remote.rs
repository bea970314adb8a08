use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;

use super::models::{AggregateStats, FileRecord, NewFile, Reaction, ReactionOutcome};
use super::{RecordStore, StoreError};
use crate::api::wire::{
    ErrorResponse, FileEnvelope, FileListResponse, ReactionRequest, ReactionResponse,
    ReactionsResponse, StatsResponse, SuccessResponse, UploadFileData, UploadRequest,
    UploadResponse, ViewResponse,
};
use crate::state_machine::ReactionState;

/// Record store reached over the HTTP API of a fileshare server.
pub struct RemoteStore {
    base_url: String,
    client: Client,
}

impl RemoteStore {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::ConnectionFailure(format!("cannot build client: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, StoreError> {
        let response = request
            .send()
            .await
            .map_err(|e| StoreError::ConnectionFailure(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return response.json::<T>().await.map_err(|e| {
                StoreError::TransactionFailure(format!("unexpected response body: {e}"))
            });
        }

        let message = response
            .json::<ErrorResponse>()
            .await
            .map(|body| body.error)
            .unwrap_or_else(|_| status.to_string());
        Err(status_error(status, message))
    }
}

/// Map an HTTP error status back onto the store error taxonomy.
fn status_error(status: StatusCode, message: String) -> StoreError {
    match status {
        StatusCode::NOT_FOUND => StoreError::NotFound(message),
        StatusCode::BAD_REQUEST | StatusCode::PAYLOAD_TOO_LARGE => {
            StoreError::InvalidArgument(message)
        }
        StatusCode::CONFLICT => StoreError::ConstraintViolation(message),
        StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::BAD_GATEWAY
        | StatusCode::GATEWAY_TIMEOUT => StoreError::ConnectionFailure(message),
        _ => StoreError::TransactionFailure(format!("{status}: {message}")),
    }
}

#[async_trait]
impl RecordStore for RemoteStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.send::<StatsResponse>(self.client.get(self.url("/stats")))
            .await
            .map(|_| ())
    }

    async fn get_all_files(&self) -> Result<Vec<FileRecord>, StoreError> {
        let body: FileListResponse = self.send(self.client.get(self.url("/files"))).await?;
        Ok(body.files.into_iter().map(FileRecord::from).collect())
    }

    async fn get_file(&self, id: &str) -> Result<Option<FileRecord>, StoreError> {
        match self
            .send::<FileEnvelope>(self.client.get(self.url(&format!("/files/{id}"))))
            .await
        {
            Ok(body) => Ok(Some(body.file.into())),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn insert_file(&self, file: NewFile, uploader_id: &str) -> Result<String, StoreError> {
        let file_data = serde_json::to_string(&UploadFileData::from(&file))
            .map_err(|e| StoreError::InvalidArgument(format!("cannot encode upload: {e}")))?;
        let request = UploadRequest {
            file_data,
            caption: file.caption,
            uploader_id: Some(uploader_id.to_string()),
        };

        let body: UploadResponse = self
            .send(self.client.post(self.url("/upload")).json(&request))
            .await?;
        Ok(body.file_id)
    }

    async fn delete_file(&self, id: &str) -> Result<(), StoreError> {
        self.send::<SuccessResponse>(self.client.delete(self.url(&format!("/files/{id}"))))
            .await
            .map(|_| ())
    }

    async fn increment_views(&self, id: &str) -> Result<u64, StoreError> {
        let body: ViewResponse = self
            .send(self.client.post(self.url(&format!("/files/{id}/view"))))
            .await?;
        Ok(body.views)
    }

    async fn get_reactions_for_user(
        &self,
        user_id: &str,
    ) -> Result<HashMap<String, Reaction>, StoreError> {
        let body: ReactionsResponse = self
            .send(self.client.get(self.url(&format!("/reactions/{user_id}"))))
            .await?;
        Ok(body.reactions)
    }

    async fn apply_reaction(
        &self,
        file_id: &str,
        user_id: &str,
        reaction: Reaction,
    ) -> Result<ReactionOutcome, StoreError> {
        let request = ReactionRequest {
            reaction: reaction.as_str().to_string(),
            user_id: user_id.to_string(),
        };
        let body: ReactionResponse = self
            .send(
                self.client
                    .post(self.url(&format!("/files/{file_id}/reaction")))
                    .json(&request),
            )
            .await?;

        Ok(ReactionOutcome {
            state: ReactionState::from_reaction(body.reaction),
            like_delta: body.like_delta,
            dislike_delta: body.dislike_delta,
            likes: body.likes,
            dislikes: body.dislikes,
        })
    }

    async fn get_aggregate_stats(&self) -> Result<AggregateStats, StoreError> {
        let body: StatsResponse = self.send(self.client.get(self.url("/stats"))).await?;
        Ok(body.stats)
    }
}
