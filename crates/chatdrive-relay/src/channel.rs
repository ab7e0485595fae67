//! The relay implementation of the remote chunk channel port.
//!
//! Chunk objects are message attachments: one message per chunk, created in
//! the container channel with a name hint for operator debuggability.
//! Attachment URLs are time-limited, so they are resolved fresh before every
//! download. The metadata document lives at the channel's well-known
//! metadata location and is replaced in place on save.

use anyhow::Context;
use bytes::Bytes;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use chatdrive_core::domain::{ContainerId, ObjectId};
use chatdrive_core::ports::chunk_channel::{
    ChannelError, DeleteOutcome, ObjectBytes, RemoteChunkChannel, StoredObject,
};

use crate::client::RelayClient;

/// Pieces buffered between the download task and the consumer.
const DOWNLOAD_PIPELINE: usize = 8;

// ============================================================================
// Relay API response types
// ============================================================================

/// Response from creating a message with an attachment.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageCreated {
    /// Message id - the opaque object reference from the store's viewpoint
    id: String,
    /// Attachment URL valid right after the upload
    attachment_url: String,
}

/// Response from resolving a fresh attachment URL.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttachmentUrl {
    url: String,
}

// ============================================================================
// RelayChannel
// ============================================================================

/// [`RemoteChunkChannel`] over the relay REST API.
pub struct RelayChannel {
    client: RelayClient,
    /// Channel holding the single metadata document.
    metadata_container: ContainerId,
}

impl RelayChannel {
    pub fn new(client: RelayClient, metadata_container: ContainerId) -> Self {
        Self {
            client,
            metadata_container,
        }
    }
}

fn transport(err: anyhow::Error) -> ChannelError {
    ChannelError::Transport(format!("{err:#}"))
}

async fn error_body(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "unreadable error body".to_string());
    format!("status {status}: {body}")
}

#[async_trait::async_trait]
impl RemoteChunkChannel for RelayChannel {
    async fn send_object(
        &self,
        container: &ContainerId,
        payload: Bytes,
        name_hint: &str,
    ) -> Result<StoredObject, ChannelError> {
        debug!(container = %container, bytes = payload.len(), name_hint, "sending object");
        let request = self
            .client
            .request(Method::POST, &format!("/channels/{container}/messages"))
            .header("Content-Type", "application/octet-stream")
            .header("X-Attachment-Name", name_hint)
            .body(payload.to_vec());

        let response = self.client.execute(request).await.map_err(transport)?;
        if !response.status().is_success() {
            return Err(ChannelError::Transport(error_body(response).await));
        }
        let created: MessageCreated = response
            .json()
            .await
            .context("malformed message creation response")
            .map_err(transport)?;

        Ok(StoredObject {
            id: ObjectId::new(created.id)
                .map_err(|err| ChannelError::Transport(err.to_string()))?,
            download_url: created.attachment_url,
        })
    }

    async fn fetch_object_url(
        &self,
        container: &ContainerId,
        object: &ObjectId,
    ) -> Result<String, ChannelError> {
        let request = self.client.request(
            Method::GET,
            &format!("/channels/{container}/messages/{object}/attachment"),
        );
        let response = self.client.execute(request).await.map_err(transport)?;
        match response.status() {
            StatusCode::NOT_FOUND => Err(ChannelError::NotFound(format!("object {object}"))),
            status if status.is_success() => {
                let resolved: AttachmentUrl = response
                    .json()
                    .await
                    .context("malformed attachment url response")
                    .map_err(transport)?;
                Ok(resolved.url)
            }
            _ => Err(ChannelError::Transport(error_body(response).await)),
        }
    }

    async fn fetch_object(&self, url: &str) -> Result<ObjectBytes, ChannelError> {
        // Attachment URLs are absolute and point at the storage host, not
        // the API base; no bearer token travels with them.
        let response = self
            .client
            .http_client()
            .get(url)
            .send()
            .await
            .context("attachment download failed")
            .map_err(transport)?;
        match response.status() {
            StatusCode::NOT_FOUND => {
                return Err(ChannelError::NotFound(format!("attachment at {url}")))
            }
            status if !status.is_success() => {
                return Err(ChannelError::Transport(error_body(response).await))
            }
            _ => {}
        }

        let (tx, rx) = mpsc::channel(DOWNLOAD_PIPELINE);
        tokio::spawn(async move {
            let mut response = response;
            loop {
                match response.chunk().await {
                    Ok(Some(piece)) => {
                        if tx.send(Ok(piece)).await.is_err() {
                            return;
                        }
                    }
                    Ok(None) => return,
                    Err(err) => {
                        warn!(error = %err, "attachment download interrupted");
                        let _ = tx
                            .send(Err(ChannelError::Transport(format!(
                                "download interrupted: {err}"
                            ))))
                            .await;
                        return;
                    }
                }
            }
        });
        Ok(rx)
    }

    async fn delete_object(
        &self,
        container: &ContainerId,
        object: &ObjectId,
    ) -> Result<DeleteOutcome, ChannelError> {
        let request = self.client.request(
            Method::DELETE,
            &format!("/channels/{container}/messages/{object}"),
        );
        let response = self.client.execute(request).await.map_err(transport)?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(DeleteOutcome::NotFound),
            status if status.is_success() => Ok(DeleteOutcome::Deleted),
            _ => Err(ChannelError::Transport(error_body(response).await)),
        }
    }

    async fn load_metadata(&self) -> Result<Option<Bytes>, ChannelError> {
        let request = self.client.request(
            Method::GET,
            &format!("/channels/{}/metadata", self.metadata_container),
        );
        let response = self.client.execute(request).await.map_err(transport)?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            // The backend reports an ambiguous metadata location (more than
            // one candidate document) as a conflict; that is external
            // corruption the store must not paper over.
            StatusCode::CONFLICT => Err(ChannelError::Transport(
                "multiple metadata documents exist remotely".to_string(),
            )),
            status if status.is_success() => {
                let bytes = response
                    .bytes()
                    .await
                    .context("metadata download failed")
                    .map_err(transport)?;
                Ok(Some(bytes))
            }
            _ => Err(ChannelError::Transport(error_body(response).await)),
        }
    }

    async fn store_metadata(&self, document: Bytes) -> Result<(), ChannelError> {
        let request = self
            .client
            .request(
                Method::PUT,
                &format!("/channels/{}/metadata", self.metadata_container),
            )
            .header("Content-Type", "application/json")
            .body(document.to_vec());
        let response = self.client.execute(request).await.map_err(transport)?;
        if !response.status().is_success() {
            return Err(ChannelError::Transport(error_body(response).await));
        }
        debug!("metadata document stored");
        Ok(())
    }
}
