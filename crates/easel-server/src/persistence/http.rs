//! HTTP client for the external document store.
//!
//! Documents live at `{base_url}/documents/{room_id}`: `GET` returns the
//! document JSON or 404, `PUT` accepts the same JSON. The adapter reports
//! 404 as "no document"; every other non-success status is an error.

use async_trait::async_trait;
use easel_proto::{Document, RoomId};

use super::{DocumentStore, StoreError};

/// HTTP-backed document store client.
pub struct HttpStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpStore {
    /// Create a client for the store at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| StoreError::Request(e.to_string()))?;
        let base_url = base_url.into();
        let base_url = base_url.trim_end_matches('/').to_string();
        Ok(Self { client, base_url })
    }

    fn document_url(&self, room_id: &RoomId) -> String {
        format!("{}/documents/{}", self.base_url, room_id)
    }
}

#[async_trait]
impl DocumentStore for HttpStore {
    async fn load(&self, room_id: &RoomId) -> Result<Option<Document>, StoreError> {
        let response = self
            .client
            .get(self.document_url(room_id))
            .send()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(StoreError::Request(format!(
                "unexpected load status {}",
                response.status()
            )));
        }

        let document = response
            .json::<Document>()
            .await
            .map_err(|e| StoreError::InvalidBody(e.to_string()))?;
        Ok(Some(document))
    }

    async fn save(&self, room_id: &RoomId, document: &Document) -> Result<(), StoreError> {
        let response = self
            .client
            .put(self.document_url(room_id))
            .json(document)
            .send()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(StoreError::Request(format!(
                "unexpected save status {}",
                response.status()
            )));
        }
        Ok(())
    }
}
