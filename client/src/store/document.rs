//! Document types held by the document store.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{Result, StoreError};

/// Store-assigned identifier of a document.
pub type DocumentId = String;

/// A stored document: id, optimistic version counter and JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Store-assigned, immutable identifier
    pub id: DocumentId,
    /// Version number, incremented on each committed write
    pub version: u64,
    /// The actual data payload (JSON value)
    pub data: serde_json::Value,
    /// When the document was first created
    pub created_at: DateTime<Utc>,
    /// When the document was last written
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub(crate) fn new(id: DocumentId, data: serde_json::Value, now: DateTime<Utc>) -> Self {
        Self {
            id,
            version: 1,
            data,
            created_at: now,
            updated_at: now,
        }
    }

    /// Decode the payload into a typed schema struct.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.data.clone()).map_err(|e| StoreError::InvalidDocument {
            path: self.id.clone(),
            reason: e.to_string(),
        })
    }
}

/// Mint a fresh store-assigned document id.
pub(crate) fn new_document_id() -> DocumentId {
    uuid::Uuid::new_v4().to_string()
}
