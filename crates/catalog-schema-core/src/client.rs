//! The persistence seam.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

use crate::payload::{SchemaSubmission, StoredSchema};

/// A failed call to the persistence backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ClientError {
    pub message: String,
    /// Whether retrying the same submission may succeed.
    pub retryable: bool,
}

impl ClientError {
    pub fn retryable(message: impl Into<String>) -> Self {
        ClientError {
            message: message.into(),
            retryable: true,
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        ClientError {
            message: message.into(),
            retryable: false,
        }
    }
}

/// Something that stores a submitted schema.
pub trait SchemaClient {
    fn create_schema(&self, submission: &SchemaSubmission) -> Result<StoredSchema, ClientError>;
}

/// Keeps submitted schemas in memory.
#[derive(Debug, Default)]
pub struct MemoryClient {
    next_id: AtomicU64,
    stored: Mutex<Vec<StoredSchema>>,
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every schema stored so far, oldest first.
    pub fn stored(&self) -> Result<Vec<StoredSchema>, ClientError> {
        let stored = self
            .stored
            .lock()
            .map_err(|_| ClientError::fatal("schema store lock poisoned"))?;
        Ok(stored.clone())
    }
}

impl SchemaClient for MemoryClient {
    fn create_schema(&self, submission: &SchemaSubmission) -> Result<StoredSchema, ClientError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let schema = StoredSchema::from_submission(id, submission);
        self.stored
            .lock()
            .map_err(|_| ClientError::fatal("schema store lock poisoned"))?
            .push(schema.clone());
        tracing::info!(id, title = %schema.title, "stored schema");
        Ok(schema)
    }
}
