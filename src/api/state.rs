//! Application state for the Payroll Engine API.
//!
//! This module defines the shared application state that is available
//! to all request handlers.

use std::sync::Arc;

use crate::config::ServiceConfig;
use crate::error::EngineResult;
use crate::ingest::UploadStore;
use crate::store::PayrollStore;

/// Shared application state.
///
/// Contains resources that are shared across all request handlers: the
/// payroll database and the directory uploads are buffered to.
#[derive(Clone)]
pub struct AppState {
    store: Arc<PayrollStore>,
    uploads: Arc<UploadStore>,
    max_upload_bytes: usize,
}

impl AppState {
    /// Creates a new application state over an existing store.
    pub fn new(store: PayrollStore, uploads: UploadStore, max_upload_bytes: usize) -> Self {
        Self {
            store: Arc::new(store),
            uploads: Arc::new(uploads),
            max_upload_bytes,
        }
    }

    /// Connects to the configured database and opens the upload directory.
    pub async fn from_config(config: &ServiceConfig) -> EngineResult<Self> {
        let store = PayrollStore::connect(&config.database).await?;
        let uploads = UploadStore::new(&config.uploads.directory)?;
        Ok(Self::new(store, uploads, config.uploads.max_upload_bytes))
    }

    /// Returns the payroll store.
    pub fn store(&self) -> &PayrollStore {
        &self.store
    }

    /// Returns the upload store.
    pub fn uploads(&self) -> &UploadStore {
        &self.uploads
    }

    /// Largest accepted request body.
    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }
}
