//! In-memory stand-ins for the remote spreadsheet and storage services.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::fetcher::TableSource;
use crate::uploader::{ImageStore, UploadPayload};

#[derive(Default)]
pub struct MemorySource {
    worksheets: Mutex<HashMap<String, Result<Vec<Vec<String>>, String>>>,
    calls: AtomicU64,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, resource: &str, values: Vec<Vec<String>>) {
        let mut worksheets = self.worksheets.lock().unwrap_or_else(|e| e.into_inner());
        worksheets.insert(resource.to_string(), Ok(values));
    }

    /// Make every read of `resource` fail with `message`
    pub fn fail(&self, resource: &str, message: &str) {
        let mut worksheets = self.worksheets.lock().unwrap_or_else(|e| e.into_inner());
        worksheets.insert(resource.to_string(), Err(message.to_string()));
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl TableSource for MemorySource {
    fn backend_tag(&self) -> &'static str {
        "memory"
    }

    async fn worksheet_values(&self, resource: &str) -> Result<Vec<Vec<String>>, String> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let worksheets = self.worksheets.lock().unwrap_or_else(|e| e.into_inner());
        worksheets
            .get(resource)
            .cloned()
            .unwrap_or_else(|| Err(format!("SpreadsheetNotFound: {}", resource)))
    }
}

/// One upload accepted by [`MemoryStore`]
#[derive(Debug, Clone, PartialEq)]
pub struct StoredFile {
    pub name: String,
    pub folder_id: String,
    pub content_type: String,
    pub size: usize,
}

#[derive(Default)]
pub struct MemoryStore {
    files: Mutex<Vec<StoredFile>>,
    failure: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later upload fail with `message`
    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap_or_else(|e| e.into_inner()) = Some(message.to_string());
    }

    pub fn files(&self) -> Vec<StoredFile> {
        self.files.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl ImageStore for MemoryStore {
    fn backend_tag(&self) -> &'static str {
        "memory"
    }

    async fn upload(
        &self,
        name: &str,
        folder_id: &str,
        payload: &UploadPayload,
    ) -> Result<String, String> {
        if let Some(message) = self.failure.lock().unwrap_or_else(|e| e.into_inner()).clone() {
            return Err(message);
        }
        let mut files = self.files.lock().unwrap_or_else(|e| e.into_inner());
        files.push(StoredFile {
            name: name.to_string(),
            folder_id: folder_id.to_string(),
            content_type: payload.content_type.clone(),
            size: payload.size(),
        });
        Ok(format!("file-{}", files.len()))
    }
}
