//! The persistence seam: where model text comes from and goes to.

use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Loads and stores the textual form of models by uri.
#[async_trait]
pub trait ModelPersistence: Send + Sync {
    /// Text of the document at `uri`, `None` if it does not exist.
    async fn load(&self, uri: &str) -> Result<Option<String>, PersistenceError>;

    async fn save(&self, uri: &str, text: &str) -> Result<(), PersistenceError>;
}

/// Which operation [`MemoryPersistence`] should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOn {
    Load,
    Save,
}

/// In-memory persistence.
///
/// Clones share storage. Failures can be injected to exercise error paths.
#[derive(Debug, Clone, Default)]
pub struct MemoryPersistence {
    inner: Arc<Mutex<MemoryInner>>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    documents: IndexMap<String, String>,
    fail_on: Option<FailOn>,
    saves: usize,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(self, uri: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert(uri, text);
        self
    }

    /// Store text directly, bypassing `save`.
    pub fn insert(&self, uri: impl Into<String>, text: impl Into<String>) {
        self.inner.lock().documents.insert(uri.into(), text.into());
    }

    pub fn get(&self, uri: &str) -> Option<String> {
        self.inner.lock().documents.get(uri).cloned()
    }

    pub fn remove(&self, uri: &str) -> Option<String> {
        self.inner.lock().documents.shift_remove(uri)
    }

    pub fn fail_on(&self, fail_on: Option<FailOn>) {
        self.inner.lock().fail_on = fail_on;
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        self.inner.lock().saves
    }
}

#[async_trait]
impl ModelPersistence for MemoryPersistence {
    async fn load(&self, uri: &str) -> Result<Option<String>, PersistenceError> {
        let inner = self.inner.lock();
        if inner.fail_on == Some(FailOn::Load) {
            return Err(PersistenceError::Unavailable(format!("load of {uri} failed")));
        }
        Ok(inner.documents.get(uri).cloned())
    }

    async fn save(&self, uri: &str, text: &str) -> Result<(), PersistenceError> {
        let mut inner = self.inner.lock();
        if inner.fail_on == Some(FailOn::Save) {
            return Err(PersistenceError::Unavailable(format!("save of {uri} failed")));
        }
        inner.documents.insert(uri.to_string(), text.to_string());
        inner.saves += 1;
        Ok(())
    }
}
