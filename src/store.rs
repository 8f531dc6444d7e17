//! Collaborator contracts consumed by the importer and the history ledger.

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::model::Library;

/// Whole-document access to the library.
#[async_trait]
pub trait LibraryStore: Send + Sync {
    /// Returns an empty library when nothing has been saved yet.
    async fn load(&self) -> Result<Library>;

    async fn save(&self, library: &Library) -> Result<()>;
}

/// Best-effort remote cover discovery.
#[async_trait]
pub trait CoverLookup: Send + Sync {
    async fn find(&self, title: &str, author: &str) -> Result<Option<String>>;

    /// Downloads an image, returning its bytes and content type.
    async fn fetch(&self, url: &str) -> Result<(Vec<u8>, String)>;
}

/// Durable storage for cover images.
#[async_trait]
pub trait CoverStore: Send + Sync {
    /// Stores the bytes under `key` and returns a URL they can be served from.
    async fn store(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String>;
}

/// Library kept in process memory. Used by the `memory` backend and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    library: Mutex<Option<Library>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LibraryStore for MemoryStore {
    async fn load(&self) -> Result<Library> {
        Ok(self.library.lock().await.clone().unwrap_or_default())
    }

    async fn save(&self, library: &Library) -> Result<()> {
        *self.library.lock().await = Some(library.clone());
        Ok(())
    }
}

/// Cover lookup that never finds anything, for deployments with covers disabled.
#[derive(Debug, Default)]
pub struct NoCovers;

#[async_trait]
impl CoverLookup for NoCovers {
    async fn find(&self, _title: &str, _author: &str) -> Result<Option<String>> {
        Ok(None)
    }

    async fn fetch(&self, url: &str) -> Result<(Vec<u8>, String)> {
        anyhow::bail!("cover lookup disabled, refusing to fetch {}", url)
    }
}

/// Keeps covers in memory and hands back `memory://` URLs.
#[derive(Debug, Default)]
pub struct MemoryCoverStore {
    pub objects: Mutex<Vec<(String, Vec<u8>, String)>>,
}

#[async_trait]
impl CoverStore for MemoryCoverStore {
    async fn store(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String> {
        self.objects
            .lock()
            .await
            .push((key.to_string(), bytes, content_type.to_string()));
        Ok(format!("memory://{}", key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_starts_empty_and_round_trips() {
        let store = MemoryStore::new();
        assert_eq!(store.load().await.unwrap(), Library::default());

        let mut library = Library::default();
        library.last_sync = Some(chrono::Utc::now());
        store.save(&library).await.unwrap();
        assert_eq!(store.load().await.unwrap(), library);
    }

    #[tokio::test]
    async fn test_memory_cover_store_returns_addressable_url() {
        let covers = MemoryCoverStore::default();
        let url = covers.store("covers/b1.jpg", vec![1, 2], "image/jpeg").await.unwrap();
        assert_eq!(url, "memory://covers/b1.jpg");
        assert_eq!(covers.objects.lock().await.len(), 1);
    }
}
