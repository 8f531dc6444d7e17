//! Whole-document orchestration of every user-facing operation.
//!
//! Each mutating call loads the library once, applies its change in memory
//! and saves once. Nothing is written when the change fails.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;

use crate::error::LibrarianError;
use crate::history::{self, RenameOutcome, Restored};
use crate::model::{Book, DeletedBook, DeletedHighlight, HistoryEntry, Library, new_id};
use crate::parser::parse_clippings;
use crate::reconcile::{CoverPipeline, ImportStats, reconcile};
use crate::store::{CoverLookup, CoverStore, LibraryStore};

pub struct Librarian {
    store: Arc<dyn LibraryStore>,
    cover_lookup: Arc<dyn CoverLookup>,
    cover_store: Arc<dyn CoverStore>,
    // Serializes read-modify-write cycles issued through this process.
    write_lock: Mutex<()>,
}

impl Librarian {
    pub fn new(
        store: Arc<dyn LibraryStore>,
        cover_lookup: Arc<dyn CoverLookup>,
        cover_store: Arc<dyn CoverStore>,
    ) -> Self {
        Self {
            store,
            cover_lookup,
            cover_store,
            write_lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<Library, LibrarianError> {
        self.store.load().await.map_err(|e| {
            tracing::error!(error = %e, "failed to load library document");
            LibrarianError::Persistence(e)
        })
    }

    async fn save(&self, library: &Library) -> Result<(), LibrarianError> {
        self.store.save(library).await.map_err(|e| {
            tracing::error!(error = %e, "failed to save library document");
            LibrarianError::Persistence(e)
        })
    }

    /// Runs `change` against a fresh copy of the library and persists the result
    /// only when it succeeds.
    async fn mutate<T, F>(&self, change: F) -> Result<T, LibrarianError>
    where
        F: FnOnce(&mut Library) -> Result<T, LibrarianError>,
    {
        let _guard = self.write_lock.lock().await;
        let mut library = self.load().await?;
        let value = change(&mut library)?;
        self.save(&library).await?;
        Ok(value)
    }

    pub async fn import(&self, text: &str) -> Result<ImportStats, LibrarianError> {
        let drafts = parse_clippings(text);
        tracing::info!(books = drafts.len(), "parsed clippings");

        let _guard = self.write_lock.lock().await;
        let mut library = self.load().await?;
        let pipeline = CoverPipeline {
            lookup: self.cover_lookup.as_ref(),
            store: self.cover_store.as_ref(),
        };
        let stats = reconcile(&mut library, drafts, &pipeline).await;
        library.last_sync = Some(Utc::now());
        self.save(&library).await?;

        tracing::info!(
            new_books = stats.new_books,
            new_highlights = stats.new_highlights,
            total_books = stats.total_books,
            "import complete"
        );
        Ok(stats)
    }

    pub async fn list_books(&self, query: Option<&str>) -> Result<Vec<Book>, LibrarianError> {
        Ok(self.load().await?.list_books(query))
    }

    pub async fn get_book(&self, id: &str) -> Result<Option<Book>, LibrarianError> {
        Ok(self.load().await?.book(id).cloned())
    }

    pub async fn history(&self) -> Result<Vec<HistoryEntry>, LibrarianError> {
        Ok(self.load().await?.list_history())
    }

    pub async fn delete_book(&self, id: &str) -> Result<DeletedBook, LibrarianError> {
        let tombstone = self
            .mutate(|library| Ok(history::delete_book(library, id)?))
            .await?;
        tracing::info!(book_id = id, entry_id = %tombstone.id, "book deleted");
        Ok(tombstone)
    }

    pub async fn delete_highlight(
        &self,
        book_id: &str,
        highlight_id: &str,
    ) -> Result<DeletedHighlight, LibrarianError> {
        let tombstone = self
            .mutate(|library| Ok(history::delete_highlight(library, book_id, highlight_id)?))
            .await?;
        tracing::info!(book_id, highlight_id, entry_id = %tombstone.id, "highlight deleted");
        Ok(tombstone)
    }

    pub async fn rename_book(
        &self,
        id: &str,
        new_title: &str,
        new_author: &str,
    ) -> Result<RenameOutcome, LibrarianError> {
        let _guard = self.write_lock.lock().await;
        let mut library = self.load().await?;
        let outcome = history::rename_book(&mut library, id, new_title, new_author)?;
        if let RenameOutcome::Renamed(book) = &outcome {
            self.save(&library).await?;
            tracing::info!(book_id = id, title = %book.title, author = %book.author, "book renamed");
        }
        Ok(outcome)
    }

    pub async fn restore(&self, entry_id: &str) -> Result<Restored, LibrarianError> {
        let restored = self
            .mutate(|library| Ok(history::restore(library, entry_id)?))
            .await
            .inspect_err(|e| tracing::warn!(entry_id, error = %e, "restore failed"))?;
        tracing::info!(entry_id, ?restored, "history entry restored");
        Ok(restored)
    }

    /// Stores an uploaded cover image and points the book at it.
    pub async fn replace_cover(
        &self,
        book_id: &str,
        bytes: Vec<u8>,
        content_type: &str,
        extension: &str,
    ) -> Result<String, LibrarianError> {
        if !content_type.starts_with("image/") {
            return Err(LibrarianError::Validation("file must be an image".to_string()));
        }

        let _guard = self.write_lock.lock().await;
        let mut library = self.load().await?;
        let book = library
            .book_mut(book_id)
            .ok_or_else(|| history::HistoryError::BookNotFound(book_id.to_string()))?;

        let key = format!("covers/{}-{}.{}", book_id, new_id(), extension);
        let url = self
            .cover_store
            .store(&key, bytes, content_type)
            .await
            .map_err(LibrarianError::Cover)?;
        book.cover_url = Some(url.clone());
        self.save(&library).await.inspect_err(|_| {
            tracing::warn!(book_id, cover_key = %key, "cover stored but library not saved, object is orphaned")
        })?;

        tracing::info!(book_id, cover_url = %url, "cover replaced");
        Ok(url)
    }
}
