//! Reconciliation Engine
//!
//! Merges one parsed batch into a library snapshot. Tombstones are consulted
//! first so that deleted books and highlights do not come back on re-import.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::{Book, Highlight, Library, new_id};
use crate::parser::{DraftBook, DraftHighlight};
use crate::resolver::{IdentityIndex, Resolution};
use crate::store::{CoverLookup, CoverStore};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportStats {
    pub new_books: usize,
    pub new_highlights: usize,
    pub total_books: usize,
}

/// What happened to one draft book.
#[derive(Debug, PartialEq, Eq)]
pub enum MergeResult {
    Created { highlights: usize },
    Updated { highlights: usize },
    Unchanged,
    Suppressed,
}

impl MergeResult {
    pub fn record(self, stats: &mut ImportStats) {
        match self {
            MergeResult::Created { highlights } => {
                stats.new_books += 1;
                stats.new_highlights += highlights;
            }
            MergeResult::Updated { highlights } => stats.new_highlights += highlights,
            MergeResult::Unchanged | MergeResult::Suppressed => {}
        }
    }
}

/// Cover lookup and storage used for books created by an import.
pub struct CoverPipeline<'a> {
    pub lookup: &'a dyn CoverLookup,
    pub store: &'a dyn CoverStore,
}

impl CoverPipeline<'_> {
    /// Finds, downloads and stores a cover. Failures are logged and yield `None`.
    pub async fn resolve(&self, book_id: &str, title: &str, author: &str) -> Option<String> {
        match self.try_resolve(book_id, title, author).await {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(book_id, title, error = %e, "cover lookup failed, continuing without cover");
                None
            }
        }
    }

    async fn try_resolve(&self, book_id: &str, title: &str, author: &str) -> anyhow::Result<Option<String>> {
        let Some(remote) = self.lookup.find(title, author).await? else {
            return Ok(None);
        };
        let (bytes, content_type) = self.lookup.fetch(&remote).await?;
        let key = format!("covers/{}.jpg", book_id);
        let url = self.store.store(&key, bytes, &content_type).await?;
        Ok(Some(url))
    }
}

/// Merges `drafts` into `library` in parse order and returns the batch counters.
pub async fn reconcile(
    library: &mut Library,
    drafts: Vec<DraftBook>,
    covers: &CoverPipeline<'_>,
) -> ImportStats {
    let index = IdentityIndex::build(library);
    let now = Utc::now();
    let mut stats = ImportStats::default();

    for draft in drafts {
        let result = match index.resolve(&draft.key()) {
            Resolution::Suppressed => {
                tracing::debug!(title = %draft.title, author = %draft.author, "skipping deleted book");
                MergeResult::Suppressed
            }
            Resolution::Existing(pos) => merge_into(&mut library.books[pos], draft.highlights, &index, now),
            Resolution::New => {
                let book = create_book(draft, covers, now).await;
                let highlights = book.highlights.len();
                library.books.push(book);
                MergeResult::Created { highlights }
            }
        };
        result.record(&mut stats);
    }

    stats.total_books = library.books.len();
    stats
}

fn merge_into(
    book: &mut Book,
    drafts: Vec<DraftHighlight>,
    index: &IdentityIndex,
    now: DateTime<Utc>,
) -> MergeResult {
    let mut added = 0;

    for draft in drafts {
        if index.is_highlight_suppressed(&book.id, &draft.text) || book.has_highlight_text(&draft.text) {
            continue;
        }
        book.highlights.push(into_highlight(draft));
        added += 1;
    }

    if added == 0 {
        return MergeResult::Unchanged;
    }
    book.last_updated = now;
    MergeResult::Updated { highlights: added }
}

async fn create_book(draft: DraftBook, covers: &CoverPipeline<'_>, now: DateTime<Utc>) -> Book {
    let id = new_id();
    let cover_url = covers.resolve(&id, &draft.title, &draft.author).await;

    Book {
        id,
        title: draft.title,
        author: draft.author,
        cover_url,
        highlights: draft.highlights.into_iter().map(into_highlight).collect(),
        last_updated: now,
        aliases: Vec::new(),
    }
}

fn into_highlight(draft: DraftHighlight) -> Highlight {
    Highlight {
        id: new_id(),
        text: draft.text,
        location: draft.location,
        page: draft.page,
        date_added: draft.date_added,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history;
    use crate::parser::parse_clippings;
    use crate::store::{MemoryCoverStore, NoCovers};
    use async_trait::async_trait;

    const EXPORT: &str = "Dune (Frank Herbert)\n- Your Highlight on page 1 | Location 10-11 | Added on day one\n\nFear is the mind-killer.\n==========\n\
Dune (Frank Herbert)\n- Your Highlight on page 2 | Location 20-21 | Added on day one\n\nThe spice must flow.\n==========\n\
Emma (Jane Austen)\n- Your Highlight on Location 5 | Added on day two\n\nA single woman of good fortune.\n==========\n";

    struct FixedCover;

    #[async_trait]
    impl CoverLookup for FixedCover {
        async fn find(&self, title: &str, _author: &str) -> anyhow::Result<Option<String>> {
            if title == "Emma" {
                anyhow::bail!("lookup service unavailable");
            }
            Ok(Some(format!("https://covers.example/{}.jpg", title)))
        }

        async fn fetch(&self, _url: &str) -> anyhow::Result<(Vec<u8>, String)> {
            Ok((vec![0xff, 0xd8], "image/jpeg".to_string()))
        }
    }

    struct FullBucket;

    #[async_trait]
    impl CoverStore for FullBucket {
        async fn store(&self, key: &str, _bytes: Vec<u8>, _content_type: &str) -> anyhow::Result<String> {
            anyhow::bail!("put {} rejected: quota exceeded", key)
        }
    }

    async fn import(library: &mut Library, text: &str) -> ImportStats {
        let covers = MemoryCoverStore::default();
        let pipeline = CoverPipeline { lookup: &NoCovers, store: &covers };
        reconcile(library, parse_clippings(text), &pipeline).await
    }

    fn dune(library: &Library) -> &Book {
        library.books.iter().find(|b| b.title == "Dune").unwrap()
    }

    #[tokio::test]
    async fn test_first_import_creates_books() {
        let mut library = Library::default();
        let stats = import(&mut library, EXPORT).await;

        assert_eq!(
            stats,
            ImportStats { new_books: 2, new_highlights: 3, total_books: 2 }
        );
        assert_eq!(dune(&library).highlights.len(), 2);
        assert_eq!(dune(&library).highlights[0].page.as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_reimport_is_idempotent() {
        let mut library = Library::default();
        import(&mut library, EXPORT).await;
        let before = dune(&library).last_updated;

        let stats = import(&mut library, EXPORT).await;
        assert_eq!(stats.new_books, 0);
        assert_eq!(stats.new_highlights, 0);
        assert_eq!(stats.total_books, 2);
        assert_eq!(dune(&library).last_updated, before);
    }

    #[tokio::test]
    async fn test_new_highlights_merge_into_existing_book() {
        let mut library = Library::default();
        import(&mut library, EXPORT).await;

        let more = "Dune (Frank Herbert)\n- Location 30 | Added on day three\n\nHe who controls the spice.\n==========";
        let stats = import(&mut library, more).await;

        assert_eq!(stats, ImportStats { new_books: 0, new_highlights: 1, total_books: 2 });
        assert_eq!(dune(&library).highlights.len(), 3);
        assert_eq!(dune(&library).highlights[2].text, "He who controls the spice.");
    }

    #[tokio::test]
    async fn test_deleted_book_is_not_recreated() {
        let mut library = Library::default();
        import(&mut library, EXPORT).await;
        let id = dune(&library).id.clone();
        history::delete_book(&mut library, &id).unwrap();

        let stats = import(&mut library, EXPORT).await;
        assert_eq!(stats.new_books, 0);
        assert_eq!(stats.new_highlights, 0);
        assert_eq!(stats.total_books, 1);
        assert!(library.books.iter().all(|b| b.title != "Dune"));
    }

    #[tokio::test]
    async fn test_restored_book_merges_on_reimport() {
        let mut library = Library::default();
        import(&mut library, EXPORT).await;
        let id = dune(&library).id.clone();
        let tombstone = history::delete_book(&mut library, &id).unwrap();
        history::restore(&mut library, &tombstone.id).unwrap();

        let more = format!(
            "{}Dune (Frank Herbert)\n- Location 60 | Added on day six\n\nThe sleeper must awaken.\n==========",
            EXPORT
        );
        let stats = import(&mut library, &more).await;

        assert_eq!(stats, ImportStats { new_books: 0, new_highlights: 1, total_books: 2 });
        let restored = library.book(&id).unwrap();
        assert_eq!(restored.highlights.len(), 3);
        assert_eq!(restored.highlights[2].text, "The sleeper must awaken.");
    }

    #[tokio::test]
    async fn test_deleted_highlight_stays_deleted() {
        let mut library = Library::default();
        import(&mut library, EXPORT).await;
        let book = dune(&library);
        let (book_id, highlight_id) = (book.id.clone(), book.highlights[0].id.clone());
        history::delete_highlight(&mut library, &book_id, &highlight_id).unwrap();

        let extra = format!(
            "{}Dune (Frank Herbert)\n- Location 40 | Added on day four\n\nArrakis teaches the attitude of the knife.\n==========",
            EXPORT
        );
        let stats = import(&mut library, &extra).await;

        assert_eq!(stats.new_highlights, 1);
        let texts: Vec<&str> = dune(&library).highlights.iter().map(|h| h.text.as_str()).collect();
        assert_eq!(
            texts,
            vec!["The spice must flow.", "Arrakis teaches the attitude of the knife."]
        );
    }

    #[tokio::test]
    async fn test_old_identity_merges_into_renamed_book() {
        let mut library = Library::default();
        import(&mut library, EXPORT).await;
        let id = dune(&library).id.clone();
        history::rename_book(&mut library, &id, "Dune (Deluxe Edition)", "Frank Herbert").unwrap();

        let more = "Dune (Frank Herbert)\n- Location 50 | Added on day five\n\nBless the maker.\n==========";
        let stats = import(&mut library, more).await;

        assert_eq!(stats, ImportStats { new_books: 0, new_highlights: 1, total_books: 2 });
        let renamed = library.book(&id).unwrap();
        assert_eq!(renamed.title, "Dune (Deluxe Edition)");
        assert_eq!(renamed.highlights.len(), 3);
    }

    #[tokio::test]
    async fn test_cover_failure_is_isolated_to_one_book() {
        let covers = MemoryCoverStore::default();
        let pipeline = CoverPipeline { lookup: &FixedCover, store: &covers };
        let mut library = Library::default();

        let stats = reconcile(&mut library, parse_clippings(EXPORT), &pipeline).await;

        assert_eq!(stats.new_books, 2);
        let dune = dune(&library);
        assert_eq!(dune.cover_url, Some(format!("memory://covers/{}.jpg", dune.id)));
        let emma = library.books.iter().find(|b| b.title == "Emma").unwrap();
        assert_eq!(emma.cover_url, None);
        assert_eq!(covers.objects.lock().await.len(), 1);

        // A store that rejects every upload still lets the import finish.
        let pipeline = CoverPipeline { lookup: &FixedCover, store: &FullBucket };
        let mut library = Library::default();

        let stats = reconcile(&mut library, parse_clippings(EXPORT), &pipeline).await;

        assert_eq!(stats, ImportStats { new_books: 2, new_highlights: 3, total_books: 2 });
        assert!(library.books.iter().all(|b| b.cover_url.is_none()));
    }

    #[test]
    fn test_merge_result_counters() {
        let mut stats = ImportStats::default();
        MergeResult::Created { highlights: 3 }.record(&mut stats);
        MergeResult::Updated { highlights: 2 }.record(&mut stats);
        MergeResult::Suppressed.record(&mut stats);
        MergeResult::Unchanged.record(&mut stats);
        assert_eq!(stats.new_books, 1);
        assert_eq!(stats.new_highlights, 5);
    }
}
