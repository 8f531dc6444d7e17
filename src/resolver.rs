//! Identity Resolver
//!
//! Lookup indices built once per import batch from the current library:
//! live identities (current keys plus aliases), book tombstones, and
//! highlight tombstones grouped by parent book.

use std::collections::{HashMap, HashSet};

use crate::model::{BookKey, HistoryEntry, Library};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Position of the matching book in `Library::books`.
    Existing(usize),
    Suppressed,
    New,
}

#[derive(Debug, Default)]
pub struct IdentityIndex {
    active: HashMap<BookKey, usize>,
    suppressed_books: HashSet<BookKey>,
    suppressed_highlights: HashMap<String, HashSet<String>>,
}

impl IdentityIndex {
    pub fn build(library: &Library) -> Self {
        let mut index = IdentityIndex::default();

        // Current identities claim their key before any alias does, and the
        // first book to claim a key keeps it.
        for (pos, book) in library.books.iter().enumerate() {
            index.active.entry(book.key()).or_insert(pos);
        }
        for (pos, book) in library.books.iter().enumerate() {
            for alias in &book.aliases {
                index.active.entry(alias.key()).or_insert(pos);
            }
        }

        for entry in &library.history {
            match entry {
                HistoryEntry::Book(deleted) => {
                    index
                        .suppressed_books
                        .insert(BookKey::new(&deleted.title, &deleted.author));
                }
                HistoryEntry::Highlight(deleted) => {
                    index
                        .suppressed_highlights
                        .entry(deleted.book_id.clone())
                        .or_default()
                        .insert(deleted.text.clone());
                }
                HistoryEntry::Rename(_) => {}
            }
        }

        index
    }

    pub fn resolve(&self, key: &BookKey) -> Resolution {
        if let Some(&pos) = self.active.get(key) {
            Resolution::Existing(pos)
        } else if self.suppressed_books.contains(key) {
            Resolution::Suppressed
        } else {
            Resolution::New
        }
    }

    pub fn is_highlight_suppressed(&self, book_id: &str, text: &str) -> bool {
        self.suppressed_highlights
            .get(book_id)
            .is_some_and(|texts| texts.contains(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Book, BookAlias, DeletedBook, DeletedHighlight, Highlight};
    use chrono::Utc;

    fn book(id: &str, title: &str, author: &str) -> Book {
        Book {
            id: id.to_string(),
            title: title.to_string(),
            author: author.to_string(),
            cover_url: None,
            highlights: vec![],
            last_updated: Utc::now(),
            aliases: vec![],
        }
    }

    fn tombstone(title: &str, author: &str) -> HistoryEntry {
        HistoryEntry::Book(DeletedBook {
            id: "t1".to_string(),
            original_id: "gone".to_string(),
            data: book("gone", title, author),
            deleted_at: Utc::now(),
            title: title.to_string(),
            author: author.to_string(),
        })
    }

    #[test]
    fn test_resolves_current_and_alias_keys() {
        let mut renamed = book("b1", "New Title", "A");
        renamed.aliases.push(BookAlias {
            title: "Old Title".to_string(),
            author: "A".to_string(),
        });
        let library = Library {
            books: vec![book("b0", "Other", "B"), renamed],
            ..Default::default()
        };

        let index = IdentityIndex::build(&library);
        assert_eq!(index.resolve(&BookKey::new("New Title", "A")), Resolution::Existing(1));
        assert_eq!(index.resolve(&BookKey::new("Old Title", "A")), Resolution::Existing(1));
        assert_eq!(index.resolve(&BookKey::new("Other", "B")), Resolution::Existing(0));
        assert_eq!(index.resolve(&BookKey::new("Unseen", "B")), Resolution::New);
    }

    #[test]
    fn test_live_identity_wins_over_tombstone() {
        let library = Library {
            books: vec![book("b1", "Dune", "Frank Herbert")],
            history: vec![tombstone("Dune", "Frank Herbert"), tombstone("Emma", "Jane Austen")],
            ..Default::default()
        };

        let index = IdentityIndex::build(&library);
        assert_eq!(
            index.resolve(&BookKey::new("Dune", "Frank Herbert")),
            Resolution::Existing(0)
        );
        assert_eq!(
            index.resolve(&BookKey::new("Emma", "Jane Austen")),
            Resolution::Suppressed
        );
    }

    #[test]
    fn test_current_key_takes_precedence_over_alias() {
        let mut first = book("b1", "Renamed", "A");
        first.aliases.push(BookAlias {
            title: "Shared".to_string(),
            author: "A".to_string(),
        });
        let library = Library {
            books: vec![first, book("b2", "Shared", "A")],
            ..Default::default()
        };

        let index = IdentityIndex::build(&library);
        assert_eq!(index.resolve(&BookKey::new("Shared", "A")), Resolution::Existing(1));
    }

    #[test]
    fn test_suppressed_highlights_are_scoped_to_book() {
        let library = Library {
            history: vec![HistoryEntry::Highlight(DeletedHighlight {
                id: "t1".to_string(),
                original_id: "h1".to_string(),
                data: Highlight {
                    id: "h1".to_string(),
                    text: "gone".to_string(),
                    location: None,
                    page: None,
                    date_added: String::new(),
                },
                deleted_at: Utc::now(),
                book_id: "b1".to_string(),
                text: "gone".to_string(),
            })],
            ..Default::default()
        };

        let index = IdentityIndex::build(&library);
        assert!(index.is_highlight_suppressed("b1", "gone"));
        assert!(!index.is_highlight_suppressed("b2", "gone"));
        assert!(!index.is_highlight_suppressed("b1", "kept"));
    }
}
