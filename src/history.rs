//! History Ledger
//!
//! Delete, rename and restore for books and highlights. Deletes leave a
//! tombstone carrying a full snapshot; restores consume exactly the entry they
//! act on and leave the ledger untouched when they fail.

use chrono::Utc;
use thiserror::Error;

use crate::model::{
    Book, BookAlias, DeletedBook, DeletedHighlight, HistoryEntry, Library, RenamedItem, new_id,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HistoryError {
    #[error("book {0} not found")]
    BookNotFound(String),
    #[error("highlight {highlight_id} not found in book {book_id}")]
    HighlightNotFound { book_id: String, highlight_id: String },
    #[error("history entry {0} not found")]
    EntryNotFound(String),
    #[error("parent book {book_id} of history entry {entry_id} no longer exists")]
    ParentBookMissing { entry_id: String, book_id: String },
    #[error("history entry {0} cannot be restored")]
    NotRestorable(String),
    #[error("{0}")]
    Validation(String),
}

#[derive(Debug, PartialEq)]
pub enum RenameOutcome {
    Renamed(Book),
    Unchanged(Book),
}

#[derive(Debug, PartialEq)]
pub enum Restored {
    Book { book_id: String },
    Highlight { book_id: String, highlight_id: String },
}

pub fn delete_book(library: &mut Library, book_id: &str) -> Result<DeletedBook, HistoryError> {
    let pos = library
        .books
        .iter()
        .position(|b| b.id == book_id)
        .ok_or_else(|| HistoryError::BookNotFound(book_id.to_string()))?;

    let book = library.books.remove(pos);
    let tombstone = DeletedBook {
        id: new_id(),
        original_id: book.id.clone(),
        title: book.title.clone(),
        author: book.author.clone(),
        deleted_at: Utc::now(),
        data: book,
    };
    library.history.push(HistoryEntry::Book(tombstone.clone()));

    Ok(tombstone)
}

pub fn delete_highlight(
    library: &mut Library,
    book_id: &str,
    highlight_id: &str,
) -> Result<DeletedHighlight, HistoryError> {
    let book = library
        .book_mut(book_id)
        .ok_or_else(|| HistoryError::BookNotFound(book_id.to_string()))?;
    let pos = book
        .highlights
        .iter()
        .position(|h| h.id == highlight_id)
        .ok_or_else(|| HistoryError::HighlightNotFound {
            book_id: book_id.to_string(),
            highlight_id: highlight_id.to_string(),
        })?;

    let highlight = book.highlights.remove(pos);
    let tombstone = DeletedHighlight {
        id: new_id(),
        original_id: highlight.id.clone(),
        book_id: book_id.to_string(),
        text: highlight.text.clone(),
        deleted_at: Utc::now(),
        data: highlight,
    };
    library.history.push(HistoryEntry::Highlight(tombstone.clone()));

    Ok(tombstone)
}

pub fn rename_book(
    library: &mut Library,
    book_id: &str,
    new_title: &str,
    new_author: &str,
) -> Result<RenameOutcome, HistoryError> {
    let (new_title, new_author) = (new_title.trim(), new_author.trim());
    if new_title.is_empty() || new_author.is_empty() {
        return Err(HistoryError::Validation(
            "new title and author are required".to_string(),
        ));
    }

    let book = library
        .book_mut(book_id)
        .ok_or_else(|| HistoryError::BookNotFound(book_id.to_string()))?;

    if book.title == new_title && book.author == new_author {
        return Ok(RenameOutcome::Unchanged(book.clone()));
    }

    let previous = BookAlias {
        title: book.title.clone(),
        author: book.author.clone(),
    };
    let now = Utc::now();
    let renamed = RenamedItem {
        id: new_id(),
        book_id: book.id.clone(),
        old_title: previous.title.clone(),
        old_author: previous.author.clone(),
        new_title: new_title.to_string(),
        new_author: new_author.to_string(),
        date: now,
    };

    let previous_key = previous.key();
    if !book.aliases.iter().any(|alias| alias.key() == previous_key) {
        book.aliases.push(previous);
    }
    book.title = new_title.to_string();
    book.author = new_author.to_string();
    // Renaming back to an earlier identity must not leave it listed as an alias.
    let current = book.key();
    book.aliases.retain(|alias| alias.key() != current);
    book.last_updated = now;

    let book = book.clone();
    library.history.push(HistoryEntry::Rename(renamed));

    Ok(RenameOutcome::Renamed(book))
}

pub fn restore(library: &mut Library, entry_id: &str) -> Result<Restored, HistoryError> {
    let pos = library
        .history
        .iter()
        .position(|entry| entry.id() == entry_id)
        .ok_or_else(|| HistoryError::EntryNotFound(entry_id.to_string()))?;

    let restored = match library.history[pos].clone() {
        HistoryEntry::Book(deleted) => {
            let book_id = deleted.data.id.clone();
            if library.book(&book_id).is_none() {
                library.books.push(deleted.data);
            }
            Restored::Book { book_id }
        }
        HistoryEntry::Highlight(DeletedHighlight { data, book_id, .. }) => {
            let book = library.book_mut(&book_id).ok_or_else(|| HistoryError::ParentBookMissing {
                entry_id: entry_id.to_string(),
                book_id: book_id.clone(),
            })?;
            let highlight_id = data.id.clone();
            if !book.has_highlight_id(&data.id) && !book.has_highlight_text(&data.text) {
                book.highlights.push(data);
            }
            Restored::Highlight { book_id, highlight_id }
        }
        HistoryEntry::Rename(_) => return Err(HistoryError::NotRestorable(entry_id.to_string())),
    };

    library.history.remove(pos);
    Ok(restored)
}
