use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const UNKNOWN_AUTHOR: &str = "Unknown Author";

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Normalized (title, author) identity of a book.
///
/// Surrounding whitespace and a leading byte-order mark are dropped and inner
/// whitespace runs collapse to a single space. Comparison stays case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BookKey {
    pub title: String,
    pub author: String,
}

impl BookKey {
    pub fn new(title: &str, author: &str) -> Self {
        Self {
            title: normalize(title),
            author: normalize(author),
        }
    }
}

fn normalize(s: &str) -> String {
    s.trim_start_matches('\u{feff}')
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Highlight {
    pub id: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
    #[serde(default)]
    pub date_added: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookAlias {
    pub title: String,
    pub author: String,
}

impl BookAlias {
    pub fn key(&self) -> BookKey {
        BookKey::new(&self.title, &self.author)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: String,
    pub title: String,
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
    #[serde(default)]
    pub highlights: Vec<Highlight>,
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub aliases: Vec<BookAlias>,
}

impl Book {
    pub fn key(&self) -> BookKey {
        BookKey::new(&self.title, &self.author)
    }

    pub fn has_highlight_text(&self, text: &str) -> bool {
        self.highlights.iter().any(|h| h.text == text)
    }

    pub fn has_highlight_id(&self, id: &str) -> bool {
        self.highlights.iter().any(|h| h.id == id)
    }

    pub fn matches(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.title.to_lowercase().contains(&query)
            || self.author.to_lowercase().contains(&query)
            || self
                .highlights
                .iter()
                .any(|h| h.text.to_lowercase().contains(&query))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedBook {
    pub id: String,
    pub original_id: String,
    pub data: Book,
    pub deleted_at: DateTime<Utc>,
    pub title: String,
    pub author: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedHighlight {
    pub id: String,
    pub original_id: String,
    pub data: Highlight,
    pub deleted_at: DateTime<Utc>,
    pub book_id: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenamedItem {
    pub id: String,
    pub book_id: String,
    pub old_title: String,
    pub old_author: String,
    pub new_title: String,
    pub new_author: String,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum HistoryEntry {
    Book(DeletedBook),
    Highlight(DeletedHighlight),
    Rename(RenamedItem),
}

impl HistoryEntry {
    pub fn id(&self) -> &str {
        match self {
            HistoryEntry::Book(item) => &item.id,
            HistoryEntry::Highlight(item) => &item.id,
            HistoryEntry::Rename(item) => &item.id,
        }
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            HistoryEntry::Book(item) => item.deleted_at,
            HistoryEntry::Highlight(item) => item.deleted_at,
            HistoryEntry::Rename(item) => item.date,
        }
    }
}

/// The single persisted document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Library {
    #[serde(default)]
    pub books: Vec<Book>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync: Option<DateTime<Utc>>,
}

impl Library {
    pub fn book(&self, id: &str) -> Option<&Book> {
        self.books.iter().find(|b| b.id == id)
    }

    pub fn book_mut(&mut self, id: &str) -> Option<&mut Book> {
        self.books.iter_mut().find(|b| b.id == id)
    }

    /// Books ordered by most recently updated, optionally filtered by a search query.
    pub fn list_books(&self, query: Option<&str>) -> Vec<Book> {
        let mut books: Vec<Book> = match query.map(str::trim).filter(|q| !q.is_empty()) {
            Some(q) => self.books.iter().filter(|b| b.matches(q)).cloned().collect(),
            None => self.books.clone(),
        };
        books.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));
        books
    }

    /// History entries, newest first.
    pub fn list_history(&self) -> Vec<HistoryEntry> {
        let mut history = self.history.clone();
        history.sort_by(|a, b| b.occurred_at().cmp(&a.occurred_at()));
        history
    }
}
