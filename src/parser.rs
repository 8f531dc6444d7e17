//! Clippings Parser
//!
//! Turns a device export ("My Clippings.txt") into draft books. The grammar is
//! line oriented:
//!
//! ```text
//! <title> (<author>)
//! - Your Highlight on page 12 | Location 100-105 | Added on <date>
//!
//! <body, one or more lines>
//! ==========
//! ```
//!
//! Records with fewer than three lines or an empty body (bookmarks) are dropped
//! without error.

use std::collections::HashMap;

use crate::model::{BookKey, UNKNOWN_AUTHOR};

pub const RECORD_DELIMITER: &str = "==========";

const DATE_MARKER: &str = "Added on";
const LOCATION_MARKER: &str = "Location";
const PAGE_MARKER: &str = "page";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftHighlight {
    pub text: String,
    pub location: Option<String>,
    pub page: Option<String>,
    pub date_added: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftBook {
    pub title: String,
    pub author: String,
    pub highlights: Vec<DraftHighlight>,
}

impl DraftBook {
    pub fn key(&self) -> BookKey {
        BookKey::new(&self.title, &self.author)
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
struct Metadata {
    location: Option<String>,
    page: Option<String>,
    date_added: Option<String>,
}

/// Parses a clippings blob into draft books, in order of first appearance.
pub fn parse_clippings(input: &str) -> Vec<DraftBook> {
    let mut books: Vec<DraftBook> = Vec::new();
    let mut index: HashMap<BookKey, usize> = HashMap::new();

    for record in split_records(input) {
        let Some((key, highlight)) = parse_record(&record) else {
            continue;
        };

        let slot = *index.entry(key.clone()).or_insert_with(|| {
            books.push(DraftBook {
                title: key.title.clone(),
                author: key.author.clone(),
                highlights: Vec::new(),
            });
            books.len() - 1
        });

        let book = &mut books[slot];
        if !book.highlights.iter().any(|h| h.text == highlight.text) {
            book.highlights.push(highlight);
        }
    }

    books
}

fn split_records(input: &str) -> Vec<String> {
    let mut records = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in input.lines() {
        if line.trim() == RECORD_DELIMITER {
            push_record(&mut records, &current);
            current.clear();
        } else {
            current.push(line);
        }
    }
    push_record(&mut records, &current);

    records
}

fn push_record(records: &mut Vec<String>, lines: &[&str]) {
    let record = lines.join("\n");
    let record = record.trim();
    if !record.is_empty() {
        records.push(record.to_string());
    }
}

fn parse_record(record: &str) -> Option<(BookKey, DraftHighlight)> {
    let lines: Vec<&str> = record.lines().collect();
    if lines.len() < 3 {
        return None;
    }

    let body = lines[2..].join("\n").trim().to_string();
    if body.is_empty() {
        return None;
    }

    let (title, author) = split_title_line(lines[0]);
    let meta = parse_metadata(lines[1]);

    Some((
        BookKey::new(&title, &author),
        DraftHighlight {
            text: body,
            location: meta.location,
            page: meta.page,
            date_added: meta.date_added.unwrap_or_default(),
        },
    ))
}

/// Splits `Title (Author)` into its parts. The author group is the leftmost
/// `(` whose tail up to the final `)` holds no other `)`. Without a trailing,
/// non-empty group the whole line is the title.
fn split_title_line(line: &str) -> (String, String) {
    let line = line.trim().trim_start_matches('\u{feff}').trim();

    let author_group = line
        .strip_suffix(')')
        .and_then(|rest| {
            let floor = rest.rfind(')').map_or(0, |close| close + 1);
            rest[floor..]
                .find('(')
                .map(|open| (floor + open, &rest[floor + open + 1..]))
        })
        .filter(|(_, author)| !author.is_empty());

    match author_group {
        Some((open, author)) => (line[..open].trim().to_string(), author.to_string()),
        None => (line.to_string(), UNKNOWN_AUTHOR.to_string()),
    }
}

fn parse_metadata(line: &str) -> Metadata {
    let mut meta = Metadata::default();

    for segment in line.split('|') {
        let segment = segment.trim();
        let segment = segment.strip_prefix('-').unwrap_or(segment).trim();

        if let Some(date) = text_after(segment, DATE_MARKER) {
            meta.date_added = Some(date);
        } else if let Some(location) = text_after(segment, LOCATION_MARKER) {
            meta.location = Some(location);
        } else if let Some(page) = page_number(segment) {
            meta.page = Some(page);
        }
    }

    meta
}

fn text_after(segment: &str, marker: &str) -> Option<String> {
    segment
        .find(marker)
        .map(|at| segment[at + marker.len()..].trim().to_string())
}

/// Digits following the word "page", or the whole segment when it mentions a
/// page without a number.
fn page_number(segment: &str) -> Option<String> {
    let lowered = segment.to_ascii_lowercase();
    if !lowered.contains(PAGE_MARKER) {
        return None;
    }

    let digits = lowered.match_indices(PAGE_MARKER).find_map(|(at, _)| {
        let rest = &segment[at + PAGE_MARKER.len()..];
        let after_space = rest.trim_start();
        if after_space.len() == rest.len() {
            return None;
        }
        let digits: String = after_space.chars().take_while(char::is_ascii_digit).collect();
        (!digits.is_empty()).then_some(digits)
    });

    Some(digits.unwrap_or_else(|| segment.to_string()))
}
