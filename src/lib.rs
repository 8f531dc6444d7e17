//! Personal highlights library with "smart import" of e-reader clippings.
//!
//! Deleted books and highlights leave tombstones and renamed books keep their
//! old identities as aliases, so re-importing the same device export never
//! resurrects removed content or duplicates renamed books.

use std::error::Error;

pub mod api;
pub mod auth;
pub mod config;
pub mod covers;
pub mod db;
pub mod error;
pub mod handler;
pub mod history;
pub mod librarian;
pub mod model;
pub mod parser;
pub mod reconcile;
pub mod resolver;
pub mod routes;
pub mod s3;
pub mod store;

pub fn unpack_error(err: &dyn Error) -> String {
    let mut parts = Vec::new();
    parts.push(err.to_string());
    let mut current = err.source();
    while let Some(source) = current {
        parts.push(source.to_string());
        current = source.source();
    }
    parts.join(": ")
}

pub fn get_s3_url(service: &str, bucket: &str, key: &str) -> String {
    match service {
        "t3" => format!("https://{}.t3.storage.dev/{}", bucket, key),
        "s3" => format!("https://{}.s3.amazonaws.com/{}", bucket, key),
        _ => format!("https://{}.storage.dev/{}", service, key),
    }
}
