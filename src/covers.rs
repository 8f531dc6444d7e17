//! Remote cover lookup.
//!
//! Open Library is asked first; Google Books is the fallback. Both are queried
//! with the cleaned `title author` string and only the first result is used.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use crate::store::CoverLookup;

const OPEN_LIBRARY_SEARCH: &str = "https://openlibrary.org/search.json";
const OPEN_LIBRARY_COVERS: &str = "https://covers.openlibrary.org/b/id";
const GOOGLE_BOOKS_VOLUMES: &str = "https://www.googleapis.com/books/v1/volumes";

#[derive(Debug, Deserialize)]
struct OpenLibrarySearch {
    #[serde(default)]
    docs: Vec<OpenLibraryDoc>,
}

#[derive(Debug, Deserialize)]
struct OpenLibraryDoc {
    cover_i: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct GoogleVolumes {
    #[serde(default)]
    items: Vec<GoogleVolume>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleVolume {
    volume_info: Option<VolumeInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VolumeInfo {
    image_links: Option<ImageLinks>,
}

#[derive(Debug, Deserialize)]
struct ImageLinks {
    thumbnail: Option<String>,
}

pub struct RemoteCovers {
    client: reqwest::Client,
}

impl RemoteCovers {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("marginalia/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build cover lookup client")?;
        Ok(Self { client })
    }

    async fn open_library(&self, query: &str) -> Result<Option<String>> {
        let url = format!("{}?q={}&limit=1", OPEN_LIBRARY_SEARCH, query);
        let search: OpenLibrarySearch = self.client.get(url).send().await?.error_for_status()?.json().await?;

        Ok(search
            .docs
            .into_iter()
            .next()
            .and_then(|doc| doc.cover_i)
            .map(|id| format!("{}/{}-L.jpg", OPEN_LIBRARY_COVERS, id)))
    }

    async fn google_books(&self, query: &str) -> Result<Option<String>> {
        let url = format!("{}?q={}", GOOGLE_BOOKS_VOLUMES, query);
        let volumes: GoogleVolumes = self.client.get(url).send().await?.error_for_status()?.json().await?;

        Ok(volumes
            .items
            .into_iter()
            .next()
            .and_then(|v| v.volume_info)
            .and_then(|info| info.image_links)
            .and_then(|links| links.thumbnail)
            .map(|thumb| secure_url(&thumb)))
    }
}

#[async_trait]
impl CoverLookup for RemoteCovers {
    async fn find(&self, title: &str, author: &str) -> Result<Option<String>> {
        let query = search_query(title, author);

        match self.open_library(&query).await {
            Ok(Some(url)) => return Ok(Some(url)),
            Ok(None) => {}
            Err(e) => tracing::warn!(title, error = %e, "open library lookup failed"),
        }

        self.google_books(&query).await
    }

    async fn fetch(&self, url: &str) -> Result<(Vec<u8>, String)> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to download cover {}", url))?
            .error_for_status()?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/jpeg")
            .to_string();
        if !content_type.starts_with("image/") {
            anyhow::bail!("cover {} is not an image ({})", url, content_type);
        }

        let bytes = response.bytes().await?;
        Ok((bytes.to_vec(), content_type))
    }
}

fn search_query(title: &str, author: &str) -> String {
    let clean = |s: &str| s.replace('_', " ").trim().to_string();
    urlencoding::encode(&format!("{} {}", clean(title), clean(author))).into_owned()
}

fn secure_url(url: &str) -> String {
    match url.strip_prefix("http://") {
        Some(rest) => format!("https://{}", rest),
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_query_cleans_and_encodes() {
        assert_eq!(
            search_query("The_Name_of_the_Rose ", "Umberto Eco"),
            "The%20Name%20of%20the%20Rose%20Umberto%20Eco"
        );
    }

    #[test]
    fn test_thumbnail_upgraded_to_https() {
        assert_eq!(
            secure_url("http://books.google.com/thumb?id=1"),
            "https://books.google.com/thumb?id=1"
        );
        assert_eq!(secure_url("https://x/y"), "https://x/y");
    }

    #[test]
    fn test_google_volume_payload() {
        let payload = r#"{"items":[{"volumeInfo":{"imageLinks":{"thumbnail":"http://img/1"}}}]}"#;
        let volumes: GoogleVolumes = serde_json::from_str(payload).unwrap();
        let thumb = volumes.items[0]
            .volume_info
            .as_ref()
            .and_then(|i| i.image_links.as_ref())
            .and_then(|l| l.thumbnail.clone());
        assert_eq!(thumb.as_deref(), Some("http://img/1"));

        let empty: OpenLibrarySearch = serde_json::from_str(r#"{"numFound":0}"#).unwrap();
        assert!(empty.docs.is_empty());
    }
}
