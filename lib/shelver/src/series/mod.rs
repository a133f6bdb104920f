//! Best-effort series lookup: Open Library, then Google Books, then whatever
//! the title itself gives away.

pub mod parse;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use shared::catalog::SeriesInfo;
use tokio::time::sleep;
use tracing::{debug, warn};
use url::Url;

use crate::error::{Result, ShelverError};
use crate::traits::{FallbackSeriesLookup, SeriesLookup};
use parse::{book_number_in, clean_search_term, series_in_description, series_in_subject, SeriesHint};

/// Timeout for individual lookup requests (10 seconds)
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Maximum attempts for transient errors
const MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff (milliseconds)
const BASE_DELAY_MS: u64 = 500;

/// Maximum backoff delay cap (milliseconds)
const MAX_BACKOFF_MS: u64 = 5000;

const OPEN_LIBRARY_SEARCH: &str = "https://openlibrary.org/search.json";
const GOOGLE_BOOKS_VOLUMES: &str = "https://www.googleapis.com/books/v1/volumes";

fn http_client() -> reqwest::Client {
    let version = env!("CARGO_PKG_VERSION");
    reqwest::Client::builder()
        .user_agent(format!("Shelver/{version} (series lookup)"))
        .build()
        .unwrap_or_default()
}

fn is_retryable(error: &ShelverError) -> bool {
    match error {
        ShelverError::Timeout(_) => true,
        ShelverError::Http(e) => {
            if e.is_timeout() || e.is_connect() {
                return true;
            }
            match e.status() {
                Some(status) => status.is_server_error() || status.as_u16() == 429,
                None => true,
            }
        }
        _ => false,
    }
}

/// Retries an async operation with exponential backoff and a per-attempt
/// timeout. Client errors are returned immediately.
async fn with_retry<T, F, Fut>(operation_name: &str, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let timeout = Duration::from_secs(REQUEST_TIMEOUT_SECS);
    let mut last_error = ShelverError::Timeout(timeout);

    for attempt in 0..MAX_RETRIES {
        let error = match tokio::time::timeout(timeout, operation()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => e,
            Err(_) => ShelverError::Timeout(timeout),
        };
        if !is_retryable(&error) {
            warn!("{} failed with non-retryable error: {}", operation_name, error);
            return Err(error);
        }
        if attempt < MAX_RETRIES - 1 {
            let delay = std::cmp::min(BASE_DELAY_MS * 2u64.pow(attempt), MAX_BACKOFF_MS);
            warn!(
                "{} failed (attempt {}/{}), retrying in {}ms: {}",
                operation_name,
                attempt + 1,
                MAX_RETRIES,
                delay,
                error
            );
            sleep(Duration::from_millis(delay)).await;
        }
        last_error = error;
    }
    Err(last_error)
}

async fn get_json<T: serde::de::DeserializeOwned>(client: &reqwest::Client, url: &Url) -> Result<T> {
    let response = client.get(url.clone()).send().await?.error_for_status()?;
    Ok(response.json::<T>().await?)
}

fn found(hint: SeriesHint, source: &str) -> SeriesInfo {
    SeriesInfo {
        series_name: hint.series_name,
        book_number: hint.book_number,
        total_books: None,
        source: Some(source.to_string()),
        found: true,
    }
}

#[derive(Debug, Default, Deserialize)]
struct OpenLibraryResponse {
    #[serde(default)]
    docs: Vec<OpenLibraryDoc>,
}

#[derive(Debug, Default, Deserialize)]
struct OpenLibraryDoc {
    #[serde(default)]
    title: String,
    /// Either a string or a list of strings.
    #[serde(default)]
    series: Value,
    #[serde(default)]
    subject: Vec<String>,
}

impl OpenLibraryDoc {
    fn series_hint(&self) -> SeriesHint {
        let mut hint = SeriesHint {
            series_name: match &self.series {
                Value::String(s) => Some(s.clone()),
                Value::Array(items) => items.first().and_then(Value::as_str).map(str::to_string),
                _ => None,
            },
            book_number: book_number_in(&self.title),
        };
        for subject in &self.subject {
            if let Some(name) = series_in_subject(subject) {
                hint.series_name = Some(name);
            }
        }
        hint
    }
}

pub struct OpenLibraryLookup {
    client: reqwest::Client,
}

impl OpenLibraryLookup {
    pub fn new() -> Self {
        Self {
            client: http_client(),
        }
    }
}

impl Default for OpenLibraryLookup {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SeriesLookup for OpenLibraryLookup {
    fn id(&self) -> &'static str {
        "openlibrary"
    }

    fn name(&self) -> &'static str {
        "Open Library"
    }

    async fn find_series_info(&self, title: &str, author: Option<&str>) -> Result<SeriesInfo> {
        let mut query = format!("title:\"{}\"", clean_search_term(title));
        if let Some(author) = author.map(clean_search_term).filter(|a| !a.is_empty()) {
            query.push_str(&format!(" author:\"{}\"", author));
        }
        let url = Url::parse_with_params(OPEN_LIBRARY_SEARCH, &[("q", query.as_str()), ("limit", "10")])
            .map_err(|e| ShelverError::Config(e.to_string()))?;
        debug!("Searching Open Library: {}", url);

        let response: OpenLibraryResponse =
            with_retry("Open Library search", || get_json(&self.client, &url)).await?;
        Ok(response
            .docs
            .iter()
            .map(OpenLibraryDoc::series_hint)
            .find(|hint| !hint.is_empty())
            .map(|hint| found(hint, self.name()))
            .unwrap_or_else(SeriesInfo::not_found))
    }
}

#[derive(Debug, Default, Deserialize)]
struct GoogleBooksResponse {
    #[serde(default)]
    items: Vec<GoogleBooksItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleBooksItem {
    #[serde(default)]
    volume_info: VolumeInfo,
}

#[derive(Debug, Default, Deserialize)]
struct VolumeInfo {
    #[serde(default)]
    title: String,
    #[serde(default)]
    subtitle: String,
    #[serde(default)]
    description: String,
}

impl VolumeInfo {
    fn series_hint(&self) -> SeriesHint {
        let from_description = series_in_description(&self.description);
        let full_title = format!("{} {}", self.title, self.subtitle);
        SeriesHint {
            series_name: from_description.series_name,
            book_number: from_description
                .book_number
                .or_else(|| book_number_in(full_title.trim())),
        }
    }
}

pub struct GoogleBooksLookup {
    client: reqwest::Client,
}

impl GoogleBooksLookup {
    pub fn new() -> Self {
        Self {
            client: http_client(),
        }
    }
}

impl Default for GoogleBooksLookup {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SeriesLookup for GoogleBooksLookup {
    fn id(&self) -> &'static str {
        "googlebooks"
    }

    fn name(&self) -> &'static str {
        "Google Books"
    }

    async fn find_series_info(&self, title: &str, author: Option<&str>) -> Result<SeriesInfo> {
        let mut query = format!("intitle:\"{}\"", clean_search_term(title));
        if let Some(author) = author.map(clean_search_term).filter(|a| !a.is_empty()) {
            query.push_str(&format!(" inauthor:\"{}\"", author));
        }
        let url = Url::parse_with_params(
            GOOGLE_BOOKS_VOLUMES,
            &[("q", query.as_str()), ("maxResults", "10")],
        )
        .map_err(|e| ShelverError::Config(e.to_string()))?;
        debug!("Searching Google Books: {}", url);

        let response: GoogleBooksResponse =
            with_retry("Google Books search", || get_json(&self.client, &url)).await?;
        Ok(response
            .items
            .iter()
            .map(|item| item.volume_info.series_hint())
            .find(|hint| !hint.is_empty())
            .map(|hint| found(hint, self.name()))
            .unwrap_or_else(SeriesInfo::not_found))
    }
}

/// Offline lookup that only reads the title.
#[derive(Debug, Clone, Copy, Default)]
pub struct TitleSeriesParser;

#[async_trait]
impl SeriesLookup for TitleSeriesParser {
    fn id(&self) -> &'static str {
        "title"
    }

    fn name(&self) -> &'static str {
        "Title Parsing"
    }

    async fn find_series_info(&self, title: &str, _author: Option<&str>) -> Result<SeriesInfo> {
        let hint = parse::series_in_title(title);
        if hint.is_empty() {
            return Ok(SeriesInfo::not_found());
        }
        Ok(found(hint, self.name()))
    }
}

/// Online sources first, title parsing last.
pub fn standard_resolver(online: bool) -> FallbackSeriesLookup {
    let mut sources: Vec<Box<dyn SeriesLookup>> = Vec::new();
    if online {
        sources.push(Box::new(OpenLibraryLookup::new()));
        sources.push(Box::new(GoogleBooksLookup::new()));
    }
    sources.push(Box::new(TitleSeriesParser));
    FallbackSeriesLookup::new(sources)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_library_doc_prefers_subject_series() {
        let doc: OpenLibraryDoc = serde_json::from_value(serde_json::json!({
            "title": "The Dragon Reborn: Book 3",
            "series": ["WoT"],
            "subject": ["Fantasy", "Wheel of Time (Series)"]
        }))
        .unwrap();
        let hint = doc.series_hint();
        assert_eq!(hint.series_name.as_deref(), Some("Wheel Of Time"));
        assert_eq!(hint.book_number.as_deref(), Some("3"));
    }

    #[test]
    fn google_volume_reads_description() {
        let volume = VolumeInfo {
            title: "Oathbringer".into(),
            subtitle: String::new(),
            description: "Book 3 of the Stormlight Archive series.".into(),
        };
        let hint = volume.series_hint();
        assert_eq!(hint.series_name.as_deref(), Some("Stormlight Archive"));
        assert_eq!(hint.book_number.as_deref(), Some("3"));
    }

    #[tokio::test]
    async fn offline_resolver_falls_back_to_title() {
        let resolver = standard_resolver(false);
        let info = resolver
            .find_series_info("The Great Hunt (Wheel of Time #2)", None)
            .await
            .unwrap();
        assert!(info.found);
        assert_eq!(info.source.as_deref(), Some("Title Parsing"));
        assert_eq!(info.book_number.as_deref(), Some("2"));

        let missing = resolver.find_series_info("Project Hail Mary", None).await.unwrap();
        assert!(!missing.found);
    }

    #[tokio::test]
    async fn retry_gives_up_on_non_retryable_errors() {
        let mut calls = 0;
        let result: Result<()> = with_retry("test", || {
            calls += 1;
            async { Err(ShelverError::NotFound("nope".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }
}
