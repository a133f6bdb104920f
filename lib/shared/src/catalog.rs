use serde::{Deserialize, Serialize};

/// A query sent to a catalog source. Exactly which fields are set depends on
/// the search strategy being tried.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CatalogQuery {
    pub identifier: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub free_text: Option<String>,
}

impl CatalogQuery {
    pub fn identifier(identifier: impl Into<String>) -> Self {
        Self {
            identifier: Some(identifier.into()),
            ..Default::default()
        }
    }

    pub fn title(title: impl Into<String>, author: Option<String>) -> Self {
        Self {
            title: Some(title.into()),
            author,
            ..Default::default()
        }
    }

    pub fn free_text(text: impl Into<String>) -> Self {
        Self {
            free_text: Some(text.into()),
            ..Default::default()
        }
    }

    /// Keyword string for sources that only take a single search box.
    pub fn keywords(&self) -> String {
        if let Some(id) = self.identifier.as_deref().filter(|s| !s.is_empty()) {
            return id.to_string();
        }
        let parts: Vec<&str> = [
            self.title.as_deref(),
            self.author.as_deref(),
            self.free_text.as_deref(),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
        parts.join(" ")
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SeriesRef {
    pub title: String,
    pub sequence: Option<String>,
}

/// A raw candidate as returned by a catalog source.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub identifier: Option<String>,
    pub title: String,
    pub subtitle: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub narrators: Vec<String>,
    #[serde(default)]
    pub series: Vec<SeriesRef>,
    pub release_date: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    pub runtime_minutes: Option<u32>,
    pub publisher: Option<String>,
    pub language: Option<String>,
    pub description: Option<String>,
    pub cover_url: Option<String>,
}

impl CatalogRecord {
    pub fn primary_author(&self) -> Option<&str> {
        self.authors.first().map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SeriesInfo {
    pub series_name: Option<String>,
    pub book_number: Option<String>,
    pub total_books: Option<u32>,
    pub source: Option<String>,
    pub found: bool,
}

impl SeriesInfo {
    pub fn not_found() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_wins_over_text_fields() {
        let mut query = CatalogQuery::identifier("B00ABCDEFG");
        query.title = Some("ignored".into());
        assert_eq!(query.keywords(), "B00ABCDEFG");
    }

    #[test]
    fn title_and_author_are_joined() {
        let query = CatalogQuery::title("The Hobbit", Some("Tolkien".into()));
        assert_eq!(query.keywords(), "The Hobbit Tolkien");
    }
}
