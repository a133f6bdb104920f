use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Stable identifier of a work, assigned once when its folder is first grouped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkId(String);

impl WorkId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for WorkId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WorkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WorkId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for WorkId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkStatus {
    #[default]
    Pending,
    Accepted,
    Ignored,
    Broken,
    Manual,
}

impl WorkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkStatus::Pending => "pending",
            WorkStatus::Accepted => "accepted",
            WorkStatus::Ignored => "ignored",
            WorkStatus::Broken => "broken",
            WorkStatus::Manual => "manual",
        }
    }
}

impl fmt::Display for WorkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(WorkStatus::Pending),
            "accepted" => Ok(WorkStatus::Accepted),
            "ignored" => Ok(WorkStatus::Ignored),
            "broken" => Ok(WorkStatus::Broken),
            "manual" => Ok(WorkStatus::Manual),
            other => Err(format!("unknown work status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchConfidence {
    Low,
    Medium,
    High,
}

impl MatchConfidence {
    pub fn from_score(score: f64) -> Self {
        if score > 0.8 {
            MatchConfidence::High
        } else if score > 0.5 {
            MatchConfidence::Medium
        } else {
            MatchConfidence::Low
        }
    }
}

/// Local view of a work as read from its audio files.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OriginalMetadata {
    pub title: String,
    pub author: Option<String>,
    pub narrator: Option<String>,
    pub series: Option<String>,
    pub year: Option<String>,
    #[serde(default)]
    pub genre: Vec<String>,
    pub runtime_minutes: Option<u32>,
    /// External catalog identifier (ASIN) when one was tagged.
    pub identifier: Option<String>,
    /// Cover asset file name under the covers directory.
    pub cover: Option<String>,
    /// Media-root-relative paths, `/` separated, in playback order.
    #[serde(default)]
    pub paths: Vec<String>,
}

impl OriginalMetadata {
    /// Folder key of the first listed path.
    pub fn primary_folder(&self) -> Option<String> {
        self.paths.first().map(|p| folder_key(p))
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Suggestion {
    pub sequence_id: u32,
    pub title: String,
    pub subtitle: Option<String>,
    pub author: Option<String>,
    pub narrator: Option<String>,
    pub series: Option<String>,
    pub book_number: Option<String>,
    pub year: Option<String>,
    #[serde(default)]
    pub genre: Vec<String>,
    pub identifier: Option<String>,
    pub cover_url: Option<String>,
    pub runtime_minutes: Option<u32>,
    pub publisher: Option<String>,
    pub language: Option<String>,
    pub description: Option<String>,
    pub match_score: f64,
    pub confidence: Option<MatchConfidence>,
    #[serde(default)]
    pub organized_paths: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkRecord {
    pub id: WorkId,
    pub original: OriginalMetadata,
    #[serde(default)]
    pub suggestions: Vec<Suggestion>,
    pub selected_suggestion_id: Option<u32>,
    #[serde(default)]
    pub status: WorkStatus,
    /// Explanation left by the last enrichment or manual search.
    pub last_search: Option<String>,
}

impl WorkRecord {
    pub fn new(original: OriginalMetadata) -> Self {
        Self {
            id: WorkId::new(),
            original,
            suggestions: Vec::new(),
            selected_suggestion_id: None,
            status: WorkStatus::Pending,
            last_search: None,
        }
    }

    pub fn suggestion(&self, sequence_id: u32) -> Option<&Suggestion> {
        self.suggestions
            .iter()
            .find(|s| s.sequence_id == sequence_id)
    }

    /// The chosen suggestion, falling back to the first one when the recorded
    /// selection no longer exists.
    pub fn selected_suggestion(&self) -> Option<&Suggestion> {
        self.selected_suggestion_id
            .and_then(|id| self.suggestion(id))
            .or_else(|| self.suggestions.first())
    }
}

/// Folder key for a media-root-relative path. Files directly under the root
/// belong to `"."`.
pub fn folder_key(relative_path: &str) -> String {
    match relative_path.rsplit_once('/') {
        Some((parent, _)) if !parent.is_empty() => parent.to_string(),
        _ => ".".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folder_key_uses_parent_or_root_marker() {
        assert_eq!(folder_key("Author/Book/01.mp3"), "Author/Book");
        assert_eq!(folder_key("loose.m4b"), ".");
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("Accepted".parse::<WorkStatus>(), Ok(WorkStatus::Accepted));
        assert!("done".parse::<WorkStatus>().is_err());
    }

    #[test]
    fn selection_falls_back_to_first_suggestion() {
        let mut record = WorkRecord::new(OriginalMetadata::default());
        record.suggestions = vec![
            Suggestion {
                sequence_id: 1,
                title: "First".into(),
                ..Default::default()
            },
            Suggestion {
                sequence_id: 2,
                title: "Second".into(),
                ..Default::default()
            },
        ];
        record.selected_suggestion_id = Some(7);
        assert_eq!(record.selected_suggestion().map(|s| s.sequence_id), Some(1));
        record.selected_suggestion_id = Some(2);
        assert_eq!(record.selected_suggestion().map(|s| s.sequence_id), Some(2));
    }
}
