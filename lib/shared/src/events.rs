use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::work::WorkId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LibraryEventKind {
    ScanStarted { full: bool },
    ScanFinished { processed: usize, full: bool },
    WorkUpdated { id: WorkId, title: String },
    ChangesDetected { added: usize, modified: usize, removed: usize },
    CleanupFinished { metadata: usize, covers: usize, dry_run: bool },
    OrganizeFinished { processed: usize, errors: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryEvent {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: LibraryEventKind,
}

impl LibraryEvent {
    pub fn now(kind: LibraryEventKind) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
        }
    }
}
