use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FolderStructure {
    pub series_folder: String,
    pub book_folder: String,
    pub full_folder_path: String,
    pub is_multi_part: bool,
    pub part_count: usize,
}

/// Fields that actually shaped a generated layout.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PathMetadata {
    pub title: String,
    pub series: Option<String>,
    pub book_number: Option<String>,
    pub year: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PathResult {
    /// Destination paths relative to the organize root, same order as
    /// `original_paths`.
    pub organized_paths: Vec<String>,
    pub folder_structure: FolderStructure,
    pub metadata_used: PathMetadata,
    pub original_paths: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OrganizeRequest {
    pub destination_root: String,
    pub copy_only: bool,
    pub cleanup_empty_folders: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OrganizeReport {
    pub processed: usize,
    pub errors: usize,
    pub cleaned_folders: usize,
    pub cleaned_metadata: usize,
    pub cleaned_covers: usize,
    pub messages: Vec<String>,
}
