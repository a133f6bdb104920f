//! Canonical destination layout for a work: `series/book/file`.
//!
//! Everything here is pure; nothing touches the filesystem.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use shared::organize::{FolderStructure, PathMetadata, PathResult};
use shared::work::{OriginalMetadata, Suggestion, WorkRecord};

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("static whitespace pattern"));
static YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{4}").expect("static year pattern"));

const UNKNOWN_TITLE: &str = "Unknown Title";

/// The fields that decide where a work ends up.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PathFields<'a> {
    pub title: &'a str,
    pub series: Option<&'a str>,
    pub book_number: Option<&'a str>,
    pub year: Option<&'a str>,
}

impl<'a> From<&'a Suggestion> for PathFields<'a> {
    fn from(s: &'a Suggestion) -> Self {
        Self {
            title: &s.title,
            series: s.series.as_deref(),
            book_number: s.book_number.as_deref(),
            year: s.year.as_deref(),
        }
    }
}

impl<'a> From<&'a OriginalMetadata> for PathFields<'a> {
    fn from(o: &'a OriginalMetadata) -> Self {
        Self {
            title: &o.title,
            series: o.series.as_deref(),
            book_number: None,
            year: o.year.as_deref(),
        }
    }
}

/// Makes free text safe to use as a single path segment on any platform.
pub fn sanitize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            ':' => out.push_str(" -"),
            '?' | '*' => {}
            '"' => out.push('\''),
            '<' => out.push('('),
            '>' => out.push(')'),
            '|' | '/' | '\\' => out.push('-'),
            '\n' | '\r' | '\t' => out.push(' '),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    let collapsed = WHITESPACE.replace_all(&out, " ");
    collapsed
        .trim()
        .trim_end_matches(['.', ' '])
        .to_string()
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.map(sanitize).filter(|v| !v.is_empty())
}

fn extension_of(path: &str) -> String {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e))
        .unwrap_or_default()
}

/// Generates destination paths for `original_paths`, in the same order.
/// `None` when there is nothing to lay out.
pub fn generate(fields: PathFields<'_>, original_paths: &[String]) -> Option<PathResult> {
    if original_paths.is_empty() {
        return None;
    }

    let title = non_empty(Some(fields.title)).unwrap_or_else(|| UNKNOWN_TITLE.to_string());
    let series_folder = non_empty(fields.series).unwrap_or_else(|| title.clone());
    let book_number = non_empty(fields.book_number);
    let year = fields
        .year
        .and_then(|y| YEAR.find(y))
        .map(|m| m.as_str().to_string());

    let mut book_folder = String::new();
    if let Some(number) = &book_number {
        book_folder.push_str(number);
        book_folder.push('-');
    }
    book_folder.push_str(&title);
    if let Some(year) = &year {
        book_folder.push_str(&format!(" ({})", year));
    }

    let full_folder_path = format!("{}/{}", series_folder, book_folder);
    let is_multi_part = original_paths.len() > 1;
    let organized_paths = original_paths
        .iter()
        .enumerate()
        .map(|(index, original)| {
            let ext = extension_of(original);
            if is_multi_part {
                format!("{}/{} [Part {:02}]{}", full_folder_path, title, index + 1, ext)
            } else {
                format!("{}/{}{}", full_folder_path, title, ext)
            }
        })
        .collect();

    Some(PathResult {
        organized_paths,
        folder_structure: FolderStructure {
            series_folder,
            book_folder,
            full_folder_path,
            is_multi_part,
            part_count: original_paths.len(),
        },
        metadata_used: PathMetadata {
            title,
            series: non_empty(fields.series),
            book_number,
            year,
        },
        original_paths: original_paths.to_vec(),
    })
}

/// Paths for one suggestion of a record. With no `sequence_id` the selected
/// suggestion is used, or the local metadata when there are no suggestions.
/// `None` when the record has no files or the sequence id does not exist.
pub fn generate_for_record(record: &WorkRecord, sequence_id: Option<u32>) -> Option<PathResult> {
    let paths = &record.original.paths;
    match sequence_id {
        Some(id) => generate(record.suggestion(id)?.into(), paths),
        None => match record.selected_suggestion() {
            Some(suggestion) => generate(suggestion.into(), paths),
            None => generate((&record.original).into(), paths),
        },
    }
}

/// Renders a layout as an indented tree for operators to eyeball.
pub fn preview(result: &PathResult) -> String {
    let structure = &result.folder_structure;
    let mut out = format!("{}/\n  {}/\n", structure.series_folder, structure.book_folder);
    for path in &result.organized_paths {
        let file = path.rsplit('/').next().unwrap_or(path);
        out.push_str(&format!("    {}\n", file));
    }
    out
}
