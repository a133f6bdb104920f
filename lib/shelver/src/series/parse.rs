//! Text heuristics for pulling series names and positions out of titles,
//! subjects and blurbs.

use std::sync::LazyLock;

use regex::Regex;

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static series pattern")
}

static BOOK_NUMBER: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"book\s+(\d+)",
        r"#(\d+)",
        r"\((\d+)\)",
        r"volume\s+(\d+)",
        r"part\s+(\d+)",
        r"number\s+(\d+)",
    ]
    .into_iter()
    .map(re)
    .collect()
});

static SUBJECT_SERIES: LazyLock<Vec<Regex>> =
    LazyLock::new(|| [r"^(.+?)\s*\(series\)", r"^(.+?)\s*series\b"].into_iter().map(re).collect());

static DESCRIPTION_NUMBERED: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"book\s+(\d+)\s+(?:of|in)\s+(?:the\s+)?(.+?)\s+series",
        r"(\d+)(?:st|nd|rd|th)\s+book\s+in\s+(?:the\s+)?(.+?)\s+series",
        r"part\s+(\d+)\s+of\s+(?:the\s+)?(.+?)\s+(?:series|saga)",
    ]
    .into_iter()
    .map(re)
    .collect()
});

static DESCRIPTION_NAME: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?:[Tt]he\s+)?((?:[A-Z][a-zA-Z']*\s+(?:(?:of|the|and)\s+)?)+)series\b"));

static TITLE_SERIES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)^.+?\s*\((.+?)\s*#(\d+)\)",
        r"(?i)^.+?\s*\((.+?),?\s*book\s*(\d+)\)",
        r"(?i)^.+?\s*:\s*(.+?)\s*#(\d+)",
        r"(?i)^.+?\s+-\s+(.+?)\s*#(\d+)",
        r"(?i)^(.+?),?\s*book\s*(\d+)",
    ]
    .into_iter()
    .map(re)
    .collect()
});

static PARENTHESIZED: LazyLock<Regex> = LazyLock::new(|| re(r"\s*\(.*?\)\s*"));
static HASH_NUMBER: LazyLock<Regex> = LazyLock::new(|| re(r"\s*#\d+\s*"));
static BOOK_N: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)\s*book\s*\d+\s*"));
static SPACES: LazyLock<Regex> = LazyLock::new(|| re(r"\s+"));

/// Series name and position found in some text.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SeriesHint {
    pub series_name: Option<String>,
    pub book_number: Option<String>,
}

impl SeriesHint {
    pub fn is_empty(&self) -> bool {
        self.series_name.is_none() && self.book_number.is_none()
    }
}

fn number(text: &str) -> Option<String> {
    text.parse::<u32>().ok().map(|n| n.to_string())
}

pub fn book_number_in(text: &str) -> Option<String> {
    let lower = text.to_lowercase();
    BOOK_NUMBER
        .iter()
        .filter_map(|re| re.captures(&lower))
        .find_map(|caps| number(&caps[1]))
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// "Wheel of Time (Series)" or "Discworld series".
pub fn series_in_subject(subject: &str) -> Option<String> {
    let lower = subject.to_lowercase();
    SUBJECT_SERIES
        .iter()
        .filter_map(|re| re.captures(&lower))
        .map(|caps| title_case(caps[1].trim()))
        .find(|name| !name.is_empty())
}

pub fn series_in_description(description: &str) -> SeriesHint {
    let lower = description.to_lowercase();
    for pattern in DESCRIPTION_NUMBERED.iter() {
        if let Some(caps) = pattern.captures(&lower) {
            if let Some(book_number) = number(&caps[1]) {
                return SeriesHint {
                    series_name: Some(title_case(caps[2].trim())),
                    book_number: Some(book_number),
                };
            }
        }
    }
    DESCRIPTION_NAME
        .captures(description)
        .map(|caps| caps[1].trim().to_string())
        .filter(|name| name.len() > 3 && name.len() < 50)
        .map(|name| SeriesHint {
            series_name: Some(name),
            book_number: None,
        })
        .unwrap_or_default()
}

/// Last-resort parse of titles such as "Title (Series #3)" or "Series Book 3".
pub fn series_in_title(title: &str) -> SeriesHint {
    for pattern in TITLE_SERIES.iter() {
        if let Some(caps) = pattern.captures(title) {
            let name = caps[1].trim().trim_end_matches(',').trim();
            if let (false, Some(book_number)) = (name.is_empty(), number(&caps[2])) {
                return SeriesHint {
                    series_name: Some(name.to_string()),
                    book_number: Some(book_number),
                };
            }
        }
    }
    SeriesHint::default()
}

/// Strips decorations that confuse bibliographic search engines.
pub fn clean_search_term(term: &str) -> String {
    let term = PARENTHESIZED.replace_all(term, " ");
    let term = HASH_NUMBER.replace_all(&term, " ");
    let term = BOOK_N.replace_all(&term, " ");
    SPACES.replace_all(&term, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_book_numbers() {
        assert_eq!(book_number_in("The Shadow Rising: Book 4"), Some("4".into()));
        assert_eq!(book_number_in("Mistborn #2"), Some("2".into()));
        assert_eq!(book_number_in("Volume 7 of something"), Some("7".into()));
        assert_eq!(book_number_in("No numbers here"), None);
    }

    #[test]
    fn finds_series_in_subjects() {
        assert_eq!(
            series_in_subject("Wheel of Time (Series)"),
            Some("Wheel Of Time".into())
        );
        assert_eq!(series_in_subject("Fantasy fiction"), None);
    }

    #[test]
    fn finds_series_in_descriptions() {
        let hint = series_in_description("Book 3 of the Stormlight Archive series, continuing...");
        assert_eq!(hint.book_number.as_deref(), Some("3"));
        assert_eq!(hint.series_name.as_deref(), Some("Stormlight Archive"));

        let hint = series_in_description("A new entry in the Expanse series.");
        assert_eq!(hint.series_name.as_deref(), Some("Expanse"));
        assert_eq!(hint.book_number, None);
    }

    #[test]
    fn parses_titles() {
        let hint = series_in_title("The Great Hunt (Wheel of Time #2)");
        assert_eq!(hint.series_name.as_deref(), Some("Wheel of Time"));
        assert_eq!(hint.book_number.as_deref(), Some("2"));

        let hint = series_in_title("Mistborn Book 3");
        assert_eq!(hint.series_name.as_deref(), Some("Mistborn"));
        assert_eq!(hint.book_number.as_deref(), Some("3"));

        assert!(series_in_title("Project Hail Mary").is_empty());
    }

    #[test]
    fn cleans_search_terms() {
        assert_eq!(
            clean_search_term("The Great Hunt (Wheel of Time #2) Book 2"),
            "The Great Hunt"
        );
    }
}
