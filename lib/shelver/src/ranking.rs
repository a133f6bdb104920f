//! Catalog search, candidate scoring and suggestion building.

use std::path::Path;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use shared::catalog::{CatalogQuery, CatalogRecord};
use shared::library::EnrichmentOutcome;
use shared::work::{MatchConfidence, OriginalMetadata, Suggestion};
use tracing::{debug, info, warn};

use crate::paths;
use crate::traits::{CatalogProvider, SeriesLookup};

/// Candidates kept after ranking.
pub const MAX_SUGGESTIONS: usize = 10;

const IDENTIFIER_WEIGHT: f64 = 0.40;
const TITLE_WEIGHT: f64 = 0.30;
const AUTHOR_WEIGHT: f64 = 0.20;
const RUNTIME_WEIGHT: f64 = 0.25;

static NON_LETTERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z ]+").expect("static query pattern"));
static YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{4}").expect("static year pattern"));

/// Replaces everything but letters and spaces with spaces.
pub fn clean_query(text: &str) -> String {
    NON_LETTERS
        .replace_all(text, " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStrategy {
    Identifier,
    TitleAuthor,
    Title,
    FolderName,
}

/// What a candidate is compared against.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MatchInput {
    pub title: String,
    pub author: Option<String>,
    pub runtime_minutes: Option<u32>,
    pub identifier: Option<String>,
    /// A representative source file, used for the folder-name strategy.
    pub path: Option<String>,
}

impl From<&OriginalMetadata> for MatchInput {
    fn from(o: &OriginalMetadata) -> Self {
        Self {
            title: o.title.clone(),
            author: o.author.clone(),
            runtime_minutes: o.runtime_minutes,
            identifier: o.identifier.clone(),
            path: o.paths.first().cloned(),
        }
    }
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Queries to try, in order, until one returns anything.
pub fn search_plan(input: &MatchInput) -> Vec<(SearchStrategy, CatalogQuery)> {
    let mut plan = Vec::new();
    if let Some(id) = present(input.identifier.as_deref()) {
        plan.push((SearchStrategy::Identifier, CatalogQuery::identifier(id)));
    }
    let title = clean_query(&input.title);
    let author = present(input.author.as_deref()).map(clean_query).filter(|a| !a.is_empty());
    if !title.is_empty() {
        if let Some(author) = author {
            plan.push((
                SearchStrategy::TitleAuthor,
                CatalogQuery::title(title.clone(), Some(author)),
            ));
        }
        plan.push((SearchStrategy::Title, CatalogQuery::title(title, None)));
    }
    let folder = input
        .path
        .as_deref()
        .and_then(|p| Path::new(p).parent())
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .map(clean_query)
        .filter(|f| !f.is_empty());
    if let Some(folder) = folder {
        plan.push((SearchStrategy::FolderName, CatalogQuery::free_text(folder)));
    }
    plan
}

fn similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(&a.to_lowercase(), &b.to_lowercase())
}

/// Weighted match score in `[0, 1]`. Fields missing on either side are left
/// out of both the sum and the normalizing weight.
pub fn score(candidate: &CatalogRecord, input: &MatchInput) -> f64 {
    let mut total = 0.0;
    let mut weight = 0.0;

    if let (Some(local), Some(remote)) = (
        present(input.identifier.as_deref()),
        present(candidate.identifier.as_deref()),
    ) {
        weight += IDENTIFIER_WEIGHT;
        if local.eq_ignore_ascii_case(remote) {
            total += IDENTIFIER_WEIGHT;
        }
    }

    if let (Some(local), Some(remote)) = (
        present(Some(input.title.as_str())),
        present(Some(candidate.title.as_str())),
    ) {
        weight += TITLE_WEIGHT;
        total += TITLE_WEIGHT * similarity(local, remote);
    }

    if let (Some(local), Some(remote)) = (
        present(input.author.as_deref()),
        present(candidate.primary_author()),
    ) {
        weight += AUTHOR_WEIGHT;
        total += AUTHOR_WEIGHT * similarity(local, remote);
    }

    if let (Some(local), Some(remote)) = (
        input.runtime_minutes.filter(|m| *m > 0),
        candidate.runtime_minutes.filter(|m| *m > 0),
    ) {
        let (local, remote) = (f64::from(local), f64::from(remote));
        let closeness = 1.0 - (local - remote).abs() / local.max(remote);
        weight += RUNTIME_WEIGHT;
        total += RUNTIME_WEIGHT * closeness.max(0.0);
    }

    if weight == 0.0 {
        0.0
    } else {
        (total / weight).clamp(0.0, 1.0)
    }
}

/// Scores and orders candidates, best first, keeping source order on ties.
pub fn rank(candidates: Vec<CatalogRecord>, input: &MatchInput) -> Vec<(CatalogRecord, f64)> {
    let mut scored: Vec<_> = candidates
        .into_iter()
        .map(|c| {
            let s = score(&c, input);
            (c, s)
        })
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.truncate(MAX_SUGGESTIONS);
    scored
}

fn suggestion_from(
    sequence_id: u32,
    candidate: CatalogRecord,
    match_score: f64,
    original: &OriginalMetadata,
) -> Suggestion {
    let series = candidate.series.first().cloned();
    let narrator = (!candidate.narrators.is_empty()).then(|| candidate.narrators.join(", "));
    let year = candidate
        .release_date
        .as_deref()
        .and_then(|d| YEAR.find(d))
        .map(|m| m.as_str().to_string());
    let mut suggestion = Suggestion {
        sequence_id,
        author: candidate.primary_author().map(str::to_string),
        title: candidate.title,
        subtitle: candidate.subtitle,
        narrator,
        series: series.as_ref().map(|s| s.title.clone()),
        book_number: series.and_then(|s| s.sequence),
        year,
        genre: candidate.genres,
        identifier: candidate.identifier,
        cover_url: candidate.cover_url,
        runtime_minutes: candidate.runtime_minutes,
        publisher: candidate.publisher,
        language: candidate.language,
        description: candidate.description,
        match_score,
        confidence: Some(MatchConfidence::from_score(match_score)),
        organized_paths: Vec::new(),
    };
    refresh_paths(&mut suggestion, original);
    suggestion
}

/// Recomputes a suggestion's destination paths from its current fields.
pub fn refresh_paths(suggestion: &mut Suggestion, original: &OriginalMetadata) {
    suggestion.organized_paths = paths::generate((&*suggestion).into(), &original.paths)
        .map(|r| r.organized_paths)
        .unwrap_or_else(|| original.paths.clone());
}

/// Turns ranked candidates into suggestions numbered 1..N.
pub fn build_suggestions(
    ranked: Vec<(CatalogRecord, f64)>,
    original: &OriginalMetadata,
) -> Vec<Suggestion> {
    ranked
        .into_iter()
        .enumerate()
        .map(|(index, (candidate, s))| suggestion_from(index as u32 + 1, candidate, s, original))
        .collect()
}

/// Queries the catalog and turns whatever comes back into ranked suggestions.
#[derive(Clone)]
pub struct CandidateRanker {
    catalog: Arc<dyn CatalogProvider>,
    series: Option<Arc<dyn SeriesLookup>>,
}

impl CandidateRanker {
    pub fn new(catalog: Arc<dyn CatalogProvider>, series: Option<Arc<dyn SeriesLookup>>) -> Self {
        Self { catalog, series }
    }

    /// Runs the search plan and returns the first non-empty answer. A failing
    /// strategy counts as empty.
    pub async fn search(
        &self,
        input: &MatchInput,
    ) -> Option<(SearchStrategy, Vec<CatalogRecord>)> {
        for (strategy, query) in search_plan(input) {
            match self.catalog.search(&query, MAX_SUGGESTIONS).await {
                Ok(results) if !results.is_empty() => {
                    debug!("{:?} search found {} results", strategy, results.len());
                    return Some((strategy, results));
                }
                Ok(_) => continue,
                Err(e) => {
                    warn!("{} {:?} search failed: {}", self.catalog.name(), strategy, e);
                    continue;
                }
            }
        }
        None
    }

    /// End-to-end enrichment for one local record. Never fails; problems come
    /// back as an un-enhanced outcome with a message.
    pub async fn enrich(&self, original: &OriginalMetadata) -> EnrichmentOutcome {
        let input = MatchInput::from(original);
        match self.search(&input).await {
            Some((strategy, candidates)) => {
                let total = candidates.len();
                let outcome = self.outcome(candidates, &input, original).await;
                info!(
                    "'{}': {} ranked suggestions via {:?} search",
                    original.title,
                    outcome.suggestions.len(),
                    strategy
                );
                EnrichmentOutcome {
                    total_results: total,
                    ..outcome
                }
            }
            None => EnrichmentOutcome::not_enhanced("No catalog results found"),
        }
    }

    /// Same ranking as [`enrich`](Self::enrich) but for operator-typed text.
    /// Only the title takes part in matching.
    pub async fn manual_search(&self, original: &OriginalMetadata, query: &str) -> EnrichmentOutcome {
        let query = query.trim();
        if query.is_empty() {
            return EnrichmentOutcome::not_enhanced("Search query is empty");
        }
        let input = MatchInput {
            title: query.to_string(),
            runtime_minutes: original.runtime_minutes,
            path: original.paths.first().cloned(),
            ..Default::default()
        };
        let candidates = match self
            .catalog
            .search(&CatalogQuery::free_text(query), MAX_SUGGESTIONS)
            .await
        {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!("{} manual search failed: {}", self.catalog.name(), e);
                Vec::new()
            }
        };
        let total = candidates.len();
        let mut outcome = if candidates.is_empty() {
            EnrichmentOutcome::not_enhanced("")
        } else {
            self.outcome(candidates, &input, original).await
        };
        outcome.total_results = total;
        outcome.message = format!("Manual search: \"{}\" - Found {} results", query, total);
        outcome
    }

    async fn outcome(
        &self,
        candidates: Vec<CatalogRecord>,
        input: &MatchInput,
        original: &OriginalMetadata,
    ) -> EnrichmentOutcome {
        let mut suggestions = build_suggestions(rank(candidates, input), original);
        if let Some(best) = suggestions.first_mut() {
            self.enrich_series(best, original).await;
        }
        EnrichmentOutcome {
            enhanced: !suggestions.is_empty(),
            selected_suggestion_id: suggestions.first().map(|s| s.sequence_id),
            total_results: suggestions.len(),
            message: format!("Found {} ranked suggestions", suggestions.len()),
            suggestions,
        }
    }

    /// Fills a missing series position on the best suggestion only. Lower
    /// ranked suggestions keep whatever the catalog said.
    async fn enrich_series(&self, best: &mut Suggestion, original: &OriginalMetadata) {
        if best.book_number.is_some() {
            return;
        }
        let Some(lookup) = &self.series else {
            return;
        };
        match lookup.find_series_info(&best.title, best.author.as_deref()).await {
            Ok(info) if info.found => {
                if best.series.is_none() {
                    best.series = info.series_name;
                }
                best.book_number = info.book_number;
                refresh_paths(best, original);
            }
            Ok(_) => {}
            Err(e) => warn!("{} failed for '{}': {}", lookup.name(), best.title, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use shared::catalog::{SeriesInfo, SeriesRef};
    use std::sync::Mutex;

    use crate::error::{Result, ShelverError};

    fn candidate(id: Option<&str>, title: &str, author: Option<&str>, runtime: Option<u32>) -> CatalogRecord {
        CatalogRecord {
            identifier: id.map(str::to_string),
            title: title.to_string(),
            authors: author.map(|a| vec![a.to_string()]).unwrap_or_default(),
            runtime_minutes: runtime,
            ..Default::default()
        }
    }

    fn local() -> MatchInput {
        MatchInput {
            title: "The Way of Kings".into(),
            author: Some("Brandon Sanderson".into()),
            runtime_minutes: Some(2710),
            identifier: Some("B003P2WO5E".into()),
            path: Some("Sanderson/The Way of Kings (2010)/01.mp3".into()),
        }
    }

    #[test]
    fn exact_match_outscores_title_only_match() {
        let exact = candidate(Some("b003p2wo5e"), "The Way of Kings", Some("Brandon Sanderson"), Some(2710));
        let loose = candidate(None, "The Way of Kingz", None, None);
        let s1 = score(&exact, &local());
        let s2 = score(&loose, &local());
        assert!((s1 - 1.0).abs() < 1e-9);
        assert!(s1 > s2);
        assert!((0.0..=1.0).contains(&s2));
    }

    #[test]
    fn missing_fields_do_not_dilute_the_score() {
        let input = MatchInput {
            title: "Dune".into(),
            ..Default::default()
        };
        assert!((score(&candidate(None, "Dune", Some("Herbert"), Some(100)), &input) - 1.0).abs() < 1e-9);
        assert_eq!(score(&candidate(None, "", None, None), &MatchInput::default()), 0.0);
    }

    #[test]
    fn runtime_closeness_is_relative_to_the_longer_runtime() {
        let input = MatchInput {
            runtime_minutes: Some(100),
            ..Default::default()
        };
        let s = score(&candidate(None, "", None, Some(400)), &input);
        assert!((s - 0.25).abs() < 1e-9);
    }

    #[test]
    fn ranking_is_stable_and_capped() {
        let input = MatchInput {
            title: "Same".into(),
            ..Default::default()
        };
        let candidates: Vec<_> = (0..12)
            .map(|i| candidate(Some(&format!("ID{i}")), "Same", None, None))
            .collect();
        let ranked = rank(candidates, &input);
        assert_eq!(ranked.len(), MAX_SUGGESTIONS);
        let ids: Vec<_> = ranked.iter().map(|(c, _)| c.identifier.clone().unwrap()).collect();
        assert_eq!(ids[0], "ID0");
        assert_eq!(ids[9], "ID9");
    }

    #[test]
    fn plan_orders_strategies_and_cleans_text() {
        let plan = search_plan(&local());
        let strategies: Vec<_> = plan.iter().map(|(s, _)| *s).collect();
        assert_eq!(
            strategies,
            vec![
                SearchStrategy::Identifier,
                SearchStrategy::TitleAuthor,
                SearchStrategy::Title,
                SearchStrategy::FolderName
            ]
        );
        assert_eq!(plan[3].1.free_text.as_deref(), Some("The Way of Kings"));
        assert_eq!(clean_query("Book #1: Dune (2021)"), "Book Dune");
    }

    struct ScriptedCatalog {
        answers: Mutex<Vec<Result<Vec<CatalogRecord>>>>,
        seen: Mutex<Vec<CatalogQuery>>,
    }

    impl ScriptedCatalog {
        fn new(answers: Vec<Result<Vec<CatalogRecord>>>) -> Self {
            Self {
                answers: Mutex::new(answers),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CatalogProvider for ScriptedCatalog {
        fn id(&self) -> &'static str {
            "scripted"
        }
        fn name(&self) -> &'static str {
            "Scripted"
        }
        async fn search(&self, query: &CatalogQuery, _limit: usize) -> Result<Vec<CatalogRecord>> {
            self.seen.lock().unwrap().push(query.clone());
            let mut answers = self.answers.lock().unwrap();
            if answers.is_empty() {
                Ok(vec![])
            } else {
                answers.remove(0)
            }
        }
    }

    struct FixedSeries;

    #[async_trait]
    impl SeriesLookup for FixedSeries {
        fn id(&self) -> &'static str {
            "fixed"
        }
        fn name(&self) -> &'static str {
            "Fixed"
        }
        async fn find_series_info(&self, _: &str, _: Option<&str>) -> Result<SeriesInfo> {
            Ok(SeriesInfo {
                series_name: Some("Stormlight Archive".into()),
                book_number: Some("1".into()),
                found: true,
                ..Default::default()
            })
        }
    }

    fn original() -> OriginalMetadata {
        OriginalMetadata {
            title: "The Way of Kings".into(),
            author: Some("Brandon Sanderson".into()),
            runtime_minutes: Some(2710),
            identifier: Some("B003P2WO5E".into()),
            paths: vec!["Sanderson/The Way of Kings (2010)/01.mp3".into()],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn stops_at_first_strategy_with_results() {
        let catalog = Arc::new(ScriptedCatalog::new(vec![
            Err(ShelverError::Catalog("offline".into())),
            Ok(vec![]),
            Ok(vec![
                candidate(None, "Something Else", None, None),
                candidate(None, "The Way of Kings", Some("Brandon Sanderson"), Some(2700)),
            ]),
        ]));
        let ranker = CandidateRanker::new(catalog.clone(), Some(Arc::new(FixedSeries)));
        let outcome = ranker.enrich(&original()).await;

        assert!(outcome.enhanced);
        assert_eq!(catalog.seen.lock().unwrap().len(), 3);
        assert_eq!(outcome.suggestions.len(), 2);
        assert_eq!(outcome.selected_suggestion_id, Some(1));

        let best = &outcome.suggestions[0];
        assert_eq!(best.title, "The Way of Kings");
        assert_eq!(best.sequence_id, 1);
        assert_eq!(best.series.as_deref(), Some("Stormlight Archive"));
        assert_eq!(best.book_number.as_deref(), Some("1"));
        assert_eq!(
            best.organized_paths,
            vec!["Stormlight Archive/1-The Way of Kings/The Way of Kings.mp3".to_string()]
        );
        // Lower ranked suggestions are left alone.
        assert_eq!(outcome.suggestions[1].book_number, None);
        assert_eq!(outcome.suggestions[1].sequence_id, 2);
    }

    #[tokio::test]
    async fn nothing_found_is_not_an_error() {
        let ranker = CandidateRanker::new(Arc::new(ScriptedCatalog::new(vec![])), None);
        let outcome = ranker.enrich(&original()).await;
        assert!(!outcome.enhanced);
        assert!(outcome.suggestions.is_empty());
        assert_eq!(outcome.message, "No catalog results found");
    }

    #[tokio::test]
    async fn manual_search_uses_only_the_typed_query() {
        let mut with_series = candidate(Some("X1"), "Dune", Some("Frank Herbert"), None);
        with_series.series = vec![SeriesRef {
            title: "Dune".into(),
            sequence: Some("1".into()),
        }];
        let catalog = Arc::new(ScriptedCatalog::new(vec![Ok(vec![with_series])]));
        let ranker = CandidateRanker::new(catalog.clone(), None);
        let outcome = ranker.manual_search(&original(), " dune ").await;

        assert_eq!(catalog.seen.lock().unwrap().as_slice(), &[CatalogQuery::free_text("dune")]);
        assert_eq!(outcome.message, "Manual search: \"dune\" - Found 1 results");
        assert_eq!(outcome.suggestions[0].book_number.as_deref(), Some("1"));
    }
}
