//! Query-time search over the persisted detection artifact.
//!
//! Searching never re-runs recognition. The detection artifact is loaded,
//! every record is scored against every query term, and the matches are
//! written to a query-scoped result file plus a fresh set of match-annotated
//! page images. A record that matches several terms appears once per term,
//! distinguished by `matched_term`.
//!
//! ## Matching
//!
//! Terms are whitespace-split from the query and compared case-insensitively.
//! Substring containment is checked first (when enabled) because it is exact
//! evidence the term occurs in the word; only non-substrings fall through to
//! Levenshtein similarity scored on a 0–100 scale against the configured
//! threshold.

use crate::annotate::{annotate_page, AnnotationStyle};
use crate::artifact::{
    document_base_name, page_image_name, DetectionRecord, MatchRecord, SearchArtifact,
};
use crate::config::PipelineConfig;
use crate::error::WordLensError;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Does `word` match a single query `term`?
///
/// Both sides are compared lowercased. `partial` enables the substring check;
/// otherwise (or when containment fails) the normalized Levenshtein similarity
/// of the full strings, scaled to 0–100, must reach `threshold`.
pub fn term_matches(word: &str, term: &str, threshold: u8, partial: bool) -> bool {
    let word = word.to_lowercase();
    let term = term.to_lowercase();
    if partial && word.contains(&term) {
        return true;
    }
    let score = strsim::normalized_levenshtein(&term, &word) * 100.0;
    score >= f64::from(threshold)
}

/// Search the detection artifact and write the query's result file and
/// match-annotated images.
///
/// The result file is written even when nothing matched, so "searched and
/// found nothing" is distinguishable from "never searched". Annotation skips
/// pages whose source image has gone missing; the textual results are still
/// complete in that case.
pub async fn search_documents(
    config: &PipelineConfig,
    query: &str,
) -> Result<SearchArtifact, WordLensError> {
    let terms = query_terms(query)?;
    let layout = config.layout();

    let records = load_detection_records(config)?;
    info!(
        "Searching {} detection records for {} term(s)",
        records.len(),
        terms.len()
    );

    let mut matches = Vec::new();
    for record in &records {
        for term in &terms {
            if term_matches(&record.word, term, config.fuzzy_threshold, config.partial_match) {
                matches.push(MatchRecord::from_detection(record, term)?);
            }
        }
    }

    // Group by page so each annotated image carries all of its matches.
    let mut pages: BTreeMap<(String, u32), Vec<MatchRecord>> = BTreeMap::new();
    for m in &matches {
        pages
            .entry((m.document.clone(), m.page))
            .or_default()
            .push(m.clone());
    }

    let mut annotated_pages = 0;
    for ((document, page), page_matches) in &pages {
        let base = document_base_name(document);
        let source = layout.page_image_path(base, *page);
        if !source.is_file() {
            warn!(
                "Page image missing, skipping annotation: {}",
                source.display()
            );
            continue;
        }

        let out_dir = layout.search_annotated_dir(base);
        std::fs::create_dir_all(&out_dir).map_err(|e| WordLensError::ArtifactWriteFailed {
            path: out_dir.clone(),
            source: e,
        })?;
        let out_path = out_dir.join(page_image_name(*page));

        let match_count = page_matches.len();
        let page_matches = page_matches.clone();
        let source_path = source.clone();
        let target_path = out_path.clone();
        tokio::task::spawn_blocking(move || {
            annotate_page(
                &source_path,
                &page_matches,
                &target_path,
                AnnotationStyle::Labelled,
            )
        })
        .await
        .map_err(|e| WordLensError::Internal(format!("annotation task panicked: {e}")))??;

        debug!("Annotated {} match(es) → {}", match_count, out_path.display());
        annotated_pages += 1;
    }

    let results_path = layout.search_results_path(query);
    if let Some(parent) = results_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| WordLensError::ArtifactWriteFailed {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    let json = serde_json::to_string_pretty(&matches)
        .map_err(|e| WordLensError::Internal(format!("serialize match records: {e}")))?;
    std::fs::write(&results_path, json).map_err(|e| WordLensError::ArtifactWriteFailed {
        path: results_path.clone(),
        source: e,
    })?;

    info!(
        "Search \"{}\": {} match(es) across {} page(s) → {}",
        query,
        matches.len(),
        pages.len(),
        results_path.display()
    );

    Ok(SearchArtifact {
        results_path,
        matches,
        annotated_pages,
    })
}

/// Split the query into lowercase-insensitive terms, dropping duplicates.
fn query_terms(query: &str) -> Result<Vec<String>, WordLensError> {
    let mut seen = Vec::new();
    for term in query.split_whitespace() {
        if !seen.iter().any(|t: &String| t.eq_ignore_ascii_case(term)) {
            seen.push(term.to_string());
        }
    }
    if seen.is_empty() {
        return Err(WordLensError::InvalidConfig(
            "search query must contain at least one term".into(),
        ));
    }
    Ok(seen)
}

/// Load and parse the persisted detection artifact.
fn load_detection_records(
    config: &PipelineConfig,
) -> Result<Vec<DetectionRecord>, WordLensError> {
    let path = config.layout().detection_results_path();
    let raw = std::fs::read_to_string(&path).map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            WordLensError::DetectionArtifactMissing { path: path.clone() }
        } else {
            WordLensError::ArtifactWriteFailed {
                path: path.clone(),
                source: e,
            }
        }
    })?;
    serde_json::from_str(&raw).map_err(|e| WordLensError::ArtifactParseFailed {
        path: PathBuf::from(&path),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn substring_containment_matches_before_fuzzy() {
        assert!(term_matches("Invoice", "invoic", 80, true));
        assert!(term_matches("INVOICE", "voi", 80, true));
        // Not a substring and far below threshold.
        assert!(!term_matches("Invoice", "xyzzy", 80, true));
    }

    #[test]
    fn fuzzy_scoring_respects_threshold() {
        // "invoice" vs "invoices": similarity 7/8 = 87.5.
        assert!(term_matches("invoices", "invoice", 87, false));
        assert!(!term_matches("invoices", "invoice", 88, false));
    }

    #[test]
    fn partial_disabled_still_allows_exact() {
        assert!(term_matches("Total", "total", 100, false));
    }

    #[test]
    fn query_terms_split_and_dedupe() {
        let terms = query_terms("Total total  invoice").unwrap();
        assert_eq!(terms, vec!["Total", "invoice"]);
        assert!(query_terms("   ").is_err());
    }

    fn seed_artifact(root: &Path, records: &[DetectionRecord]) -> PipelineConfig {
        let config = PipelineConfig::builder()
            .artifacts_root(root)
            .build()
            .unwrap();
        let layout = config.layout();
        let results = layout.detection_results_path();
        std::fs::create_dir_all(results.parent().unwrap()).unwrap();
        std::fs::write(&results, serde_json::to_string_pretty(records).unwrap()).unwrap();
        config
    }

    fn white_page(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        image::RgbImage::from_pixel(80, 60, image::Rgb([255, 255, 255]))
            .save(path)
            .unwrap();
    }

    fn record(document: &str, page_image: &str, word: &str) -> DetectionRecord {
        DetectionRecord {
            document: document.into(),
            page_image: page_image.into(),
            word: word.into(),
            bounding_box: [0.1, 0.1, 0.4, 0.2],
            confidence: 0.9,
        }
    }

    #[tokio::test]
    async fn missing_artifact_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::builder()
            .artifacts_root(dir.path())
            .build()
            .unwrap();
        assert!(matches!(
            search_documents(&config, "anything").await,
            Err(WordLensError::DetectionArtifactMissing { .. })
        ));
    }

    #[tokio::test]
    async fn matches_are_grouped_and_annotated() {
        let dir = tempfile::tempdir().unwrap();
        let config = seed_artifact(
            dir.path(),
            &[
                record("report.pdf", "img_2.jpg", "Invoice"),
                record("report.pdf", "img_2.jpg", "Total"),
                record("report.pdf", "img_3.jpg", "Summary"),
            ],
        );
        let layout = config.layout();
        white_page(&layout.page_image_path("report", 2));
        white_page(&layout.page_image_path("report", 3));

        let artifact = search_documents(&config, "invoic total").await.unwrap();

        assert_eq!(artifact.matches.len(), 2);
        assert_eq!(artifact.matches[0].matched_term, "invoic");
        assert_eq!(artifact.matches[0].page, 2);
        assert_eq!(artifact.matches[1].matched_term, "total");
        // Both matches share page 2, one annotated image.
        assert_eq!(artifact.annotated_pages, 1);
        assert!(layout
            .search_annotated_dir("report")
            .join("img_2.jpg")
            .is_file());
        assert_eq!(
            artifact.results_path,
            layout.search_results_path("invoic total")
        );
    }

    #[tokio::test]
    async fn empty_result_file_is_still_written() {
        let dir = tempfile::tempdir().unwrap();
        seed_artifact(dir.path(), &[record("a.pdf", "img_1.jpg", "hello")]);

        let strict = PipelineConfig::builder()
            .artifacts_root(dir.path())
            .fuzzy_threshold(90)
            .partial_match(false)
            .build()
            .unwrap();
        let artifact = search_documents(&strict, "xyzzy").await.unwrap();

        assert!(artifact.matches.is_empty());
        assert_eq!(artifact.annotated_pages, 0);
        let json = std::fs::read_to_string(&artifact.results_path).unwrap();
        let parsed: Vec<MatchRecord> = serde_json::from_str(&json).unwrap();
        assert!(parsed.is_empty());
    }

    #[tokio::test]
    async fn missing_page_image_skips_annotation_only() {
        let dir = tempfile::tempdir().unwrap();
        let config = seed_artifact(dir.path(), &[record("gone.pdf", "img_1.jpg", "Invoice")]);

        let artifact = search_documents(&config, "invoice").await.unwrap();

        assert_eq!(artifact.matches.len(), 1);
        assert_eq!(artifact.annotated_pages, 0);
        assert!(artifact.results_path.is_file());
    }

    #[tokio::test]
    async fn one_record_per_matching_term() {
        let dir = tempfile::tempdir().unwrap();
        let config = seed_artifact(dir.path(), &[record("a.pdf", "img_1.jpg", "Invoice")]);
        let layout = config.layout();
        white_page(&layout.page_image_path("a", 1));

        // Both terms hit the same record.
        let artifact = search_documents(&config, "inv voice").await.unwrap();
        assert_eq!(artifact.matches.len(), 2);
        assert_eq!(artifact.matches[0].word, "Invoice");
        assert_eq!(artifact.matches[1].word, "Invoice");
        assert_ne!(
            artifact.matches[0].matched_term,
            artifact.matches[1].matched_term
        );
    }
}
