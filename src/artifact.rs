//! Record and artifact types shared across pipeline stages.
//!
//! Two kinds of types live here:
//!
//! * **Records** — [`DetectionRecord`] and [`MatchRecord`], the JSON-visible
//!   schema of the detection and search artifacts. Their serde field names
//!   and ordering are a wire contract; downstream tooling parses these files.
//! * **Stage artifacts** — plain structs describing where a stage wrote its
//!   output. They hold paths and counts, no behaviour.
//!
//! This module also owns both sides of the `img_{n}.jpg` naming convention:
//! [`page_image_name`] produces names (rasterizer), [`page_number`] parses
//! them back (detector ordering, search matcher). Keeping producer and parser
//! next to each other is what stops the two stages from drifting apart.

use crate::error::WordLensError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

// ── Page-image naming contract ───────────────────────────────────────────

/// File name for the 1-indexed `page` of a rasterized document.
pub fn page_image_name(page: u32) -> String {
    format!("img_{page}.jpg")
}

/// Parse the page number back out of a stored page-image file name.
///
/// Splits on `_` and `.`, so `img_12.jpg` → `12`. Anything that does not
/// yield a number between the first `_` and the following `.` is rejected.
pub fn page_number(page_image: &str) -> Result<u32, WordLensError> {
    page_image
        .split('_')
        .nth(1)
        .and_then(|rest| rest.split('.').next())
        .and_then(|n| n.parse().ok())
        .ok_or_else(|| WordLensError::BadPageImageName {
            name: page_image.to_string(),
        })
}

/// Normalize a document identifier to its `.pdf`-suffixed form.
///
/// Detection records always carry the converted document's file name, even
/// when the on-disk image folder uses the bare base name.
pub fn ensure_pdf_suffix(document: &str) -> String {
    if document.ends_with(".pdf") {
        document.to_string()
    } else {
        format!("{document}.pdf")
    }
}

/// Strip the `.pdf` suffix to recover the image-folder base name.
pub fn document_base_name(document: &str) -> &str {
    document.strip_suffix(".pdf").unwrap_or(document)
}

// ── Records ──────────────────────────────────────────────────────────────

/// One recognized word on one page image.
///
/// `bounding_box` is `[xmin, ymin, xmax, ymax]`, normalized to the page
/// image's own width/height (all values in `[0, 1]`). `confidence` is in
/// `[0, 1]`. Created once per detection run and immutable thereafter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    /// Converted document file name, `.pdf`-suffixed.
    pub document: String,
    /// Page image file name, `img_{n}.jpg`.
    pub page_image: String,
    /// Recognized word text.
    pub word: String,
    /// Normalized `[xmin, ymin, xmax, ymax]`.
    pub bounding_box: [f64; 4],
    /// Recognition confidence in `[0, 1]`.
    pub confidence: f64,
}

/// A [`DetectionRecord`] plus the query term that matched it.
///
/// A record matching several query terms appears once per matching term;
/// `matched_term` is what distinguishes the duplicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub document: String,
    /// 1-indexed page number, parsed from the record's `page_image` name.
    pub page: u32,
    pub word: String,
    pub bounding_box: [f64; 4],
    pub confidence: f64,
    pub matched_term: String,
}

impl MatchRecord {
    /// Build a match record from a detection record and the term it matched.
    pub fn from_detection(record: &DetectionRecord, term: &str) -> Result<Self, WordLensError> {
        Ok(Self {
            document: ensure_pdf_suffix(&record.document),
            page: page_number(&record.page_image)?,
            word: record.word.clone(),
            bounding_box: record.bounding_box,
            confidence: record.confidence,
            matched_term: term.to_string(),
        })
    }
}

// ── Stage artifacts ──────────────────────────────────────────────────────

/// A recoverable per-file failure recorded while a batch stage kept going.
#[derive(Debug, Clone)]
pub struct StageFailure {
    /// The input file the failure originated from.
    pub path: PathBuf,
    /// Human-readable failure detail (tool stderr, decode error, …).
    pub detail: String,
}

/// Output description of the document-conversion stage.
#[derive(Debug)]
pub struct ConversionArtifact {
    /// Folder holding one converted PDF per successful input.
    pub documents_dir: PathBuf,
    /// Paths of the produced PDFs, one entry per successfully converted input.
    pub converted: Vec<PathBuf>,
    /// Inputs that failed conversion; the batch continued without them.
    pub failures: Vec<StageFailure>,
}

/// Output description of the page-rasterization stage.
#[derive(Debug)]
pub struct RasterArtifact {
    /// Root folder containing one `{doc_base}/img_{n}.jpg` subtree per document.
    pub images_dir: PathBuf,
    /// Page count per document base name, in document-name order.
    pub page_counts: BTreeMap<String, u32>,
    /// Documents that failed rasterization; completed documents keep their output.
    pub failures: Vec<StageFailure>,
}

/// Output description of the text-detection stage.
#[derive(Debug)]
pub struct DetectionArtifact {
    /// Root folder of box-annotated page images, mirroring the corpus layout.
    pub annotated_dir: PathBuf,
    /// Path of the persisted JSON array of [`DetectionRecord`]s.
    pub results_path: PathBuf,
    /// Number of records persisted.
    pub record_count: usize,
}

/// Output description of one search run.
#[derive(Debug)]
pub struct SearchArtifact {
    /// Path of the query-scoped JSON array of [`MatchRecord`]s.
    pub results_path: PathBuf,
    /// The match records, in detection-artifact order.
    pub matches: Vec<MatchRecord>,
    /// Number of `(document, page)` groups that were re-annotated.
    pub annotated_pages: usize,
}

/// Everything a full pipeline run produced, as reported to external callers.
#[derive(Debug)]
pub struct PipelineArtifact {
    pub documents_dir: PathBuf,
    pub images_dir: PathBuf,
    pub annotated_dir: PathBuf,
    pub detection_results: PathBuf,
    /// Per-file conversion failures tolerated during the run.
    pub conversion_failures: Vec<StageFailure>,
    /// Per-document rasterization failures tolerated during the run.
    pub raster_failures: Vec<StageFailure>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_image_name_round_trips() {
        for n in [1u32, 2, 9, 10, 137] {
            assert_eq!(page_number(&page_image_name(n)).unwrap(), n);
        }
    }

    #[test]
    fn page_number_rejects_foreign_names() {
        assert!(page_number("page-3.png").is_err());
        assert!(page_number("img_x.jpg").is_err());
        assert!(page_number("img.jpg").is_err());
        assert!(page_number("").is_err());
    }

    #[test]
    fn pdf_suffix_enforced_once() {
        assert_eq!(ensure_pdf_suffix("invoice"), "invoice.pdf");
        assert_eq!(ensure_pdf_suffix("invoice.pdf"), "invoice.pdf");
        assert_eq!(document_base_name("invoice.pdf"), "invoice");
        assert_eq!(document_base_name("invoice"), "invoice");
    }

    #[test]
    fn detection_record_json_schema() {
        let record = DetectionRecord {
            document: "a.pdf".into(),
            page_image: "img_2.jpg".into(),
            word: "Invoice".into(),
            bounding_box: [0.1, 0.2, 0.3, 0.25],
            confidence: 0.92,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["document"], "a.pdf");
        assert_eq!(json["page_image"], "img_2.jpg");
        assert_eq!(json["word"], "Invoice");
        assert_eq!(json["bounding_box"][2], 0.3);
        assert_eq!(json["confidence"], 0.92);
    }

    #[test]
    fn match_record_from_detection_parses_page() {
        let record = DetectionRecord {
            document: "a".into(),
            page_image: "img_2.jpg".into(),
            word: "Invoice".into(),
            bounding_box: [0.1, 0.2, 0.3, 0.25],
            confidence: 0.92,
        };
        let m = MatchRecord::from_detection(&record, "invoic").unwrap();
        assert_eq!(m.document, "a.pdf");
        assert_eq!(m.page, 2);
        assert_eq!(m.matched_term, "invoic");
    }
}
