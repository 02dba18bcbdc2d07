//! # wordlens
//!
//! Index scanned documents with OCR, then search them by word.
//!
//! ## Why this crate?
//!
//! Scanned office documents and photographed pages carry no text layer, so
//! "where does the word *invoice* appear?" is unanswerable with grep. This
//! crate builds a word-level index once — every document is converted to PDF,
//! rasterized to page images, and run through OCR — and then answers any
//! number of fuzzy or substring queries against the persisted index without
//! re-running recognition. Matches come back as JSON records and as page
//! images with the matched words boxed.
//!
//! ## Pipeline Overview
//!
//! ```text
//! input folder (doc/docx/odt/xls/xlsx/ppt/pptx, jpg/png/tiff, pdf)
//!  │
//!  ├─ 1. Convert  everything → PDF (soffice for office, in-process for images)
//!  ├─ 2. Raster   each PDF page → img_{n}.jpg via pdfium (spawn_blocking)
//!  ├─ 3. Detect   OCR every page, persist a JSON array of word records
//!  │              and box-annotated page images
//!  └─ 4. Search   (any time later) score records against query terms,
//!                 write search_{query}.json + labelled annotated pages
//! ```
//!
//! Stages 1–3 are one indexing run ([`run_pipeline`]); stage 4
//! ([`search_documents`]) runs independently against the artifact tree on
//! disk, as often as wanted.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use wordlens::{run_pipeline, search_documents, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::builder()
//!         .input_dir("data")
//!         .artifacts_root("artifacts")
//!         .build()?;
//!
//!     let index = run_pipeline(&config).await?;
//!     eprintln!("detection records at {}", index.detection_results.display());
//!
//!     let hits = search_documents(&config, "invoice total").await?;
//!     println!("{} match(es)", hits.matches.len());
//!     Ok(())
//! }
//! ```
//!
//! ## External tools
//!
//! | Tool | Stage | Needed when |
//! |------|-------|-------------|
//! | `soffice` (LibreOffice) | convert | input contains office documents |
//! | pdfium (`libpdfium`)    | raster  | always |
//! | `tesseract`             | detect  | unless an [`OcrEngine`] is injected |
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `wordlens` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! wordlens = { version = "0.4", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod annotate;
pub mod artifact;
pub mod config;
pub mod error;
pub mod ocr;
pub mod pipeline;
pub mod search;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use artifact::{
    ConversionArtifact, DetectionArtifact, DetectionRecord, MatchRecord, PipelineArtifact,
    RasterArtifact, SearchArtifact, StageFailure,
};
pub use config::{ArtifactLayout, PipelineConfig, PipelineConfigBuilder};
pub use error::WordLensError;
pub use ocr::{OcrEngine, OcrWord, TesseractOcr};
pub use pipeline::{convert_documents, detect_text, rasterize_documents, run_pipeline};
pub use search::search_documents;
