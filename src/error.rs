//! Error types for the wordlens library.
//!
//! Fatal failures are expressed as [`WordLensError`] variants and returned as
//! `Err` from the stage entry points. Recoverable per-file failures — a single
//! office document the converter tool rejected, a single PDF pdfium could not
//! open — are *not* errors: they are collected as
//! [`crate::artifact::StageFailure`] values inside the stage's artifact so the
//! batch keeps going and callers can inspect partial success afterwards.
//!
//! Every variant carries structured context (stage-relevant path, external
//! tool detail) instead of interpreter-style frame data, so messages stay
//! meaningful when they reach the outermost caller.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the wordlens library.
#[derive(Debug, Error)]
pub enum WordLensError {
    // ── Input / precondition errors ───────────────────────────────────────
    /// The input folder handed to the pipeline does not exist.
    #[error("Input folder not found: '{path}'\nCheck the path exists and is readable.")]
    InputDirMissing { path: PathBuf },

    /// The page-image corpus expected by the detector is absent — the
    /// transformation stage never ran against this artifact root.
    #[error("Page-image corpus not found: '{path}'\nRun the pipeline's transformation stage first.")]
    ImageCorpusMissing { path: PathBuf },

    /// The detection artifact expected by the search matcher is absent.
    #[error("Detection results not found: '{path}'\nRun the full pipeline before searching.")]
    DetectionArtifactMissing { path: PathBuf },

    // ── External tool errors ──────────────────────────────────────────────
    /// The external binary could not be spawned at all (not installed / not
    /// on PATH). Per-file tool failures are recoverable and live in
    /// [`crate::artifact::StageFailure`] instead.
    #[error("External tool '{binary}' could not be started: {detail}\n{hint}")]
    ToolUnavailable {
        binary: String,
        detail: String,
        hint: String,
    },

    /// OCR failed on a page image. The detector runs against the complete
    /// corpus as a single pass, so this aborts the stage.
    #[error("Text recognition failed for '{image}': {detail}")]
    OcrFailed { image: PathBuf, detail: String },

    // ── PDF / image errors ────────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
         Install libpdfium on the system library path or place it next to the binary."
    )]
    PdfiumBindingFailed(String),

    /// A page image or source image could not be decoded.
    #[error("Failed to decode image '{path}': {detail}")]
    ImageDecodeFailed { path: PathBuf, detail: String },

    /// Drawing or re-encoding an annotated page failed.
    #[error("Failed to annotate '{path}': {detail}")]
    AnnotationFailed { path: PathBuf, detail: String },

    // ── Artifact I/O errors ───────────────────────────────────────────────
    /// Could not create an output folder or write an artifact file.
    #[error("Failed to write artifact '{path}': {source}")]
    ArtifactWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A persisted artifact could not be parsed back.
    #[error("Failed to parse artifact '{path}': {source}")]
    ArtifactParseFailed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A stored page-image file name does not follow the `img_{n}.jpg`
    /// convention shared by the detector and the search matcher.
    #[error("Unparsable page-image name '{name}': expected img_{{n}}.jpg")]
    BadPageImageName { name: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corpus_missing_display_names_path() {
        let e = WordLensError::ImageCorpusMissing {
            path: PathBuf::from("/tmp/artifacts/data_transformation/images"),
        };
        assert!(e.to_string().contains("data_transformation/images"));
    }

    #[test]
    fn tool_unavailable_display_carries_hint() {
        let e = WordLensError::ToolUnavailable {
            binary: "tesseract".into(),
            detail: "No such file or directory".into(),
            hint: "Install tesseract-ocr and ensure it is on PATH.".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("tesseract"));
        assert!(msg.contains("PATH"));
    }

    #[test]
    fn bad_page_image_name_display() {
        let e = WordLensError::BadPageImageName {
            name: "page-3.png".into(),
        };
        assert!(e.to_string().contains("page-3.png"));
        assert!(e.to_string().contains("img_"));
    }
}
