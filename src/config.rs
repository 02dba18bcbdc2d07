//! Configuration for pipeline runs and searches.
//!
//! All behaviour is controlled through [`PipelineConfig`], built via its
//! [`PipelineConfigBuilder`]. Keeping every knob in one validated struct means
//! a bad value fails at startup, not at first use halfway through a batch.
//!
//! [`ArtifactLayout`] makes the on-disk artifact schema explicit. The paths it
//! computes are a hand-off contract between stages: the rasterizer writes
//! where the detector reads, the detector writes where the search matcher
//! reads. Changing any of them changes the schema for every stage at once,
//! which is the point of centralising them.

use crate::error::WordLensError;
use crate::ocr::OcrEngine;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Office-document extensions handed to the external converter tool.
pub const DOC_EXTENSIONS: &[&str] = &["doc", "docx", "odt", "xls", "xlsx", "ppt", "pptx"];

/// Image extensions converted in-process to single-page PDFs.
pub const IMG_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "tiff"];

/// Configuration for pipeline runs and searches.
///
/// Built via [`PipelineConfig::builder()`] or [`PipelineConfig::default()`].
///
/// # Example
/// ```rust
/// use wordlens::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .input_dir("data")
///     .artifacts_root("artifacts")
///     .concurrency(4)
///     .fuzzy_threshold(85)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Folder scanned for source documents. Default: `data`.
    pub input_dir: PathBuf,

    /// Root of the artifact tree all stages write into. Default: `artifacts`.
    ///
    /// Two runs against the same root overwrite each other's outputs; the
    /// tree is the system's only persistent state and is deliberately kept
    /// human-inspectable rather than namespaced per run.
    pub artifacts_root: PathBuf,

    /// Office-document extensions dispatched to the external converter.
    pub doc_extensions: Vec<String>,

    /// Image extensions converted in-process.
    pub img_extensions: Vec<String>,

    /// Binary name or path of the external office-document converter.
    /// Default: `soffice`.
    pub soffice_binary: String,

    /// Binary name or path of the default OCR engine. Default: `tesseract`.
    ///
    /// Ignored when [`PipelineConfig::ocr_engine`] injects an engine directly.
    pub tesseract_binary: String,

    /// Tesseract language(s), e.g. `eng` or `eng+deu`. Default: `eng`.
    pub tesseract_lang: String,

    /// Injected OCR engine. `None` means build a Tesseract engine from the
    /// `tesseract_*` fields at detection time. Tests inject scripted engines
    /// here so detection runs without the external binary.
    pub ocr_engine: Option<Arc<dyn OcrEngine>>,

    /// Maximum rendered page dimension (width or height) in pixels. Default: 2000.
    ///
    /// Page sizes vary wildly; capping the longest edge rather than fixing a
    /// DPI keeps memory bounded on oversized pages while leaving normal pages
    /// sharp enough for word-level recognition.
    pub raster_max_pixels: u32,

    /// Bounded worker-pool width for per-file and per-image work. Default: 4.
    ///
    /// Conversion of images/PDFs and OCR of page images have no cross-file
    /// dependencies. Office conversions are excluded: the converter tool
    /// shares one user profile and is run sequentially.
    pub concurrency: usize,

    /// Per-call timeout for external tool invocations, in seconds. Default: 120.
    ///
    /// A hung converter or OCR process would otherwise stall the whole stage;
    /// on timeout the originating file is recorded as failed and the process
    /// is killed.
    pub tool_timeout_secs: u64,

    /// Minimum 0–100 similarity score for a non-substring match. Default: 80.
    pub fuzzy_threshold: u8,

    /// Whether substring containment counts as a match, checked before any
    /// fuzzy scoring. Default: true.
    pub partial_match: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("data"),
            artifacts_root: PathBuf::from("artifacts"),
            doc_extensions: DOC_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            img_extensions: IMG_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            soffice_binary: "soffice".to_string(),
            tesseract_binary: "tesseract".to_string(),
            tesseract_lang: "eng".to_string(),
            ocr_engine: None,
            raster_max_pixels: 2000,
            concurrency: 4,
            tool_timeout_secs: 120,
            fuzzy_threshold: 80,
            partial_match: true,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("input_dir", &self.input_dir)
            .field("artifacts_root", &self.artifacts_root)
            .field("doc_extensions", &self.doc_extensions)
            .field("img_extensions", &self.img_extensions)
            .field("soffice_binary", &self.soffice_binary)
            .field("tesseract_binary", &self.tesseract_binary)
            .field("tesseract_lang", &self.tesseract_lang)
            .field("ocr_engine", &self.ocr_engine.as_ref().map(|_| "<dyn OcrEngine>"))
            .field("raster_max_pixels", &self.raster_max_pixels)
            .field("concurrency", &self.concurrency)
            .field("tool_timeout_secs", &self.tool_timeout_secs)
            .field("fuzzy_threshold", &self.fuzzy_threshold)
            .field("partial_match", &self.partial_match)
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    /// The artifact-tree layout rooted at [`PipelineConfig::artifacts_root`].
    pub fn layout(&self) -> ArtifactLayout {
        ArtifactLayout::new(&self.artifacts_root)
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn input_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.input_dir = dir.into();
        self
    }

    pub fn artifacts_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.artifacts_root = root.into();
        self
    }

    pub fn doc_extensions(mut self, exts: Vec<String>) -> Self {
        self.config.doc_extensions = exts;
        self
    }

    pub fn img_extensions(mut self, exts: Vec<String>) -> Self {
        self.config.img_extensions = exts;
        self
    }

    pub fn soffice_binary(mut self, binary: impl Into<String>) -> Self {
        self.config.soffice_binary = binary.into();
        self
    }

    pub fn tesseract_binary(mut self, binary: impl Into<String>) -> Self {
        self.config.tesseract_binary = binary.into();
        self
    }

    pub fn tesseract_lang(mut self, lang: impl Into<String>) -> Self {
        self.config.tesseract_lang = lang.into();
        self
    }

    pub fn ocr_engine(mut self, engine: Arc<dyn OcrEngine>) -> Self {
        self.config.ocr_engine = Some(engine);
        self
    }

    pub fn raster_max_pixels(mut self, px: u32) -> Self {
        self.config.raster_max_pixels = px.max(100);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn tool_timeout_secs(mut self, secs: u64) -> Self {
        self.config.tool_timeout_secs = secs.max(1);
        self
    }

    pub fn fuzzy_threshold(mut self, threshold: u8) -> Self {
        self.config.fuzzy_threshold = threshold.min(100);
        self
    }

    pub fn partial_match(mut self, enabled: bool) -> Self {
        self.config.partial_match = enabled;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, WordLensError> {
        let c = &self.config;
        if c.fuzzy_threshold > 100 {
            return Err(WordLensError::InvalidConfig(format!(
                "fuzzy threshold must be 0–100, got {}",
                c.fuzzy_threshold
            )));
        }
        if c.concurrency == 0 {
            return Err(WordLensError::InvalidConfig(
                "concurrency must be ≥ 1".into(),
            ));
        }
        if c.doc_extensions.is_empty() && c.img_extensions.is_empty() {
            return Err(WordLensError::InvalidConfig(
                "at least one supported extension is required".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Artifact layout ──────────────────────────────────────────────────────

/// On-disk schema of the artifact tree.
///
/// ```text
/// {root}/data_transformation/documents/{base}.pdf
/// {root}/data_transformation/images/{base}/img_{n}.jpg
/// {root}/data_detection/annotated_images/{base}/img_{n}.jpg
/// {root}/data_detection/output_json/final_output.json
/// {root}/data_search/annotated_images/{base}/img_{n}.jpg
/// {root}/data_search/search_{query}.json
/// ```
#[derive(Debug, Clone)]
pub struct ArtifactLayout {
    root: PathBuf,
}

impl ArtifactLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Converted-document folder.
    pub fn documents_dir(&self) -> PathBuf {
        self.root.join("data_transformation").join("documents")
    }

    /// Root of the page-image corpus.
    pub fn images_dir(&self) -> PathBuf {
        self.root.join("data_transformation").join("images")
    }

    /// Page-image subfolder for one document base name.
    pub fn doc_images_dir(&self, doc_base: &str) -> PathBuf {
        self.images_dir().join(doc_base)
    }

    /// Full path of one page image.
    pub fn page_image_path(&self, doc_base: &str, page: u32) -> PathBuf {
        self.doc_images_dir(doc_base)
            .join(crate::artifact::page_image_name(page))
    }

    /// Root of the detection-annotated images, mirroring the corpus layout.
    pub fn annotated_dir(&self) -> PathBuf {
        self.root.join("data_detection").join("annotated_images")
    }

    /// Well-known path of the persisted detection artifact.
    pub fn detection_results_path(&self) -> PathBuf {
        self.root
            .join("data_detection")
            .join("output_json")
            .join("final_output.json")
    }

    /// Root of the search output (result files and match-annotated images).
    pub fn search_dir(&self) -> PathBuf {
        self.root.join("data_search")
    }

    /// Match-annotated images subfolder for one document of one search run.
    pub fn search_annotated_dir(&self, doc_base: &str) -> PathBuf {
        self.search_dir().join("annotated_images").join(doc_base)
    }

    /// Query-scoped search result file; spaces in the query become underscores.
    pub fn search_results_path(&self, query: &str) -> PathBuf {
        let safe = query.trim().replace(' ', "_");
        self.search_dir().join(format!("search_{safe}.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_clamps_and_validates() {
        let config = PipelineConfig::builder()
            .concurrency(0)
            .raster_max_pixels(10)
            .fuzzy_threshold(250)
            .build()
            .unwrap();
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.raster_max_pixels, 100);
        assert_eq!(config.fuzzy_threshold, 100);
    }

    #[test]
    fn builder_rejects_empty_extension_sets() {
        let result = PipelineConfig::builder()
            .doc_extensions(vec![])
            .img_extensions(vec![])
            .build();
        assert!(matches!(result, Err(WordLensError::InvalidConfig(_))));
    }

    #[test]
    fn layout_matches_schema() {
        let layout = ArtifactLayout::new("artifacts");
        assert_eq!(
            layout.page_image_path("invoice", 3),
            PathBuf::from("artifacts/data_transformation/images/invoice/img_3.jpg")
        );
        assert_eq!(
            layout.detection_results_path(),
            PathBuf::from("artifacts/data_detection/output_json/final_output.json")
        );
        assert_eq!(
            layout.search_results_path("hello world"),
            PathBuf::from("artifacts/data_search/search_hello_world.json")
        );
    }
}
