//! Text detection: run the OCR engine over the whole page-image corpus.
//!
//! For every document subfolder and every page image inside it, the engine is
//! invoked once and its words are normalized into
//! [`crate::artifact::DetectionRecord`]s: two normalized corner points are
//! flattened into the four-value bounding box, confidences land in `[0, 1]`,
//! and the owning document is recorded with its `.pdf` suffix. All records
//! across all images are accumulated into one ordered list (documents by
//! name, pages by number) and persisted as a single JSON array at the
//! layout's well-known path. In the same pass each page image is annotated
//! with all of its own words' boxes into a parallel folder tree.
//!
//! A missing corpus folder is a fatal precondition failure — the
//! transformation stage never ran. A failure on any individual image also
//! aborts the stage: detection is one model pass over the complete corpus,
//! and a silently incomplete artifact would corrupt every later search.

use crate::annotate::{annotate_page, AnnotationStyle};
use crate::artifact::{ensure_pdf_suffix, page_number, DetectionArtifact, DetectionRecord};
use crate::config::PipelineConfig;
use crate::error::WordLensError;
use crate::ocr::{OcrEngine, TesseractOcr};
use futures::stream::{self, StreamExt};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// One page image queued for recognition.
struct PageJob {
    doc_base: String,
    page: u32,
    image_path: PathBuf,
    annotated_path: PathBuf,
}

/// Run detection over the corpus and persist the detection artifact.
pub async fn detect_text(config: &PipelineConfig) -> Result<DetectionArtifact, WordLensError> {
    let layout = config.layout();
    let images_root = layout.images_dir();
    if !images_root.is_dir() {
        return Err(WordLensError::ImageCorpusMissing { path: images_root });
    }

    let annotated_dir = layout.annotated_dir();
    let results_path = layout.detection_results_path();
    for dir in [&annotated_dir, &results_path.parent().map(PathBuf::from).unwrap_or_default()] {
        std::fs::create_dir_all(dir).map_err(|e| WordLensError::ArtifactWriteFailed {
            path: dir.clone(),
            source: e,
        })?;
    }

    let engine: Arc<dyn OcrEngine> = match &config.ocr_engine {
        Some(engine) => Arc::clone(engine),
        None => Arc::new(TesseractOcr::new(
            &config.tesseract_binary,
            &config.tesseract_lang,
            Duration::from_secs(config.tool_timeout_secs),
        )),
    };

    let jobs = collect_jobs(&images_root, &annotated_dir)?;
    info!(
        "Detecting text on {} page images under {}",
        jobs.len(),
        images_root.display()
    );

    // Per-image recognition has no cross-image dependencies; the engine is an
    // out-of-process call, so a bounded pool is safe. Results are re-sorted
    // afterwards so the artifact order never depends on completion order.
    let outcomes: Vec<Result<(String, u32, Vec<DetectionRecord>), WordLensError>> =
        stream::iter(jobs.into_iter().map(|job| {
            let engine = Arc::clone(&engine);
            async move { process_page(&engine, job).await }
        }))
        .buffer_unordered(config.concurrency)
        .collect()
        .await;

    let mut per_page = Vec::with_capacity(outcomes.len());
    for outcome in outcomes {
        per_page.push(outcome?);
    }
    per_page.sort_by(|a, b| (&a.0, a.1).cmp(&(&b.0, b.1)));

    let records: Vec<DetectionRecord> = per_page
        .into_iter()
        .flat_map(|(_, _, records)| records)
        .collect();

    let json = serde_json::to_string_pretty(&records)
        .map_err(|e| WordLensError::Internal(format!("serialize detection records: {e}")))?;
    std::fs::write(&results_path, json).map_err(|e| WordLensError::ArtifactWriteFailed {
        path: results_path.clone(),
        source: e,
    })?;

    info!(
        "Detection complete: {} records → {}",
        records.len(),
        results_path.display()
    );

    Ok(DetectionArtifact {
        annotated_dir,
        results_path,
        record_count: records.len(),
    })
}

/// Walk the corpus into per-page jobs: documents by name, pages by number.
fn collect_jobs(
    images_root: &PathBuf,
    annotated_dir: &PathBuf,
) -> Result<Vec<PageJob>, WordLensError> {
    let mut doc_dirs: Vec<PathBuf> =
        std::fs::read_dir(images_root)
            .map_err(|e| WordLensError::ArtifactWriteFailed {
                path: images_root.clone(),
                source: e,
            })?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .collect();
    doc_dirs.sort();

    let mut jobs = Vec::new();
    for doc_dir in doc_dirs {
        let doc_base = match doc_dir.file_name().and_then(|n| n.to_str()) {
            Some(name) => name.to_string(),
            None => continue,
        };
        debug!("Queueing document: {doc_base}");

        let annotated_doc_dir = annotated_dir.join(&doc_base);
        std::fs::create_dir_all(&annotated_doc_dir).map_err(|e| {
            WordLensError::ArtifactWriteFailed {
                path: annotated_doc_dir.clone(),
                source: e,
            }
        })?;

        let mut pages: Vec<(u32, PathBuf)> = std::fs::read_dir(&doc_dir)
            .map_err(|e| WordLensError::ArtifactWriteFailed {
                path: doc_dir.clone(),
                source: e,
            })?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .filter_map(|path| {
                let name = path.file_name()?.to_str()?;
                match page_number(name) {
                    Ok(n) => Some((n, path.clone())),
                    Err(_) => {
                        warn!("Foreign file in corpus skipped: {}", path.display());
                        None
                    }
                }
            })
            .collect();
        // Numeric order, not lexicographic — img_10 sorts after img_9.
        pages.sort_by_key(|(n, _)| *n);

        for (page, image_path) in pages {
            let file_name = image_path
                .file_name()
                .map(|n| n.to_os_string())
                .unwrap_or_default();
            jobs.push(PageJob {
                doc_base: doc_base.clone(),
                page,
                annotated_path: annotated_doc_dir.join(file_name),
                image_path,
            });
        }
    }
    Ok(jobs)
}

/// Recognize one page, normalize its words, and annotate the page image.
async fn process_page(
    engine: &Arc<dyn OcrEngine>,
    job: PageJob,
) -> Result<(String, u32, Vec<DetectionRecord>), WordLensError> {
    let words = engine.recognize(&job.image_path).await?;

    let document = ensure_pdf_suffix(&job.doc_base);
    let page_image = job
        .image_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();

    let records: Vec<DetectionRecord> = words
        .into_iter()
        .map(|word| DetectionRecord {
            document: document.clone(),
            page_image: page_image.clone(),
            word: word.text,
            bounding_box: [
                word.corner_min.0,
                word.corner_min.1,
                word.corner_max.0,
                word.corner_max.1,
            ],
            confidence: word.confidence,
        })
        .collect();

    debug!(
        "{} page {}: {} words",
        job.doc_base,
        job.page,
        records.len()
    );

    // Annotation is CPU-bound pixel work; keep it off the async workers.
    let image_path = job.image_path.clone();
    let annotated_path = job.annotated_path.clone();
    let to_draw = records.clone();
    tokio::task::spawn_blocking(move || {
        annotate_page(&image_path, &to_draw, &annotated_path, AnnotationStyle::Boxes)
    })
    .await
    .map_err(|e| WordLensError::Internal(format!("annotation task panicked: {e}")))??;

    Ok((job.doc_base, job.page, records))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::OcrWord;
    use async_trait::async_trait;
    use std::path::Path;

    /// Scripted engine: every page yields the same two words.
    struct TwoWordEngine;

    #[async_trait]
    impl OcrEngine for TwoWordEngine {
        async fn recognize(&self, _image: &Path) -> Result<Vec<OcrWord>, WordLensError> {
            Ok(vec![
                OcrWord {
                    text: "Invoice".into(),
                    corner_min: (0.1, 0.2),
                    corner_max: (0.3, 0.25),
                    confidence: 0.92,
                },
                OcrWord {
                    text: "Total".into(),
                    corner_min: (0.5, 0.6),
                    corner_max: (0.7, 0.65),
                    confidence: 0.88,
                },
            ])
        }
    }

    fn seed_corpus(root: &Path, doc: &str, pages: u32) {
        let dir = root
            .join("data_transformation")
            .join("images")
            .join(doc);
        std::fs::create_dir_all(&dir).unwrap();
        for n in 1..=pages {
            image::RgbImage::from_pixel(60, 40, image::Rgb([255, 255, 255]))
                .save(dir.join(format!("img_{n}.jpg")))
                .unwrap();
        }
    }

    fn test_config(root: &Path) -> PipelineConfig {
        PipelineConfig::builder()
            .artifacts_root(root)
            .ocr_engine(Arc::new(TwoWordEngine))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn missing_corpus_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let result = detect_text(&config).await;
        assert!(matches!(
            result,
            Err(WordLensError::ImageCorpusMissing { .. })
        ));
    }

    #[tokio::test]
    async fn records_cover_every_page_in_order() {
        let dir = tempfile::tempdir().unwrap();
        seed_corpus(dir.path(), "beta", 2);
        seed_corpus(dir.path(), "alpha", 11);

        let config = test_config(dir.path());
        let artifact = detect_text(&config).await.unwrap();

        // 13 pages × 2 words per page — append-complete.
        assert_eq!(artifact.record_count, 26);

        let json = std::fs::read_to_string(&artifact.results_path).unwrap();
        let records: Vec<DetectionRecord> = serde_json::from_str(&json).unwrap();
        assert_eq!(records.len(), 26);

        // Documents in name order, pages in numeric order (10 after 9).
        assert_eq!(records[0].document, "alpha.pdf");
        assert_eq!(records[0].page_image, "img_1.jpg");
        let alpha_pages: Vec<u32> = records
            .iter()
            .filter(|r| r.document == "alpha.pdf")
            .step_by(2)
            .map(|r| page_number(&r.page_image).unwrap())
            .collect();
        assert_eq!(alpha_pages, (1..=11).collect::<Vec<u32>>());
        assert_eq!(records.last().unwrap().document, "beta.pdf");

        // Geometry was flattened from the two corner points.
        assert_eq!(records[0].bounding_box, [0.1, 0.2, 0.3, 0.25]);

        // Every page got an annotated twin.
        assert!(artifact
            .annotated_dir
            .join("alpha")
            .join("img_11.jpg")
            .is_file());
        assert!(artifact
            .annotated_dir
            .join("beta")
            .join("img_2.jpg")
            .is_file());
    }

    #[tokio::test]
    async fn engine_failure_aborts_the_stage() {
        struct FailingEngine;

        #[async_trait]
        impl OcrEngine for FailingEngine {
            async fn recognize(&self, image: &Path) -> Result<Vec<OcrWord>, WordLensError> {
                Err(WordLensError::OcrFailed {
                    image: image.to_path_buf(),
                    detail: "scripted failure".into(),
                })
            }
        }

        let dir = tempfile::tempdir().unwrap();
        seed_corpus(dir.path(), "doc", 1);
        let config = PipelineConfig::builder()
            .artifacts_root(dir.path())
            .ocr_engine(Arc::new(FailingEngine))
            .build()
            .unwrap();

        assert!(matches!(
            detect_text(&config).await,
            Err(WordLensError::OcrFailed { .. })
        ));
    }
}
