//! Page rasterization: every converted PDF becomes a folder of page JPEGs.
//!
//! ## Why spawn_blocking?
//!
//! pdfium wraps a C++ library with thread-local state and is not safe to call
//! from async contexts. The whole stage runs inside one
//! `tokio::task::spawn_blocking` call: bind once, then walk the documents.
//!
//! ## Naming
//!
//! Pages are written as `{images_dir}/{doc_base}/img_{n}.jpg`, 1-indexed in
//! page order. The name is produced by [`crate::artifact::page_image_name`],
//! the same helper the detector and search matcher parse with.
//!
//! A document that fails to load or render is recorded as a failure and its
//! partially written page folder is removed — a partial page set would
//! silently truncate that document in every later stage. Completed documents
//! keep their output.

use crate::artifact::{page_image_name, RasterArtifact, StageFailure};
use crate::config::PipelineConfig;
use crate::error::WordLensError;
use pdfium_render::prelude::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Rasterize every page of every converted document into the image corpus.
pub async fn rasterize_documents(
    config: &PipelineConfig,
    documents: &[PathBuf],
) -> Result<RasterArtifact, WordLensError> {
    let images_dir = config.layout().images_dir();
    std::fs::create_dir_all(&images_dir).map_err(|e| WordLensError::ArtifactWriteFailed {
        path: images_dir.clone(),
        source: e,
    })?;

    let documents = documents.to_vec();
    let out_dir = images_dir.clone();
    let max_pixels = config.raster_max_pixels;

    let (page_counts, failures) =
        tokio::task::spawn_blocking(move || rasterize_blocking(&documents, &out_dir, max_pixels))
            .await
            .map_err(|e| WordLensError::Internal(format!("raster task panicked: {e}")))??;

    info!(
        "Rasterization complete: {} documents, {} failed",
        page_counts.len(),
        failures.len()
    );

    Ok(RasterArtifact {
        images_dir,
        page_counts,
        failures,
    })
}

type RasterOutcome = (BTreeMap<String, u32>, Vec<StageFailure>);

fn rasterize_blocking(
    documents: &[PathBuf],
    images_dir: &Path,
    max_pixels: u32,
) -> Result<RasterOutcome, WordLensError> {
    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|e| WordLensError::PdfiumBindingFailed(format!("{e:?}")))?;
    let pdfium = Pdfium::new(bindings);

    let render_config = PdfRenderConfig::new()
        .set_target_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let mut page_counts = BTreeMap::new();
    let mut failures = Vec::new();

    for pdf_path in documents {
        let base = match pdf_path.file_stem().and_then(|s| s.to_str()) {
            Some(base) => base.to_string(),
            None => {
                failures.push(StageFailure {
                    path: pdf_path.clone(),
                    detail: "document has no usable base name".into(),
                });
                continue;
            }
        };
        let doc_dir = images_dir.join(&base);

        match rasterize_document(&pdfium, &render_config, pdf_path, &doc_dir) {
            Ok(pages) => {
                info!("Rasterized {} → {} pages", pdf_path.display(), pages);
                page_counts.insert(base, pages);
            }
            Err(detail) => {
                tracing::error!("Rasterization failed for {}: {}", pdf_path.display(), detail);
                // Never leave a truncated page set behind.
                let _ = std::fs::remove_dir_all(&doc_dir);
                failures.push(StageFailure {
                    path: pdf_path.clone(),
                    detail,
                });
            }
        }
    }

    Ok((page_counts, failures))
}

/// Rasterize one document; any page failure fails the whole document.
fn rasterize_document(
    pdfium: &Pdfium,
    render_config: &PdfRenderConfig,
    pdf_path: &Path,
    doc_dir: &Path,
) -> Result<u32, String> {
    let document = pdfium
        .load_pdf_from_file(pdf_path, None)
        .map_err(|e| format!("load failed: {e:?}"))?;

    std::fs::create_dir_all(doc_dir).map_err(|e| format!("create {}: {e}", doc_dir.display()))?;

    let pages = document.pages();
    let total = pages.len();
    debug!("{}: {} pages", pdf_path.display(), total);

    for index in 0..total {
        let page = pages
            .get(index)
            .map_err(|e| format!("page {}: {e:?}", index + 1))?;
        let bitmap = page
            .render_with_config(render_config)
            .map_err(|e| format!("render page {}: {e:?}", index + 1))?;

        // JPEG output has no alpha channel.
        let image = bitmap.as_image().into_rgb8();
        let out_path = doc_dir.join(page_image_name(u32::from(index) + 1));
        image
            .save(&out_path)
            .map_err(|e| format!("save {}: {e}", out_path.display()))?;
        debug!(
            "  page {} → {} ({}x{})",
            index + 1,
            out_path.display(),
            image.width(),
            image.height()
        );
    }

    Ok(u32::from(total))
}
