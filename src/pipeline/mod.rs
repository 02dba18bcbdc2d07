//! The three-stage indexing pipeline.
//!
//! ```text
//! input files ──► convert ──► PDFs ──► raster ──► page JPEGs ──► detect
//!                                                                  │
//!                              detection records (JSON) ◄──────────┘
//! ```
//!
//! Each stage reads the previous stage's on-disk artifact and writes its own,
//! so stages can also be run individually against an existing artifact tree.
//! [`run_pipeline`] chains all three and returns the combined artifact
//! summary. Conversion and rasterization tolerate per-file failures and
//! report them; detection is all-or-nothing.

mod convert;
mod detect;
mod raster;

pub use convert::convert_documents;
pub use detect::detect_text;
pub use raster::rasterize_documents;

use crate::artifact::PipelineArtifact;
use crate::config::PipelineConfig;
use crate::error::WordLensError;
use tracing::info;

/// Run convert, raster, and detect in sequence.
///
/// Per-file conversion and rasterization failures are carried in the returned
/// artifact rather than aborting the run. An error return means a whole stage
/// could not proceed (missing input folder, unusable tooling, failed OCR).
pub async fn run_pipeline(config: &PipelineConfig) -> Result<PipelineArtifact, WordLensError> {
    info!("Pipeline start: input {}", config.input_dir.display());

    let conversion = convert_documents(config).await?;
    let raster = rasterize_documents(config, &conversion.converted).await?;
    let detection = detect_text(config).await?;

    info!(
        "Pipeline complete: {} PDFs, {} documents rasterized, {} detection records",
        conversion.converted.len(),
        raster.page_counts.len(),
        detection.record_count
    );

    Ok(PipelineArtifact {
        documents_dir: conversion.documents_dir,
        images_dir: raster.images_dir,
        annotated_dir: detection.annotated_dir,
        detection_results: detection.results_path,
        conversion_failures: conversion.failures,
        raster_failures: raster.failures,
    })
}
