//! Document conversion: every supported input becomes a PDF.
//!
//! Dispatch is by file extension, in three strategies:
//!
//! * office documents — handed to the external converter tool (`soffice
//!   --headless`), which writes a same-named PDF into the output folder;
//! * images — decoded, forced to RGB, and wrapped as a single-page PDF
//!   in-process;
//! * PDFs — byte-copied unchanged.
//!
//! A file the converter tool rejects is a recoverable failure: it is logged,
//! recorded in the artifact, and the batch continues. Only a missing input
//! folder or an uninstallable tool aborts the stage.
//!
//! Image and PDF jobs run through a bounded worker pool; office conversions
//! run one at a time because `soffice` shares a single user profile across
//! invocations.

use crate::artifact::{ConversionArtifact, StageFailure};
use crate::config::PipelineConfig;
use crate::error::WordLensError;
use futures::stream::{self, StreamExt};
use image::RgbImage;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// How one input file is converted, decided by its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    /// External converter tool.
    Office,
    /// In-process image → single-page PDF.
    Image,
    /// Byte-copy, the input already is a PDF.
    Passthrough,
}

/// Classify a file against the configured extension sets.
fn classify(path: &Path, config: &PipelineConfig) -> Option<Strategy> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    if config.doc_extensions.iter().any(|e| *e == ext) {
        Some(Strategy::Office)
    } else if config.img_extensions.iter().any(|e| *e == ext) {
        Some(Strategy::Image)
    } else if ext == "pdf" {
        Some(Strategy::Passthrough)
    } else {
        None
    }
}

/// Convert every supported file in the input folder into the documents folder.
pub async fn convert_documents(
    config: &PipelineConfig,
) -> Result<ConversionArtifact, WordLensError> {
    let input_dir = &config.input_dir;
    if !input_dir.is_dir() {
        return Err(WordLensError::InputDirMissing {
            path: input_dir.clone(),
        });
    }

    let documents_dir = config.layout().documents_dir();
    std::fs::create_dir_all(&documents_dir).map_err(|e| WordLensError::ArtifactWriteFailed {
        path: documents_dir.clone(),
        source: e,
    })?;

    let entries = list_files(input_dir)?;
    info!(
        "Converting {} files from {}",
        entries.len(),
        input_dir.display()
    );

    // Visit extension groups in a fixed order: office, then image, then pdf.
    let mut office_jobs = Vec::new();
    let mut pooled_jobs = Vec::new();
    for ext in &config.doc_extensions {
        office_jobs.extend(files_with_ext(&entries, ext));
    }
    for ext in &config.img_extensions {
        pooled_jobs.extend(
            files_with_ext(&entries, ext)
                .into_iter()
                .map(|p| (p, Strategy::Image)),
        );
    }
    pooled_jobs.extend(
        files_with_ext(&entries, "pdf")
            .into_iter()
            .map(|p| (p, Strategy::Passthrough)),
    );

    for path in &entries {
        if classify(path, config).is_none() {
            warn!("Unsupported format skipped: {}", path.display());
        }
    }

    let mut converted = Vec::new();
    let mut failures = Vec::new();

    // The external tool writes into a shared profile directory, so office
    // conversions are serialized.
    for path in office_jobs {
        match convert_office(config, &path, &documents_dir).await {
            Ok(pdf) => {
                info!("Converted {} → {}", path.display(), pdf.display());
                converted.push(pdf);
            }
            Err(WordLensError::ToolUnavailable {
                binary,
                detail,
                hint,
            }) => {
                return Err(WordLensError::ToolUnavailable {
                    binary,
                    detail,
                    hint,
                })
            }
            Err(e) => {
                tracing::error!("Conversion failed for {}: {}", path.display(), e);
                failures.push(StageFailure {
                    path,
                    detail: e.to_string(),
                });
            }
        }
    }

    // Image and passthrough jobs have no shared state; run them pooled.
    // Each job writes only its own `{base}.pdf`.
    let results: Vec<(PathBuf, Result<PathBuf, WordLensError>)> =
        stream::iter(pooled_jobs.into_iter().map(|(path, strategy)| {
            let documents_dir = documents_dir.clone();
            async move {
                let result = match strategy {
                    Strategy::Image => convert_image(&path, &documents_dir).await,
                    Strategy::Passthrough => copy_pdf(&path, &documents_dir).await,
                    Strategy::Office => unreachable!("office jobs are not pooled"),
                };
                (path, result)
            }
        }))
        .buffer_unordered(config.concurrency)
        .collect()
        .await;

    for (path, result) in results {
        match result {
            Ok(pdf) => {
                info!("Converted {} → {}", path.display(), pdf.display());
                converted.push(pdf);
            }
            Err(e) => {
                tracing::error!("Conversion failed for {}: {}", path.display(), e);
                failures.push(StageFailure {
                    path,
                    detail: e.to_string(),
                });
            }
        }
    }

    info!(
        "Conversion complete: {} converted, {} failed",
        converted.len(),
        failures.len()
    );

    Ok(ConversionArtifact {
        documents_dir,
        converted,
        failures,
    })
}

/// Plain files in the input folder, in filesystem enumeration order.
fn list_files(dir: &Path) -> Result<Vec<PathBuf>, WordLensError> {
    let read_dir = std::fs::read_dir(dir).map_err(|e| WordLensError::ArtifactWriteFailed {
        path: dir.to_path_buf(),
        source: e,
    })?;
    Ok(read_dir
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect())
}

fn files_with_ext(entries: &[PathBuf], ext: &str) -> Vec<PathBuf> {
    entries
        .iter()
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .map(|e| e.eq_ignore_ascii_case(ext))
                .unwrap_or(false)
        })
        .cloned()
        .collect()
}

fn target_pdf_path(input: &Path, documents_dir: &Path) -> Result<PathBuf, WordLensError> {
    let base = input
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| WordLensError::Internal(format!("no file stem: {}", input.display())))?;
    Ok(documents_dir.join(format!("{base}.pdf")))
}

/// Run the external converter tool on one office document.
async fn convert_office(
    config: &PipelineConfig,
    input: &Path,
    documents_dir: &Path,
) -> Result<PathBuf, WordLensError> {
    let pdf_path = target_pdf_path(input, documents_dir)?;
    debug!("soffice: {} → {}", input.display(), pdf_path.display());

    let mut cmd = Command::new(&config.soffice_binary);
    cmd.args(["--headless", "--convert-to", "pdf"])
        .arg(input)
        .arg("--outdir")
        .arg(documents_dir)
        .kill_on_drop(true);

    let output = tokio::time::timeout(Duration::from_secs(config.tool_timeout_secs), cmd.output())
        .await
        .map_err(|_| {
            WordLensError::Internal(format!(
                "converter timed out after {}s on {}",
                config.tool_timeout_secs,
                input.display()
            ))
        })?
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                WordLensError::ToolUnavailable {
                    binary: config.soffice_binary.clone(),
                    detail: e.to_string(),
                    hint: "Install LibreOffice and ensure soffice is on PATH.".into(),
                }
            } else {
                WordLensError::Internal(e.to_string())
            }
        })?;

    if !output.status.success() {
        return Err(WordLensError::Internal(format!(
            "converter exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    if !pdf_path.is_file() {
        return Err(WordLensError::Internal(format!(
            "converter reported success but wrote no {}",
            pdf_path.display()
        )));
    }

    Ok(pdf_path)
}

/// Decode an image, force RGB, and wrap it as a single-page PDF.
async fn convert_image(input: &Path, documents_dir: &Path) -> Result<PathBuf, WordLensError> {
    let pdf_path = target_pdf_path(input, documents_dir)?;
    let input = input.to_path_buf();
    let out = pdf_path.clone();

    tokio::task::spawn_blocking(move || {
        let rgb = image::open(&input)
            .map_err(|e| WordLensError::ImageDecodeFailed {
                path: input.clone(),
                detail: e.to_string(),
            })?
            .to_rgb8();

        let title = out
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("document")
            .to_string();
        let bytes = image_to_pdf_bytes(rgb, &title)
            .map_err(|detail| WordLensError::Internal(format!("PDF encoding: {detail}")))?;

        std::fs::write(&out, bytes).map_err(|e| WordLensError::ArtifactWriteFailed {
            path: out.clone(),
            source: e,
        })
    })
    .await
    .map_err(|e| WordLensError::Internal(format!("image conversion task panicked: {e}")))??;

    Ok(pdf_path)
}

/// Encode raw RGB pixels as a one-page PDF sized to the image dimensions.
fn image_to_pdf_bytes(rgb: RgbImage, title: &str) -> Result<Vec<u8>, String> {
    use printpdf::{
        ColorBits, ColorSpace, Image, ImageTransform, ImageXObject, Mm, PdfDocument, Px,
    };

    // 96 DPI keeps the page at the image's nominal screen size; the pixel
    // data itself is embedded losslessly either way.
    let dpi = 96.0;
    let (width, height) = rgb.dimensions();
    let width_mm = Mm::from(Px(width as usize).into_pt(dpi));
    let height_mm = Mm::from(Px(height as usize).into_pt(dpi));

    let (doc, page, layer) = PdfDocument::new(title, width_mm, height_mm, "page");
    let layer_ref = doc.get_page(page).get_layer(layer);

    let xobject = ImageXObject {
        width: Px(width as usize),
        height: Px(height as usize),
        color_space: ColorSpace::Rgb,
        bits_per_component: ColorBits::Bit8,
        interpolate: false,
        image_data: rgb.into_raw(),
        image_filter: None,
        smask: None,
        clipping_bbox: None,
    };
    Image::from(xobject).add_to_layer(
        layer_ref,
        ImageTransform {
            dpi: Some(dpi),
            ..Default::default()
        },
    );

    let mut writer = BufWriter::new(Vec::new());
    doc.save(&mut writer).map_err(|e| e.to_string())?;
    writer.into_inner().map_err(|e| e.to_string())
}

/// Byte-copy an already-PDF input into the documents folder.
async fn copy_pdf(input: &Path, documents_dir: &Path) -> Result<PathBuf, WordLensError> {
    let pdf_path = target_pdf_path(input, documents_dir)?;
    tokio::fs::copy(input, &pdf_path)
        .await
        .map_err(|e| WordLensError::ArtifactWriteFailed {
            path: pdf_path.clone(),
            source: e,
        })?;
    Ok(pdf_path)
}
