//! The text detection/recognition seam.
//!
//! The pipeline never talks to a recognition model directly; it talks to the
//! [`OcrEngine`] trait. The default implementation shells out to the system
//! `tesseract` binary and parses its TSV output, which carries word-level
//! boxes and confidences without any native bindings. Tests inject scripted
//! engines instead, so detection logic is exercised without the binary.
//!
//! ## Why TSV?
//!
//! Tesseract's TSV format emits one row per layout element. Level-5 rows are
//! words with pixel-space `left top width height` and a 0–100 confidence; the
//! level-1 page row carries the full page dimensions. That is everything
//! needed to produce normalized word geometry, and parsing it is a pure
//! string transformation that unit tests can feed directly.

use crate::error::WordLensError;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// One recognized word, as reported by an engine.
///
/// Geometry is two corner points in normalized image-fraction coordinates:
/// `corner_min` is the top-left, `corner_max` the bottom-right. The detector
/// flattens them into the four-value bounding box of the detection artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrWord {
    pub text: String,
    /// Top-left corner, `(x, y)` in `[0, 1]`.
    pub corner_min: (f64, f64),
    /// Bottom-right corner, `(x, y)` in `[0, 1]`.
    pub corner_max: (f64, f64),
    /// Recognition confidence in `[0, 1]`.
    pub confidence: f64,
}

/// A text detection/recognition capability invoked once per page image.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Recognize all words on one page image.
    async fn recognize(&self, image: &Path) -> Result<Vec<OcrWord>, WordLensError>;
}

/// The default engine: the system `tesseract` binary in TSV mode.
pub struct TesseractOcr {
    binary: String,
    lang: String,
    timeout: Duration,
}

impl TesseractOcr {
    pub fn new(binary: impl Into<String>, lang: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            lang: lang.into(),
            timeout,
        }
    }
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    async fn recognize(&self, image: &Path) -> Result<Vec<OcrWord>, WordLensError> {
        let mut cmd = Command::new(&self.binary);
        cmd.arg(image)
            .arg("stdout")
            .args(["-l", &self.lang])
            .arg("tsv")
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| WordLensError::OcrFailed {
                image: image.to_path_buf(),
                detail: format!("timed out after {}s", self.timeout.as_secs()),
            })?
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    WordLensError::ToolUnavailable {
                        binary: self.binary.clone(),
                        detail: e.to_string(),
                        hint: "Install tesseract-ocr and ensure it is on PATH.".into(),
                    }
                } else {
                    WordLensError::OcrFailed {
                        image: image.to_path_buf(),
                        detail: e.to_string(),
                    }
                }
            })?;

        if !output.status.success() {
            return Err(WordLensError::OcrFailed {
                image: image.to_path_buf(),
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let tsv = String::from_utf8_lossy(&output.stdout);
        let words = parse_tsv(&tsv).map_err(|detail| WordLensError::OcrFailed {
            image: image.to_path_buf(),
            detail,
        })?;

        debug!("OCR: {} → {} words", image.display(), words.len());
        Ok(words)
    }
}

/// Parse Tesseract TSV output into normalized words.
///
/// The level-1 page row establishes the page dimensions; level-5 rows are
/// words. Rows with negative confidence (layout separators) or whitespace-only
/// text are dropped.
pub fn parse_tsv(tsv: &str) -> Result<Vec<OcrWord>, String> {
    let mut page_dims: Option<(f64, f64)> = None;
    let mut words = Vec::new();

    for line in tsv.lines().skip(1) {
        let cols: Vec<&str> = line.split('\t').collect();
        if cols.len() < 12 {
            continue;
        }
        let level: u32 = cols[0].parse().map_err(|_| format!("bad level: {line}"))?;

        if level == 1 {
            let width: f64 = cols[8].parse().map_err(|_| format!("bad page width: {line}"))?;
            let height: f64 = cols[9].parse().map_err(|_| format!("bad page height: {line}"))?;
            if width <= 0.0 || height <= 0.0 {
                return Err(format!("degenerate page dimensions {width}x{height}"));
            }
            page_dims = Some((width, height));
            continue;
        }
        if level != 5 {
            continue;
        }

        let (page_w, page_h) = page_dims.ok_or("word row before page row")?;
        let conf: f64 = cols[10].parse().map_err(|_| format!("bad confidence: {line}"))?;
        let text = cols[11].trim();
        if conf < 0.0 || text.is_empty() {
            continue;
        }

        let left: f64 = cols[6].parse().map_err(|_| format!("bad left: {line}"))?;
        let top: f64 = cols[7].parse().map_err(|_| format!("bad top: {line}"))?;
        let width: f64 = cols[8].parse().map_err(|_| format!("bad width: {line}"))?;
        let height: f64 = cols[9].parse().map_err(|_| format!("bad height: {line}"))?;

        words.push(OcrWord {
            text: text.to_string(),
            corner_min: (left / page_w, top / page_h),
            corner_max: ((left + width) / page_w, (top + height) / page_h),
            confidence: (conf / 100.0).clamp(0.0, 1.0),
        });
    }

    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext";

    fn tsv(rows: &[&str]) -> String {
        let mut out = String::from(HEADER);
        for row in rows {
            out.push('\n');
            out.push_str(row);
        }
        out
    }

    #[test]
    fn parses_words_normalized_to_page_dims() {
        let input = tsv(&[
            "1\t1\t0\t0\t0\t0\t0\t0\t1000\t500\t-1\t",
            "5\t1\t1\t1\t1\t1\t100\t50\t200\t25\t96.5\tInvoice",
        ]);
        let words = parse_tsv(&input).unwrap();
        assert_eq!(words.len(), 1);
        let w = &words[0];
        assert_eq!(w.text, "Invoice");
        assert!((w.corner_min.0 - 0.1).abs() < 1e-9);
        assert!((w.corner_min.1 - 0.1).abs() < 1e-9);
        assert!((w.corner_max.0 - 0.3).abs() < 1e-9);
        assert!((w.corner_max.1 - 0.15).abs() < 1e-9);
        assert!((w.confidence - 0.965).abs() < 1e-9);
    }

    #[test]
    fn drops_separators_and_blank_text() {
        let input = tsv(&[
            "1\t1\t0\t0\t0\t0\t0\t0\t1000\t500\t-1\t",
            "2\t1\t1\t0\t0\t0\t10\t10\t980\t480\t-1\t",
            "5\t1\t1\t1\t1\t1\t100\t50\t200\t25\t-1\t ",
            "5\t1\t1\t1\t1\t2\t100\t50\t200\t25\t88\ttotal",
        ]);
        let words = parse_tsv(&input).unwrap();
        assert_eq!(words.len(), 1);
        assert_eq!(words[0].text, "total");
    }

    #[test]
    fn word_before_page_row_is_an_error() {
        let input = tsv(&["5\t1\t1\t1\t1\t1\t100\t50\t200\t25\t88\ttotal"]);
        assert!(parse_tsv(&input).is_err());
    }

    #[test]
    fn empty_page_yields_no_words() {
        let input = tsv(&["1\t1\t0\t0\t0\t0\t0\t0\t640\t480\t-1\t"]);
        assert!(parse_tsv(&input).unwrap().is_empty());
    }
}
