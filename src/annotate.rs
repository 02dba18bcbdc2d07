//! Bounding-box annotation of page images.
//!
//! Both the detector (all words, boxes only) and the search matcher (matched
//! words, boxes plus labels) render evidence onto a copy of a page image.
//! Boxes arrive in normalized `[0, 1]` coordinates and are scaled to the
//! image's *current* pixel dimensions at draw time — they are never assumed
//! to be pixel coordinates, so the same records annotate correctly regardless
//! of the resolution the page was rasterized at.
//!
//! Drawing is plain `image`-crate pixel writes. Labels use a built-in 5×7
//! glyph set (uppercased ASCII letters, digits, and a few marks); characters
//! outside the set render as a hollow box. That keeps the crate free of font
//! files and text-shaping dependencies, which would be wildly oversized for
//! one-line evidence labels.

use crate::artifact::{DetectionRecord, MatchRecord};
use crate::error::WordLensError;
use image::{Rgb, RgbImage};
use std::path::Path;

/// Painted outline/label color.
const RED: Rgb<u8> = Rgb([220, 30, 30]);
/// Outline thickness in pixels.
const STROKE: u32 = 2;

/// What to render for each word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationStyle {
    /// Rectangles only — detection output.
    Boxes,
    /// Rectangles plus the word text above each box — search output.
    Labelled,
}

/// Anything carrying a normalized box and a word label.
///
/// Implemented by both record types so the annotator serves detection and
/// search without conversions.
pub trait WordBox {
    /// Normalized `[xmin, ymin, xmax, ymax]`.
    fn bounding_box(&self) -> [f64; 4];
    /// Label text for [`AnnotationStyle::Labelled`].
    fn label(&self) -> &str;
}

impl WordBox for DetectionRecord {
    fn bounding_box(&self) -> [f64; 4] {
        self.bounding_box
    }
    fn label(&self) -> &str {
        &self.word
    }
}

impl WordBox for MatchRecord {
    fn bounding_box(&self) -> [f64; 4] {
        self.bounding_box
    }
    fn label(&self) -> &str {
        &self.word
    }
}

/// Render every word's box (and optionally its label) onto a copy of
/// `image_path`, saved as JPEG at `output_path`.
///
/// Pure with respect to its inputs: the source image is never mutated, and
/// the same image plus the same records produce the same output bytes.
pub fn annotate_page<T: WordBox>(
    image_path: &Path,
    words: &[T],
    output_path: &Path,
    style: AnnotationStyle,
) -> Result<(), WordLensError> {
    let mut img = image::open(image_path)
        .map_err(|e| WordLensError::ImageDecodeFailed {
            path: image_path.to_path_buf(),
            detail: e.to_string(),
        })?
        .to_rgb8();

    let (width, height) = (img.width(), img.height());

    for word in words {
        let [bx0, by0, bx1, by1] = word.bounding_box();
        let x0 = scale_clamp(bx0, width);
        let y0 = scale_clamp(by0, height);
        let x1 = scale_clamp(bx1, width);
        let y1 = scale_clamp(by1, height);
        draw_rect_outline(&mut img, x0, y0, x1, y1);

        if style == AnnotationStyle::Labelled {
            // Label sits just above the box, or inside its top edge when the
            // box touches the top of the page.
            let label_y = y0.saturating_sub(GLYPH_H + 2);
            draw_label(&mut img, word.label(), x0, label_y);
        }
    }

    img.save(output_path)
        .map_err(|e| WordLensError::AnnotationFailed {
            path: output_path.to_path_buf(),
            detail: e.to_string(),
        })
}

/// Scale a normalized coordinate to a pixel index, clamped inside the image.
fn scale_clamp(fraction: f64, dimension: u32) -> u32 {
    let px = (fraction * dimension as f64).round();
    (px.max(0.0) as u32).min(dimension.saturating_sub(1))
}

fn draw_rect_outline(img: &mut RgbImage, x0: u32, y0: u32, x1: u32, y1: u32) {
    let (x0, x1) = (x0.min(x1), x0.max(x1));
    let (y0, y1) = (y0.min(y1), y0.max(y1));
    for t in 0..STROKE {
        for x in x0..=x1 {
            put(img, x, y0 + t);
            put(img, x, y1.saturating_sub(t));
        }
        for y in y0..=y1 {
            put(img, x0 + t, y);
            put(img, x1.saturating_sub(t), y);
        }
    }
}

fn put(img: &mut RgbImage, x: u32, y: u32) {
    if x < img.width() && y < img.height() {
        img.put_pixel(x, y, RED);
    }
}

// ── Built-in 5×7 glyphs ──────────────────────────────────────────────────

const GLYPH_W: u32 = 5;
const GLYPH_H: u32 = 7;

fn draw_label(img: &mut RgbImage, text: &str, x: u32, y: u32) {
    let mut cursor = x;
    for ch in text.chars() {
        let glyph = glyph_for(ch.to_ascii_uppercase());
        for (row, bits) in glyph.iter().enumerate() {
            for col in 0..GLYPH_W {
                if bits & (1 << (GLYPH_W - 1 - col)) != 0 {
                    put(img, cursor + col, y + row as u32);
                }
            }
        }
        cursor += GLYPH_W + 1;
        if cursor >= img.width() {
            break;
        }
    }
}

/// Uppercase letters, digits, and a few marks; everything else is a box.
fn glyph_for(ch: char) -> [u8; 7] {
    match ch {
        'A' => [0x0E, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'B' => [0x1E, 0x11, 0x11, 0x1E, 0x11, 0x11, 0x1E],
        'C' => [0x0E, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0E],
        'D' => [0x1E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x1E],
        'E' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F],
        'F' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x10],
        'G' => [0x0E, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0F],
        'H' => [0x11, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'I' => [0x0E, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E],
        'J' => [0x07, 0x02, 0x02, 0x02, 0x02, 0x12, 0x0C],
        'K' => [0x11, 0x12, 0x14, 0x18, 0x14, 0x12, 0x11],
        'L' => [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1F],
        'M' => [0x11, 0x1B, 0x15, 0x15, 0x11, 0x11, 0x11],
        'N' => [0x11, 0x19, 0x15, 0x13, 0x11, 0x11, 0x11],
        'O' => [0x0E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'P' => [0x1E, 0x11, 0x11, 0x1E, 0x10, 0x10, 0x10],
        'Q' => [0x0E, 0x11, 0x11, 0x11, 0x15, 0x12, 0x0D],
        'R' => [0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11],
        'S' => [0x0F, 0x10, 0x10, 0x0E, 0x01, 0x01, 0x1E],
        'T' => [0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04],
        'U' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'V' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x0A, 0x04],
        'W' => [0x11, 0x11, 0x11, 0x15, 0x15, 0x15, 0x0A],
        'X' => [0x11, 0x11, 0x0A, 0x04, 0x0A, 0x11, 0x11],
        'Y' => [0x11, 0x11, 0x0A, 0x04, 0x04, 0x04, 0x04],
        'Z' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x10, 0x1F],
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        '-' => [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00],
        '.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C],
        ' ' => [0x00; 7],
        _ => [0x1F, 0x11, 0x11, 0x11, 0x11, 0x11, 0x1F],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use tempfile::tempdir;

    fn white_page(width: u32, height: u32) -> RgbImage {
        RgbImage::from_pixel(width, height, Rgb([255, 255, 255]))
    }

    fn record(bbox: [f64; 4], word: &str) -> DetectionRecord {
        DetectionRecord {
            document: "doc.pdf".into(),
            page_image: "img_1.jpg".into(),
            word: word.into(),
            bounding_box: bbox,
            confidence: 0.9,
        }
    }

    #[test]
    fn box_pixels_land_at_scaled_coordinates() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("page.png");
        let out = dir.path().join("out.png");
        white_page(100, 80).save(&src).unwrap();

        let records = [record([0.1, 0.25, 0.5, 0.75], "x")];
        annotate_page(&src, &records, &out, AnnotationStyle::Boxes).unwrap();

        let annotated = image::open(&out).unwrap().to_rgb8();
        // 0.1 × 100 = 10, 0.25 × 80 = 20, 0.5 × 100 = 50, 0.75 × 80 = 60.
        assert_eq!(*annotated.get_pixel(10, 20), RED);
        assert_eq!(*annotated.get_pixel(50, 20), RED);
        assert_eq!(*annotated.get_pixel(10, 60), RED);
        assert_eq!(*annotated.get_pixel(50, 60), RED);
        // Interior stays untouched.
        assert_eq!(*annotated.get_pixel(30, 40), Rgb([255, 255, 255]));
    }

    #[test]
    fn full_page_box_is_clamped_inside_image() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("page.png");
        let out = dir.path().join("out.png");
        white_page(64, 64).save(&src).unwrap();

        let records = [record([0.0, 0.0, 1.0, 1.0], "x")];
        annotate_page(&src, &records, &out, AnnotationStyle::Boxes).unwrap();

        let annotated = image::open(&out).unwrap().to_rgb8();
        assert_eq!(*annotated.get_pixel(0, 0), RED);
        assert_eq!(*annotated.get_pixel(63, 63), RED);
    }

    #[test]
    fn labelled_style_paints_above_the_box() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("page.png");
        let out = dir.path().join("out.png");
        white_page(200, 100).save(&src).unwrap();

        let records = [record([0.2, 0.5, 0.6, 0.8], "HI")];
        annotate_page(&src, &records, &out, AnnotationStyle::Labelled).unwrap();

        let annotated = image::open(&out).unwrap().to_rgb8();
        // Label band: rows [y0 - 9, y0 - 3) with y0 = 50.
        let label_band_red = (41..48)
            .flat_map(|y| (40..52).map(move |x| (x, y)))
            .any(|(x, y)| *annotated.get_pixel(x, y) == RED);
        assert!(label_band_red, "expected glyph pixels above the box");
    }

    #[test]
    fn annotation_is_deterministic() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("page.png");
        white_page(120, 90).save(&src).unwrap();
        let records = [record([0.1, 0.1, 0.4, 0.3], "Total")];

        let out_a = dir.path().join("a.jpg");
        let out_b = dir.path().join("b.jpg");
        annotate_page(&src, &records, &out_a, AnnotationStyle::Labelled).unwrap();
        annotate_page(&src, &records, &out_b, AnnotationStyle::Labelled).unwrap();

        assert_eq!(
            std::fs::read(&out_a).unwrap(),
            std::fs::read(&out_b).unwrap()
        );
    }

    #[test]
    fn missing_source_image_is_a_decode_error() {
        let dir = tempdir().unwrap();
        let result = annotate_page(
            &dir.path().join("absent.jpg"),
            &[record([0.0, 0.0, 0.1, 0.1], "x")],
            &dir.path().join("out.jpg"),
            AnnotationStyle::Boxes,
        );
        assert!(matches!(
            result,
            Err(WordLensError::ImageDecodeFailed { .. })
        ));
    }
}
