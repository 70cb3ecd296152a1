//! Screenshot annotation: numbered bounding boxes for interactive elements.
//!
//! The capture is pasted onto a slightly larger white canvas so boxes and
//! tags at the screen edge have a margin to land in.  Layout (geometry
//! only) fans out across a rayon pool; compositing onto the canvas stays
//! single-threaded since the canvas is one mutable buffer.  Labels are
//! the element's positional index in the snapshot's interactive list,
//! drawn in a filled tag above the box's top-right corner.

use std::io::Cursor;
use std::sync::OnceLock;

use ab_glyph::{FontVec, PxScale};
use image::{ImageFormat, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use rayon::prelude::*;

use crate::errors::AgentDeskError;
use crate::geometry::BoundingBox;
use crate::tree::element::TreeElementNode;

/// White margin around the pasted capture.
const CANVAS_PADDING: i32 = 5;

const CANVAS_BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);

const LABEL_HEIGHT: i32 = 16;
const LABEL_CHAR_WIDTH: i32 = 9;
const LABEL_TEXT_SCALE: f32 = 14.0;

/// Box colours, cycled by label index.  High-contrast against most UI
/// chrome; the label tag is filled with the same colour.
const PALETTE: [Rgba<u8>; 8] = [
    Rgba([228, 26, 28, 255]),
    Rgba([55, 126, 184, 255]),
    Rgba([77, 175, 74, 255]),
    Rgba([152, 78, 163, 255]),
    Rgba([255, 127, 0, 255]),
    Rgba([166, 86, 40, 255]),
    Rgba([0, 139, 139, 255]),
    Rgba([199, 21, 133, 255]),
];

const LABEL_TEXT_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Placement of one annotation, in canvas (not screen) coordinates.
#[derive(Debug, Clone)]
pub struct Annotation {
    pub label: usize,
    pub color: Rgba<u8>,
    pub bounds: BoundingBox,
    pub label_box: BoundingBox,
}

fn label_font() -> Option<&'static FontVec> {
    static FONT: OnceLock<Option<FontVec>> = OnceLock::new();
    FONT.get_or_init(|| {
        let candidates = [
            r"C:\Windows\Fonts\arial.ttf",
            r"C:\Windows\Fonts\segoeui.ttf",
            "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
            "/usr/share/fonts/TTF/DejaVuSans.ttf",
        ];
        for path in candidates {
            if let Ok(bytes) = std::fs::read(path) {
                if let Ok(font) = FontVec::try_from_vec(bytes) {
                    return Some(font);
                }
            }
        }
        log::warn!("no label font found; annotations will omit digits");
        None
    })
    .as_ref()
}

fn digits(n: usize) -> i32 {
    let mut n = n;
    let mut count = 1;
    while n >= 10 {
        n /= 10;
        count += 1;
    }
    count
}

/// Compute annotation geometry for every interactive node.
///
/// `origin` is the top-left of the virtual screen; element bounds are in
/// screen coordinates while the capture sits at `(CANVAS_PADDING,
/// CANVAS_PADDING)` on the canvas, so both shifts happen here.  Pure
/// geometry, so it parallelises freely.
pub fn layout_annotations(nodes: &[TreeElementNode], origin: (i32, i32)) -> Vec<Annotation> {
    nodes
        .par_iter()
        .enumerate()
        .map(|(label, node)| {
            let bounds = node
                .bounding_box
                .offset_by(origin.0 - CANVAS_PADDING, origin.1 - CANVAS_PADDING);

            let label_width = digits(label) * LABEL_CHAR_WIDTH + 4;
            // Tag sits above the top-right corner, clamped onto the canvas.
            let label_left = (bounds.right - label_width).max(0);
            let label_top = (bounds.top - LABEL_HEIGHT).max(0);
            let label_box = BoundingBox::new(
                label_left,
                label_top,
                label_left + label_width,
                label_top + LABEL_HEIGHT,
            );

            Annotation {
                label,
                color: PALETTE[label % PALETTE.len()],
                bounds,
                label_box,
            }
        })
        .collect()
}

fn to_rect(bounds: &BoundingBox) -> Option<Rect> {
    let width = bounds.width();
    let height = bounds.height();
    if width <= 0 || height <= 0 {
        return None;
    }
    Some(Rect::at(bounds.left, bounds.top).of_size(width as u32, height as u32))
}

/// Paste `screenshot` onto a padded canvas and draw the numbered boxes.
pub fn annotate(screenshot: &RgbaImage, annotations: &[Annotation]) -> RgbaImage {
    let pad = CANVAS_PADDING as u32;
    let mut canvas = RgbaImage::from_pixel(
        screenshot.width() + 2 * pad,
        screenshot.height() + 2 * pad,
        CANVAS_BACKGROUND,
    );
    image::imageops::replace(&mut canvas, screenshot, i64::from(pad), i64::from(pad));
    let font = label_font();

    for annotation in annotations {
        let Some(rect) = to_rect(&annotation.bounds) else {
            continue;
        };
        // Two hollow rects give a 2px border.
        draw_hollow_rect_mut(&mut canvas, rect, annotation.color);
        if let Some(inner) = to_rect(&annotation.bounds.inflate(-1)) {
            draw_hollow_rect_mut(&mut canvas, inner, annotation.color);
        }

        if let Some(tag) = to_rect(&annotation.label_box) {
            draw_filled_rect_mut(&mut canvas, tag, annotation.color);
            if let Some(font) = font {
                draw_text_mut(
                    &mut canvas,
                    LABEL_TEXT_COLOR,
                    annotation.label_box.left + 2,
                    annotation.label_box.top + 1,
                    PxScale::from(LABEL_TEXT_SCALE),
                    font,
                    &annotation.label.to_string(),
                );
            }
        }
    }
    canvas
}

/// Uniform down-scale factor fitting `(width, height)` inside
/// `(max_width, max_height)`.  Never scales up.
pub fn fit_scale(width: u32, height: u32, max_width: u32, max_height: u32) -> f64 {
    if width == 0 || height == 0 {
        return 1.0;
    }
    let wr = f64::from(max_width) / f64::from(width);
    let hr = f64::from(max_height) / f64::from(height);
    wr.min(hr).min(1.0)
}

/// Resample `image` by `scale` (Lanczos3).  A no-op for `scale >= 1.0`
/// within rounding.
pub fn scale_image(image: &RgbaImage, scale: f64) -> RgbaImage {
    let width = ((f64::from(image.width()) * scale).round() as u32).max(1);
    let height = ((f64::from(image.height()) * scale).round() as u32).max(1);
    if width == image.width() && height == image.height() {
        return image.clone();
    }
    image::imageops::resize(image, width, height, image::imageops::FilterType::Lanczos3)
}

/// PNG-encode an RGBA image.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, AgentDeskError> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|e| AgentDeskError::CaptureError(format!("png encode failed: {e}")))?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::ControlKind;

    fn node(left: i32, top: i32, right: i32, bottom: i32) -> TreeElementNode {
        TreeElementNode {
            name: "n".into(),
            control_kind: ControlKind::Button,
            bounding_box: BoundingBox::new(left, top, right, bottom),
            xpath: String::new(),
        }
    }

    #[test]
    fn test_fit_scale() {
        assert_eq!(fit_scale(3840, 2160, 1920, 1080), 0.5);
        assert_eq!(fit_scale(800, 600, 1920, 1080), 1.0); // never upscale
        assert_eq!(fit_scale(0, 0, 1920, 1080), 1.0);
        // Limited by the tighter axis.
        let s = fit_scale(1920, 2160, 1920, 1080);
        assert!((s - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_layout_translates_by_origin() {
        // Virtual screen starting at (-1920, 0): a monitor left of primary.
        let nodes = vec![node(-1900, 100, -1800, 140)];
        let annotations = layout_annotations(&nodes, (-1920, 0));
        assert_eq!(annotations.len(), 1);
        let a = &annotations[0];
        assert_eq!(a.bounds.left, 20 + CANVAS_PADDING);
        assert_eq!(a.bounds.top, 100 + CANVAS_PADDING);
        assert_eq!(a.label, 0);
    }

    #[test]
    fn test_canvas_padded_and_boxes_exact() {
        let screenshot = RgbaImage::from_pixel(200, 200, Rgba([0, 0, 0, 255]));
        let nodes = vec![node(40, 0, 120, 30)];
        let annotations = layout_annotations(&nodes, (0, 0));
        // The drawn box is the element's own bounds, shifted into the
        // padded canvas, never inflated.
        assert_eq!(annotations[0].bounds, BoundingBox::new(45, 5, 125, 35));

        let canvas = annotate(&screenshot, &annotations);
        assert_eq!((canvas.width(), canvas.height()), (210, 210));
        // Margin is background, pasted capture shows through elsewhere.
        assert_eq!(*canvas.get_pixel(0, 0), CANVAS_BACKGROUND);
        assert_eq!(*canvas.get_pixel(100, 150), Rgba([0, 0, 0, 255]));
        // Border pixel on the box's left edge.
        assert_eq!(*canvas.get_pixel(45, 20), annotations[0].color);
    }

    #[test]
    fn test_layout_preserves_order_and_cycles_palette() {
        let nodes: Vec<TreeElementNode> = (0..10)
            .map(|i| node(i * 50, 50, i * 50 + 40, 90))
            .collect();
        let annotations = layout_annotations(&nodes, (0, 0));
        for (i, a) in annotations.iter().enumerate() {
            assert_eq!(a.label, i);
            assert_eq!(a.color, PALETTE[i % PALETTE.len()]);
        }
    }

    #[test]
    fn test_label_box_clamped_to_canvas() {
        // Element at the very top: the tag cannot go above y=0.
        let nodes = vec![node(10, 0, 100, 30)];
        let annotations = layout_annotations(&nodes, (0, 0));
        assert!(annotations[0].label_box.top >= 0);
    }

    #[test]
    fn test_annotate_draws_border() {
        let screenshot = RgbaImage::from_pixel(200, 200, Rgba([0, 0, 0, 255]));
        let nodes = vec![node(50, 50, 120, 100)];
        let annotations = layout_annotations(&nodes, (0, 0));
        let canvas = annotate(&screenshot, &annotations);

        let border = annotations[0].bounds;
        assert_eq!(
            *canvas.get_pixel(border.left as u32, (border.top + 10) as u32),
            annotations[0].color
        );
        // Far corner is margin.
        assert_eq!(*canvas.get_pixel(209, 209), CANVAS_BACKGROUND);
        // Source untouched.
        assert_eq!(*screenshot.get_pixel(border.left as u32, 60), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_annotate_skips_degenerate_bounds() {
        let screenshot = RgbaImage::from_pixel(50, 50, Rgba([0, 0, 0, 255]));
        let annotations = vec![Annotation {
            label: 0,
            color: PALETTE[0],
            bounds: BoundingBox::new(10, 10, 10, 10),
            label_box: BoundingBox::new(10, 0, 10, 0),
        }];
        let canvas = annotate(&screenshot, &annotations);
        assert_eq!(*canvas.get_pixel(10, 10), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_scale_image_dimensions() {
        let image = RgbaImage::from_pixel(400, 300, Rgba([10, 20, 30, 255]));
        let half = scale_image(&image, 0.5);
        assert_eq!((half.width(), half.height()), (200, 150));
        let same = scale_image(&image, 1.0);
        assert_eq!((same.width(), same.height()), (400, 300));
    }

    #[test]
    fn test_encode_png_signature() {
        let image = RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 255]));
        let bytes = encode_png(&image).unwrap();
        assert_eq!(&bytes[..8], &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]);
    }
}
