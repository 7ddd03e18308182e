// THEORY:
// The `renderer` is the final stage. It consumes a `DifferenceMask` together with
// the second ("after") image and draws a picture of where the two disagree.
//
// Two rendering strategies exist and both are legitimate, so they are modelled as
// a single `RenderMode` enum rather than two near-identical pipelines:
// - `TransparentOverlay` isolates the changed pixels of image B on a fully
//   transparent canvas. Stack it over image A to see exactly what moved.
// - `HighlightedBlend` keeps all of image B and tints the changed pixels red,
//   so a reviewer sees the change in context.
//
// Both strategies read pixel values from image B only. The magnitude is
// symmetric, the picture is not.
//
// Rendering is pure. Encoding produces PNG bytes in memory; writing them anywhere
// is the caller's business.

use crate::core_modules::difference::DifferenceMask;
use crate::error::{DiffError, Result, ValidationIssue};
use image::codecs::png::PngEncoder;
use image::{DynamicImage, ImageEncoder, Rgb, RgbImage, Rgba, RgbaImage};
use std::fmt;
use std::str::FromStr;

/// Tint applied to differing pixels in `HighlightedBlend`.
pub const HIGHLIGHT_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
/// Share of the highlight in a blended pixel, in tenths (0.3).
pub const HIGHLIGHT_WEIGHT_TENTHS: u16 = 3;

/// Selects how a difference mask is turned into an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub enum RenderMode {
    /// RGBA canvas, transparent except where the mask is set.
    #[default]
    #[cfg_attr(feature = "serde", serde(alias = "overlay"))]
    TransparentOverlay,
    /// Opaque copy of image B with differing pixels blended toward red.
    #[cfg_attr(feature = "serde", serde(alias = "blend"))]
    HighlightedBlend,
}

impl RenderMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderMode::TransparentOverlay => "transparent-overlay",
            RenderMode::HighlightedBlend => "highlighted-blend",
        }
    }
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown render mode '{0}' (expected transparent-overlay or highlighted-blend)")]
pub struct ParseRenderModeError(String);

impl FromStr for RenderMode {
    type Err = ParseRenderModeError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "transparent-overlay" | "overlay" | "transparent" => Ok(RenderMode::TransparentOverlay),
            "highlighted-blend" | "blend" | "highlight" => Ok(RenderMode::HighlightedBlend),
            _ => Err(ParseRenderModeError(s.to_string())),
        }
    }
}

/// Draws the mask over image B according to `mode`.
pub fn render(image_b: &RgbImage, mask: &DifferenceMask, mode: RenderMode) -> Result<DynamicImage> {
    if image_b.dimensions() != (mask.width(), mask.height()) {
        return Err(ValidationIssue::DimensionMismatch {
            left_width: image_b.width(),
            left_height: image_b.height(),
            right_width: mask.width(),
            right_height: mask.height(),
        }
        .into());
    }

    Ok(match mode {
        RenderMode::TransparentOverlay => {
            DynamicImage::ImageRgba8(render_transparent_overlay(image_b, mask))
        }
        RenderMode::HighlightedBlend => {
            DynamicImage::ImageRgb8(render_highlighted_blend(image_b, mask))
        }
    })
}

fn render_transparent_overlay(image_b: &RgbImage, mask: &DifferenceMask) -> RgbaImage {
    // `RgbaImage::new` is zero-filled: every pixel starts fully transparent.
    let mut overlay = RgbaImage::new(image_b.width(), image_b.height());
    for (x, y) in mask.differing_coordinates() {
        let Rgb([red, green, blue]) = *image_b.get_pixel(x, y);
        overlay.put_pixel(x, y, Rgba([red, green, blue, u8::MAX]));
    }
    overlay
}

fn render_highlighted_blend(image_b: &RgbImage, mask: &DifferenceMask) -> RgbImage {
    let mut blended = image_b.clone();
    for (x, y) in mask.differing_coordinates() {
        let pixel = blended.get_pixel_mut(x, y);
        for (channel, highlight) in pixel.0.iter_mut().zip(HIGHLIGHT_COLOR.0) {
            *channel = blend_channel(*channel, highlight);
        }
    }
    blended
}

/// `0.7 * original + 0.3 * highlight`, truncated. Integer math keeps it exact.
#[inline]
fn blend_channel(original: u8, highlight: u8) -> u8 {
    let keep = 10 - HIGHLIGHT_WEIGHT_TENTHS;
    let mixed = (keep * u16::from(original) + HIGHLIGHT_WEIGHT_TENTHS * u16::from(highlight)) / 10;
    mixed.min(u16::from(u8::MAX)) as u8
}

/// Encodes a rendered image as PNG bytes.
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut png = Vec::new();
    PngEncoder::new(&mut png)
        .write_image(
            image.as_bytes(),
            image.width(),
            image.height(),
            image.color().into(),
        )
        .map_err(|e| DiffError::internal("encoding PNG artifact", e))?;
    Ok(png)
}
