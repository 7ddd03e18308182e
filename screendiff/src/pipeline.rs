// THEORY:
// The `pipeline` module is the top-level API of the diff engine. It wires the
// three stages together into a single call:
//
//     loader  ->  difference  ->  renderer
//
// Data only flows forward. Nothing is cached between calls, so the same request
// with the same two images always yields a bit-identical artifact, and
// independent requests can run on as many threads as the caller likes.
//
// Any stage failing aborts the whole request. There is no partial artifact.

use crate::core_modules::difference::{DifferenceMap, Threshold};
use crate::core_modules::loader::{self, NormalizedPair};
use crate::core_modules::renderer;
use crate::error::Result;
use image::DynamicImage;
use std::fmt::Display;
use std::path::PathBuf;
use tracing::{debug, info, info_span};

// Re-export key data structures for the public API.
pub use crate::core_modules::renderer::RenderMode;
pub use crate::core_modules::statistics::DiffStatistics;

/// Sensitivity used when a request does not specify one.
pub const DEFAULT_THRESHOLD_PERCENT: f64 = 5.0;

fn default_threshold_percent() -> f64 {
    DEFAULT_THRESHOLD_PERCENT
}

/// A request to compare two images on disk.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DiffRequest {
    #[cfg_attr(feature = "serde", serde(rename = "imageA"))]
    pub path_a: PathBuf,
    #[cfg_attr(feature = "serde", serde(rename = "imageB"))]
    pub path_b: PathBuf,
    /// Sensitivity in percent of the 8-bit channel range. Nominally 0..=100.
    #[cfg_attr(
        feature = "serde",
        serde(rename = "threshold", default = "default_threshold_percent")
    )]
    pub threshold_percent: f64,
    #[cfg_attr(feature = "serde", serde(default))]
    pub mode: RenderMode,
}

impl DiffRequest {
    pub fn new(path_a: impl Into<PathBuf>, path_b: impl Into<PathBuf>) -> Self {
        Self {
            path_a: path_a.into(),
            path_b: path_b.into(),
            threshold_percent: default_threshold_percent(),
            mode: RenderMode::default(),
        }
    }

    pub fn with_threshold(mut self, threshold_percent: f64) -> Self {
        self.threshold_percent = threshold_percent;
        self
    }

    pub fn with_mode(mut self, mode: RenderMode) -> Self {
        self.mode = mode;
        self
    }
}

/// The output of one diff: an encoded PNG and the figures describing it.
#[derive(Debug, Clone)]
pub struct DiffArtifact {
    pub png: Vec<u8>,
    pub stats: DiffStatistics,
    pub mode: RenderMode,
}

/// `strftime` pattern for the timestamp in generated artifact names.
pub const ARTIFACT_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S_%3f";

/// File name for an artifact stamped with `timestamp`, which should be rendered
/// with `ARTIFACT_TIMESTAMP_FORMAT`: `diff_20240131_235959_123.png`.
pub fn artifact_file_name(timestamp: impl Display) -> String {
    format!("diff_{timestamp}.png")
}

/// Loads, compares and renders the two images named by `request`.
pub fn compute_diff(request: &DiffRequest) -> Result<DiffArtifact> {
    let span = info_span!(
        "compute_diff",
        path_a = %request.path_a.display(),
        path_b = %request.path_b.display(),
        threshold = request.threshold_percent,
        mode = %request.mode,
    );
    let _enter = span.enter();

    let threshold = Threshold::from_percent(request.threshold_percent)?;

    // Stage 1: Loading & Normalization
    let pair = loader::load_pair(&request.path_a, &request.path_b)?;

    run_stages(pair, threshold, request.mode)
}

/// Same pipeline as `compute_diff`, for images that are already decoded.
pub fn compute_diff_images(
    image_a: DynamicImage,
    image_b: DynamicImage,
    threshold_percent: f64,
    mode: RenderMode,
) -> Result<DiffArtifact> {
    let threshold = Threshold::from_percent(threshold_percent)?;
    let pair = loader::normalize_pair(image_a, image_b)?;
    run_stages(pair, threshold, mode)
}

fn run_stages(
    pair: NormalizedPair,
    threshold: Threshold,
    mode: RenderMode,
) -> Result<DiffArtifact> {
    // Stage 2: Difference Engine
    let map = DifferenceMap::compute(&pair.image_a, &pair.image_b)?;
    let mask = map.mask(threshold);
    let stats = DiffStatistics::from_mask(&mask)?;
    debug!(
        threshold_value = threshold.value(),
        width = pair.width,
        height = pair.height,
        "difference mask computed"
    );

    // Stage 3: Rendering & Encoding
    let rendered = renderer::render(&pair.image_b, &mask, mode)?;
    let png = renderer::encode_png(&rendered)?;

    info!(
        different_pixels = stats.different_pixel_count,
        difference_percentage = stats.difference_percentage,
        width = stats.width,
        height = stats.height,
        bytes = png.len(),
        "diff artifact generated"
    );

    Ok(DiffArtifact { png, stats, mode })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DiffError, DiffErrorKind};
    use image::{Rgb, RgbImage};

    fn solid(width: u32, height: u32, value: u8) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([value, value, value])))
    }

    #[test]
    fn request_defaults() {
        let request = DiffRequest::new("a.png", "b.png");
        assert_eq!(request.threshold_percent, 5.0);
        assert_eq!(request.mode, RenderMode::TransparentOverlay);

        let request = request.with_threshold(12.5).with_mode(RenderMode::HighlightedBlend);
        assert_eq!(request.threshold_percent, 12.5);
        assert_eq!(request.mode, RenderMode::HighlightedBlend);
    }

    #[test]
    fn artifact_names_wrap_the_timestamp() {
        assert_eq!(artifact_file_name("20240131_235959_123"), "diff_20240131_235959_123.png");
    }

    #[test]
    fn in_memory_diff_reports_all_pixels_changed() {
        let artifact =
            compute_diff_images(solid(4, 4, 0), solid(4, 4, 10), 5.0, RenderMode::HighlightedBlend)
                .unwrap();
        assert_eq!(artifact.stats.different_pixel_count, 16);
        assert_eq!(artifact.stats.difference_percentage, 100.0);
        assert_eq!(artifact.mode, RenderMode::HighlightedBlend);
        assert!(artifact.png.starts_with(b"\x89PNG"));
    }

    #[test]
    fn malformed_threshold_is_reported_before_touching_disk() {
        let request = DiffRequest::new("/nonexistent/a.png", "/nonexistent/b.png")
            .with_threshold(f64::NAN);
        let err = compute_diff(&request).unwrap_err();
        assert_eq!(err.kind(), DiffErrorKind::Validation);
    }

    #[test]
    fn missing_inputs_are_not_found() {
        let request = DiffRequest::new("/nonexistent/a.png", "/nonexistent/b.png");
        let err = compute_diff(&request).unwrap_err();
        assert!(matches!(err, DiffError::NotFound { ref path } if path.ends_with("a.png")));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn request_uses_wire_names_and_defaults() {
        let request: DiffRequest =
            serde_json::from_str(r#"{"imageA": "x/a.png", "imageB": "x/b.png"}"#).unwrap();
        assert_eq!(request.path_a, PathBuf::from("x/a.png"));
        assert_eq!(request.threshold_percent, DEFAULT_THRESHOLD_PERCENT);
        assert_eq!(request.mode, RenderMode::TransparentOverlay);

        let request: DiffRequest = serde_json::from_str(
            r#"{"imageA": "a", "imageB": "b", "threshold": 20, "mode": "blend"}"#,
        )
        .unwrap();
        assert_eq!(request.threshold_percent, 20.0);
        assert_eq!(request.mode, RenderMode::HighlightedBlend);
    }
}
