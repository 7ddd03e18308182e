// THEORY:
// The `loader` is the entry stage of the pipeline. It turns two paths into two
// RGB images of identical size, ready for a pixel-by-pixel comparison.
//
// Key architectural principles:
// 1.  **Fail Precisely, Fail Early**: Both paths are checked for existence before
//     either file is decoded. A missing file is reported as `NotFound` with the
//     offending path rather than surfacing as a vague decode failure halfway
//     through the pair.
// 2.  **One Color Mode**: Everything is converted to 3-channel RGB. Alpha is
//     dropped, not composited.
// 3.  **Shrink, Never Grow**: When the two images disagree on size, both are
//     resampled down to the smaller width and the smaller height of the pair.
//     Nothing is cropped or padded. This discards detail instead of attempting
//     registration, and existing callers depend on exactly this behavior.

use crate::error::{DiffError, Result, ValidationIssue};
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageError, ImageReader, Limits, RgbImage};
use std::io::{Cursor, ErrorKind};
use std::path::Path;
use tracing::debug;

/// Bicubic resampling used when the two images have to be brought to a common size.
pub const RESAMPLE_FILTER: FilterType = FilterType::CatmullRom;

/// Upper bound on the decoder's buffer allocation. Large enough for a 16k x 16k
/// RGBA screenshot.
pub const MAX_DECODE_ALLOC: u64 = 4 * 1024 * 1024 * 1024;

/// Limits applied when decoding inputs.
pub fn decode_limits() -> Limits {
    let mut limits = Limits::no_limits();
    limits.max_alloc = Some(MAX_DECODE_ALLOC);
    limits
}

/// Two images of identical dimensions in RGB mode.
#[derive(Debug, Clone)]
pub struct NormalizedPair {
    pub image_a: RgbImage,
    pub image_b: RgbImage,
    pub width: u32,
    pub height: u32,
}

/// Fails with `NotFound` unless `path` resolves to a regular file.
pub fn ensure_exists(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(DiffError::NotFound {
            path: path.to_path_buf(),
        })
    }
}

/// Reads and decodes a single image. The format is sniffed from the content.
pub fn decode_image(path: &Path) -> Result<DynamicImage> {
    let bytes = std::fs::read(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => DiffError::NotFound {
            path: path.to_path_buf(),
        },
        _ => DiffError::internal(format!("reading {}", path.display()), e),
    })?;

    decode_bytes(path, &bytes, decode_limits())
}

/// Decodes an in-memory image under `limits`. A file that only trips a limit is
/// a validation failure; everything else the decoder rejects is `Decode`.
pub fn decode_bytes(path: &Path, bytes: &[u8], limits: Limits) -> Result<DynamicImage> {
    let mut reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| DiffError::internal(format!("sniffing {}", path.display()), e))?;
    reader.limits(limits);

    reader.decode().map_err(|source| match source {
        ImageError::Limits(_) => DiffError::from(ValidationIssue::ImageTooLarge {
            path: path.to_path_buf(),
        }),
        source => DiffError::Decode {
            path: path.to_path_buf(),
            source,
        },
    })
}

/// Loads both images from disk and brings them to a common size and color mode.
pub fn load_pair(path_a: &Path, path_b: &Path) -> Result<NormalizedPair> {
    ensure_exists(path_a)?;
    ensure_exists(path_b)?;

    let image_a = decode_image(path_a)?;
    let image_b = decode_image(path_b)?;
    debug!(
        a_width = image_a.width(),
        a_height = image_a.height(),
        b_width = image_b.width(),
        b_height = image_b.height(),
        "decoded image pair"
    );

    normalize_pair(image_a, image_b)
}

/// Converts both images to RGB and, if their sizes differ, downsamples both to
/// the element-wise minimum width and height.
pub fn normalize_pair(image_a: DynamicImage, image_b: DynamicImage) -> Result<NormalizedPair> {
    let image_a = image_a.into_rgb8();
    let image_b = image_b.into_rgb8();

    if image_a.dimensions() == image_b.dimensions() {
        let (width, height) = image_a.dimensions();
        return Ok(NormalizedPair {
            image_a,
            image_b,
            width,
            height,
        });
    }

    let width = image_a.width().min(image_b.width());
    let height = image_a.height().min(image_b.height());
    if width == 0 || height == 0 {
        return Err(ValidationIssue::ZeroArea { width, height }.into());
    }

    debug!(width, height, "resizing image pair to common dimensions");
    Ok(NormalizedPair {
        image_a: fit(image_a, width, height),
        image_b: fit(image_b, width, height),
        width,
        height,
    })
}

fn fit(image: RgbImage, width: u32, height: u32) -> RgbImage {
    if image.dimensions() == (width, height) {
        image
    } else {
        imageops::resize(&image, width, height, RESAMPLE_FILTER)
    }
}
