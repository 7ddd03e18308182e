// THEORY:
// The `difference` module is the analytical heart of the engine. It takes two
// aligned RGB images and answers one question for every coordinate: did this
// pixel change by more than the caller is willing to tolerate?
//
// Key architectural principles:
// 1.  **Two Passes, Two Buffers**: First a `DifferenceMap` records the magnitude
//     of change at every pixel. Then a `Threshold` turns that map into a
//     `DifferenceMask`. Both buffers are owned by the request that created them;
//     nothing is shared between concurrent comparisons.
// 2.  **Strict Cutoff**: A pixel is flagged only when its magnitude is strictly
//     greater than the threshold value. A pixel sitting exactly on the threshold
//     is considered unchanged.
// 3.  **Permissive Threshold**: Percentages outside 0..=100 are accepted. They
//     produce degenerate masks (everything or nothing flagged) but never a crash.
//     Only non-finite values are rejected, since there is no cutoff to derive.

use crate::core_modules::smart_pixel::{self, Magnitude};
use crate::error::{Result, ValidationIssue};
use image::RgbImage;

/// A magnitude cutoff derived from a percentage of the 8-bit channel range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Threshold {
    percent: f64,
    value: i64,
}

impl Threshold {
    /// `floor(255 * percent / 100)`. Values outside 0..=100 are kept as-is.
    pub fn from_percent(percent: f64) -> Result<Self> {
        if !percent.is_finite() {
            return Err(ValidationIssue::NonFiniteThreshold(percent).into());
        }
        let value = (255.0 * percent / 100.0).floor() as i64;
        Ok(Self { percent, value })
    }

    pub fn percent(&self) -> f64 {
        self.percent
    }

    /// The cutoff on the 0..=765 magnitude scale. May be negative.
    pub fn value(&self) -> i64 {
        self.value
    }

    #[inline]
    pub fn is_exceeded_by(&self, magnitude: Magnitude) -> bool {
        i64::from(magnitude) > self.value
    }
}

/// Per-pixel difference magnitudes for an aligned image pair, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct DifferenceMap {
    width: u32,
    height: u32,
    magnitudes: Vec<Magnitude>,
}

impl DifferenceMap {
    pub fn compute(image_a: &RgbImage, image_b: &RgbImage) -> Result<Self> {
        if image_a.dimensions() != image_b.dimensions() {
            return Err(ValidationIssue::DimensionMismatch {
                left_width: image_a.width(),
                left_height: image_a.height(),
                right_width: image_b.width(),
                right_height: image_b.height(),
            }
            .into());
        }

        let (width, height) = image_a.dimensions();
        let mut magnitudes = Vec::with_capacity(width as usize * height as usize);
        for (pixel_a, pixel_b) in image_a.pixels().zip(image_b.pixels()) {
            magnitudes.push(smart_pixel::magnitude(pixel_a, pixel_b));
        }

        Ok(Self {
            width,
            height,
            magnitudes,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn magnitude(&self, x: u32, y: u32) -> Magnitude {
        self.magnitudes[y as usize * self.width as usize + x as usize]
    }

    pub fn magnitudes(&self) -> &[Magnitude] {
        &self.magnitudes
    }

    /// Flags every pixel whose magnitude is strictly above `threshold`.
    pub fn mask(&self, threshold: Threshold) -> DifferenceMask {
        DifferenceMask {
            width: self.width,
            height: self.height,
            flags: self
                .magnitudes
                .iter()
                .map(|&magnitude| threshold.is_exceeded_by(magnitude))
                .collect(),
        }
    }
}

/// Boolean grid of differing pixels, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DifferenceMask {
    width: u32,
    height: u32,
    flags: Vec<bool>,
}

impl DifferenceMask {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_different(&self, x: u32, y: u32) -> bool {
        self.flags[y as usize * self.width as usize + x as usize]
    }

    pub fn flags(&self) -> &[bool] {
        &self.flags
    }

    pub fn different_count(&self) -> u64 {
        self.flags.iter().filter(|&&flag| flag).count() as u64
    }

    /// Coordinates of the flagged pixels, in row-major order.
    pub fn differing_coordinates(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        let row_len = (self.width as usize).max(1);
        self.flags
            .chunks(row_len)
            .zip(0u32..)
            .flat_map(|(row, y)| {
                row.iter()
                    .zip(0u32..)
                    .filter(|(flag, _)| **flag)
                    .map(move |(_, x)| (x, y))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn solid(width: u32, height: u32, value: u8) -> RgbImage {
        RgbImage::from_pixel(width, height, Rgb([value, value, value]))
    }

    #[test]
    fn threshold_follows_the_channel_scale() {
        assert_eq!(Threshold::from_percent(5.0).unwrap().value(), 12);
        assert_eq!(Threshold::from_percent(50.0).unwrap().value(), 127);
        assert_eq!(Threshold::from_percent(100.0).unwrap().value(), 255);
        assert_eq!(Threshold::from_percent(0.0).unwrap().value(), 0);
    }

    #[test]
    fn out_of_range_thresholds_are_tolerated() {
        let negative = Threshold::from_percent(-10.0).unwrap();
        assert_eq!(negative.value(), -26);
        assert!(negative.is_exceeded_by(0));

        let huge = Threshold::from_percent(1000.0).unwrap();
        assert!(!huge.is_exceeded_by(smart_pixel::MAX_MAGNITUDE));
    }

    #[test]
    fn non_finite_thresholds_are_rejected() {
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(Threshold::from_percent(bad).is_err());
        }
    }

    #[test]
    fn pixel_exactly_on_threshold_is_not_flagged() {
        // 5% -> 12. One pixel at magnitude 12, one at 13.
        let a = solid(2, 1, 0);
        let mut b = solid(2, 1, 0);
        b.put_pixel(0, 0, Rgb([4, 4, 4]));
        b.put_pixel(1, 0, Rgb([5, 4, 4]));

        let map = DifferenceMap::compute(&a, &b).unwrap();
        assert_eq!(map.magnitude(0, 0), 12);
        assert_eq!(map.magnitude(1, 0), 13);

        let mask = map.mask(Threshold::from_percent(5.0).unwrap());
        assert!(!mask.is_different(0, 0));
        assert!(mask.is_different(1, 0));
        assert_eq!(mask.different_count(), 1);
    }

    #[test]
    fn solid_four_by_four_scenario() {
        let map = DifferenceMap::compute(&solid(4, 4, 0), &solid(4, 4, 10)).unwrap();
        assert!(map.magnitudes().iter().all(|&m| m == 30));

        let loose = map.mask(Threshold::from_percent(5.0).unwrap());
        assert_eq!(loose.different_count(), 16);

        let strict = map.mask(Threshold::from_percent(50.0).unwrap());
        assert_eq!(strict.different_count(), 0);
    }

    #[test]
    fn magnitudes_are_symmetric() {
        let mut a = solid(3, 2, 90);
        let mut b = solid(3, 2, 10);
        a.put_pixel(2, 1, Rgb([0, 255, 17]));
        b.put_pixel(0, 0, Rgb([200, 3, 77]));

        let forward = DifferenceMap::compute(&a, &b).unwrap();
        let backward = DifferenceMap::compute(&b, &a).unwrap();
        assert_eq!(forward, backward);
    }

    #[test]
    fn mismatched_dimensions_are_rejected() {
        let err = DifferenceMap::compute(&solid(2, 2, 0), &solid(2, 3, 0)).unwrap_err();
        assert_eq!(err.kind(), crate::error::DiffErrorKind::Validation);
    }

    #[test]
    fn differing_coordinates_are_row_major() {
        let a = solid(3, 2, 0);
        let mut b = solid(3, 2, 0);
        b.put_pixel(2, 0, Rgb([255, 0, 0]));
        b.put_pixel(1, 1, Rgb([255, 0, 0]));

        let mask = DifferenceMap::compute(&a, &b)
            .unwrap()
            .mask(Threshold::from_percent(5.0).unwrap());
        let coords: Vec<_> = mask.differing_coordinates().collect();
        assert_eq!(coords, vec![(2, 0), (1, 1)]);
    }

    #[test]
    fn coordinates_follow_rows_of_wide_masks() {
        let width = 100_000u32;
        let mut flags = vec![false; width as usize * 2];
        flags[width as usize - 1] = true;
        flags[width as usize * 2 - 1] = true;
        let mask = DifferenceMask {
            width,
            height: 2,
            flags,
        };

        let coords: Vec<_> = mask.differing_coordinates().collect();
        assert_eq!(coords, vec![(width - 1, 0), (width - 1, 1)]);
        assert!(mask.is_different(width - 1, 1));
    }
}
