// THEORY:
// `DiffStatistics` is the small, serializable summary that UI layers and CI
// gates actually consume to decide pass or fail. It is derived from a mask and
// nothing else, so it can never disagree with the artifact it accompanies.

use crate::core_modules::difference::DifferenceMask;
use crate::error::{Result, ValidationIssue};

/// Aggregate figures describing how much of the working image changed.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "camelCase")
)]
pub struct DiffStatistics {
    pub different_pixel_count: u64,
    pub total_pixel_count: u64,
    /// `100 * different_pixel_count / total_pixel_count`.
    pub difference_percentage: f64,
    pub width: u32,
    pub height: u32,
}

impl DiffStatistics {
    /// Fails with `ZeroArea` rather than reporting a NaN percentage.
    pub fn from_mask(mask: &DifferenceMask) -> Result<Self> {
        let (width, height) = (mask.width(), mask.height());
        let total_pixel_count = u64::from(width) * u64::from(height);
        if total_pixel_count == 0 {
            return Err(ValidationIssue::ZeroArea { width, height }.into());
        }

        let different_pixel_count = mask.different_count();
        Ok(Self {
            different_pixel_count,
            total_pixel_count,
            difference_percentage: different_pixel_count as f64 / total_pixel_count as f64 * 100.0,
            width,
            height,
        })
    }

    pub fn is_identical(&self) -> bool {
        self.different_pixel_count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::difference::{DifferenceMap, Threshold};
    use crate::error::DiffError;
    use image::{Rgb, RgbImage};

    #[test]
    fn quarter_changed_is_twenty_five_percent() {
        let a = RgbImage::from_pixel(2, 2, Rgb([0, 0, 0]));
        let mut b = a.clone();
        b.put_pixel(1, 1, Rgb([255, 255, 255]));

        let mask = DifferenceMap::compute(&a, &b)
            .unwrap()
            .mask(Threshold::from_percent(5.0).unwrap());
        let stats = DiffStatistics::from_mask(&mask).unwrap();

        assert_eq!(stats.different_pixel_count, 1);
        assert_eq!(stats.total_pixel_count, 4);
        assert_eq!(stats.difference_percentage, 25.0);
        assert_eq!((stats.width, stats.height), (2, 2));
        assert!(!stats.is_identical());
    }

    #[test]
    fn empty_mask_is_a_validation_error() {
        let empty = RgbImage::new(0, 0);
        let mask = DifferenceMap::compute(&empty, &empty)
            .unwrap()
            .mask(Threshold::from_percent(5.0).unwrap());

        let err = DiffStatistics::from_mask(&mask).unwrap_err();
        assert!(matches!(
            err,
            DiffError::Validation(ValidationIssue::ZeroArea { width: 0, height: 0 })
        ));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serializes_with_camel_case_names() {
        let stats = DiffStatistics {
            different_pixel_count: 3,
            total_pixel_count: 12,
            difference_percentage: 25.0,
            width: 4,
            height: 3,
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["differentPixelCount"], 3);
        assert_eq!(json["differencePercentage"], 25.0);
    }
}
