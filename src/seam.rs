//! Overlap consistency between neighbouring tiles.
//!
//! Two tiles cut with overlap `k` share `k` columns (or rows) of source pixels.
//! [`compare_seam`] reads the trailing strip of the first tile and the leading strip
//! of the second and counts samples that differ, per band.

use std::fmt;

use crate::error::TileError;
use crate::raster::RasterDataset;

/// Where the second tile sits relative to the first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeamAxis {
    /// Second tile is the right-hand neighbour; the seam runs along columns
    Horizontal,
    /// Second tile is below; the seam runs along rows
    Vertical,
}

impl fmt::Display for SeamAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Horizontal => write!(f, "horizontal"),
            Self::Vertical => write!(f, "vertical"),
        }
    }
}

/// Result of comparing one seam
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeamReport {
    pub axis: SeamAxis,
    pub overlap: usize,
    /// Samples compared per band
    pub samples_per_band: usize,
    /// Differing samples, one entry per band
    pub differing: Vec<usize>,
}

impl SeamReport {
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.differing.iter().all(|&n| n == 0)
    }

    #[must_use]
    pub fn total_differing(&self) -> usize {
        self.differing.iter().sum()
    }
}

/// Compare the shared strip of two neighbouring tiles.
///
/// NaN samples compare equal to each other.
///
/// # Errors
/// - [`TileError::InvalidGridConfig`] if `overlap` is zero, wider than either tile,
///   or the tiles disagree on band count or seam length
/// - [`TileError::Read`] if a tile cannot be read
pub fn compare_seam<A, B>(
    first: &A,
    second: &B,
    axis: SeamAxis,
    overlap: usize,
) -> Result<SeamReport, TileError>
where
    A: RasterDataset + ?Sized,
    B: RasterDataset + ?Sized,
{
    let invalid = |reason: String| Err(TileError::InvalidGridConfig(reason));

    if first.band_count() != second.band_count() {
        return invalid(format!(
            "band counts differ: {} vs {}",
            first.band_count(),
            second.band_count()
        ));
    }

    // (across, along) extents relative to the seam
    let (first_across, first_along, second_across, second_along) = match axis {
        SeamAxis::Horizontal => (first.width(), first.height(), second.width(), second.height()),
        SeamAxis::Vertical => (first.height(), first.width(), second.height(), second.width()),
    };
    if first_along != second_along {
        return invalid(format!("seam lengths differ: {first_along} vs {second_along}"));
    }
    if overlap == 0 || overlap > first_across || overlap > second_across {
        return invalid(format!(
            "overlap {overlap} does not fit tiles {first_across} and {second_across} wide"
        ));
    }

    let start = first_across - overlap;
    let (first_x, first_y, width, height) = match axis {
        SeamAxis::Horizontal => (start, 0, overlap, first_along),
        SeamAxis::Vertical => (0, start, first_along, overlap),
    };

    let mut differing = Vec::with_capacity(first.band_count());
    for band in 0..first.band_count() {
        let a = first.read_window(band, first_x, first_y, width, height)?;
        let b = second.read_window(band, 0, 0, width, height)?;
        let count = (0..width * height)
            .filter(|&i| !same_sample(a.samples.get_f64(i), b.samples.get_f64(i)))
            .count();
        differing.push(count);
    }

    Ok(SeamReport {
        axis,
        overlap,
        samples_per_band: width * height,
        differing,
    })
}

fn same_sample(a: Option<f64>, b: Option<f64>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a == b || (a.is_nan() && b.is_nan()),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryRaster;
    use crate::raster::{DataType, Samples};

    /// Crop `(x, y, w, h)` out of a 2-band ramp raster
    fn cut(source: &MemoryRaster, x: usize, y: usize, w: usize, h: usize) -> MemoryRaster {
        let bands = (0..source.band_count())
            .map(|b| source.read_window(b, x, y, w, h).unwrap().samples)
            .collect();
        MemoryRaster::from_bands(w, h, bands).unwrap()
    }

    fn ramp() -> MemoryRaster {
        let a: Vec<f32> = (0..16 * 16).map(|i| i as f32).collect();
        let b: Vec<f32> = (0..16 * 16).map(|i| (i * 7 % 13) as f32).collect();
        MemoryRaster::from_bands(16, 16, vec![Samples::F32(a), Samples::F32(b)]).unwrap()
    }

    #[test]
    fn test_horizontal_neighbours_match() {
        let source = ramp();
        let left = cut(&source, 0, 0, 8, 16);
        let right = cut(&source, 7, 0, 9, 16);
        let report = compare_seam(&left, &right, SeamAxis::Horizontal, 1).unwrap();
        assert!(report.is_consistent());
        assert_eq!(report.samples_per_band, 16);
        assert_eq!(report.differing, vec![0, 0]);
    }

    #[test]
    fn test_vertical_neighbours_match() {
        let source = ramp();
        let top = cut(&source, 0, 0, 16, 10);
        let bottom = cut(&source, 0, 7, 16, 9);
        let report = compare_seam(&top, &bottom, SeamAxis::Vertical, 3).unwrap();
        assert!(report.is_consistent());
        assert_eq!(report.samples_per_band, 48);
    }

    #[test]
    fn test_missing_overlap_detected() {
        // Tiles placed edge to edge without a shared column
        let source = ramp();
        let left = cut(&source, 0, 0, 8, 16);
        let right = cut(&source, 8, 0, 8, 16);
        let report = compare_seam(&left, &right, SeamAxis::Horizontal, 1).unwrap();
        assert!(!report.is_consistent());
        assert_eq!(report.differing[0], 16);
        assert!(report.total_differing() >= 16);
    }

    #[test]
    fn test_nan_samples_equal() {
        let left =
            MemoryRaster::from_bands(2, 1, vec![Samples::F64(vec![1.0, f64::NAN])]).unwrap();
        let right =
            MemoryRaster::from_bands(2, 1, vec![Samples::F64(vec![f64::NAN, 2.0])]).unwrap();
        let report = compare_seam(&left, &right, SeamAxis::Horizontal, 1).unwrap();
        assert!(report.is_consistent());
    }

    #[test]
    fn test_invalid_inputs() {
        let a = MemoryRaster::new(4, 4, 1, DataType::U8);
        let taller = MemoryRaster::new(4, 5, 1, DataType::U8);
        let two_bands = MemoryRaster::new(4, 4, 2, DataType::U8);

        for result in [
            compare_seam(&a, &a, SeamAxis::Horizontal, 0),
            compare_seam(&a, &a, SeamAxis::Horizontal, 5),
            compare_seam(&a, &taller, SeamAxis::Horizontal, 1),
            compare_seam(&a, &two_bands, SeamAxis::Vertical, 1),
        ] {
            assert!(matches!(result, Err(TileError::InvalidGridConfig(_))));
        }
        assert!(compare_seam(&a, &taller, SeamAxis::Vertical, 1).is_ok());
    }
}
