//! Affine geotransform handling.
//!
//! A [`GeoTransform`] holds the six GDAL-ordered coefficients
//! `(origin_x, pixel_width, rot_x, origin_y, rot_y, pixel_height)` mapping pixel
//! `(col, row)` to world coordinates:
//!
//! ```text
//! x = origin_x + col * pixel_width + row * rot_x
//! y = origin_y + col * rot_y       + row * pixel_height
//! ```
//!
//! Cropping a raster never changes pixel size or rotation, only the origin moves.

/// Six-coefficient affine transform from pixel to world space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub pixel_width: f64,
    pub rot_x: f64,
    pub origin_y: f64,
    pub rot_y: f64,
    pub pixel_height: f64,
}

impl Default for GeoTransform {
    /// Identity transform (pixel space with y pointing down)
    fn default() -> Self {
        Self::from_array([0.0, 1.0, 0.0, 0.0, 0.0, 1.0])
    }
}

impl GeoTransform {
    /// Create a north-up transform without rotation
    #[must_use]
    pub fn north_up(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            pixel_width,
            rot_x: 0.0,
            origin_y,
            rot_y: 0.0,
            pixel_height,
        }
    }

    #[must_use]
    pub fn from_array(gt: [f64; 6]) -> Self {
        Self {
            origin_x: gt[0],
            pixel_width: gt[1],
            rot_x: gt[2],
            origin_y: gt[3],
            rot_y: gt[4],
            pixel_height: gt[5],
        }
    }

    #[must_use]
    pub fn to_array(&self) -> [f64; 6] {
        [
            self.origin_x,
            self.pixel_width,
            self.rot_x,
            self.origin_y,
            self.rot_y,
            self.pixel_height,
        ]
    }

    /// Map a pixel position to world coordinates
    #[must_use]
    pub fn pixel_to_world(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.origin_x + col * self.pixel_width + row * self.rot_x,
            self.origin_y + col * self.rot_y + row * self.pixel_height,
        )
    }

    /// Whether the transform has no rotation terms
    #[must_use]
    pub fn is_north_up(&self) -> bool {
        self.rot_x == 0.0 && self.rot_y == 0.0
    }

    /// Build from GeoTIFF `ModelPixelScale` and `ModelTiepoint` tags.
    ///
    /// The tiepoint `(I, J, K, X, Y, Z)` ties raster pixel `(I, J)` to world `(X, Y)`.
    /// GeoTIFF stores the Y scale as a positive number for north-up images, so it is
    /// negated here.
    #[must_use]
    pub fn from_scale_tiepoint(scale: &[f64], tiepoint: &[f64]) -> Option<Self> {
        if scale.len() < 2 || tiepoint.len() < 6 {
            return None;
        }
        let pixel_width = scale[0];
        let pixel_height = -scale[1];
        Some(Self::north_up(
            tiepoint[3] - tiepoint[0] * pixel_width,
            tiepoint[4] - tiepoint[1] * pixel_height,
            pixel_width,
            pixel_height,
        ))
    }

    /// Build from the 16 values of a GeoTIFF `ModelTransformation` matrix
    #[must_use]
    pub fn from_model_transformation(matrix: &[f64]) -> Option<Self> {
        if matrix.len() < 16 {
            return None;
        }
        Some(Self {
            origin_x: matrix[3],
            pixel_width: matrix[0],
            rot_x: matrix[1],
            origin_y: matrix[7],
            rot_y: matrix[4],
            pixel_height: matrix[5],
        })
    }

    /// GeoTIFF `ModelPixelScale` values, `[ScaleX, ScaleY, ScaleZ]`
    #[must_use]
    pub fn model_pixel_scale(&self) -> [f64; 3] {
        [self.pixel_width, -self.pixel_height, 0.0]
    }

    /// GeoTIFF `ModelTiepoint` tying pixel (0, 0) to the origin
    #[must_use]
    pub fn model_tiepoint(&self) -> [f64; 6] {
        [0.0, 0.0, 0.0, self.origin_x, self.origin_y, 0.0]
    }

    /// GeoTIFF `ModelTransformation` matrix, used when the transform is rotated
    #[must_use]
    #[rustfmt::skip]
    pub fn model_transformation(&self) -> [f64; 16] {
        [
            self.pixel_width, self.rot_x, 0.0, self.origin_x,
            self.rot_y, self.pixel_height, 0.0, self.origin_y,
            0.0, 0.0, 0.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ]
    }
}

/// Geotransform of a window cut from `source` at pixel offset `(x_offset, y_offset)`.
///
/// Only the origin shifts; pixel size and rotation terms are copied unchanged.
#[must_use]
pub fn derive_tile_transform(
    source: &GeoTransform,
    x_offset: usize,
    y_offset: usize,
) -> GeoTransform {
    // Raster offsets stay far below 2^53, the conversion is exact
    #[allow(clippy::cast_precision_loss)]
    let (xo, yo) = (x_offset as f64, y_offset as f64);
    GeoTransform {
        origin_x: source.origin_x + xo * source.pixel_width,
        origin_y: source.origin_y + yo * source.pixel_height,
        ..*source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utm_transform() -> GeoTransform {
        GeoTransform::from_array([500_000.0, 26.063, 0.0, 5_520_000.0, 0.0, -26.063])
    }

    #[test]
    fn test_zero_offset_is_identity() {
        let gt = utm_transform();
        assert_eq!(derive_tile_transform(&gt, 0, 0), gt);

        let rotated = GeoTransform::from_array([10.0, 2.0, 0.5, 20.0, 0.25, -2.0]);
        assert_eq!(derive_tile_transform(&rotated, 0, 0), rotated);
    }

    #[test]
    fn test_offset_shifts_origin_only() {
        let gt = GeoTransform::from_array([100.0, 10.0, 0.0, 200.0, 0.0, -5.0]);
        let tile = derive_tile_transform(&gt, 63, 126);

        assert_eq!(tile.origin_x, 100.0 + 63.0 * 10.0);
        assert_eq!(tile.origin_y, 200.0 - 126.0 * 5.0);
        assert_eq!(tile.pixel_width, 10.0);
        assert_eq!(tile.pixel_height, -5.0);
        assert_eq!(tile.rot_x, 0.0);
        assert_eq!(tile.rot_y, 0.0);
    }

    #[test]
    fn test_derived_origin_matches_source_pixel() {
        let gt = utm_transform();
        let tile = derive_tile_transform(&gt, 63, 0);
        let (wx, wy) = gt.pixel_to_world(63.0, 0.0);
        assert_eq!(tile.pixel_to_world(0.0, 0.0), (wx, wy));
    }

    #[test]
    fn test_scale_tiepoint_roundtrip() {
        let gt = utm_transform();
        let back = GeoTransform::from_scale_tiepoint(&gt.model_pixel_scale(), &gt.model_tiepoint())
            .unwrap();
        assert_eq!(back, gt);
    }

    #[test]
    fn test_tiepoint_at_nonzero_pixel() {
        // Pixel (10, 10) sits at world (110, 190) with 1m pixels
        let scale = [1.0, 1.0, 0.0];
        let tiepoint = [10.0, 10.0, 0.0, 110.0, 190.0, 0.0];
        let gt = GeoTransform::from_scale_tiepoint(&scale, &tiepoint).unwrap();
        assert_eq!(gt.origin_x, 100.0);
        assert_eq!(gt.origin_y, 200.0);
    }

    #[test]
    fn test_model_transformation_roundtrip() {
        let rotated = GeoTransform::from_array([10.0, 2.0, 0.5, 20.0, 0.25, -2.0]);
        assert!(!rotated.is_north_up());
        let matrix = rotated.model_transformation();
        let back = GeoTransform::from_model_transformation(&matrix).unwrap();
        assert_eq!(back, rotated);
    }

    #[test]
    fn test_model_transformation_is_row_major() {
        let rotated = GeoTransform::from_array([10.0, 2.0, 0.5, 20.0, 0.25, -2.0]);
        let matrix = rotated.model_transformation();
        assert_eq!(matrix[..4], [2.0, 0.5, 0.0, 10.0]);
        assert_eq!(matrix[4..8], [0.25, -2.0, 0.0, 20.0]);
        assert_eq!(matrix[15], 1.0);
    }

    #[test]
    fn test_short_tag_values_rejected() {
        assert!(GeoTransform::from_scale_tiepoint(&[1.0], &[0.0; 6]).is_none());
        assert!(GeoTransform::from_model_transformation(&[0.0; 8]).is_none());
    }
}
