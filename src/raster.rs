//! Raster I/O abstraction.
//!
//! The tiler never talks to a file format directly. Sources implement
//! [`RasterDataset`], outputs are created through a [`RasterDriver`] that hands out
//! [`RasterSink`]s. The crate ships an in-memory implementation
//! ([`crate::memory`]) and a GeoTIFF one ([`crate::geotiff`]).
//!
//! Band indices are 0-based throughout.

use std::path::Path;

use crate::error::TileError;
use crate::geo_transform::GeoTransform;

/// Sample type of a raster band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    U8,
    U16,
    I16,
    U32,
    I32,
    F32,
    F64,
}

impl DataType {
    /// Size of one sample in bytes
    #[must_use]
    pub fn size_bytes(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 | Self::I16 => 2,
            Self::U32 | Self::I32 | Self::F32 => 4,
            Self::F64 => 8,
        }
    }

    #[must_use]
    pub fn bits(self) -> u16 {
        // At most 8 bytes, always fits
        #[allow(clippy::cast_possible_truncation)]
        let bits = (self.size_bytes() * 8) as u16;
        bits
    }
}

/// Typed sample storage for one band window, row-major
#[derive(Debug, Clone, PartialEq)]
pub enum Samples {
    U8(Vec<u8>),
    U16(Vec<u16>),
    I16(Vec<i16>),
    U32(Vec<u32>),
    I32(Vec<i32>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

macro_rules! for_each_samples {
    ($samples:expr, $v:ident => $body:expr) => {
        match $samples {
            Samples::U8($v) => $body,
            Samples::U16($v) => $body,
            Samples::I16($v) => $body,
            Samples::U32($v) => $body,
            Samples::I32($v) => $body,
            Samples::F32($v) => $body,
            Samples::F64($v) => $body,
        }
    };
}

impl Samples {
    /// Zero-filled storage of `len` samples
    #[must_use]
    pub fn zeroed(data_type: DataType, len: usize) -> Self {
        match data_type {
            DataType::U8 => Self::U8(vec![0; len]),
            DataType::U16 => Self::U16(vec![0; len]),
            DataType::I16 => Self::I16(vec![0; len]),
            DataType::U32 => Self::U32(vec![0; len]),
            DataType::I32 => Self::I32(vec![0; len]),
            DataType::F32 => Self::F32(vec![0.0; len]),
            DataType::F64 => Self::F64(vec![0.0; len]),
        }
    }

    #[must_use]
    pub fn data_type(&self) -> DataType {
        match self {
            Self::U8(_) => DataType::U8,
            Self::U16(_) => DataType::U16,
            Self::I16(_) => DataType::I16,
            Self::U32(_) => DataType::U32,
            Self::I32(_) => DataType::I32,
            Self::F32(_) => DataType::F32,
            Self::F64(_) => DataType::F64,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        for_each_samples!(self, v => v.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sample at `index` widened to `f64`, for comparisons and statistics
    #[must_use]
    pub fn get_f64(&self, index: usize) -> Option<f64> {
        match self {
            Self::U8(v) => v.get(index).map(|&x| f64::from(x)),
            Self::U16(v) => v.get(index).map(|&x| f64::from(x)),
            Self::I16(v) => v.get(index).map(|&x| f64::from(x)),
            Self::U32(v) => v.get(index).map(|&x| f64::from(x)),
            Self::I32(v) => v.get(index).map(|&x| f64::from(x)),
            Self::F32(v) => v.get(index).map(|&x| f64::from(x)),
            Self::F64(v) => v.get(index).copied(),
        }
    }

    /// Copy a `width` x `height` window out of a row-major buffer `stride` samples wide.
    ///
    /// The window must lie inside the buffer; callers go through [`check_window`] first.
    #[must_use]
    pub(crate) fn crop(
        &self,
        stride: usize,
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    ) -> Self {
        fn rows<T: Copy>(
            v: &[T],
            stride: usize,
            x: usize,
            y: usize,
            width: usize,
            height: usize,
        ) -> Vec<T> {
            let mut out = Vec::with_capacity(width * height);
            for row in y..y + height {
                let start = row * stride + x;
                out.extend_from_slice(&v[start..start + width]);
            }
            out
        }
        match self {
            Self::U8(v) => Self::U8(rows(v, stride, x, y, width, height)),
            Self::U16(v) => Self::U16(rows(v, stride, x, y, width, height)),
            Self::I16(v) => Self::I16(rows(v, stride, x, y, width, height)),
            Self::U32(v) => Self::U32(rows(v, stride, x, y, width, height)),
            Self::I32(v) => Self::I32(rows(v, stride, x, y, width, height)),
            Self::F32(v) => Self::F32(rows(v, stride, x, y, width, height)),
            Self::F64(v) => Self::F64(rows(v, stride, x, y, width, height)),
        }
    }

    /// Append the samples as native-endian bytes
    pub fn extend_ne_bytes(&self, out: &mut Vec<u8>) {
        for_each_samples!(self, v => out.extend(v.iter().flat_map(|s| s.to_ne_bytes())))
    }
}

/// One band's pixel window
#[derive(Debug, Clone, PartialEq)]
pub struct BandWindow {
    pub width: usize,
    pub height: usize,
    pub samples: Samples,
}

impl BandWindow {
    /// Create a window, checking the sample count against the dimensions.
    ///
    /// # Errors
    /// Returns [`TileError::Read`] if `samples.len() != width * height`.
    pub fn new(width: usize, height: usize, samples: Samples) -> Result<Self, TileError> {
        if samples.len() != width * height {
            return Err(TileError::Read(format!(
                "window {width}x{height} needs {} samples, got {}",
                width * height,
                samples.len()
            )));
        }
        Ok(Self {
            width,
            height,
            samples,
        })
    }

    #[must_use]
    pub fn data_type(&self) -> DataType {
        self.samples.data_type()
    }

    /// Sample at `(x, y)` widened to `f64`
    #[must_use]
    pub fn get_f64(&self, x: usize, y: usize) -> Option<f64> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.samples.get_f64(y * self.width + x)
    }
}

/// Read side of a georeferenced raster
///
/// Implementations must be safe to read from several threads at once; the
/// extractor shares one source across its worker pool.
pub trait RasterDataset: Send + Sync {
    fn width(&self) -> usize;

    fn height(&self) -> usize;

    fn band_count(&self) -> usize;

    /// Sample type of the first band. All bands are assumed to share it.
    fn data_type(&self) -> DataType;

    fn geo_transform(&self) -> GeoTransform;

    /// Opaque projection descriptor (WKT, PROJ string or `EPSG:<code>`)
    fn projection(&self) -> String;

    /// Read a `width` x `height` window of `band` starting at `(x_offset, y_offset)`.
    ///
    /// # Errors
    /// Implementations return [`TileError::WindowOutOfBounds`] for windows outside the
    /// raster instead of clipping them, and [`TileError::Read`] for other failures.
    fn read_window(
        &self,
        band: usize,
        x_offset: usize,
        y_offset: usize,
        width: usize,
        height: usize,
    ) -> Result<BandWindow, TileError>;
}

/// Write side of a single output raster
pub trait RasterSink {
    /// Write the full pixel content of `band`
    ///
    /// # Errors
    /// Returns [`TileError::WriteFailure`] if the window does not match the sink.
    fn write_window(&mut self, band: usize, window: &BandWindow) -> Result<(), TileError>;

    fn set_geo_transform(&mut self, geo_transform: GeoTransform);

    fn set_projection(&mut self, projection: &str);

    /// Flush everything to the backing store. The raster is readable afterwards.
    ///
    /// # Errors
    /// Returns [`TileError::WriteFailure`] if the raster cannot be persisted.
    fn close(self) -> Result<(), TileError>;
}

/// Factory for output rasters plus the filesystem operations the tiler needs
pub trait RasterDriver: Send + Sync {
    type Sink: RasterSink;

    /// Create a new raster at `path`
    ///
    /// # Errors
    /// Returns [`TileError::WriteFailure`] if the raster cannot be created.
    fn create(
        &self,
        path: &Path,
        width: usize,
        height: usize,
        band_count: usize,
        data_type: DataType,
    ) -> Result<Self::Sink, TileError>;

    /// Make sure the output directory exists
    ///
    /// # Errors
    /// Returns [`TileError::Io`] if the directory cannot be created.
    fn prepare_directory(&self, dir: &Path) -> Result<(), TileError> {
        std::fs::create_dir_all(dir)?;
        Ok(())
    }

    /// Move a closed raster from `from` to its final name `to`
    ///
    /// # Errors
    /// Returns [`TileError::WriteFailure`] if the rename fails.
    fn publish(&self, from: &Path, to: &Path) -> Result<(), TileError> {
        std::fs::rename(from, to).map_err(|e| TileError::write_failure(to, e))
    }

    /// Remove a partially written raster
    fn discard(&self, path: &Path) {
        let _ = std::fs::remove_file(path);
    }
}

/// Check a window against the raster extent
///
/// # Errors
/// Returns [`TileError::WindowOutOfBounds`] if the window reaches past either edge.
pub fn check_window(
    source_width: usize,
    source_height: usize,
    x_offset: usize,
    y_offset: usize,
    width: usize,
    height: usize,
) -> Result<(), TileError> {
    let fits_x = x_offset.checked_add(width).is_some_and(|end| end <= source_width);
    let fits_y = y_offset.checked_add(height).is_some_and(|end| end <= source_height);
    if fits_x && fits_y {
        Ok(())
    } else {
        Err(TileError::WindowOutOfBounds {
            x_offset,
            y_offset,
            width,
            height,
            source_width,
            source_height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_type_sizes() {
        assert_eq!(DataType::U8.bits(), 8);
        assert_eq!(DataType::I16.bits(), 16);
        assert_eq!(DataType::F32.bits(), 32);
        assert_eq!(DataType::F64.size_bytes(), 8);
    }

    #[test]
    fn test_crop_row_major() {
        // 4x3 raster with value = y * 10 + x
        let data: Vec<u16> = (0..3).flat_map(|y| (0..4).map(move |x| y * 10 + x)).collect();
        let samples = Samples::U16(data);
        let cropped = samples.crop(4, 1, 1, 2, 2);
        assert_eq!(cropped, Samples::U16(vec![11, 12, 21, 22]));
    }

    #[test]
    fn test_band_window_length_checked() {
        assert!(BandWindow::new(2, 2, Samples::U8(vec![0; 4])).is_ok());
        assert!(BandWindow::new(2, 2, Samples::U8(vec![0; 3])).is_err());
    }

    #[test]
    fn test_band_window_get() {
        let window = BandWindow::new(2, 2, Samples::I16(vec![-1, 2, 3, -4])).unwrap();
        assert_eq!(window.get_f64(1, 1), Some(-4.0));
        assert_eq!(window.get_f64(2, 0), None);
    }

    #[test]
    fn test_check_window() {
        assert!(check_window(128, 128, 63, 63, 64, 64).is_ok());
        assert!(matches!(
            check_window(128, 128, 64, 0, 65, 64),
            Err(TileError::WindowOutOfBounds { .. })
        ));
        assert!(check_window(128, 128, usize::MAX, 0, 2, 1).is_err());
    }

    #[test]
    fn test_ne_bytes_length() {
        let mut bytes = Vec::new();
        Samples::F32(vec![1.0, 2.0]).extend_ne_bytes(&mut bytes);
        assert_eq!(bytes.len(), 8);
        assert_eq!(&bytes[..4], &1.0f32.to_ne_bytes());
    }
}
