//! In-memory raster backend.
//!
//! [`MemoryRaster`] implements [`RasterDataset`] over band buffers held in memory.
//! [`MemoryDriver`] creates rasters into a shared map keyed by path, so the whole
//! tiling pipeline (including publish and fold) can run without touching disk.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::TileError;
use crate::geo_transform::GeoTransform;
use crate::raster::{
    check_window, BandWindow, DataType, RasterDataset, RasterDriver, RasterSink, Samples,
};

/// Raster held fully in memory, one row-major buffer per band
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryRaster {
    width: usize,
    height: usize,
    data_type: DataType,
    bands: Vec<Samples>,
    geo_transform: GeoTransform,
    projection: String,
}

impl MemoryRaster {
    /// Zero-filled raster
    #[must_use]
    pub fn new(width: usize, height: usize, band_count: usize, data_type: DataType) -> Self {
        Self {
            width,
            height,
            data_type,
            bands: (0..band_count)
                .map(|_| Samples::zeroed(data_type, width * height))
                .collect(),
            geo_transform: GeoTransform::default(),
            projection: String::new(),
        }
    }

    /// Build from existing band buffers.
    ///
    /// # Errors
    /// Returns [`TileError::Read`] if there are no bands, a buffer has the wrong length,
    /// or the bands do not share one data type.
    pub fn from_bands(width: usize, height: usize, bands: Vec<Samples>) -> Result<Self, TileError> {
        let Some(first) = bands.first() else {
            return Err(TileError::Read("raster needs at least one band".to_string()));
        };
        let data_type = first.data_type();
        for (i, band) in bands.iter().enumerate() {
            if band.len() != width * height {
                return Err(TileError::Read(format!(
                    "band {i} has {} samples, expected {}",
                    band.len(),
                    width * height
                )));
            }
            if band.data_type() != data_type {
                return Err(TileError::Read(format!(
                    "band {i} is {:?}, expected {data_type:?}",
                    band.data_type()
                )));
            }
        }
        Ok(Self {
            width,
            height,
            data_type,
            bands,
            geo_transform: GeoTransform::default(),
            projection: String::new(),
        })
    }

    #[must_use]
    pub fn with_geo_transform(mut self, geo_transform: GeoTransform) -> Self {
        self.geo_transform = geo_transform;
        self
    }

    #[must_use]
    pub fn with_projection(mut self, projection: impl Into<String>) -> Self {
        self.projection = projection.into();
        self
    }

    /// Full buffer of `band`
    #[must_use]
    pub fn band(&self, band: usize) -> Option<&Samples> {
        self.bands.get(band)
    }
}

impl RasterDataset for MemoryRaster {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn band_count(&self) -> usize {
        self.bands.len()
    }

    fn data_type(&self) -> DataType {
        self.data_type
    }

    fn geo_transform(&self) -> GeoTransform {
        self.geo_transform
    }

    fn projection(&self) -> String {
        self.projection.clone()
    }

    fn read_window(
        &self,
        band: usize,
        x_offset: usize,
        y_offset: usize,
        width: usize,
        height: usize,
    ) -> Result<BandWindow, TileError> {
        check_window(self.width, self.height, x_offset, y_offset, width, height)?;
        let samples = self
            .bands
            .get(band)
            .ok_or_else(|| TileError::Read(format!("band {band} out of range")))?;
        BandWindow::new(width, height, samples.crop(self.width, x_offset, y_offset, width, height))
    }
}

type Store = Arc<Mutex<HashMap<PathBuf, MemoryRaster>>>;

/// Driver writing rasters into a shared in-memory store
#[derive(Debug, Clone, Default)]
pub struct MemoryDriver {
    store: Store,
    /// File name fragments whose creation fails, to exercise per-tile error handling
    fail_patterns: Arc<Mutex<Vec<String>>>,
}

impl MemoryDriver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PathBuf, MemoryRaster>> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every later `create` fail for file names containing `pattern`
    pub fn fail_on(&self, pattern: &str) {
        self.fail_patterns
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(pattern.to_string());
    }

    /// Raster stored at `path`, if any
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<MemoryRaster> {
        self.lock().get(path).cloned()
    }

    /// All stored paths, sorted
    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.lock().keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Store a raster directly
    pub fn insert(&self, path: impl Into<PathBuf>, raster: MemoryRaster) {
        self.lock().insert(path.into(), raster);
    }
}

impl RasterDriver for MemoryDriver {
    type Sink = MemorySink;

    fn create(
        &self,
        path: &Path,
        width: usize,
        height: usize,
        band_count: usize,
        data_type: DataType,
    ) -> Result<Self::Sink, TileError> {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let should_fail = self
            .fail_patterns
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|p| file_name.contains(p.as_str()));
        if should_fail {
            return Err(TileError::write_failure(path, "creation refused"));
        }
        Ok(MemorySink {
            path: path.to_path_buf(),
            raster: MemoryRaster::new(width, height, band_count, data_type),
            store: Arc::clone(&self.store),
        })
    }

    fn prepare_directory(&self, _dir: &Path) -> Result<(), TileError> {
        Ok(())
    }

    fn publish(&self, from: &Path, to: &Path) -> Result<(), TileError> {
        let mut store = self.lock();
        let raster = store
            .remove(from)
            .ok_or_else(|| TileError::write_failure(from, "nothing to publish"))?;
        store.insert(to.to_path_buf(), raster);
        Ok(())
    }

    fn discard(&self, path: &Path) {
        self.lock().remove(path);
    }
}

/// Output raster of [`MemoryDriver`]; visible in the store once closed
#[derive(Debug)]
pub struct MemorySink {
    path: PathBuf,
    raster: MemoryRaster,
    store: Store,
}

impl RasterSink for MemorySink {
    fn write_window(&mut self, band: usize, window: &BandWindow) -> Result<(), TileError> {
        if window.width != self.raster.width || window.height != self.raster.height {
            return Err(TileError::write_failure(
                &self.path,
                format!(
                    "window {}x{} does not match raster {}x{}",
                    window.width, window.height, self.raster.width, self.raster.height
                ),
            ));
        }
        if window.data_type() != self.raster.data_type {
            return Err(TileError::write_failure(
                &self.path,
                format!(
                    "expected {:?} samples, got {:?}",
                    self.raster.data_type,
                    window.data_type()
                ),
            ));
        }
        let slot = self
            .raster
            .bands
            .get_mut(band)
            .ok_or_else(|| {
                TileError::write_failure(&self.path, format!("band {band} out of range"))
            })?;
        *slot = window.samples.clone();
        Ok(())
    }

    fn set_geo_transform(&mut self, geo_transform: GeoTransform) {
        self.raster.geo_transform = geo_transform;
    }

    fn set_projection(&mut self, projection: &str) {
        self.raster.projection = projection.to_string();
    }

    fn close(self) -> Result<(), TileError> {
        self.store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(self.path, self.raster);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(width: usize, height: usize) -> MemoryRaster {
        let data: Vec<u16> = (0..width * height).map(|i| i as u16).collect();
        MemoryRaster::from_bands(width, height, vec![Samples::U16(data)]).unwrap()
    }

    #[test]
    fn test_read_window() {
        let raster = ramp(8, 8);
        let window = raster.read_window(0, 2, 3, 2, 2).unwrap();
        assert_eq!(window.samples, Samples::U16(vec![26, 27, 34, 35]));
    }

    #[test]
    fn test_read_window_out_of_bounds_not_clipped() {
        let raster = ramp(8, 8);
        assert!(matches!(
            raster.read_window(0, 7, 0, 2, 2),
            Err(TileError::WindowOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_read_missing_band() {
        let raster = ramp(4, 4);
        assert!(matches!(raster.read_window(1, 0, 0, 1, 1), Err(TileError::Read(_))));
    }

    #[test]
    fn test_from_bands_validates() {
        assert!(MemoryRaster::from_bands(2, 2, vec![]).is_err());
        assert!(MemoryRaster::from_bands(2, 2, vec![Samples::U8(vec![0; 3])]).is_err());
        let mixed = vec![Samples::U8(vec![0; 4]), Samples::U16(vec![0; 4])];
        assert!(MemoryRaster::from_bands(2, 2, mixed).is_err());
    }

    #[test]
    fn test_sink_visible_only_after_close() {
        let driver = MemoryDriver::new();
        let path = Path::new("out/t_0_0.tif");
        let mut sink = driver.create(path, 2, 2, 1, DataType::U8).unwrap();
        sink.write_window(0, &BandWindow::new(2, 2, Samples::U8(vec![1, 2, 3, 4])).unwrap())
            .unwrap();
        sink.set_projection("EPSG:32633");
        assert!(driver.get(path).is_none());

        sink.close().unwrap();
        let stored = driver.get(path).unwrap();
        assert_eq!(stored.projection(), "EPSG:32633");
        assert_eq!(stored.band(0), Some(&Samples::U8(vec![1, 2, 3, 4])));
    }

    #[test]
    fn test_sink_rejects_mismatched_window() {
        let driver = MemoryDriver::new();
        let mut sink = driver.create(Path::new("a.tif"), 2, 2, 1, DataType::U8).unwrap();
        let wrong_size = BandWindow::new(1, 1, Samples::U8(vec![0])).unwrap();
        assert!(sink.write_window(0, &wrong_size).is_err());
        let wrong_type = BandWindow::new(2, 2, Samples::U16(vec![0; 4])).unwrap();
        assert!(sink.write_window(0, &wrong_type).is_err());
    }

    #[test]
    fn test_publish_moves_entry() {
        let driver = MemoryDriver::new();
        driver.insert("a.tmp", ramp(2, 2));
        driver.publish(Path::new("a.tmp"), Path::new("a.tif")).unwrap();
        assert_eq!(driver.paths(), vec![PathBuf::from("a.tif")]);
        assert!(driver.publish(Path::new("a.tmp"), Path::new("b.tif")).is_err());
    }

    #[test]
    fn test_fail_on() {
        let driver = MemoryDriver::new();
        driver.fail_on("t_1_0");
        assert!(driver.create(Path::new("out/.t_1_0.tif.partial"), 1, 1, 1, DataType::U8).is_err());
        assert!(driver.create(Path::new("out/.t_0_0.tif.partial"), 1, 1, 1, DataType::U8).is_ok());
    }
}
