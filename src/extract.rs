//! Tile extraction.
//!
//! [`TileExtractor`] plans the grid for a source raster and writes one raster per
//! tile through a [`RasterDriver`]. Tiles are written under a hidden temporary name
//! and renamed to `{prefix}_{column}_{row}.{ext}` only once closed, so an interrupted
//! run never leaves a half-written file under a final tile name.
//!
//! # Example
//!
//! ```rust
//! use lodtiles::extract::{SplitOptions, TileExtractor};
//! use lodtiles::grid::TileSizing;
//! use lodtiles::memory::{MemoryDriver, MemoryRaster};
//! use lodtiles::raster::DataType;
//!
//! let source = MemoryRaster::new(128, 128, 1, DataType::U16);
//! let driver = MemoryDriver::new();
//! let options = SplitOptions::new(TileSizing::Size(64)).with_prefix("plzen");
//!
//! let report = TileExtractor::new(&source, &driver).options(options).run().unwrap();
//! assert_eq!(report.written.len(), 4);
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::error::TileError;
use crate::geo_transform::{derive_tile_transform, GeoTransform};
use crate::grid::{plan_grid, AxisPolicy, GridOptions, TileGrid, TileSizing, TileSpec};
use crate::quadtree::{tile_file_name, QuadAddress};
use crate::raster::{check_window, RasterDataset, RasterDriver, RasterSink};

/// Prefix used when neither an explicit prefix nor a source path is known
pub const DEFAULT_PREFIX: &str = "tile";

/// Extension of written tiles
pub const DEFAULT_EXTENSION: &str = "tif";

/// Options for splitting one raster into a tile level
#[derive(Debug, Clone)]
pub struct SplitOptions {
    pub grid: GridOptions,
    /// Created if absent
    pub output_directory: PathBuf,
    /// `None` falls back to [`DEFAULT_PREFIX`]
    pub filename_prefix: Option<String>,
    pub extension: String,
    /// Extract tiles on the rayon pool
    pub parallel: bool,
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self {
            grid: GridOptions::default(),
            output_directory: PathBuf::from("out"),
            filename_prefix: None,
            extension: DEFAULT_EXTENSION.to_string(),
            parallel: true,
        }
    }
}

impl SplitOptions {
    #[must_use]
    pub fn new(sizing: TileSizing) -> Self {
        Self {
            grid: GridOptions::new(sizing),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_overlap(mut self, overlap: usize) -> Self {
        self.grid.overlap = overlap;
        self
    }

    #[must_use]
    pub fn with_axis_policy(mut self, axis_policy: AxisPolicy) -> Self {
        self.grid.axis_policy = axis_policy;
        self
    }

    #[must_use]
    pub fn with_output_directory<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.output_directory = dir.into();
        self
    }

    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.filename_prefix = Some(prefix.into());
        self
    }

    /// Use the file stem of `path` as prefix unless one was set explicitly
    #[must_use]
    pub fn with_prefix_from_path(mut self, path: &Path) -> Self {
        if self.filename_prefix.is_none() {
            self.filename_prefix = path
                .file_stem()
                .and_then(|s| s.to_str())
                .map(str::to_string);
        }
        self
    }

    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    #[must_use]
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        self.filename_prefix.as_deref().unwrap_or(DEFAULT_PREFIX)
    }

    /// Final path of the tile at `(column, row)`
    #[must_use]
    pub fn tile_path(&self, column: usize, row: usize) -> PathBuf {
        // usize always fits in u64 on supported targets
        let address = QuadAddress::new(column as u64, row as u64);
        self.output_directory
            .join(tile_file_name(self.prefix(), address, &self.extension))
    }
}

/// Temporary name a tile is written under before publishing
fn partial_path(final_path: &Path) -> PathBuf {
    let name = final_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    final_path.with_file_name(format!(".{name}.partial"))
}

/// Cooperative cancellation shared between the caller and a running batch
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop starting new tiles; tiles already in progress finish normally
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// A written tile
#[derive(Debug, Clone, PartialEq)]
pub struct TileFile {
    pub path: PathBuf,
    pub prefix: String,
    pub column: usize,
    pub row: usize,
    pub geo_transform: GeoTransform,
}

/// A tile that could not be written
#[derive(Debug)]
pub struct TileFailure {
    pub column: usize,
    pub row: usize,
    pub error: TileError,
}

enum TileOutcome {
    Written(TileFile),
    Failed(TileFailure),
    Skipped(TileSpec),
}

/// Outcome of a batch split
#[derive(Debug)]
pub struct SplitReport {
    pub tile_size: usize,
    pub tiles_x: usize,
    pub tiles_y: usize,
    /// Tiles whose extraction was started
    pub attempted: usize,
    /// Sorted by `(column, row)`
    pub written: Vec<TileFile>,
    /// Sorted by `(column, row)`
    pub failed: Vec<TileFailure>,
    /// Tiles never started because the batch was cancelled
    pub skipped: Vec<(usize, usize)>,
}

impl SplitReport {
    /// Every planned tile was written
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }

    /// Indices of failed tiles
    #[must_use]
    pub fn failed_indices(&self) -> Vec<(usize, usize)> {
        self.failed.iter().map(|f| (f.column, f.row)).collect()
    }

    /// One-line human readable summary
    #[must_use]
    pub fn summary(&self) -> String {
        let mut line = format!(
            "{} tiles attempted, {} written, {} failed",
            self.attempted,
            self.written.len(),
            self.failed.len()
        );
        if !self.failed.is_empty() {
            let indices: Vec<String> = self
                .failed_indices()
                .iter()
                .map(|(c, r)| format!("({c},{r})"))
                .collect();
            line.push_str(&format!(" {}", indices.join(" ")));
        }
        if !self.skipped.is_empty() {
            line.push_str(&format!(", {} skipped", self.skipped.len()));
        }
        line
    }
}

/// Extract a single tile.
///
/// Reads every band of `spec`'s window from `source`, writes them to a new raster
/// with the derived geotransform and the source projection, then publishes it at
/// `final_path`.
///
/// # Errors
/// - [`TileError::WindowOutOfBounds`] if the window exceeds the source
/// - [`TileError::Read`] if the source cannot be read
/// - [`TileError::WriteFailure`] if the tile cannot be created, written or published
pub fn extract_tile<S, D>(
    source: &S,
    driver: &D,
    spec: &TileSpec,
    final_path: &Path,
) -> Result<TileFile, TileError>
where
    S: RasterDataset + ?Sized,
    D: RasterDriver + ?Sized,
{
    check_window(
        source.width(),
        source.height(),
        spec.x_offset,
        spec.y_offset,
        spec.width,
        spec.height,
    )?;

    let temp_path = partial_path(final_path);
    let geo_transform =
        derive_tile_transform(&source.geo_transform(), spec.x_offset, spec.y_offset);

    let written = (|| {
        // Band 0 decides the sample type of the whole tile
        let mut sink = driver.create(
            &temp_path,
            spec.width,
            spec.height,
            source.band_count(),
            source.data_type(),
        )?;
        for band in 0..source.band_count() {
            let window =
                source.read_window(band, spec.x_offset, spec.y_offset, spec.width, spec.height)?;
            sink.write_window(band, &window)?;
        }
        sink.set_geo_transform(geo_transform);
        sink.set_projection(&source.projection());
        sink.close()?;
        driver.publish(&temp_path, final_path)
    })();

    if let Err(e) = written {
        driver.discard(&temp_path);
        return Err(e);
    }

    let prefix = final_path
        .file_stem()
        .and_then(|s| s.to_str())
        .and_then(|stem| stem.rsplitn(3, '_').nth(2))
        .unwrap_or_default()
        .to_string();

    Ok(TileFile {
        path: final_path.to_path_buf(),
        prefix,
        column: spec.column,
        row: spec.row,
        geo_transform,
    })
}

/// Split `source` into one tile level with default cancellation.
///
/// Shorthand for `TileExtractor::new(source, driver).options(options).run()`.
///
/// # Errors
/// See [`TileExtractor::run`].
pub fn split_raster<S, D>(
    source: &S,
    driver: &D,
    options: SplitOptions,
) -> Result<SplitReport, TileError>
where
    S: RasterDataset + ?Sized,
    D: RasterDriver + ?Sized,
{
    TileExtractor::new(source, driver).options(options).run()
}

/// Builder running a whole split of one source raster
pub struct TileExtractor<'a, S: ?Sized, D: ?Sized> {
    source: &'a S,
    driver: &'a D,
    options: SplitOptions,
    cancel: CancelToken,
}

impl<'a, S, D> TileExtractor<'a, S, D>
where
    S: RasterDataset + ?Sized,
    D: RasterDriver + ?Sized,
{
    #[must_use]
    pub fn new(source: &'a S, driver: &'a D) -> Self {
        Self {
            source,
            driver,
            options: SplitOptions::default(),
            cancel: CancelToken::default(),
        }
    }

    #[must_use]
    pub fn options(mut self, options: SplitOptions) -> Self {
        self.options = options;
        self
    }

    /// Share a cancellation token with the batch
    #[must_use]
    pub fn cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Plan the grid without writing anything
    ///
    /// # Errors
    /// Returns the planner's [`TileError::InvalidGridConfig`] or
    /// [`TileError::NonSquareSource`].
    pub fn plan(&self) -> Result<TileGrid, TileError> {
        plan_grid(self.source.width(), self.source.height(), &self.options.grid)
    }

    /// Plan, then extract every tile.
    ///
    /// Planning errors and out-of-bounds windows abort before anything is written.
    /// A write failure only fails its own tile; the rest of the batch continues.
    ///
    /// # Errors
    /// Returns fatal errors: planning errors, [`TileError::WindowOutOfBounds`],
    /// [`TileError::Read`], or [`TileError::Io`] if the output directory cannot be
    /// created.
    pub fn run(&self) -> Result<SplitReport, TileError> {
        let grid = self.plan()?;
        for spec in &grid.tiles {
            check_window(
                self.source.width(),
                self.source.height(),
                spec.x_offset,
                spec.y_offset,
                spec.width,
                spec.height,
            )?;
        }

        info!(
            width = self.source.width(),
            height = self.source.height(),
            bands = self.source.band_count(),
            tile_size = grid.tile_size,
            overlap = grid.overlap,
            tiles_x = grid.tiles_x,
            tiles_y = grid.tiles_y,
            "Splitting raster"
        );

        self.driver.prepare_directory(&self.options.output_directory)?;

        // A fatal error in one worker stops the others from starting new tiles
        let abort = CancelToken::new();
        let outcomes: Vec<TileOutcome> = if self.options.parallel {
            grid.tiles.par_iter().map(|spec| self.process(spec, &abort)).collect()
        } else {
            grid.tiles.iter().map(|spec| self.process(spec, &abort)).collect()
        };

        let mut report = SplitReport {
            tile_size: grid.tile_size,
            tiles_x: grid.tiles_x,
            tiles_y: grid.tiles_y,
            attempted: 0,
            written: Vec::new(),
            failed: Vec::new(),
            skipped: Vec::new(),
        };
        let mut fatal = None;
        for outcome in outcomes {
            match outcome {
                TileOutcome::Written(tile) => {
                    report.attempted += 1;
                    report.written.push(tile);
                }
                TileOutcome::Failed(failure) if failure.error.is_fatal() => {
                    report.attempted += 1;
                    fatal.get_or_insert(failure.error);
                }
                TileOutcome::Failed(failure) => {
                    report.attempted += 1;
                    report.failed.push(failure);
                }
                TileOutcome::Skipped(spec) => report.skipped.push((spec.column, spec.row)),
            }
        }
        if let Some(error) = fatal {
            return Err(error);
        }

        report.written.sort_by_key(|t| (t.column, t.row));
        report.failed.sort_by_key(|f| (f.column, f.row));

        if report.is_complete() {
            info!(summary = %report.summary(), "Split finished");
        } else {
            warn!(summary = %report.summary(), "Split finished with missing tiles");
        }
        Ok(report)
    }

    fn process(&self, spec: &TileSpec, abort: &CancelToken) -> TileOutcome {
        if self.cancel.is_cancelled() || abort.is_cancelled() {
            return TileOutcome::Skipped(*spec);
        }

        let path = self.options.tile_path(spec.column, spec.row);
        match extract_tile(self.source, self.driver, spec, &path) {
            Ok(tile) => {
                debug!(path = %path.display(), column = spec.column, row = spec.row, "Wrote tile");
                TileOutcome::Written(tile)
            }
            Err(error) => {
                if error.is_fatal() {
                    abort.cancel();
                }
                warn!(column = spec.column, row = spec.row, error = %error, "Failed to write tile");
                TileOutcome::Failed(TileFailure {
                    column: spec.column,
                    row: spec.row,
                    error,
                })
            }
        }
    }
}
