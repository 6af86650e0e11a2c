//! Overlapping tile grid planning.
//!
//! Windows along an axis of length `W` are `tile_size` wide and start every
//! `tile_size - overlap` pixels, so neighbours share exactly `overlap` pixel
//! columns (or rows). The number of windows per axis is
//! `floor(1 + (W - tile_size) / (tile_size - overlap))`; trailing pixels that do not
//! fill a whole window are dropped.
//!
//! # Example
//!
//! ```rust
//! use lodtiles::grid::{plan_grid, GridOptions, TileSizing};
//!
//! let grid = plan_grid(128, 128, &GridOptions::new(TileSizing::Size(64))).unwrap();
//! assert_eq!((grid.tiles_x, grid.tiles_y), (2, 2));
//! assert_eq!(grid.tiles[1].y_offset, 63);
//! ```

use crate::error::TileError;

/// How the tile size is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileSizing {
    /// Tile edge length in pixels
    Size(usize),
    /// Tiles per row; edge length becomes `floor(width / n)`
    Count(usize),
}

/// Handling of sources whose width and height differ
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AxisPolicy {
    /// Reject non-square sources with [`TileError::NonSquareSource`]
    #[default]
    RequireSquare,
    /// Apply the tile count formula to each axis on its own
    PerAxis,
}

/// Grid planning options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridOptions {
    pub sizing: TileSizing,
    /// Pixels shared by neighbouring tiles
    pub overlap: usize,
    pub axis_policy: AxisPolicy,
}

impl GridOptions {
    /// Options with the default overlap of one pixel
    #[must_use]
    pub fn new(sizing: TileSizing) -> Self {
        Self {
            sizing,
            overlap: 1,
            axis_policy: AxisPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_overlap(mut self, overlap: usize) -> Self {
        self.overlap = overlap;
        self
    }

    #[must_use]
    pub fn with_axis_policy(mut self, axis_policy: AxisPolicy) -> Self {
        self.axis_policy = axis_policy;
        self
    }
}

impl Default for GridOptions {
    /// Quadrant split (2x2) with one pixel overlap
    fn default() -> Self {
        Self::new(TileSizing::Count(2))
    }
}

/// One planned tile: grid index plus source pixel window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileSpec {
    pub column: usize,
    pub row: usize,
    pub x_offset: usize,
    pub y_offset: usize,
    pub width: usize,
    pub height: usize,
}

impl TileSpec {
    /// Whether the window lies inside a `source_width` x `source_height` raster
    #[must_use]
    pub fn fits_within(&self, source_width: usize, source_height: usize) -> bool {
        self.x_offset
            .checked_add(self.width)
            .is_some_and(|end| end <= source_width)
            && self
                .y_offset
                .checked_add(self.height)
                .is_some_and(|end| end <= source_height)
    }
}

/// Result of planning: grid dimensions and all tile windows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileGrid {
    pub tile_size: usize,
    pub overlap: usize,
    pub tiles_x: usize,
    pub tiles_y: usize,
    /// Column-major: every row of column 0, then column 1, ...
    pub tiles: Vec<TileSpec>,
}

impl TileGrid {
    #[must_use]
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Look up the tile at grid position `(column, row)`
    #[must_use]
    pub fn get(&self, column: usize, row: usize) -> Option<&TileSpec> {
        if column >= self.tiles_x || row >= self.tiles_y {
            return None;
        }
        self.tiles.get(column * self.tiles_y + row)
    }

    /// Pixel offset of index `i` along either axis
    #[must_use]
    pub fn offset(&self, i: usize) -> usize {
        i * (self.tile_size - self.overlap)
    }
}

/// Number of overlapping windows that fit along an axis of `length` pixels.
///
/// # Errors
/// Returns [`TileError::InvalidGridConfig`] if `tile_size <= overlap` or no window fits.
pub fn tiles_along_axis(
    length: usize,
    tile_size: usize,
    overlap: usize,
) -> Result<usize, TileError> {
    if tile_size <= overlap {
        return Err(TileError::InvalidGridConfig(format!(
            "tile size {tile_size} must be larger than overlap {overlap}"
        )));
    }
    if tile_size > length {
        return Err(TileError::InvalidGridConfig(format!(
            "tile size {tile_size} exceeds raster extent {length}, no tile fits"
        )));
    }
    Ok(1 + (length - tile_size) / (tile_size - overlap))
}

/// Resolve the tile edge length for a raster of the given width.
///
/// # Errors
/// Returns [`TileError::InvalidGridConfig`] for a zero size or count, or a count
/// larger than the width.
pub fn resolve_tile_size(sizing: TileSizing, width: usize) -> Result<usize, TileError> {
    match sizing {
        TileSizing::Size(0) => Err(TileError::InvalidGridConfig(
            "tile size must be positive".to_string(),
        )),
        TileSizing::Size(size) => Ok(size),
        TileSizing::Count(0) => Err(TileError::InvalidGridConfig(
            "tile count must be positive".to_string(),
        )),
        TileSizing::Count(count) if count > width => Err(TileError::InvalidGridConfig(format!(
            "{count} tiles per row do not fit into {width} pixels"
        ))),
        TileSizing::Count(count) => Ok(width / count),
    }
}

/// Plan the overlapping tile grid for a `width` x `height` source.
///
/// # Errors
/// - [`TileError::NonSquareSource`] when `width != height` under
///   [`AxisPolicy::RequireSquare`]
/// - [`TileError::InvalidGridConfig`] when the sizing and overlap cannot produce at
///   least one tile on each axis
pub fn plan_grid(
    width: usize,
    height: usize,
    options: &GridOptions,
) -> Result<TileGrid, TileError> {
    if options.axis_policy == AxisPolicy::RequireSquare && width != height {
        return Err(TileError::NonSquareSource { width, height });
    }

    let tile_size = resolve_tile_size(options.sizing, width)?;
    let overlap = options.overlap;
    let tiles_x = tiles_along_axis(width, tile_size, overlap)?;
    let tiles_y = tiles_along_axis(height, tile_size, overlap)?;
    let stride = tile_size - overlap;

    let mut tiles = Vec::with_capacity(tiles_x * tiles_y);
    for column in 0..tiles_x {
        for row in 0..tiles_y {
            tiles.push(TileSpec {
                column,
                row,
                x_offset: column * stride,
                y_offset: row * stride,
                width: tile_size,
                height: tile_size,
            });
        }
    }

    Ok(TileGrid {
        tile_size,
        overlap,
        tiles_x,
        tiles_y,
        tiles,
    })
}
