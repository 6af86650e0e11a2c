#![doc = include_str!("../README.md")]
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`grid`]: Overlapping grid planning ([`plan_grid`], [`TileGrid`])
//! - [`geo_transform`]: Affine pixel-to-world transforms and per-tile derivation
//! - [`raster`]: Raster I/O traits ([`RasterDataset`], [`RasterDriver`], [`RasterSink`])
//! - [`extract`]: Batch tile extraction with the [`TileExtractor`] builder
//! - [`quadtree`]: Quadtree addresses and folding of quadrant file names
//! - [`pyramid`]: Subdividing one tile into the next level
//! - [`seam`]: Overlap consistency checks between neighbouring tiles
//! - [`geotiff`]: Pure Rust GeoTIFF reader and writer
//! - [`memory`]: In-memory raster backend

// ============================================================================
// Public modules
// ============================================================================

pub mod casting;
pub mod error;
pub mod extract;
pub mod geo_transform;
pub mod geotiff;
pub mod grid;
pub mod memory;
pub mod pyramid;
pub mod quadtree;
pub mod raster;
pub mod seam;

// ============================================================================
// Errors
// ============================================================================

pub use error::TileError;

// ============================================================================
// Grid Planning
// ============================================================================

pub use grid::{
    plan_grid,
    AxisPolicy,
    GridOptions,
    TileGrid,
    TileSizing,
    TileSpec,
};

pub use geo_transform::{derive_tile_transform, GeoTransform};

// ============================================================================
// Tile Extraction
// ============================================================================
// Primary API: TileExtractor::new(&source, &driver).options(...).run()

pub use extract::{
    extract_tile,
    split_raster,
    CancelToken,
    SplitOptions,
    SplitReport,
    TileExtractor,
    TileFailure,
    TileFile,
};

// ============================================================================
// Quadtree Pyramid
// ============================================================================

pub use quadtree::{
    fold_directory,
    fold_into_parent_address,
    FoldReport,
    QuadAddress,
    SplitTileName,
};

pub use pyramid::subdivide_tile;

pub use seam::{compare_seam, SeamAxis, SeamReport};

// ============================================================================
// Raster Abstraction
// ============================================================================

pub use raster::{
    BandWindow,
    DataType,
    RasterDataset,
    RasterDriver,
    RasterSink,
    Samples,
};

pub use memory::{MemoryDriver, MemoryRaster};

// ============================================================================
// GeoTIFF I/O
// ============================================================================

pub use geotiff::{
    GeoTiffCompression,
    GeoTiffDataset,
    GeoTiffDriver,
    GeoTiffError,
};
