//! Building the next pyramid level from one tile.
//!
//! [`subdivide_tile`] cuts a tile named `prefix_C_R.ext` into a 2x2 quadrant grid,
//! written as `prefix_C_R_{0,1}_{0,1}.ext`, then folds each quadrant into its
//! address at the next level:
//!
//! ```text
//! plzen_1_2.tif -> plzen_1_2_0_0.tif -> plzen_2_4.tif
//!                  plzen_1_2_1_0.tif -> plzen_3_4.tif
//!                  plzen_1_2_0_1.tif -> plzen_2_5.tif
//!                  plzen_1_2_1_1.tif -> plzen_3_5.tif
//! ```

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::TileError;
use crate::extract::{SplitOptions, TileExtractor};
use crate::geotiff::{GeoTiffDataset, GeoTiffDriver};
use crate::grid::TileSizing;
use crate::quadtree::{fold_into_parent_address, tile_file_name, SplitTileName};

/// Split the GeoTIFF tile at `path` into quadrants and fold them to the next level.
///
/// Grid sizing and the file name prefix are taken over from the tile itself; overlap,
/// axis policy, output directory, extension and parallelism come from `options`.
/// Returns the folded paths in `(column, row)` order of the quadrants.
///
/// # Errors
/// - [`TileError::PatternMismatch`] if the stem of `path` is not `prefix_C_R`
/// - [`TileError::Read`] if the tile cannot be decoded
/// - [`TileError::InvalidGridConfig`] if the tile does not cut into exactly 2x2
/// - the first per-tile error if a quadrant could not be written
/// - [`TileError::TargetExists`] before anything is written if a next-level tile
///   already exists
/// - [`TileError::Io`] if folding fails
///
/// On any error after writing started, every file written so far is removed.
pub fn subdivide_tile(
    path: &Path,
    driver: &GeoTiffDriver,
    options: SplitOptions,
) -> Result<Vec<PathBuf>, TileError> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| TileError::PatternMismatch(path.display().to_string()))?;
    // The quadrant names must fold, so check the stem before writing anything
    let parent = SplitTileName::parse(&format!("{stem}_0_0"))
        .map_err(|_| TileError::PatternMismatch(path.display().to_string()))?
        .parent;

    let source = GeoTiffDataset::open(path)?;

    let mut options = options.with_prefix(stem);
    options.grid.sizing = TileSizing::Count(2);

    let extractor = TileExtractor::new(&source, driver).options(options.clone());
    let grid = extractor.plan()?;
    if grid.tiles_x != 2 || grid.tiles_y != 2 {
        return Err(TileError::InvalidGridConfig(format!(
            "{} cuts into {}x{} tiles, not quadrants",
            path.display(),
            grid.tiles_x,
            grid.tiles_y
        )));
    }

    let children = parent
        .children()
        .ok_or_else(|| TileError::PatternMismatch(path.display().to_string()))?;
    for child in children {
        let target = options
            .output_directory
            .join(tile_file_name(stem, child, &options.extension));
        if target.exists() {
            return Err(TileError::TargetExists(target));
        }
    }

    let report = extractor.run()?;
    let quadrants: Vec<PathBuf> = report.written.iter().map(|tile| tile.path.clone()).collect();
    if let Some(failure) = report.failed.into_iter().next() {
        discard_all(&quadrants);
        return Err(failure.error);
    }

    let mut folded = Vec::with_capacity(quadrants.len());
    for (i, quadrant) in quadrants.iter().enumerate() {
        match fold_into_parent_address(quadrant) {
            Ok(target) => folded.push(target),
            Err(error) => {
                // Leave no partial level behind
                discard_all(&folded);
                discard_all(&quadrants[i..]);
                return Err(error);
            }
        }
    }

    info!(
        path = %path.display(),
        tile_size = report.tile_size,
        tiles = folded.len(),
        "Subdivided tile"
    );
    Ok(folded)
}

fn discard_all(paths: &[PathBuf]) {
    for path in paths {
        if let Err(e) = std::fs::remove_file(path) {
            warn!(path = %path.display(), error = %e, "Failed to remove tile");
        }
    }
}
