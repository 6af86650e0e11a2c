//! Error taxonomy for planning, extraction and renaming.
//!
//! Errors fall into three groups:
//!
//! - planning errors ([`TileError::InvalidGridConfig`], [`TileError::NonSquareSource`])
//!   are fatal and always reported before any file is touched
//! - extraction errors: [`TileError::WindowOutOfBounds`] is fatal for a batch, while
//!   [`TileError::WriteFailure`] only fails the tile it belongs to
//! - renaming errors ([`TileError::PatternMismatch`], [`TileError::TargetExists`]) are
//!   non-fatal; directory-wide folding logs them and moves on

use std::path::PathBuf;

/// Error type for tiling operations
#[derive(Debug)]
pub enum TileError {
    /// Tile size, tile count or overlap cannot produce a grid
    InvalidGridConfig(String),
    /// Source raster is not square and the axis policy requires it
    NonSquareSource { width: usize, height: usize },
    /// A pixel window reaches past the source extent
    WindowOutOfBounds {
        x_offset: usize,
        y_offset: usize,
        width: usize,
        height: usize,
        source_width: usize,
        source_height: usize,
    },
    /// An output tile could not be created, written or published
    WriteFailure { path: PathBuf, reason: String },
    /// Filename is not of the form `prefix_A_B_C_D.ext`
    PatternMismatch(String),
    /// Folding would overwrite an existing tile
    TargetExists(PathBuf),
    /// Source raster could not be read
    Read(String),
    /// I/O error outside of tile writing (directory creation, scanning)
    Io(std::io::Error),
}

impl TileError {
    /// Whether this error must stop a whole batch rather than a single tile.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InvalidGridConfig(_)
                | Self::NonSquareSource { .. }
                | Self::WindowOutOfBounds { .. }
                | Self::Read(_)
        )
    }

    pub(crate) fn write_failure(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::WriteFailure {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

impl std::fmt::Display for TileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidGridConfig(e) => write!(f, "Invalid grid configuration: {e}"),
            Self::NonSquareSource { width, height } => {
                write!(f, "Source raster must be square, got {width}x{height}")
            }
            Self::WindowOutOfBounds {
                x_offset,
                y_offset,
                width,
                height,
                source_width,
                source_height,
            } => write!(
                f,
                "Window {width}x{height} at ({x_offset}, {y_offset}) exceeds source extent \
                 {source_width}x{source_height}"
            ),
            Self::WriteFailure { path, reason } => {
                write!(f, "Failed to write {}: {reason}", path.display())
            }
            Self::PatternMismatch(name) => {
                write!(f, "{name} does not match the expected prefix_A_B_C_D pattern")
            }
            Self::TargetExists(path) => write!(f, "Target {} already exists", path.display()),
            Self::Read(e) => write!(f, "Read error: {e}"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for TileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for TileError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}
