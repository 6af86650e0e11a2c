//! Quadtree addressing and tile renaming.
//!
//! Splitting a tile `prefix_A_B` into quadrants names the pieces
//! `prefix_A_B_C_D` with `C, D ∈ {0, 1}`. Folding rewrites each piece to its global
//! address one level down, `prefix_{2A+C}_{2B+D}`, so every level of the pyramid
//! uses plain `(column, row)` names and children and parents are found by
//! arithmetic alone.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::TileError;

/// Tile position within one pyramid level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QuadAddress {
    pub column: u64,
    pub row: u64,
}

impl QuadAddress {
    #[must_use]
    pub const fn new(column: u64, row: u64) -> Self {
        Self { column, row }
    }

    /// Address of quadrant `(quad_column, quad_row)` one level down.
    ///
    /// Returns `None` if a quadrant index is not 0 or 1, or the address overflows.
    #[must_use]
    pub fn child(self, quad_column: u64, quad_row: u64) -> Option<Self> {
        if quad_column > 1 || quad_row > 1 {
            return None;
        }
        Some(Self {
            column: self.column.checked_mul(2)?.checked_add(quad_column)?,
            row: self.row.checked_mul(2)?.checked_add(quad_row)?,
        })
    }

    /// The four children in `(0,0), (1,0), (0,1), (1,1)` order
    #[must_use]
    pub fn children(self) -> Option<[Self; 4]> {
        Some([
            self.child(0, 0)?,
            self.child(1, 0)?,
            self.child(0, 1)?,
            self.child(1, 1)?,
        ])
    }

    /// Address of the enclosing tile one level up
    #[must_use]
    pub const fn parent(self) -> Self {
        Self {
            column: self.column / 2,
            row: self.row / 2,
        }
    }

    /// Position of this tile inside its parent
    #[must_use]
    pub const fn quadrant(self) -> (u64, u64) {
        (self.column % 2, self.row % 2)
    }
}

impl fmt::Display for QuadAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.column, self.row)
    }
}

/// Parsed pre-fold filename `prefix_A_B_C_D.ext`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitTileName {
    pub prefix: String,
    pub parent: QuadAddress,
    pub quad_column: u64,
    pub quad_row: u64,
    /// Extension without the dot, empty if the name has none
    pub extension: String,
}

fn parse_index(token: &str) -> Option<u64> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse().ok()
}

impl SplitTileName {
    /// Parse a bare file name (no directories).
    ///
    /// The prefix is everything before the last four `_`-separated tokens and may
    /// itself contain underscores.
    ///
    /// # Errors
    /// Returns [`TileError::PatternMismatch`] unless the name ends with four decimal
    /// tokens, the last two being 0 or 1, after a non-empty prefix.
    pub fn parse(file_name: &str) -> Result<Self, TileError> {
        let mismatch = || TileError::PatternMismatch(file_name.to_string());

        let (stem, extension) = match file_name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => (stem, ext),
            _ => (file_name, ""),
        };

        let mut tokens = stem.rsplitn(5, '_');
        let quad_row = tokens.next().and_then(parse_index).ok_or_else(mismatch)?;
        let quad_column = tokens.next().and_then(parse_index).ok_or_else(mismatch)?;
        let parent_row = tokens.next().and_then(parse_index).ok_or_else(mismatch)?;
        let parent_column = tokens.next().and_then(parse_index).ok_or_else(mismatch)?;
        let prefix = tokens.next().filter(|p| !p.is_empty()).ok_or_else(mismatch)?;

        if quad_column > 1 || quad_row > 1 {
            return Err(mismatch());
        }

        Ok(Self {
            prefix: prefix.to_string(),
            parent: QuadAddress::new(parent_column, parent_row),
            quad_column,
            quad_row,
            extension: extension.to_string(),
        })
    }

    /// Global address after folding
    ///
    /// # Errors
    /// Returns [`TileError::PatternMismatch`] if the address does not fit in `u64`.
    pub fn folded_address(&self) -> Result<QuadAddress, TileError> {
        self.parent
            .child(self.quad_column, self.quad_row)
            .ok_or_else(|| TileError::PatternMismatch(self.file_name()))
    }

    /// Folded file name `prefix_E_F.ext`
    ///
    /// # Errors
    /// Returns [`TileError::PatternMismatch`] if the address does not fit in `u64`.
    pub fn folded_file_name(&self) -> Result<String, TileError> {
        let address = self.folded_address()?;
        Ok(tile_file_name(&self.prefix, address, &self.extension))
    }

    /// The pre-fold file name
    #[must_use]
    pub fn file_name(&self) -> String {
        let stem = format!(
            "{}_{}_{}_{}_{}",
            self.prefix, self.parent.column, self.parent.row, self.quad_column, self.quad_row
        );
        if self.extension.is_empty() {
            stem
        } else {
            format!("{stem}.{}", self.extension)
        }
    }
}

/// File name of a tile at a stable level, `prefix_column_row.ext`
#[must_use]
pub fn tile_file_name(prefix: &str, address: QuadAddress, extension: &str) -> String {
    if extension.is_empty() {
        format!("{prefix}_{address}")
    } else {
        format!("{prefix}_{address}.{extension}")
    }
}

/// Rename `prefix_A_B_C_D.ext` to `prefix_{2A+C}_{2B+D}.ext` in the same directory.
///
/// Returns the new path. The file is left untouched on any error; a name that does not
/// match is logged and reported as a skip, not a failure.
///
/// # Errors
/// - [`TileError::PatternMismatch`] if the file name does not match
/// - [`TileError::TargetExists`] if the folded name is already taken
/// - [`TileError::Io`] if the rename fails
pub fn fold_into_parent_address(path: &Path) -> Result<PathBuf, TileError> {
    let parsed = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| TileError::PatternMismatch(path.display().to_string()))
        .and_then(SplitTileName::parse)
        .and_then(|name| Ok(path.with_file_name(name.folded_file_name()?)));
    let target = match parsed {
        Ok(target) => target,
        Err(error) => {
            warn!(path = %path.display(), "Skipping file, name does not match prefix_A_B_C_D");
            return Err(error);
        }
    };

    if target.exists() {
        return Err(TileError::TargetExists(target));
    }

    std::fs::rename(path, &target)?;
    debug!(from = %path.display(), to = %target.display(), "Folded tile");
    Ok(target)
}

/// Outcome of folding a directory
#[derive(Debug, Default)]
pub struct FoldReport {
    /// `(old, new)` path pairs
    pub folded: Vec<(PathBuf, PathBuf)>,
    /// Files whose name did not match, left untouched
    pub skipped: Vec<PathBuf>,
    /// Files that matched but could not be renamed
    pub failed: Vec<(PathBuf, TileError)>,
}

/// Fold every matching file directly inside `dir`.
///
/// Non-matching names (including already folded tiles) are logged and skipped.
///
/// # Errors
/// Returns [`TileError::Io`] only if `dir` itself cannot be read.
pub fn fold_directory(dir: &Path) -> Result<FoldReport, TileError> {
    if !dir.is_dir() {
        return Err(TileError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Directory does not exist: {}", dir.display()),
        )));
    }

    // Collect first: renaming while walking would let folded names be revisited
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .collect();
    files.sort();

    let mut report = FoldReport::default();
    for path in files {
        match fold_into_parent_address(&path) {
            Ok(target) => report.folded.push((path, target)),
            Err(TileError::PatternMismatch(_)) => report.skipped.push(path),
            Err(error) => {
                warn!(path = %path.display(), error = %error, "Failed to fold tile");
                report.failed.push((path, error));
            }
        }
    }

    info!(
        folded = report.folded.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        "Folded directory"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_parse_basic() {
        let name = SplitTileName::parse("plzen_1_2_0_1.tif").unwrap();
        assert_eq!(name.prefix, "plzen");
        assert_eq!(name.parent, QuadAddress::new(1, 2));
        assert_eq!((name.quad_column, name.quad_row), (0, 1));
        assert_eq!(name.extension, "tif");
        assert_eq!(name.file_name(), "plzen_1_2_0_1.tif");
    }

    #[test]
    fn test_parse_prefix_with_underscores_and_digits() {
        let name = SplitTileName::parse("plzen_elev_3_1_2_1_0.tif").unwrap();
        assert_eq!(name.prefix, "plzen_elev_3");
        assert_eq!(name.parent, QuadAddress::new(1, 2));
        assert_eq!(name.folded_file_name().unwrap(), "plzen_elev_3_3_4.tif");
    }

    #[test]
    fn test_parse_multi_digit_parent() {
        let name = SplitTileName::parse("dem_12_40_1_1.tiff").unwrap();
        assert_eq!(name.folded_file_name().unwrap(), "dem_25_81.tiff");
    }

    #[test]
    fn test_parse_without_extension() {
        let name = SplitTileName::parse("t_0_0_1_1").unwrap();
        assert_eq!(name.extension, "");
        assert_eq!(name.folded_file_name().unwrap(), "t_1_1");
    }

    #[test]
    fn test_parse_mismatches() {
        for bad in [
            "plzen_3_5.tif",
            "plzen_1_2_0.tif",
            "plzen_1_2_2_0.tif",
            "plzen_1_2_0_x.tif",
            "_1_2_0_1.tif",
            "1_2_0_1.tif",
            "plzen_1_-2_0_1.tif",
            "plzen_1_2_0_+1.tif",
            "plzen_1__0_1.tif",
            "",
        ] {
            assert!(
                matches!(SplitTileName::parse(bad), Err(TileError::PatternMismatch(_))),
                "{bad} should not match"
            );
        }
    }

    #[test]
    fn test_fold_composition_law() {
        for a in 0..8 {
            for b in 0..8 {
                for c in 0..2 {
                    for d in 0..2 {
                        let name = SplitTileName::parse(&format!("t_{a}_{b}_{c}_{d}.tif")).unwrap();
                        let address = name.folded_address().unwrap();
                        assert_eq!(address, QuadAddress::new(2 * a + c, 2 * b + d));
                    }
                }
            }
        }
    }

    #[test]
    fn test_fold_is_injective() {
        let mut seen = HashSet::new();
        for a in 0..16 {
            for b in 0..16 {
                for (c, d) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
                    let address = QuadAddress::new(a, b).child(c, d).unwrap();
                    assert!(seen.insert(address), "{address} produced twice");
                }
            }
        }
        assert_eq!(seen.len(), 16 * 16 * 4);
    }

    #[test]
    fn test_parent_and_quadrant_invert_child() {
        let parent = QuadAddress::new(5, 9);
        for child in parent.children().unwrap() {
            assert_eq!(child.parent(), parent);
        }
        assert_eq!(QuadAddress::new(11, 18).quadrant(), (1, 0));
        assert!(parent.child(2, 0).is_none());
        assert!(QuadAddress::new(u64::MAX, 0).child(0, 0).is_none());
    }

    #[test]
    fn test_fold_renames_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plzen_1_2_1_0.tif");
        std::fs::write(&path, b"tile").unwrap();

        let target = fold_into_parent_address(&path).unwrap();
        assert_eq!(target, dir.path().join("plzen_3_4.tif"));
        assert!(!path.exists());
        assert_eq!(std::fs::read(&target).unwrap(), b"tile");
    }

    #[test]
    fn test_fold_leaves_folded_name_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefix_3_5.tif");
        std::fs::write(&path, b"tile").unwrap();

        let err = fold_into_parent_address(&path).unwrap_err();
        assert!(matches!(err, TileError::PatternMismatch(_)));
        assert!(path.exists());
    }

    #[test]
    fn test_fold_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t_0_0_1_1.tif");
        std::fs::write(&path, b"new").unwrap();
        std::fs::write(dir.path().join("t_1_1.tif"), b"old").unwrap();

        let err = fold_into_parent_address(&path).unwrap_err();
        assert!(matches!(err, TileError::TargetExists(_)));
        assert!(path.exists());
        assert_eq!(std::fs::read(dir.path().join("t_1_1.tif")).unwrap(), b"old");
    }

    #[test]
    fn test_fold_directory_skips_non_matching() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["plzen_1_2_0_0.tif", "plzen_1_2_1_1.tif", "plzen_0_0.tif", "readme.txt"] {
            std::fs::write(dir.path().join(name), name).unwrap();
        }
        std::fs::create_dir(dir.path().join("nested_0_0_1_1")).unwrap();

        let report = fold_directory(dir.path()).unwrap();
        assert_eq!(report.folded.len(), 2);
        assert_eq!(report.skipped.len(), 2);
        assert!(report.failed.is_empty());
        assert!(dir.path().join("plzen_2_4.tif").exists());
        assert!(dir.path().join("plzen_3_5.tif").exists());
        assert!(dir.path().join("plzen_0_0.tif").exists());
        assert!(dir.path().join("nested_0_0_1_1").is_dir());
    }

    #[test]
    fn test_fold_directory_missing() {
        assert!(fold_directory(Path::new("/nonexistent/tiles")).is_err());
    }
}
