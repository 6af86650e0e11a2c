//! Checked integer conversions for TIFF fields.
//!
//! Raster dimensions and offsets are `usize` in memory but TIFF stores them as
//! 16 or 32 bit fields. Conversions that can overflow go through these helpers so a
//! raster too large for classic TIFF fails with a message instead of wrapping.

use std::convert::TryFrom;

/// Convert a `usize` dimension to a `u32` TIFF field.
///
/// # Errors
/// Returns an error string if the value exceeds `u32::MAX`.
#[inline]
pub fn usize_to_u32(value: usize) -> Result<u32, String> {
    u32::try_from(value).map_err(|_| format!("Value {value} exceeds u32 maximum"))
}

/// Convert a `usize` count to a `u16` TIFF field.
///
/// # Errors
/// Returns an error string if the value exceeds `u16::MAX`.
#[inline]
pub fn usize_to_u16(value: usize) -> Result<u16, String> {
    u16::try_from(value).map_err(|_| format!("Value {value} exceeds u16 maximum (65535)"))
}

/// Convert a `u64` file offset to a classic TIFF `u32` offset.
///
/// # Errors
/// Returns an error string if the file grew past 4 GiB.
#[inline]
pub fn u64_to_u32(value: u64) -> Result<u32, String> {
    u32::try_from(value).map_err(|_| {
        format!("File offset {value} exceeds classic TIFF addressable size")
    })
}

/// Parse an `EPSG:<code>` projection descriptor into a GeoKey value.
///
/// Codes above `u16::MAX` cannot be stored as a GeoKey and yield `None`.
#[must_use]
pub fn epsg_code(projection: &str) -> Option<u16> {
    let code = projection.trim().strip_prefix("EPSG:")?;
    if code.is_empty() || !code.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    code.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usize_to_u32() {
        assert_eq!(usize_to_u32(0), Ok(0));
        assert_eq!(usize_to_u32(4096), Ok(4096));
        #[cfg(target_pointer_width = "64")]
        assert!(usize_to_u32(usize::MAX).is_err());
    }

    #[test]
    fn test_usize_to_u16() {
        assert_eq!(usize_to_u16(65535), Ok(65535));
        assert!(usize_to_u16(65536).is_err());
    }

    #[test]
    fn test_u64_to_u32() {
        assert_eq!(u64_to_u32(8), Ok(8));
        assert!(u64_to_u32(u64::from(u32::MAX) + 1).is_err());
    }

    #[test]
    fn test_epsg_code() {
        assert_eq!(epsg_code("EPSG:32633"), Some(32633));
        assert_eq!(epsg_code(" EPSG:4326 "), Some(4326));
        assert_eq!(epsg_code("EPSG:"), None);
        assert_eq!(epsg_code("EPSG:99999"), None);
        assert_eq!(epsg_code("EPSG:-1"), None);
        assert_eq!(epsg_code("PROJCS[\"WGS 84 / UTM zone 33N\"]"), None);
    }
}
