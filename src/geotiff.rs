//! GeoTIFF raster backend.
//!
//! [`GeoTiffDataset`] decodes a GeoTIFF into memory and serves pixel windows from it.
//! [`GeoTiffDriver`] writes tiles as GeoTIFFs with pure Rust libraries (no GDAL),
//! including the georeferencing tags:
//!
//! - `ModelPixelScale` + `ModelTiepoint` for north-up transforms, or
//!   `ModelTransformation` when the transform is rotated
//! - a GeoKey directory carrying the EPSG code when the projection is `EPSG:<code>`
//! - otherwise the projection string verbatim in `GeoAsciiParams`, referenced by
//!   `GTCitationGeoKey`
//!
//! Reading reverses this, so a projection descriptor survives a write/read cycle
//! unchanged.
//!
//! # Example
//!
//! ```rust,no_run
//! use lodtiles::extract::{SplitOptions, TileExtractor};
//! use lodtiles::geotiff::{GeoTiffDataset, GeoTiffDriver};
//! use lodtiles::grid::TileSizing;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let source = GeoTiffDataset::open("plzen_elev.tif")?;
//!     let options = SplitOptions::new(TileSizing::Count(2))
//!         .with_prefix_from_path(source.path())
//!         .with_output_directory("out");
//!
//!     let report = TileExtractor::new(&source, &GeoTiffDriver::new())
//!         .options(options)
//!         .run()?;
//!     println!("{}", report.summary());
//!     Ok(())
//! }
//! ```

use std::fs::File;
use std::io::{BufReader, BufWriter, Seek, Write};
use std::path::{Path, PathBuf};

use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::{
    self, Gray16, Gray32, Gray32Float, Gray64Float, Gray8, GrayI16, GrayI32, RGB8, RGBA8,
};
use tiff::encoder::{Compression, TiffEncoder, TiffValue};
use tiff::tags::Tag;
use tracing::debug;

use crate::casting::{epsg_code, u64_to_u32, usize_to_u16, usize_to_u32};
use crate::error::TileError;
use crate::geo_transform::GeoTransform;
use crate::memory::MemoryRaster;
use crate::raster::{BandWindow, DataType, RasterDataset, RasterDriver, RasterSink, Samples};

// GeoTIFF Tag IDs (not in standard tiff crate)
const GEOTIFF_MODELPIXELSCALE: u16 = 33550;
const GEOTIFF_MODELTIEPOINT: u16 = 33922;
const GEOTIFF_MODELTRANSFORMATION: u16 = 34264;
const GEOTIFF_GEOKEYDIRECTORY: u16 = 34735;
const GEOTIFF_GEOASCIIPARAMS: u16 = 34737;

// GeoKey IDs
const GT_MODEL_TYPE_GEO_KEY: u16 = 1024;
const GT_RASTER_TYPE_GEO_KEY: u16 = 1025;
const GT_CITATION_GEO_KEY: u16 = 1026;
const GEOGRAPHIC_TYPE_GEO_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_GEO_KEY: u16 = 3072;

// GeoKey values
const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;
const USER_DEFINED: u16 = 32767;

/// Compression method for written tiles
///
/// Applies to single-band images and 8-bit RGB/RGBA. Other band layouts are written as
/// one raw strip and stay uncompressed whatever is requested here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GeoTiffCompression {
    /// No compression - fastest but largest files
    #[default]
    None,
    /// LZW compression - good balance of speed and size
    Lzw,
    /// Deflate (zlib) compression - better compression, slower
    Deflate,
}

/// Error type for GeoTIFF reading and writing
#[derive(Debug)]
pub enum GeoTiffError {
    /// I/O error during file operations
    Io(std::io::Error),
    /// TIFF encoding or decoding error
    Tiff(String),
    /// Layout or sample format this backend does not handle
    Unsupported(String),
    /// Invalid raster data
    InvalidData(String),
}

impl std::fmt::Display for GeoTiffError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Tiff(e) => write!(f, "TIFF error: {e}"),
            Self::Unsupported(e) => write!(f, "Unsupported GeoTIFF: {e}"),
            Self::InvalidData(e) => write!(f, "Invalid data: {e}"),
        }
    }
}

impl std::error::Error for GeoTiffError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for GeoTiffError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<tiff::TiffError> for GeoTiffError {
    fn from(e: tiff::TiffError) -> Self {
        Self::Tiff(e.to_string())
    }
}

impl From<String> for GeoTiffError {
    fn from(e: String) -> Self {
        Self::InvalidData(e)
    }
}

impl From<GeoTiffError> for TileError {
    fn from(e: GeoTiffError) -> Self {
        Self::Read(e.to_string())
    }
}

// ============================================================================
// Reading
// ============================================================================

/// GeoTIFF decoded into memory
#[derive(Debug, Clone)]
pub struct GeoTiffDataset {
    path: PathBuf,
    raster: MemoryRaster,
}

impl GeoTiffDataset {
    /// Decode a GeoTIFF.
    ///
    /// Supports chunky (interleaved) images with any band count and unsigned,
    /// signed or float samples of 8 to 64 bits.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, is not a TIFF, or uses a layout
    /// this backend does not handle (planar bands, 64-bit integers).
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, GeoTiffError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let mut decoder = Decoder::new(BufReader::new(file))?;

        let (width, height) = decoder.dimensions()?;
        let width = width as usize;
        let height = height as usize;

        let samples_per_pixel = decoder
            .find_tag(Tag::SamplesPerPixel)?
            .map(tiff::decoder::ifd::Value::into_u16)
            .transpose()?
            .unwrap_or(1) as usize;
        let planar = decoder
            .find_tag(Tag::PlanarConfiguration)?
            .map(tiff::decoder::ifd::Value::into_u16)
            .transpose()?
            .unwrap_or(1);
        if planar != 1 {
            return Err(GeoTiffError::Unsupported(
                "planar configuration 2 (separate band planes)".to_string(),
            ));
        }

        let geo_transform = read_geo_transform(&mut decoder)?;
        let projection = read_projection(&mut decoder)?;

        let interleaved = match decoder.read_image()? {
            DecodingResult::U8(v) => Samples::U8(v),
            DecodingResult::U16(v) => Samples::U16(v),
            DecodingResult::I16(v) => Samples::I16(v),
            DecodingResult::U32(v) => Samples::U32(v),
            DecodingResult::I32(v) => Samples::I32(v),
            DecodingResult::F32(v) => Samples::F32(v),
            DecodingResult::F64(v) => Samples::F64(v),
            _ => {
                return Err(GeoTiffError::Unsupported(
                    "sample format (8-bit signed or 64-bit integer)".to_string(),
                ))
            }
        };

        if interleaved.len() != width * height * samples_per_pixel {
            return Err(GeoTiffError::InvalidData(format!(
                "decoded {} samples, expected {width}x{height}x{samples_per_pixel}",
                interleaved.len()
            )));
        }

        let bands = deinterleave(&interleaved, samples_per_pixel);
        let raster = MemoryRaster::from_bands(width, height, bands)
            .map_err(|e| GeoTiffError::InvalidData(e.to_string()))?
            .with_geo_transform(geo_transform)
            .with_projection(projection);

        debug!(
            path = %path.display(),
            width,
            height,
            bands = samples_per_pixel,
            "Opened GeoTIFF"
        );

        Ok(Self {
            path: path.to_path_buf(),
            raster,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RasterDataset for GeoTiffDataset {
    fn width(&self) -> usize {
        self.raster.width()
    }

    fn height(&self) -> usize {
        self.raster.height()
    }

    fn band_count(&self) -> usize {
        self.raster.band_count()
    }

    fn data_type(&self) -> DataType {
        self.raster.data_type()
    }

    fn geo_transform(&self) -> GeoTransform {
        self.raster.geo_transform()
    }

    fn projection(&self) -> String {
        self.raster.projection()
    }

    fn read_window(
        &self,
        band: usize,
        x_offset: usize,
        y_offset: usize,
        width: usize,
        height: usize,
    ) -> Result<BandWindow, TileError> {
        self.raster.read_window(band, x_offset, y_offset, width, height)
    }
}

fn deinterleave(interleaved: &Samples, bands: usize) -> Vec<Samples> {
    fn split<T: Copy>(v: &[T], bands: usize, band: usize) -> Vec<T> {
        v.iter().skip(band).step_by(bands).copied().collect()
    }
    (0..bands)
        .map(|b| match interleaved {
            Samples::U8(v) => Samples::U8(split(v, bands, b)),
            Samples::U16(v) => Samples::U16(split(v, bands, b)),
            Samples::I16(v) => Samples::I16(split(v, bands, b)),
            Samples::U32(v) => Samples::U32(split(v, bands, b)),
            Samples::I32(v) => Samples::I32(split(v, bands, b)),
            Samples::F32(v) => Samples::F32(split(v, bands, b)),
            Samples::F64(v) => Samples::F64(split(v, bands, b)),
        })
        .collect()
}

fn interleave(bands: &[Samples]) -> Samples {
    fn merge<T: Copy>(bands: Vec<&Vec<T>>) -> Vec<T> {
        let len = bands.first().map_or(0, |b| b.len());
        let mut out = Vec::with_capacity(len * bands.len());
        for i in 0..len {
            out.extend(bands.iter().map(|b| b[i]));
        }
        out
    }
    macro_rules! merge_as {
        ($variant:ident) => {
            Samples::$variant(merge(
                bands
                    .iter()
                    .filter_map(|b| match b {
                        Samples::$variant(v) => Some(v),
                        _ => None,
                    })
                    .collect(),
            ))
        };
    }
    match bands.first() {
        Some(Samples::U8(_)) | None => merge_as!(U8),
        Some(Samples::U16(_)) => merge_as!(U16),
        Some(Samples::I16(_)) => merge_as!(I16),
        Some(Samples::U32(_)) => merge_as!(U32),
        Some(Samples::I32(_)) => merge_as!(I32),
        Some(Samples::F32(_)) => merge_as!(F32),
        Some(Samples::F64(_)) => merge_as!(F64),
    }
}

fn read_f64_tag<R: std::io::Read + Seek>(
    decoder: &mut Decoder<R>,
    tag: u16,
) -> Result<Option<Vec<f64>>, GeoTiffError> {
    Ok(decoder
        .find_tag(Tag::from_u16_exhaustive(tag))?
        .map(tiff::decoder::ifd::Value::into_f64_vec)
        .transpose()?)
}

fn read_geo_transform<R: std::io::Read + Seek>(
    decoder: &mut Decoder<R>,
) -> Result<GeoTransform, GeoTiffError> {
    if let Some(matrix) = read_f64_tag(decoder, GEOTIFF_MODELTRANSFORMATION)? {
        if let Some(gt) = GeoTransform::from_model_transformation(&matrix) {
            return Ok(gt);
        }
    }
    let scale = read_f64_tag(decoder, GEOTIFF_MODELPIXELSCALE)?;
    let tiepoint = read_f64_tag(decoder, GEOTIFF_MODELTIEPOINT)?;
    if let (Some(scale), Some(tiepoint)) = (scale, tiepoint) {
        if let Some(gt) = GeoTransform::from_scale_tiepoint(&scale, &tiepoint) {
            return Ok(gt);
        }
    }
    // No georeferencing - use pixel coordinates
    Ok(GeoTransform::default())
}

/// Projection descriptor from the GeoKey directory: `EPSG:<code>` for a coded CRS,
/// otherwise the citation string, otherwise empty.
fn read_projection<R: std::io::Read + Seek>(
    decoder: &mut Decoder<R>,
) -> Result<String, GeoTiffError> {
    let Some(directory) = decoder
        .find_tag(Tag::from_u16_exhaustive(GEOTIFF_GEOKEYDIRECTORY))?
        .map(tiff::decoder::ifd::Value::into_u16_vec)
        .transpose()?
    else {
        return Ok(String::new());
    };
    // Some writers store the params as BYTE rather than ASCII; treat those as absent
    let ascii = decoder
        .find_tag(Tag::from_u16_exhaustive(GEOTIFF_GEOASCIIPARAMS))?
        .and_then(|v| v.into_string().ok())
        .unwrap_or_default();
    Ok(projection_from_geokeys(&directory, &ascii))
}

fn projection_from_geokeys(directory: &[u16], ascii: &str) -> String {
    let mut citation = None;
    for key in directory.get(4..).unwrap_or_default().chunks_exact(4) {
        let (id, location, count, value) = (key[0], key[1], key[2], key[3]);
        match id {
            PROJECTED_CS_TYPE_GEO_KEY | GEOGRAPHIC_TYPE_GEO_KEY
                if location == 0 && value != USER_DEFINED && value != 0 =>
            {
                return format!("EPSG:{value}");
            }
            GT_CITATION_GEO_KEY if location == GEOTIFF_GEOASCIIPARAMS => {
                let start = usize::from(value);
                let end = start + usize::from(count);
                citation = ascii
                    .get(start..end.min(ascii.len()))
                    .map(|s| s.trim_end_matches(['|', '\0']).to_string());
            }
            _ => {}
        }
    }
    citation.unwrap_or_default()
}

// ============================================================================
// Writing
// ============================================================================

/// Georeferencing tags for one output image
struct GeoTags {
    geo_transform: GeoTransform,
    projection: String,
}

impl GeoTags {
    fn write<W: Write + Seek, K: tiff::encoder::TiffKind>(
        &self,
        dir: &mut tiff::encoder::DirectoryEncoder<W, K>,
    ) -> Result<(), GeoTiffError> {
        let gt = &self.geo_transform;
        if gt.is_north_up() {
            let scale = gt.model_pixel_scale();
            dir.write_tag(Tag::Unknown(GEOTIFF_MODELPIXELSCALE), scale.as_slice())?;
            dir.write_tag(Tag::Unknown(GEOTIFF_MODELTIEPOINT), gt.model_tiepoint().as_slice())?;
        } else {
            dir.write_tag(
                Tag::Unknown(GEOTIFF_MODELTRANSFORMATION),
                gt.model_transformation().as_slice(),
            )?;
        }

        let (geokeys, ascii) = build_geokey_directory(&self.projection);
        dir.write_tag(Tag::Unknown(GEOTIFF_GEOKEYDIRECTORY), geokeys.as_slice())?;
        if let Some(ascii) = ascii {
            dir.write_tag(Tag::Unknown(GEOTIFF_GEOASCIIPARAMS), ascii.as_str())?;
        }
        Ok(())
    }
}

/// GeoKey directory for `projection`, plus the `GeoAsciiParams` it references.
///
/// Structure: `[KeyDirectoryVersion, KeyRevision, MinorRevision, NumberOfKeys,
/// KeyID1, TIFFTagLocation1, Count1, Value_Offset1, ...]`, keys sorted by ID.
fn build_geokey_directory(projection: &str) -> (Vec<u16>, Option<String>) {
    let mut keys: Vec<[u16; 4]> = Vec::new();
    let mut ascii = None;

    if let Some(code) = epsg_code(projection) {
        // Without a CRS database, the EPSG geographic range is the best guess
        let is_geographic = (4000..5000).contains(&code);
        keys.push([
            GT_MODEL_TYPE_GEO_KEY,
            0,
            1,
            if is_geographic {
                MODEL_TYPE_GEOGRAPHIC
            } else {
                MODEL_TYPE_PROJECTED
            },
        ]);
        keys.push([GT_RASTER_TYPE_GEO_KEY, 0, 1, RASTER_PIXEL_IS_AREA]);
        if is_geographic {
            keys.push([GEOGRAPHIC_TYPE_GEO_KEY, 0, 1, code]);
        } else {
            keys.push([PROJECTED_CS_TYPE_GEO_KEY, 0, 1, code]);
        }
    } else {
        keys.push([GT_RASTER_TYPE_GEO_KEY, 0, 1, RASTER_PIXEL_IS_AREA]);
        let text = projection.trim_end_matches('|');
        if !text.is_empty() {
            // Count includes the terminating pipe
            if let Ok(count) = usize_to_u16(text.len() + 1) {
                keys.push([GT_CITATION_GEO_KEY, GEOTIFF_GEOASCIIPARAMS, count, 0]);
                ascii = Some(format!("{text}|"));
            }
        }
    }

    let mut directory = vec![1, 1, 0, keys.len() as u16];
    for key in keys {
        directory.extend_from_slice(&key);
    }
    (directory, ascii)
}

/// Driver writing GeoTIFF tiles
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoTiffDriver {
    compression: GeoTiffCompression,
}

impl GeoTiffDriver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the compression method
    #[must_use]
    pub fn compression(mut self, compression: GeoTiffCompression) -> Self {
        self.compression = compression;
        self
    }
}

impl RasterDriver for GeoTiffDriver {
    type Sink = GeoTiffSink;

    fn create(
        &self,
        path: &Path,
        width: usize,
        height: usize,
        band_count: usize,
        data_type: DataType,
    ) -> Result<Self::Sink, TileError> {
        if width == 0 || height == 0 || band_count == 0 {
            return Err(TileError::write_failure(path, "raster has zero dimensions"));
        }
        // Create the file now so an unwritable directory fails before any pixels are read
        let file = File::create(path).map_err(|e| TileError::write_failure(path, e))?;
        Ok(GeoTiffSink {
            path: path.to_path_buf(),
            file,
            width,
            height,
            data_type,
            bands: vec![None; band_count],
            tags: GeoTags {
                geo_transform: GeoTransform::default(),
                projection: String::new(),
            },
            compression: self.compression,
        })
    }
}

/// Output GeoTIFF; pixels are buffered and encoded on [`RasterSink::close`]
pub struct GeoTiffSink {
    path: PathBuf,
    file: File,
    width: usize,
    height: usize,
    data_type: DataType,
    bands: Vec<Option<Samples>>,
    tags: GeoTags,
    compression: GeoTiffCompression,
}

impl RasterSink for GeoTiffSink {
    fn write_window(&mut self, band: usize, window: &BandWindow) -> Result<(), TileError> {
        if window.width != self.width || window.height != self.height {
            return Err(TileError::write_failure(
                &self.path,
                format!(
                    "window {}x{} does not match raster {}x{}",
                    window.width, window.height, self.width, self.height
                ),
            ));
        }
        if window.data_type() != self.data_type {
            return Err(TileError::write_failure(
                &self.path,
                format!("expected {:?} samples, got {:?}", self.data_type, window.data_type()),
            ));
        }
        let slot = self
            .bands
            .get_mut(band)
            .ok_or_else(|| {
                TileError::write_failure(&self.path, format!("band {band} out of range"))
            })?;
        *slot = Some(window.samples.clone());
        Ok(())
    }

    fn set_geo_transform(&mut self, geo_transform: GeoTransform) {
        self.tags.geo_transform = geo_transform;
    }

    fn set_projection(&mut self, projection: &str) {
        self.tags.projection = projection.to_string();
    }

    fn close(self) -> Result<(), TileError> {
        let path = self.path.clone();
        self.encode().map_err(|e| TileError::write_failure(&path, e))
    }
}

impl GeoTiffSink {
    fn encode(self) -> Result<(), GeoTiffError> {
        let len = self.width * self.height;
        let bands: Vec<Samples> = self
            .bands
            .into_iter()
            .map(|b| b.unwrap_or_else(|| Samples::zeroed(self.data_type, len)))
            .collect();

        let mut writer = BufWriter::new(self.file);
        let image = EncodedImage {
            width: usize_to_u32(self.width)?,
            height: usize_to_u32(self.height)?,
            data_type: self.data_type,
            band_count: bands.len(),
            pixels: interleave(&bands),
            tags: &self.tags,
            compression: self.compression,
        };
        image.write_to(&mut writer)?;

        let file = writer.into_inner().map_err(|e| GeoTiffError::Io(e.into_error()))?;
        file.sync_all()?;
        Ok(())
    }
}

/// Interleaved pixels plus everything needed to encode them
struct EncodedImage<'a> {
    width: u32,
    height: u32,
    data_type: DataType,
    band_count: usize,
    pixels: Samples,
    tags: &'a GeoTags,
    compression: GeoTiffCompression,
}

impl EncodedImage<'_> {
    fn write_to<W: Write + Seek>(&self, writer: W) -> Result<(), GeoTiffError> {
        if self.pixels.is_empty() {
            return Err(GeoTiffError::InvalidData("Raster has no pixel data".to_string()));
        }

        let compression = match self.compression {
            GeoTiffCompression::None => Compression::Uncompressed,
            GeoTiffCompression::Lzw => Compression::Lzw,
            GeoTiffCompression::Deflate => Compression::Deflate(tiff::encoder::DeflateLevel::Fast),
        };
        let mut encoder = TiffEncoder::new(writer)?.with_compression(compression);

        // Common layouts go through the high-level API, everything else is written
        // as a raw strip with the low-level DirectoryEncoder API
        match (&self.pixels, self.band_count) {
            (Samples::U8(v), 1) => self.write_colortype::<_, Gray8>(&mut encoder, v),
            (Samples::U16(v), 1) => self.write_colortype::<_, Gray16>(&mut encoder, v),
            (Samples::I16(v), 1) => self.write_colortype::<_, GrayI16>(&mut encoder, v),
            (Samples::U32(v), 1) => self.write_colortype::<_, Gray32>(&mut encoder, v),
            (Samples::I32(v), 1) => self.write_colortype::<_, GrayI32>(&mut encoder, v),
            (Samples::F32(v), 1) => self.write_colortype::<_, Gray32Float>(&mut encoder, v),
            (Samples::F64(v), 1) => self.write_colortype::<_, Gray64Float>(&mut encoder, v),
            (Samples::U8(v), 3) => self.write_colortype::<_, RGB8>(&mut encoder, v),
            (Samples::U8(v), 4) => self.write_colortype::<_, RGBA8>(&mut encoder, v),
            _ => {
                if self.compression != GeoTiffCompression::None {
                    debug!(
                        bands = self.band_count,
                        data_type = ?self.data_type,
                        compression = ?self.compression,
                        "Band layout has no compressed encoding, writing uncompressed"
                    );
                }
                self.write_multiband_image(&mut encoder)
            }
        }
    }

    fn write_colortype<W, C>(
        &self,
        encoder: &mut TiffEncoder<W>,
        data: &[C::Inner],
    ) -> Result<(), GeoTiffError>
    where
        W: Write + Seek,
        C: colortype::ColorType,
        [C::Inner]: TiffValue,
    {
        let mut image = encoder.new_image::<C>(self.width, self.height)?;
        self.tags.write(image.encoder())?;
        image.write_data(data)?;
        Ok(())
    }

    /// Write an arbitrary band count as one uncompressed strip.
    fn write_multiband_image<W: Write + Seek>(
        &self,
        encoder: &mut TiffEncoder<W>,
    ) -> Result<(), GeoTiffError> {
        let bands = self.band_count;
        let mut dir = encoder.image_directory()?;

        dir.write_tag(Tag::ImageWidth, self.width)?;
        dir.write_tag(Tag::ImageLength, self.height)?;

        let bits_per_sample: Vec<u16> = vec![self.data_type.bits(); bands];
        dir.write_tag(Tag::BitsPerSample, bits_per_sample.as_slice())?;

        // Raw strip data is never compressed on this path
        dir.write_tag(Tag::Compression, 1u16)?;

        // PhotometricInterpretation: 1 = BlackIsZero (grayscale-like for multi-band)
        dir.write_tag(Tag::PhotometricInterpretation, 1u16)?;
        dir.write_tag(Tag::SamplesPerPixel, usize_to_u16(bands)?)?;

        // SampleFormat: 1 = unsigned, 2 = signed, 3 = IEEE float
        let format = match self.data_type {
            DataType::U8 | DataType::U16 | DataType::U32 => 1u16,
            DataType::I16 | DataType::I32 => 2,
            DataType::F32 | DataType::F64 => 3,
        };
        let sample_format: Vec<u16> = vec![format; bands];
        dir.write_tag(Tag::SampleFormat, sample_format.as_slice())?;

        // PlanarConfiguration: 1 = Chunky (interleaved)
        dir.write_tag(Tag::PlanarConfiguration, 1u16)?;
        dir.write_tag(Tag::RowsPerStrip, self.height)?;

        // ExtraSamples: mark all bands beyond the first as unspecified (0)
        if bands > 1 {
            let extra_samples: Vec<u16> = vec![0; bands - 1];
            dir.write_tag(Tag::ExtraSamples, extra_samples.as_slice())?;
        }

        self.tags.write(&mut dir)?;

        let mut pixel_bytes = Vec::with_capacity(self.pixels.len() * self.data_type.size_bytes());
        self.pixels.extend_ne_bytes(&mut pixel_bytes);

        let strip_offset = u64_to_u32(dir.write_data(pixel_bytes.as_slice())?)?;
        dir.write_tag(Tag::StripOffsets, strip_offset)?;
        dir.write_tag(Tag::StripByteCounts, usize_to_u32(pixel_bytes.len())?)?;

        dir.finish()?;
        Ok(())
    }
}
