//! End-to-end splitting, subdividing and folding with GeoTIFF files on disk.

use std::fs;
use std::path::{Path, PathBuf};

use lodtiles::{
    compare_seam, extract_tile, fold_directory, subdivide_tile, GeoTiffCompression,
    GeoTiffDataset, GeoTiffDriver, GeoTransform, RasterDataset, RasterDriver, RasterSink,
    Samples, SeamAxis, SplitOptions, TileError, TileExtractor, TileSizing, TileSpec,
};

/// Write a single band u16 GeoTIFF where each sample encodes `x * 256 + y`
fn write_source(path: &Path, size: usize) {
    let data: Vec<u16> = (0..size * size)
        .map(|i| ((i % size) * 256 + i / size) as u16)
        .collect();
    let raster = lodtiles::MemoryRaster::from_bands(size, size, vec![Samples::U16(data)]).unwrap();

    let driver = GeoTiffDriver::new().compression(GeoTiffCompression::Lzw);
    let mut sink = driver.create(path, size, size, 1, lodtiles::DataType::U16).unwrap();
    sink.write_window(0, &raster.read_window(0, 0, 0, size, size).unwrap())
        .unwrap();
    sink.set_geo_transform(GeoTransform::north_up(450_000.0, 5_520_000.0, 10.0, -10.0));
    sink.set_projection("EPSG:32633");
    sink.close().unwrap();
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn test_split_shares_overlap_column() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("plzen.tif");
    write_source(&input, 128);

    let source = GeoTiffDataset::open(&input).unwrap();
    let out = dir.path().join("lod0");
    let options = SplitOptions::new(TileSizing::Size(64))
        .with_prefix_from_path(&input)
        .with_output_directory(&out);
    let report = TileExtractor::new(&source, &GeoTiffDriver::new())
        .options(options)
        .run()
        .unwrap();

    assert!(report.is_complete());
    assert_eq!((report.tiles_x, report.tiles_y), (2, 2));
    assert_eq!(
        file_names(&out),
        vec!["plzen_0_0.tif", "plzen_0_1.tif", "plzen_1_0.tif", "plzen_1_1.tif"]
    );

    let left = GeoTiffDataset::open(out.join("plzen_0_0.tif")).unwrap();
    let right = GeoTiffDataset::open(out.join("plzen_1_0.tif")).unwrap();
    let left_edge = left.read_window(0, 63, 0, 1, 64).unwrap();
    let right_edge = right.read_window(0, 0, 0, 1, 64).unwrap();
    assert_eq!(left_edge, right_edge);
    assert_eq!(left_edge.get_f64(0, 0), Some(63.0 * 256.0));

    let seam = compare_seam(&left, &right, SeamAxis::Horizontal, 1).unwrap();
    assert!(seam.is_consistent());

    assert_eq!(right.projection(), "EPSG:32633");
    assert_eq!(right.geo_transform().origin_x, 450_000.0 + 630.0);
    assert_eq!(right.geo_transform().origin_y, 5_520_000.0);
}

#[test]
fn test_subdivide_and_fold_to_next_level() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("plzen_1_2.tif");
    write_source(&input, 64);

    let out = dir.path().join("lod1");
    let options = SplitOptions::new(TileSizing::Count(2)).with_output_directory(&out);
    let folded = subdivide_tile(&input, &GeoTiffDriver::new(), options).unwrap();

    assert_eq!(folded.len(), 4);
    assert_eq!(
        file_names(&out),
        vec!["plzen_2_4.tif", "plzen_2_5.tif", "plzen_3_4.tif", "plzen_3_5.tif"]
    );

    // Quadrant (1, 1) of the parent holds its lower right corner
    let lower_right = GeoTiffDataset::open(out.join("plzen_3_5.tif")).unwrap();
    assert_eq!(lower_right.width(), 32);
    let corner = lower_right.read_window(0, 31, 31, 1, 1).unwrap();
    assert_eq!(corner.get_f64(0, 0), Some(62.0 * 256.0 + 62.0));
}

#[test]
fn test_fold_directory_after_manual_split() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("plzen_1_2.tif");
    write_source(&input, 64);

    let out = dir.path().join("lod1");
    let source = GeoTiffDataset::open(&input).unwrap();
    let options = SplitOptions::new(TileSizing::Count(2))
        .with_prefix_from_path(&input)
        .with_output_directory(&out);
    TileExtractor::new(&source, &GeoTiffDriver::new())
        .options(options)
        .run()
        .unwrap();
    fs::write(out.join("notes.txt"), "not a tile").unwrap();

    let report = fold_directory(&out).unwrap();
    assert_eq!(report.folded.len(), 4);
    assert_eq!(report.skipped, vec![out.join("notes.txt")]);
    assert_eq!(
        file_names(&out),
        vec![
            "notes.txt",
            "plzen_2_4.tif",
            "plzen_2_5.tif",
            "plzen_3_4.tif",
            "plzen_3_5.tif"
        ]
    );
}

#[test]
fn test_unwritable_directory_is_write_failure() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("plzen.tif");
    write_source(&input, 16);
    let source = GeoTiffDataset::open(&input).unwrap();

    let spec = TileSpec {
        column: 0,
        row: 0,
        x_offset: 0,
        y_offset: 0,
        width: 8,
        height: 8,
    };
    let target: PathBuf = dir.path().join("missing").join("plzen_0_0.tif");
    let err = extract_tile(&source, &GeoTiffDriver::new(), &spec, &target).unwrap_err();
    assert!(matches!(err, TileError::WriteFailure { .. }));
    assert!(!err.is_fatal());
    assert!(!target.exists());
}
