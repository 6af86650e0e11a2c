use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use lodtiles::{
    compare_seam, fold_directory, fold_into_parent_address, subdivide_tile, AxisPolicy,
    CancelToken, GeoTiffCompression, GeoTiffDataset, GeoTiffDriver, SeamAxis, SplitOptions,
    TileError, TileExtractor, TileSizing,
};

type CliResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

#[derive(Parser, Debug)]
#[command(name = "lodtiles", version, about = "Overlapping raster tiles and quadtree pyramids")]
struct Cli {
    /// Raise log verbosity (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Split a GeoTIFF into overlapping tiles
    Split {
        input: PathBuf,
        #[command(flatten)]
        layout: LayoutArgs,
        /// Tile size in pixels
        #[arg(long, conflicts_with = "row_tiles", required_unless_present = "row_tiles")]
        tile_size: Option<usize>,
        /// Number of tiles per row; tile size becomes width / N
        #[arg(long)]
        row_tiles: Option<usize>,
        /// Output file name prefix (defaults to the input file stem)
        #[arg(long)]
        prefix: Option<String>,
    },
    /// Rename quadrant tiles prefix_A_B_C_D to their next-level address
    Fold {
        /// A tile file or a directory of tiles
        path: PathBuf,
    },
    /// Split one tile into quadrants and fold them into the next level
    Subdivide {
        input: PathBuf,
        #[command(flatten)]
        layout: LayoutArgs,
    },
    /// Check that two neighbouring tiles agree on their shared pixels
    CheckSeam {
        first: PathBuf,
        second: PathBuf,
        #[arg(long, value_enum, default_value_t = AxisArg::Horizontal)]
        axis: AxisArg,
        #[arg(long, default_value_t = 1)]
        overlap: usize,
    },
}

#[derive(Args, Debug)]
struct LayoutArgs {
    /// Pixels shared by neighbouring tiles
    #[arg(long, default_value_t = 1)]
    overlap: usize,

    #[arg(long, default_value = "out")]
    output_dir: PathBuf,

    /// Plan each axis independently instead of requiring a square source
    #[arg(long, default_value_t = false)]
    per_axis: bool,

    #[arg(long, value_enum, default_value_t = CompressionArg::None)]
    compression: CompressionArg,

    /// Write tiles one at a time
    #[arg(long, default_value_t = false)]
    sequential: bool,
}

impl LayoutArgs {
    fn apply(&self, options: SplitOptions) -> SplitOptions {
        let options = options
            .with_overlap(self.overlap)
            .with_output_directory(&self.output_dir)
            .with_axis_policy(if self.per_axis {
                AxisPolicy::PerAxis
            } else {
                AxisPolicy::RequireSquare
            });
        if self.sequential {
            options.sequential()
        } else {
            options
        }
    }

    fn driver(&self) -> GeoTiffDriver {
        GeoTiffDriver::new().compression(self.compression.into())
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CompressionArg {
    None,
    Lzw,
    Deflate,
}

impl From<CompressionArg> for GeoTiffCompression {
    fn from(arg: CompressionArg) -> Self {
        match arg {
            CompressionArg::None => Self::None,
            CompressionArg::Lzw => Self::Lzw,
            CompressionArg::Deflate => Self::Deflate,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum AxisArg {
    /// Second tile is to the right of the first
    Horizontal,
    /// Second tile is below the first
    Vertical,
}

impl From<AxisArg> for SeamAxis {
    fn from(arg: AxisArg) -> Self {
        match arg {
            AxisArg::Horizontal => Self::Horizontal,
            AxisArg::Vertical => Self::Vertical,
        }
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli.command) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            tracing::error!(error = %e, "lodtiles failed");
            ExitCode::FAILURE
        }
    }
}

/// Run one subcommand. `Ok(false)` means it finished with per-item failures.
fn run(command: Command) -> CliResult<bool> {
    match command {
        Command::Split {
            input,
            layout,
            tile_size,
            row_tiles,
            prefix,
        } => {
            let sizing = match (tile_size, row_tiles) {
                (Some(size), _) => TileSizing::Size(size),
                (None, Some(count)) => TileSizing::Count(count),
                (None, None) => return Err("one of --tile-size or --row-tiles is required".into()),
            };
            let cancel = CancelToken::new();
            let handler_token = cancel.clone();
            if let Err(e) = ctrlc::set_handler(move || handler_token.cancel()) {
                warn!(error = %e, "Could not install Ctrl-C handler");
            }
            split(&input, &layout, SplitOptions::new(sizing), prefix, cancel)
        }
        Command::Fold { path } => fold_path(&path),
        Command::Subdivide { input, layout } => {
            let options = layout.apply(SplitOptions::new(TileSizing::Count(2)));
            let folded = subdivide_tile(&input, &layout.driver(), options)?;
            for path in folded {
                println!("{}", path.display());
            }
            Ok(true)
        }
        Command::CheckSeam {
            first,
            second,
            axis,
            overlap,
        } => {
            let a = GeoTiffDataset::open(&first)?;
            let b = GeoTiffDataset::open(&second)?;
            let report = compare_seam(&a, &b, axis.into(), overlap)?;
            println!(
                "{} seam, overlap {}: {} of {} samples per band differ ({:?})",
                report.axis,
                report.overlap,
                report.total_differing(),
                report.samples_per_band,
                report.differing
            );
            Ok(report.is_consistent())
        }
    }
}

/// Split `input` into one tile level; tiles not started before `cancel` fires are skipped.
fn split(
    input: &Path,
    layout: &LayoutArgs,
    options: SplitOptions,
    prefix: Option<String>,
    cancel: CancelToken,
) -> CliResult<bool> {
    let source = GeoTiffDataset::open(input)?;
    let options = layout.apply(options);
    let options = match prefix {
        Some(prefix) => options.with_prefix(prefix),
        None => options.with_prefix_from_path(input),
    };

    let driver = layout.driver();
    let report = TileExtractor::new(&source, &driver)
        .options(options)
        .cancel_token(cancel)
        .run()?;
    for failure in &report.failed {
        warn!(column = failure.column, row = failure.row, error = %failure.error, "Tile failed");
    }
    if !report.skipped.is_empty() {
        warn!(skipped = report.skipped.len(), "Split interrupted");
    }
    println!("{}", report.summary());
    Ok(report.is_complete())
}

/// Fold one tile or every tile in a directory.
///
/// Names that do not match are skipped in both modes; taken targets count as per-item
/// failures.
fn fold_path(path: &Path) -> CliResult<bool> {
    if path.is_dir() {
        let report = fold_directory(path)?;
        println!(
            "{} folded, {} skipped, {} failed",
            report.folded.len(),
            report.skipped.len(),
            report.failed.len()
        );
        return Ok(report.failed.is_empty());
    }

    match fold_into_parent_address(path) {
        Ok(target) => {
            info!(from = %path.display(), to = %target.display(), "Folded tile");
            println!("{}", target.display());
            Ok(true)
        }
        Err(TileError::PatternMismatch(_)) => {
            println!("0 folded, 1 skipped, 0 failed");
            Ok(true)
        }
        Err(error @ TileError::TargetExists(_)) => {
            warn!(path = %path.display(), error = %error, "Failed to fold tile");
            Ok(false)
        }
        Err(error) => Err(error.into()),
    }
}
