//! centervec: vectorize line art into centerline SVG paths, and clean up
//! existing centerline documents.
//!
//! # Usage
//!
//! ```text
//! centervec vectorize drawing.png -o drawing.svg --stats stats.json
//! centervec dedupe drawing.svg --threshold 1.5 -o clean.svg
//! centervec reorder clean.svg --mode area-then-proximity --tiers 3
//! ```
//!
//! The SVG goes to `-o` (or next to the input); stdout carries the
//! report, either as a text table or, with `--json`, as JSON.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{debug, info};

use centervec_document::{
    AreaMeasure, AssembleOptions, DedupeOptions, DedupeReport, ReorderOptions, ReorderReport,
    Rgba, SortMode, StyleDefaults, VectorDocument,
};
use centervec_pipeline::{
    BackgroundMode, CurveKind, DownsampleFilter, FillHandling, LineMethod, PipelineDiagnostics,
    Raster, SegmentConfig, SkeletonAlgorithm, SystemClock, VectorizeConfig, VectorizeResult,
};

/// Centerline vectorization for raster line art.
#[derive(Parser)]
#[command(name = "centervec", version)]
struct Cli {
    /// Log pipeline stages (overrides `RUST_LOG` with `debug`).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Trace an image into an SVG of centerline paths.
    Vectorize(VectorizeArgs),
    /// Remove short, identical and overlapping paths from an SVG.
    Dedupe(DedupeArgs),
    /// Reorder the paths of an SVG for drawing.
    Reorder(ReorderArgs),
}

#[derive(Args)]
struct VectorizeArgs {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    image: PathBuf,

    /// Where to write the SVG. Defaults to the image path with `.svg`.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write the full diagnostics record as JSON to this file.
    #[arg(long)]
    stats: Option<PathBuf>,

    /// Print the diagnostics as JSON instead of a text report.
    #[arg(long)]
    json: bool,

    /// Full pipeline config as a JSON string.
    ///
    /// When provided, all other pipeline parameter flags are ignored.
    /// The JSON must be a valid `VectorizeConfig` serialization.
    #[arg(long)]
    config_json: Option<String>,

    /// Background separation.
    #[arg(long, value_enum, default_value_t = Background::Auto)]
    background: Background,

    /// Background color; selects custom background separation.
    #[arg(long, value_name = "HEX")]
    background_color: Option<Rgba>,

    /// Per-channel tolerance around `--background-color`.
    #[arg(long, default_value_t = 30)]
    background_tolerance: u8,

    /// Intensity threshold for the white/black background modes.
    #[arg(long, default_value_t = SegmentConfig::DEFAULT_THRESHOLD)]
    threshold: u8,

    /// Line band estimation.
    #[arg(long, value_enum, default_value_t = Method::Hybrid)]
    method: Method,

    /// Thinnest stroke kept, in pixels.
    #[arg(long, default_value_t = SegmentConfig::DEFAULT_MIN_LINE_WIDTH)]
    min_line_width: u32,

    /// Thickest stroke kept, in pixels.
    #[arg(long, default_value_t = SegmentConfig::DEFAULT_MAX_LINE_WIDTH)]
    max_line_width: u32,

    /// What to do with filled regions.
    #[arg(long, value_enum, default_value_t = Fills::Separate)]
    fills: Fills,

    /// Report this many dominant line colors.
    #[arg(long, value_name = "N")]
    colors: Option<usize>,

    /// Centerline extraction algorithm tried first.
    #[arg(long, value_enum, default_value_t = Algorithm::Ridge)]
    algorithm: Algorithm,

    /// Ridge curvature threshold.
    #[arg(long, default_value_t = VectorizeConfig::DEFAULT_RIDGE_THRESHOLD)]
    ridge_threshold: f64,

    /// Paths shorter than this (pixels) are dropped.
    #[arg(long, default_value_t = VectorizeConfig::DEFAULT_MIN_PATH_LENGTH)]
    min_path_length: f64,

    /// Douglas-Peucker tolerance in pixels.
    #[arg(long, default_value_t = VectorizeConfig::DEFAULT_SIMPLIFY_TOLERANCE)]
    simplify_tolerance: f64,

    /// Emit straight segments only.
    #[arg(long)]
    no_curves: bool,

    /// Curve strength (0-4).
    #[arg(long, default_value_t = VectorizeConfig::DEFAULT_SMOOTHING)]
    smoothing: f64,

    /// Curve family.
    #[arg(long, value_enum, default_value_t = Curve::Cubic)]
    curve: Curve,

    /// Pixel budget before downsampling.
    #[arg(long, default_value_t = VectorizeConfig::DEFAULT_MAX_PIXELS)]
    max_pixels: u64,

    /// Resampling filter used when the image exceeds the pixel budget.
    #[arg(long, value_enum, default_value_t = Filter::Triangle)]
    downsample_filter: Filter,

    /// Stroke each path with the source color under it.
    #[arg(long)]
    preserve_colors: bool,

    /// Stroke width follows the traced line thickness.
    #[arg(long)]
    width_from_distance: bool,

    /// Default stroke color.
    #[arg(long, value_name = "HEX", default_value = "#000000")]
    stroke: Rgba,

    /// Default stroke width.
    #[arg(long, default_value_t = StyleDefaults::DEFAULT_STROKE_WIDTH)]
    stroke_width: f64,

    /// Class added to every path (repeatable).
    #[arg(long = "class")]
    classes: Vec<String>,

    /// Creation timestamp recorded in the document metadata.
    #[arg(long)]
    created: Option<String>,
}

#[derive(Args)]
struct DedupeArgs {
    /// SVG to clean up.
    svg: PathBuf,

    /// Mean separation (canvas units) below which two paths are duplicates.
    #[arg(long, default_value_t = DedupeOptions::DEFAULT_THRESHOLD)]
    threshold: f64,

    /// Worst-case separation allowed, as a multiple of `--threshold`.
    #[arg(long, default_value_t = DedupeOptions::DEFAULT_MAX_DISTANCE_RATIO)]
    max_distance_ratio: f64,

    /// Drop paths shorter than this.
    #[arg(long, default_value_t = 0.0)]
    min_length: f64,

    /// Join open paths whose ends are this close (0 disables).
    #[arg(long, default_value_t = DedupeOptions::DEFAULT_MERGE_DISTANCE)]
    merge_distance: f64,

    /// Skip the identical-path pass.
    #[arg(long)]
    keep_exact: bool,

    /// Where to write the SVG. Defaults to `<name>.dedupe.svg`.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the report as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct ReorderArgs {
    /// SVG to reorder.
    svg: PathBuf,

    /// Sort order.
    #[arg(long, value_enum, default_value_t = Mode::AreaThenProximity)]
    mode: Mode,

    /// Number of area tiers for `area-then-proximity`.
    #[arg(long, default_value_t = ReorderOptions::DEFAULT_AREA_TIERS, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    tiers: usize,

    /// Reverse the final order.
    #[arg(long)]
    reverse: bool,

    /// Keep the existing path ids instead of renumbering.
    #[arg(long)]
    keep_ids: bool,

    /// How path area is measured.
    #[arg(long, value_enum, default_value_t = Measure::Polygon)]
    area_measure: Measure,

    /// Where to write the SVG. Defaults to `<name>.reorder.svg`.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the report as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Background {
    /// Sample the image to decide.
    Auto,
    /// Dark lines on a light background.
    White,
    /// Light lines on a dark background.
    Black,
}

#[derive(Clone, Copy, ValueEnum)]
enum Method {
    /// Gradient edges filled between.
    Edge,
    /// Local contrast against a smoothed background.
    Morphology,
    /// Union of both.
    Hybrid,
}

#[derive(Clone, Copy, ValueEnum)]
enum Fills {
    /// Treat fills like any other foreground.
    Ignore,
    /// Keep fills out of the line mask.
    Separate,
    /// Merge fills into the line mask.
    Include,
}

#[derive(Clone, Copy, ValueEnum)]
enum Algorithm {
    /// Distance-field ridges.
    Ridge,
    /// Topology-preserving thinning.
    Skeleton,
    /// Medial axis.
    MedialAxis,
}

#[derive(Clone, Copy, ValueEnum)]
enum Curve {
    /// Cubic Beziers.
    Cubic,
    /// Quadratic Beziers.
    Quadratic,
}

#[derive(Clone, Copy, ValueEnum)]
enum Filter {
    /// Nearest-neighbor (fastest, blocky).
    Nearest,
    /// Bilinear interpolation.
    Triangle,
    /// Bicubic Catmull-Rom.
    CatmullRom,
    /// Gaussian.
    Gaussian,
    /// Lanczos with 3 lobes (sharpest).
    Lanczos3,
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    /// Largest first.
    AreaDesc,
    /// Smallest first.
    AreaAsc,
    /// Nearest-neighbor tour.
    Proximity,
    /// Area tiers, each toured by proximity.
    AreaThenProximity,
}

#[derive(Clone, Copy, ValueEnum)]
enum Measure {
    /// Area enclosed by the path outline.
    Polygon,
    /// Bounding box area.
    BoundingBox,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut logger = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if cli.verbose {
        logger.filter_level(log::LevelFilter::Debug);
    }
    logger.init();

    let outcome = match &cli.command {
        Command::Vectorize(args) => vectorize(args),
        Command::Dedupe(args) => dedupe(args),
        Command::Reorder(args) => reorder(args),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("{msg}");
            ExitCode::FAILURE
        }
    }
}

// ───────────────────────── vectorize ─────────────────────────

/// Build a [`VectorizeConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored.
fn config_from_args(args: &VectorizeArgs) -> Result<VectorizeConfig, String> {
    if let Some(ref json) = args.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    let background = match (args.background_color, args.background) {
        (Some(color), _) => BackgroundMode::Custom {
            color: [color.r, color.g, color.b],
            tolerance: args.background_tolerance,
        },
        (None, Background::Auto) => BackgroundMode::Auto,
        (None, Background::White) => BackgroundMode::White,
        (None, Background::Black) => BackgroundMode::Black,
    };

    Ok(VectorizeConfig {
        segment: SegmentConfig {
            background,
            threshold: args.threshold,
            method: match args.method {
                Method::Edge => LineMethod::Edge,
                Method::Morphology => LineMethod::Morphology,
                Method::Hybrid => LineMethod::Hybrid,
            },
            min_line_width: args.min_line_width,
            max_line_width: args.max_line_width,
            fill_handling: match args.fills {
                Fills::Ignore => FillHandling::Ignore,
                Fills::Separate => FillHandling::Separate,
                Fills::Include => FillHandling::Include,
            },
            color_clustering: args.colors.is_some(),
            num_colors: args.colors.unwrap_or(SegmentConfig::DEFAULT_NUM_COLORS),
        },
        algorithm: match args.algorithm {
            Algorithm::Ridge => SkeletonAlgorithm::Ridge,
            Algorithm::Skeleton => SkeletonAlgorithm::Skeleton,
            Algorithm::MedialAxis => SkeletonAlgorithm::MedialAxis,
        },
        ridge_threshold: args.ridge_threshold,
        min_path_length: args.min_path_length,
        simplify_tolerance: args.simplify_tolerance,
        bezier_smoothing: !args.no_curves,
        smoothing: args.smoothing,
        curve_kind: match args.curve {
            Curve::Cubic => CurveKind::Cubic,
            Curve::Quadratic => CurveKind::Quadratic,
        },
        max_pixels: args.max_pixels,
        downsample_filter: match args.downsample_filter {
            Filter::Nearest => DownsampleFilter::Nearest,
            Filter::Triangle => DownsampleFilter::Triangle,
            Filter::CatmullRom => DownsampleFilter::CatmullRom,
            Filter::Gaussian => DownsampleFilter::Gaussian,
            Filter::Lanczos3 => DownsampleFilter::Lanczos3,
        },
    })
}

fn vectorize(args: &VectorizeArgs) -> Result<(), String> {
    let config = config_from_args(args)?;

    let image_bytes = std::fs::read(&args.image)
        .map_err(|e| format!("Error reading {}: {e}", args.image.display()))?;
    info!("image: {} ({} bytes)", args.image.display(), image_bytes.len());
    debug!("config: {config:?}");

    let raster = Raster::from_bytes(&image_bytes).map_err(|e| format!("Pipeline error: {e}"))?;
    let (result, diagnostics) =
        centervec_pipeline::process_with_diagnostics(raster.clone(), &config, &SystemClock)
            .map_err(|e| format!("Pipeline error: {e}"))?;

    let parameters = serde_json::to_value(&config)
        .map_err(|e| format!("Error serializing config: {e}"))?;
    let options = AssembleOptions {
        style: StyleDefaults {
            stroke: args.stroke,
            stroke_width: args.stroke_width,
            ..StyleDefaults::default()
        },
        preserve_colors: args.preserve_colors,
        width_from_distance: args.width_from_distance,
        classes: args.classes.clone(),
        created: args.created.clone(),
        parameters: Some(parameters),
    };
    let doc = centervec_document::assemble_result(&result, &options, Some(&raster));

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| args.image.with_extension("svg"));
    write_svg(&output, &doc)?;

    if let Some(ref stats_path) = args.stats {
        let json = serde_json::to_string_pretty(&diagnostics)
            .map_err(|e| format!("Error serializing diagnostics: {e}"))?;
        std::fs::write(stats_path, json)
            .map_err(|e| format!("Error writing stats to {}: {e}", stats_path.display()))?;
        eprintln!("Stats written to {}", stats_path.display());
    }

    if args.json {
        print_json(&diagnostics)?;
    } else {
        print_vectorize_report(&result, &diagnostics);
    }
    Ok(())
}

fn print_vectorize_report(result: &VectorizeResult, diagnostics: &PipelineDiagnostics) {
    println!("{}", diagnostics.report());
    if !result.color_info.colors.is_empty() {
        println!();
        println!("{:<10} {:>10} {:>8}", "Color", "Pixels", "Share");
        println!("{}", "-".repeat(30));
        for sample in &result.color_info.colors {
            println!(
                "{:<10} {:>10} {:>7.1}%",
                sample.hex, sample.count, sample.percentage
            );
        }
    }
}

// ───────────────────────── dedupe ─────────────────────────

fn dedupe(args: &DedupeArgs) -> Result<(), String> {
    let mut doc = read_svg(&args.svg)?;
    let options = DedupeOptions {
        remove_exact: !args.keep_exact,
        min_length: args.min_length,
        threshold: args.threshold,
        max_distance_ratio: args.max_distance_ratio,
        merge_distance: args.merge_distance,
    };
    let report = centervec_document::dedupe(&mut doc, &options);

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| sibling(&args.svg, "dedupe"));
    write_svg(&output, &doc)?;

    if args.json {
        print_json(&report)
    } else {
        print_dedupe_report(&report);
        Ok(())
    }
}

fn print_dedupe_report(report: &DedupeReport) {
    println!("Dedupe\n{}", "=".repeat(40));
    println!("{:<24} {:>8}", "Paths before", report.original_count);
    println!("{:<24} {:>8}", "Short removed", report.short_removed);
    println!("{:<24} {:>8}", "Identical removed", report.exact_removed);
    println!("{:<24} {:>8}", "Overlapping removed", report.near_removed);
    println!("{:<24} {:>8}", "Merged", report.merged_ids.len());
    println!("{:<24} {:>8}", "Paths after", report.remaining_count);
    if !report.removed_ids.is_empty() || !report.merged_ids.is_empty() {
        println!();
    }
    if !report.removed_ids.is_empty() {
        println!("Removed: {}", report.removed_ids.join(", "));
    }
    if !report.merged_ids.is_empty() {
        println!("Merged: {}", report.merged_ids.join(", "));
    }
}

// ───────────────────────── reorder ─────────────────────────

fn reorder(args: &ReorderArgs) -> Result<(), String> {
    let mut doc = read_svg(&args.svg)?;
    let options = ReorderOptions {
        mode: match args.mode {
            Mode::AreaDesc => SortMode::AreaDesc,
            Mode::AreaAsc => SortMode::AreaAsc,
            Mode::Proximity => SortMode::Proximity,
            Mode::AreaThenProximity => SortMode::AreaThenProximity,
        },
        area_tiers: args.tiers,
        reverse: args.reverse,
        renumber_ids: !args.keep_ids,
        area_measure: match args.area_measure {
            Measure::Polygon => AreaMeasure::Polygon,
            Measure::BoundingBox => AreaMeasure::BoundingBox,
        },
    };
    let report = centervec_document::reorder(&mut doc, &options);

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| sibling(&args.svg, "reorder"));
    write_svg(&output, &doc)?;

    if args.json {
        print_json(&report)
    } else {
        print_reorder_report(&report);
        Ok(())
    }
}

fn print_reorder_report(report: &ReorderReport) {
    println!(
        "Reorder ({}, {} paths)\n{}",
        report.mode,
        report.total_paths,
        "=".repeat(60)
    );
    println!(
        "{:>5}  {:<12} {:<12} {:>12} {:>18}",
        "#", "Old id", "New id", "Area", "Centroid"
    );
    println!("{}", "-".repeat(60));
    for entry in &report.paths {
        let centroid = format!("({:.1}, {:.1})", entry.centroid.x, entry.centroid.y);
        println!(
            "{:>5}  {:<12} {:<12} {:>12.1} {:>18}",
            entry.new_index, entry.old_id, entry.new_id, entry.area, centroid
        );
    }
}

// ───────────────────────── shared ─────────────────────────

fn read_svg(path: &Path) -> Result<VectorDocument, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("Error reading {}: {e}", path.display()))?;
    let doc = centervec_document::from_svg(&text)
        .map_err(|e| format!("Error parsing {}: {e}", path.display()))?;
    info!("{}: {} paths", path.display(), doc.len());
    Ok(doc)
}

fn write_svg(path: &Path, doc: &VectorDocument) -> Result<(), String> {
    let svg = centervec_document::to_svg(doc);
    std::fs::write(path, &svg)
        .map_err(|e| format!("Error writing SVG to {}: {e}", path.display()))?;
    eprintln!(
        "SVG written to {} ({} paths, {} bytes)",
        path.display(),
        doc.len(),
        svg.len()
    );
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), String> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| format!("Error serializing report: {e}"))?;
    println!("{json}");
    Ok(())
}

/// `dir/name.svg` -> `dir/name.<tag>.svg`.
fn sibling(path: &Path, tag: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    path.with_file_name(format!("{stem}.{tag}.svg"))
}
