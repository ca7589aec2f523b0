//! Region segmentation: classify raster pixels as background, line, or fill.
//!
//! Segmentation runs in four steps:
//!
//! 1. Background separation ([`BackgroundMode`]) produces a foreground mask.
//! 2. Line band estimation ([`LineMethod`]) splits the foreground into
//!    stroke-like pixels and everything else.
//! 3. Width pruning drops line components whose thickness falls outside
//!    `min_line_width..=max_line_width`.
//! 4. Fill handling ([`FillHandling`]) derives the fill mask.
//!
//! An image without foreground is not an error: [`segment`] returns blank
//! masks tagged with [`SegmentStatus::NoContent`].

use std::fmt;

use imageproc::distance_transform::Norm;
use imageproc::morphology::{close, open};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::distance::distance_field;
use crate::edge;
use crate::mask::{self, Mask};
use crate::raster::Raster;
use crate::types::PipelineError;

/// How the background is told apart from the drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BackgroundMode {
    /// Otsu's global threshold when the histogram is clearly bimodal,
    /// otherwise the corner pixels are taken as the background sample.
    /// Polarity follows the larger class.
    #[default]
    Auto,
    /// Light background: pixels at or below `threshold` are foreground.
    White,
    /// Dark background: pixels above `255 - threshold` are foreground.
    Black,
    /// A caller-supplied background color; pixels whose Chebyshev RGB
    /// distance from it exceeds `tolerance` are foreground.
    Custom {
        /// Background color.
        color: [u8; 3],
        /// Largest per-channel difference still counted as background.
        tolerance: u8,
    },
}

/// How line pixels are separated from filled areas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LineMethod {
    /// Canny edges grown by half the maximum line width, limited to the
    /// foreground.
    Edge,
    /// Foreground minus its opening by the maximum line width, which
    /// removes everything thicker than a stroke.
    Morphology,
    /// Union of both estimates followed by a 3x3 closing.
    #[default]
    Hybrid,
}

/// What to do with foreground that is not part of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FillHandling {
    /// Do not compute a fill mask.
    Ignore,
    /// Report fills separately; they stay out of the line mask.
    #[default]
    Separate,
    /// Merge fills into the line mask.
    Include,
}

impl fmt::Display for BackgroundMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str("auto"),
            Self::White => f.write_str("white"),
            Self::Black => f.write_str("black"),
            Self::Custom { color, tolerance } => write!(
                f,
                "custom(#{:02x}{:02x}{:02x}, {tolerance})",
                color[0], color[1], color[2]
            ),
        }
    }
}

impl fmt::Display for LineMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Edge => f.write_str("edge"),
            Self::Morphology => f.write_str("morphology"),
            Self::Hybrid => f.write_str("hybrid"),
        }
    }
}

/// Segmentation parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    /// Background separation strategy.
    pub background: BackgroundMode,
    /// Intensity threshold for the fixed-polarity modes; also sets the
    /// tolerance (`255 - threshold`) of the corner-sampling fallback.
    pub threshold: u8,
    /// Line band estimation strategy.
    pub method: LineMethod,
    /// Thinnest stroke kept, in pixels.
    pub min_line_width: u32,
    /// Thickest stroke kept, in pixels.
    pub max_line_width: u32,
    /// Fill mask policy.
    pub fill_handling: FillHandling,
    /// Whether to report the dominant line colors.
    pub color_clustering: bool,
    /// How many dominant colors to report.
    pub num_colors: usize,
}

impl SegmentConfig {
    /// Default background threshold.
    pub const DEFAULT_THRESHOLD: u8 = 240;
    /// Default minimum line width.
    pub const DEFAULT_MIN_LINE_WIDTH: u32 = 1;
    /// Default maximum line width.
    pub const DEFAULT_MAX_LINE_WIDTH: u32 = 50;
    /// Default number of reported colors.
    pub const DEFAULT_NUM_COLORS: usize = 5;
    /// Upper bound on reported colors.
    pub const MAX_NUM_COLORS: usize = 64;

    /// Check parameter ranges.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if the width bounds are
    /// empty or inverted, or if `num_colors` is out of range.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.min_line_width == 0 {
            return Err(PipelineError::InvalidConfig(
                "min_line_width must be at least 1".to_string(),
            ));
        }
        if self.min_line_width > self.max_line_width {
            return Err(PipelineError::InvalidConfig(format!(
                "min_line_width ({}) exceeds max_line_width ({})",
                self.min_line_width, self.max_line_width
            )));
        }
        if !(1..=Self::MAX_NUM_COLORS).contains(&self.num_colors) {
            return Err(PipelineError::InvalidConfig(format!(
                "num_colors must be in 1..={}, got {}",
                Self::MAX_NUM_COLORS,
                self.num_colors
            )));
        }
        Ok(())
    }
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            background: BackgroundMode::default(),
            threshold: Self::DEFAULT_THRESHOLD,
            method: LineMethod::default(),
            min_line_width: Self::DEFAULT_MIN_LINE_WIDTH,
            max_line_width: Self::DEFAULT_MAX_LINE_WIDTH,
            fill_handling: FillHandling::default(),
            color_clustering: false,
            num_colors: Self::DEFAULT_NUM_COLORS,
        }
    }
}

/// Whether segmentation found anything to vectorize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SegmentStatus {
    /// At least one foreground pixel.
    Content,
    /// The image is all background; both masks are blank.
    NoContent,
}

/// One dominant color under the line mask.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorSample {
    /// Mean color of the cluster.
    pub rgb: [u8; 3],
    /// `#rrggbb` form of [`rgb`](Self::rgb).
    pub hex: String,
    /// Number of line pixels in the cluster.
    pub count: u64,
    /// Share of all line pixels, in percent.
    pub percentage: f64,
}

/// Colors found under the line mask, most frequent first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColorInfo {
    /// Dominant colors.
    pub colors: Vec<ColorSample>,
    /// Number of line pixels sampled.
    pub count: u64,
}

/// Output of [`segment`].
#[derive(Debug, Clone)]
pub struct Segmentation {
    /// Stroke pixels.
    pub line_mask: Mask,
    /// Filled-area pixels (blank under [`FillHandling::Ignore`]).
    pub fill_mask: Mask,
    /// Dominant line colors (empty unless color clustering was requested).
    pub color_info: ColorInfo,
    /// Whether any foreground was found.
    pub status: SegmentStatus,
}

/// Minimum between-class / total variance ratio for Otsu's split to be
/// trusted.
const BIMODALITY_MIN: f64 = 0.5;

/// The lowest smoothed bin between the two modes may hold at most this
/// fraction of the smaller mode.
const VALLEY_MAX: f64 = 0.5;

/// Half-width of the moving average used for the valley test.
const VALLEY_SMOOTHING: usize = 2;

/// Fill components smaller than this (in pixels) are dropped under
/// [`FillHandling::Separate`].
const MIN_FILL_AREA: u64 = 100;

/// Side of the square sampled at each image corner.
const CORNER_PATCH: u32 = 3;

/// Split a raster into line and fill masks.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if `config` fails validation.
pub fn segment(raster: &Raster, config: &SegmentConfig) -> Result<Segmentation, PipelineError> {
    config.validate()?;
    let dimensions = raster.dimensions();

    let foreground = clean_foreground(&separate_background(raster, config), config.min_line_width);
    if mask::is_blank(&foreground) {
        debug!("segment: no foreground in {dimensions} raster");
        return Ok(Segmentation {
            line_mask: mask::empty(dimensions),
            fill_mask: mask::empty(dimensions),
            color_info: ColorInfo::default(),
            status: SegmentStatus::NoContent,
        });
    }

    let reach = half_width_kernel(config.max_line_width);
    let band = match config.method {
        LineMethod::Edge => edge::edge_band(raster.gray(), &foreground, reach)?,
        LineMethod::Morphology => morphology_band(&foreground, reach)?,
        LineMethod::Hybrid => {
            let combined = mask::union(
                &edge::edge_band(raster.gray(), &foreground, reach)?,
                &morphology_band(&foreground, reach)?,
            )?;
            // The closing may bridge one-pixel gaps into the background.
            mask::intersection(&close(&combined, Norm::LInf, 1), &foreground)?
        }
    };
    let mut line_mask = prune_by_width(&band, config.min_line_width, config.max_line_width);

    let fill_mask = match config.fill_handling {
        FillHandling::Ignore => mask::empty(dimensions),
        FillHandling::Separate => {
            let fill = mask::difference(&foreground, &line_mask)?;
            mask::remove_small_components(&open(&fill, Norm::LInf, 2), MIN_FILL_AREA)
        }
        FillHandling::Include => {
            let fill = mask::difference(&foreground, &line_mask)?;
            line_mask = mask::union(&line_mask, &fill)?;
            fill
        }
    };

    let color_info = if config.color_clustering {
        dominant_colors(raster, &line_mask, config.num_colors)
    } else {
        ColorInfo::default()
    };

    debug!(
        "segment: {} foreground, {} line, {} fill pixels ({} / {})",
        mask::count(&foreground),
        mask::count(&line_mask),
        mask::count(&fill_mask),
        config.background,
        config.method,
    );

    Ok(Segmentation {
        line_mask,
        fill_mask,
        color_info,
        status: SegmentStatus::Content,
    })
}

/// Raw foreground mask for the configured background mode.
#[must_use = "returns the foreground mask"]
pub fn separate_background(raster: &Raster, config: &SegmentConfig) -> Mask {
    let gray = raster.gray();
    let (w, h) = gray.dimensions();
    let luma = |x: u32, y: u32| gray.get_pixel(x, y).0[0];

    match config.background {
        BackgroundMode::White => mask::from_predicate(w, h, |x, y| luma(x, y) <= config.threshold),
        BackgroundMode::Black => {
            let cutoff = u8::MAX - config.threshold;
            mask::from_predicate(w, h, |x, y| luma(x, y) > cutoff)
        }
        BackgroundMode::Custom { color, tolerance } => match raster.rgb() {
            Some(rgb) => mask::from_predicate(w, h, |x, y| {
                chebyshev(rgb.get_pixel(x, y).0, color) > tolerance
            }),
            None => {
                let target = luma_of(color);
                mask::from_predicate(w, h, |x, y| luma(x, y).abs_diff(target) > tolerance)
            }
        },
        BackgroundMode::Auto => {
            let histogram = histogram(gray);
            if let Some(level) = bimodal_split(&histogram) {
                let dark: u64 = histogram[..=usize::from(level)].iter().sum();
                let light: u64 = histogram[usize::from(level) + 1..].iter().sum();
                debug!("segment: otsu level {level} (dark {dark}, light {light})");
                if dark <= light {
                    mask::from_predicate(w, h, |x, y| luma(x, y) <= level)
                } else {
                    mask::from_predicate(w, h, |x, y| luma(x, y) > level)
                }
            } else {
                let background = corner_background(gray);
                let tolerance = u8::MAX - config.threshold;
                debug!("segment: histogram not bimodal, corner background {background}");
                mask::from_predicate(w, h, |x, y| luma(x, y).abs_diff(background) > tolerance)
            }
        }
    }
}

/// Remove speckles thinner than the minimum line width, then close
/// pinholes.
fn clean_foreground(foreground: &Mask, min_line_width: u32) -> Mask {
    let radius = u8::try_from(min_line_width.saturating_sub(1) / 2).unwrap_or(u8::MAX);
    let opened = if radius == 0 {
        foreground.clone()
    } else {
        open(foreground, Norm::LInf, radius)
    };
    close(&opened, Norm::LInf, 1)
}

/// Structuring-element radius that removes regions thicker than
/// `max_line_width`.
fn half_width_kernel(max_line_width: u32) -> u8 {
    u8::try_from((max_line_width / 2).max(1)).unwrap_or(u8::MAX)
}

/// Foreground minus its opening: everything too thin to survive an
/// opening of radius `reach` is a stroke.
fn morphology_band(foreground: &Mask, reach: u8) -> Result<Mask, PipelineError> {
    mask::difference(foreground, &open(foreground, Norm::LInf, reach))
}

/// Drop connected components whose estimated stroke thickness
/// (`2 * max_distance - 1`) is outside `min..=max`.
#[must_use = "returns the pruned mask"]
pub fn prune_by_width(line: &Mask, min_line_width: u32, max_line_width: u32) -> Mask {
    let (labels, n) = mask::label_components(line);
    if n == 0 {
        return line.clone();
    }
    let field = distance_field(line);
    let mut peak = vec![0.0_f64; n as usize + 1];
    for (x, y, label) in labels.enumerate_pixels() {
        let slot = &mut peak[label.0[0] as usize];
        *slot = slot.max(field.get_pixel(x, y).0[0]);
    }
    let (lo, hi) = (f64::from(min_line_width), f64::from(max_line_width));
    mask::retain_components(&labels, |label| {
        let thickness = 2.0f64.mul_add(peak[label as usize], -1.0).round();
        (lo..=hi).contains(&thickness)
    })
}

fn histogram(gray: &image::GrayImage) -> [u64; 256] {
    let mut bins = [0u64; 256];
    for p in gray.pixels() {
        bins[usize::from(p.0[0])] += 1;
    }
    bins
}

/// Otsu's threshold, or `None` when the histogram is not clearly bimodal.
///
/// Two conditions must hold: the between-class variance explains at
/// least [`BIMODALITY_MIN`] of the total variance, and a valley separates
/// the modes on either side of the threshold (see [`has_valley`]). The
/// variance ratio alone accepts a flat histogram.
#[allow(clippy::cast_precision_loss)]
fn bimodal_split(histogram: &[u64; 256]) -> Option<u8> {
    let total: u64 = histogram.iter().sum();
    if total == 0 {
        return None;
    }
    let n = total as f64;
    let mean = histogram
        .iter()
        .enumerate()
        .map(|(i, &c)| i as f64 * c as f64)
        .sum::<f64>()
        / n;
    let variance = histogram
        .iter()
        .enumerate()
        .map(|(i, &c)| (i as f64 - mean).powi(2) * c as f64)
        .sum::<f64>()
        / n;
    if variance <= f64::EPSILON {
        return None;
    }

    let mut best = (0u8, 0.0f64);
    let (mut weight0, mut sum0) = (0.0f64, 0.0f64);
    for (level, &c) in (0u8..=u8::MAX).zip(histogram.iter()) {
        weight0 += c as f64;
        sum0 += f64::from(level) * c as f64;
        let weight1 = n - weight0;
        if weight0 <= 0.0 || weight1 <= 0.0 {
            continue;
        }
        let mean0 = sum0 / weight0;
        let mean1 = mean.mul_add(n, -sum0) / weight1;
        let between = (weight0 / n) * (weight1 / n) * (mean0 - mean1).powi(2);
        if between > best.1 {
            best = (level, between);
        }
    }
    (best.1 / variance >= BIMODALITY_MIN && has_valley(histogram, best.0)).then_some(best.0)
}

/// Whether the smoothed histogram dips to at most [`VALLEY_MAX`] of the
/// smaller mode somewhere between the most populated bin at or below
/// `split` and the most populated bin above it.
#[allow(clippy::cast_precision_loss)]
fn has_valley(histogram: &[u64; 256], split: u8) -> bool {
    let smoothed: Vec<f64> = (0..histogram.len())
        .map(|i| {
            let lo = i.saturating_sub(VALLEY_SMOOTHING);
            let hi = (i + VALLEY_SMOOTHING).min(histogram.len() - 1);
            let sum: u64 = histogram[lo..=hi].iter().sum();
            sum as f64 / (hi - lo + 1) as f64
        })
        .collect();

    // Modes are located on the raw counts; the average would spread a
    // spike across the split.
    let split = usize::from(split);
    let peak = |range: std::ops::Range<usize>| {
        range.fold(None, |best: Option<usize>, i| match best {
            Some(b) if histogram[b] >= histogram[i] => Some(b),
            _ => Some(i),
        })
    };
    let (Some(low_at), Some(high_at)) = (peak(0..split + 1), peak(split + 1..histogram.len()))
    else {
        return false;
    };
    let (low_mode, high_mode) = (smoothed[low_at], smoothed[high_at]);
    if low_mode <= 0.0 || high_mode <= 0.0 {
        return false;
    }
    let valley = smoothed[low_at..=high_at]
        .iter()
        .copied()
        .fold(f64::INFINITY, f64::min);
    valley <= VALLEY_MAX * low_mode.min(high_mode)
}

/// Median intensity of the four corner patches.
fn corner_background(gray: &image::GrayImage) -> u8 {
    let (w, h) = gray.dimensions();
    let pw = CORNER_PATCH.min(w);
    let ph = CORNER_PATCH.min(h);
    let mut samples = Vec::new();
    for (x0, y0) in [(0, 0), (w - pw, 0), (0, h - ph), (w - pw, h - ph)] {
        for y in y0..y0 + ph {
            for x in x0..x0 + pw {
                samples.push(gray.get_pixel(x, y).0[0]);
            }
        }
    }
    samples.sort_unstable();
    samples.get(samples.len() / 2).copied().unwrap_or(u8::MAX)
}

fn chebyshev(a: [u8; 3], b: [u8; 3]) -> u8 {
    a.iter().zip(b).map(|(&p, q)| p.abs_diff(q)).max().unwrap_or(0)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn luma_of(rgb: [u8; 3]) -> u8 {
    let [r, g, b] = rgb.map(f64::from);
    0.114f64
        .mul_add(b, 0.299f64.mul_add(r, 0.587 * g))
        .round()
        .clamp(0.0, 255.0) as u8
}

/// Dominant colors under `line`, by a 3-bit-per-channel histogram.
///
/// Deterministic: bins are ranked by count, ties broken by bin index.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn dominant_colors(raster: &Raster, line: &Mask, num_colors: usize) -> ColorInfo {
    let mut bins = vec![(0u64, [0u64; 3]); 512];
    let mut count = 0u64;
    for (x, y, p) in line.enumerate_pixels() {
        if p.0[0] == 0 {
            continue;
        }
        let rgb = raster
            .rgb()
            .map_or_else(|| [raster.gray().get_pixel(x, y).0[0]; 3], |img| img.get_pixel(x, y).0);
        let index = (usize::from(rgb[0] >> 5) << 6) | (usize::from(rgb[1] >> 5) << 3) | usize::from(rgb[2] >> 5);
        let bin = &mut bins[index];
        bin.0 += 1;
        for (sum, channel) in bin.1.iter_mut().zip(rgb) {
            *sum += u64::from(channel);
        }
        count += 1;
    }

    let mut ranked: Vec<(usize, u64, [u64; 3])> = bins
        .into_iter()
        .enumerate()
        .filter(|(_, (n, _))| *n > 0)
        .map(|(i, (n, sums))| (i, n, sums))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    let colors = ranked
        .into_iter()
        .take(num_colors)
        .map(|(_, n, sums)| {
            // Mean of u8 samples fits in u8.
            let rgb = sums.map(|s| (s / n) as u8);
            ColorSample {
                rgb,
                hex: format!("#{:02x}{:02x}{:02x}", rgb[0], rgb[1], rgb[2]),
                count: n,
                percentage: n as f64 / count as f64 * 100.0,
            }
        })
        .collect();
    ColorInfo { colors, count }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage};

    /// White canvas with a dark horizontal stroke `width` pixels thick
    /// centered on row 50, columns 10..=90.
    fn stroke_raster(width: u32) -> Raster {
        let half = width / 2;
        Raster::from_gray(GrayImage::from_fn(100, 100, |x, y| {
            let on = (10..=90).contains(&x) && (50 - half..=50 + half).contains(&y);
            Luma([if on { 0 } else { 255 }])
        }))
    }

    #[test]
    fn blank_image_reports_no_content() {
        let raster = Raster::from_gray(GrayImage::from_pixel(40, 40, Luma([255])));
        let result = segment(&raster, &SegmentConfig::default()).unwrap();
        assert_eq!(result.status, SegmentStatus::NoContent);
        assert!(mask::is_blank(&result.line_mask));
        assert!(mask::is_blank(&result.fill_mask));
        assert_eq!(result.line_mask.dimensions(), (40, 40));
    }

    #[test]
    fn auto_mode_finds_dark_stroke_on_white() {
        let result = segment(&stroke_raster(3), &SegmentConfig::default()).unwrap();
        assert_eq!(result.status, SegmentStatus::Content);
        assert!(mask::is_on(&result.line_mask, 50, 50));
        assert!(!mask::is_on(&result.line_mask, 50, 40));
        assert_eq!(mask::count(&result.line_mask), 81 * 3);
    }

    #[test]
    fn auto_mode_finds_light_stroke_on_black() {
        let gray = GrayImage::from_fn(60, 60, |x, y| {
            Luma([if (29..=31).contains(&y) && (5..55).contains(&x) { 255 } else { 0 }])
        });
        let result = segment(&Raster::from_gray(gray), &SegmentConfig::default()).unwrap();
        assert!(mask::is_on(&result.line_mask, 30, 30));
        assert!(!mask::is_on(&result.line_mask, 30, 10));
    }

    #[test]
    fn fixed_polarity_modes() {
        let raster = stroke_raster(3);
        let white = SegmentConfig {
            background: BackgroundMode::White,
            ..SegmentConfig::default()
        };
        assert!(mask::is_on(&separate_background(&raster, &white), 50, 50));

        // With a black background the white canvas itself is foreground.
        let black = SegmentConfig {
            background: BackgroundMode::Black,
            ..SegmentConfig::default()
        };
        let fg = separate_background(&raster, &black);
        assert!(mask::is_on(&fg, 5, 5));
        assert!(!mask::is_on(&fg, 50, 50));
    }

    #[test]
    fn custom_background_color_removed() {
        let rgb = RgbImage::from_fn(30, 30, |x, _| {
            if x == 15 { Rgb([200, 0, 0]) } else { Rgb([10, 200, 10]) }
        });
        let config = SegmentConfig {
            background: BackgroundMode::Custom {
                color: [12, 198, 12],
                tolerance: 8,
            },
            ..SegmentConfig::default()
        };
        let fg = separate_background(&Raster::from_rgb(rgb), &config);
        assert_eq!(mask::count(&fg), 30);
        assert!(mask::is_on(&fg, 15, 3));
    }

    #[test]
    fn thick_blob_is_fill_not_line() {
        let gray = GrayImage::from_fn(200, 200, |x, y| {
            let blob = (40..160).contains(&x) && (40..160).contains(&y);
            let stroke = (10..=12).contains(&y) && (20..180).contains(&x);
            Luma([if blob || stroke { 0 } else { 255 }])
        });
        let config = SegmentConfig {
            method: LineMethod::Morphology,
            max_line_width: 20,
            ..SegmentConfig::default()
        };
        let result = segment(&Raster::from_gray(gray), &config).unwrap();
        assert!(mask::is_on(&result.line_mask, 100, 11));
        assert!(!mask::is_on(&result.line_mask, 100, 100));
        assert!(mask::is_on(&result.fill_mask, 100, 100));
    }

    #[test]
    fn include_merges_fill_into_lines() {
        let gray = GrayImage::from_fn(120, 120, |x, y| {
            Luma([if (20..100).contains(&x) && (20..100).contains(&y) { 0 } else { 255 }])
        });
        let config = SegmentConfig {
            method: LineMethod::Morphology,
            max_line_width: 10,
            fill_handling: FillHandling::Include,
            ..SegmentConfig::default()
        };
        let result = segment(&Raster::from_gray(gray), &config).unwrap();
        assert!(mask::is_on(&result.line_mask, 60, 60));
    }

    #[test]
    fn ignore_leaves_fill_blank() {
        let config = SegmentConfig {
            fill_handling: FillHandling::Ignore,
            ..SegmentConfig::default()
        };
        let result = segment(&stroke_raster(3), &config).unwrap();
        assert!(mask::is_blank(&result.fill_mask));
    }

    #[test]
    fn width_pruning_rejects_thin_and_thick() {
        let band = mask::from_predicate(60, 60, |x, y| {
            let hairline = y == 5 && (5..55).contains(&x);
            let stroke = (20..=24).contains(&y) && (5..55).contains(&x);
            hairline || stroke
        });
        let pruned = prune_by_width(&band, 3, 7);
        assert!(!mask::is_on(&pruned, 30, 5), "1-px line is below min width");
        assert!(mask::is_on(&pruned, 30, 22), "5-px stroke is in range");

        let pruned = prune_by_width(&band, 1, 3);
        assert!(mask::is_on(&pruned, 30, 5));
        assert!(!mask::is_on(&pruned, 30, 22), "5-px stroke is above max width");
    }

    #[test]
    fn histogram_split_requires_bimodality() {
        let flat = [10u64; 256];
        let mut spikes = [0u64; 256];
        spikes[20] = 500;
        spikes[230] = 500;
        assert_eq!(bimodal_split(&spikes), Some(20));

        let mut single = [0u64; 256];
        single[128] = 1000;
        assert_eq!(bimodal_split(&single), None);
        assert_eq!(bimodal_split(&flat), None, "no valley in a flat histogram");
    }

    #[test]
    fn histogram_split_needs_a_valley() {
        // Two broad humps with a shallow dip: variance ratio passes, valley fails.
        let mut shallow = [0u64; 256];
        for (i, bin) in shallow.iter_mut().enumerate() {
            *bin = if (100..156).contains(&i) { 80 } else { 100 };
        }
        assert_eq!(bimodal_split(&shallow), None);

        // Anti-aliased line art: dark ink, light paper, sparse grays between.
        let mut art = [1u64; 256];
        for bin in &mut art[0..30] {
            *bin = 40;
        }
        for bin in &mut art[220..256] {
            *bin = 400;
        }
        let split = bimodal_split(&art).unwrap();
        assert!((30..220).contains(&split), "split {split}");
    }

    #[test]
    fn dominant_colors_ranked_by_count() {
        let rgb = RgbImage::from_fn(10, 10, |x, _| {
            if x < 7 { Rgb([250, 0, 0]) } else { Rgb([0, 0, 250]) }
        });
        let all = mask::from_predicate(10, 10, |_, _| true);
        let info = dominant_colors(&Raster::from_rgb(rgb), &all, 5);
        assert_eq!(info.count, 100);
        assert_eq!(info.colors.len(), 2);
        assert_eq!(info.colors[0].hex, "#fa0000");
        assert_eq!(info.colors[0].count, 70);
        assert!((info.colors[1].percentage - 30.0).abs() < 1e-9);
    }

    #[test]
    fn inverted_width_bounds_rejected() {
        let config = SegmentConfig {
            min_line_width: 10,
            max_line_width: 5,
            ..SegmentConfig::default()
        };
        assert!(matches!(
            segment(&stroke_raster(3), &config),
            Err(PipelineError::InvalidConfig(_))
        ));
    }
}
