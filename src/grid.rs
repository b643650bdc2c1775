//! Pixel-art grid detection.
//!
//! Estimates the edge length of the repeated uniform blocks in a source that
//! was authored as pixel art and later upscaled. Sampled rows and columns are
//! split into runs of near-identical pixels; the dominant run length, reduced
//! by the greatest common divisor of every other frequent run length, is the
//! cell size. Sources without repeated structure resolve to 1.

use std::collections::BTreeMap;

use crate::config::PixelatorConfig;
use crate::raster::RawImage;

/// Run lengths seen less often than `1 / MIN_SHARE_DIVISOR` of all runs are
/// treated as noise and do not constrain the cell size.
const MIN_SHARE_DIVISOR: usize = 20;

/// Detect the source grid's cell size in pixels, in `[1, min(width, height)]`.
pub fn detect_cell_size(image: &RawImage, config: &PixelatorConfig) -> usize {
    let width = image.width();
    let height = image.height();
    let tolerance = config.grid_tolerance;
    let lines = config.grid_scan_lines.max(1);

    let mut histogram: BTreeMap<usize, usize> = BTreeMap::new();

    for y in sample_positions(height, lines) {
        collect_runs((0..width).map(|x| image.get(x, y)), tolerance, &mut histogram);
    }
    for x in sample_positions(width, lines) {
        collect_runs((0..height).map(|y| image.get(x, y)), tolerance, &mut histogram);
    }

    let total_runs: usize = histogram.values().sum();
    // BTreeMap iterates ascending, so ties resolve to the shortest run
    let dominant = histogram
        .iter()
        .fold(None, |best: Option<(usize, usize)>, (&len, &count)| match best {
            Some((_, best_count)) if best_count >= count => best,
            _ => Some((len, count)),
        })
        .map(|(len, _)| len);

    let Some(dominant) = dominant else {
        return 1;
    };

    let cell = histogram
        .iter()
        .filter(|&(_, &count)| count * MIN_SHARE_DIVISOR >= total_runs)
        .fold(dominant, |acc, (&len, _)| gcd(acc, len));

    let cell = cell.clamp(1, width.min(height));
    log::debug!("detected pixel-art cell size {} over {} runs", cell, total_runs);
    cell
}

/// Evenly spaced, deduplicated line indices across `extent`.
fn sample_positions(extent: usize, lines: usize) -> impl Iterator<Item = usize> {
    let count = lines.min(extent);
    let mut last = None;
    (0..count).filter_map(move |i| {
        let pos = i * extent / count;
        if last == Some(pos) {
            None
        } else {
            last = Some(pos);
            Some(pos)
        }
    })
}

/// Record the run lengths of one line.
///
/// The first and last runs may be cut short by the image border, so only
/// interior runs are counted. A line that is a single run counts as is.
fn collect_runs(
    line: impl Iterator<Item = crate::color::Rgba>,
    tolerance: u8,
    histogram: &mut BTreeMap<usize, usize>,
) {
    let mut runs = Vec::new();
    let mut anchor = None;
    let mut run = 0usize;
    for pixel in line {
        match anchor {
            Some(a) if pixel.max_channel_delta(a) <= tolerance => run += 1,
            _ => {
                if run > 0 {
                    runs.push(run);
                }
                anchor = Some(pixel);
                run = 1;
            }
        }
    }
    if run > 0 {
        runs.push(run);
    }

    let interior = match runs.len() {
        0 | 1 => &runs[..],
        n => &runs[1..n - 1],
    };
    for &len in interior {
        *histogram.entry(len).or_insert(0) += 1;
    }
}

fn gcd(mut a: usize, mut b: usize) -> usize {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

/// Detected cell size for the current source image.
///
/// Owned by an editing session and invalidated whenever a new source is
/// loaded. Detection is deterministic, so the cache only saves work.
#[derive(Clone, Debug, Default)]
pub struct CellSizeCache {
    cached: Option<usize>,
}

impl CellSizeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_detect(&mut self, image: &RawImage, config: &PixelatorConfig) -> usize {
        *self.cached.get_or_insert_with(|| detect_cell_size(image, config))
    }

    pub fn cached(&self) -> Option<usize> {
        self.cached
    }

    pub fn invalidate(&mut self) {
        self.cached = None;
    }
}
