//! Palette reduction using Median Cut and K-Means refinement in Oklab.
//!
//! Clustering runs over the histogram of unique colors (weighted by pixel
//! count) with alpha as a fourth axis. Every output pixel is replaced by a
//! palette entry, so the output never holds more distinct colors than the
//! palette, and the palette never holds more than the requested count.

use std::collections::HashMap;

use ordered_float::OrderedFloat;

use crate::color::{OklabA, Rgba};
use crate::raster::OutputImage;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

const AXES: usize = 4;

#[derive(Clone, Debug, PartialEq)]
pub struct Palette {
    pub colors: Vec<Rgba>,
    pub points: Vec<OklabA>,
}

impl Palette {
    pub fn new(mut colors: Vec<Rgba>) -> Self {
        // centroids may round to the same 8-bit color
        colors.sort_unstable();
        colors.dedup();
        let points = colors.iter().map(|&c| c.to_oklaba()).collect();
        Self { colors, points }
    }

    pub fn len(&self) -> usize { self.colors.len() }
    pub fn is_empty(&self) -> bool { self.colors.is_empty() }

    /// Index of the perceptually closest entry; ties go to the lower index.
    pub fn find_nearest(&self, target: OklabA) -> usize {
        let mut best_idx = 0;
        let mut best_dist = f32::INFINITY;
        for (i, &p) in self.points.iter().enumerate() {
            let dist = target.distance_squared(p);
            if dist < best_dist {
                best_dist = dist;
                best_idx = i;
                if dist == 0.0 { break; }
            }
        }
        best_idx
    }
}

#[derive(Clone, Copy, Debug)]
struct WeightedColor {
    rgba: Rgba,
    point: OklabA,
    count: usize,
}

/// Unique colors with their pixel counts, in a fixed order.
fn histogram(pixels: &[Rgba]) -> Vec<WeightedColor> {
    let mut counts: HashMap<Rgba, usize> = HashMap::new();
    for &p in pixels {
        *counts.entry(p).or_insert(0) += 1;
    }
    let mut colors: Vec<WeightedColor> = counts
        .into_iter()
        .map(|(rgba, count)| WeightedColor { rgba, point: rgba.to_oklaba(), count })
        .collect();
    colors.sort_unstable_by_key(|c| c.rgba);
    colors
}

/// Reduce `image` to at most `max_colors` distinct colors in place and
/// return the palette used.
pub fn quantize(image: &mut OutputImage, max_colors: usize, kmeans_iterations: usize) -> Palette {
    let max_colors = max_colors.max(1);
    let colors = histogram(image.pixels());

    if colors.len() <= max_colors {
        return Palette::new(colors.iter().map(|c| c.rgba).collect());
    }

    let centroids = median_cut(&colors, max_colors);
    let centroids = kmeans_refine(&colors, centroids, kmeans_iterations);
    let palette = Palette::new(centroids.into_iter().map(OklabA::to_rgba).collect());

    #[cfg(feature = "parallel")]
    let mapped: Vec<Rgba> = colors
        .par_iter()
        .map(|c| palette.colors[palette.find_nearest(c.point)])
        .collect();
    #[cfg(not(feature = "parallel"))]
    let mapped: Vec<Rgba> = colors
        .iter()
        .map(|c| palette.colors[palette.find_nearest(c.point)])
        .collect();

    let lookup: HashMap<Rgba, Rgba> = colors.iter().map(|c| c.rgba).zip(mapped).collect();
    for p in image.pixels_mut() {
        if let Some(&q) = lookup.get(p) {
            *p = q;
        }
    }

    log::debug!("quantized {} colors down to {}", colors.len(), palette.len());
    palette
}

fn median_cut(colors: &[WeightedColor], target: usize) -> Vec<OklabA> {
    if colors.is_empty() { return vec![]; }
    let mut buckets = vec![colors.to_vec()];

    while buckets.len() < target {
        let split = buckets
            .iter()
            .enumerate()
            .filter(|(_, b)| b.len() > 1)
            .map(|(i, b)| (i, largest_axis(b)))
            .max_by_key(|&(_, (_, range))| OrderedFloat(range));

        match split {
            Some((i, (axis, _))) => {
                let bucket = buckets.remove(i);
                let (left, right) = split_bucket(bucket, axis);
                buckets.push(left);
                buckets.push(right);
            }
            None => break,
        }
    }

    buckets.iter().map(|b| weighted_mean(b)).collect()
}

fn weighted_mean(bucket: &[WeightedColor]) -> OklabA {
    let (sum, total) = bucket.iter().fold((OklabA::default(), 0.0f32), |(sum, total), c| {
        let w = c.count as f32;
        (sum + c.point * w, total + w)
    });
    sum / total.max(1.0)
}

fn largest_axis(colors: &[WeightedColor]) -> (usize, f32) {
    (0..AXES)
        .map(|axis| {
            let (min, max) = colors.iter().fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), c| {
                let v = c.point.axis(axis);
                (lo.min(v), hi.max(v))
            });
            (axis, max - min)
        })
        .fold((0, f32::NEG_INFINITY), |best, cur| if cur.1 > best.1 { cur } else { best })
}

/// Split at the weighted median along `axis`; both halves are non-empty.
fn split_bucket(mut colors: Vec<WeightedColor>, axis: usize) -> (Vec<WeightedColor>, Vec<WeightedColor>) {
    colors.sort_by(|a, b| a.point.axis(axis).total_cmp(&b.point.axis(axis)));

    let total: usize = colors.iter().map(|c| c.count).sum();
    let mut cum = 0;
    let mut split = colors.len() / 2;
    for (i, c) in colors.iter().enumerate() {
        cum += c.count;
        if cum * 2 >= total {
            split = i + 1;
            break;
        }
    }
    let right = colors.split_off(split.clamp(1, colors.len() - 1));
    (colors, right)
}

fn kmeans_refine(colors: &[WeightedColor], mut centers: Vec<OklabA>, iterations: usize) -> Vec<OklabA> {
    if centers.is_empty() { return centers; }

    for _ in 0..iterations {
        let mut sums = vec![OklabA::default(); centers.len()];
        let mut weights = vec![0.0f32; centers.len()];

        for c in colors {
            let best = centers
                .iter()
                .enumerate()
                .min_by_key(|&(_, &k)| OrderedFloat(c.point.distance_squared(k)))
                .map(|(i, _)| i)
                .unwrap_or(0);
            let w = c.count as f32;
            sums[best] = sums[best] + c.point * w;
            weights[best] += w;
        }

        let mut moved = 0.0f32;
        for (i, center) in centers.iter_mut().enumerate() {
            if weights[i] > 0.0 {
                let next = sums[i] / weights[i];
                moved = moved.max(next.distance_squared(*center));
                *center = next;
            }
        }
        if moved < 1e-8 { break; }
    }
    centers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::RawImage;
    use proptest::prelude::*;

    fn rainbow(w: usize, h: usize) -> RawImage {
        let pixels = (0..h)
            .flat_map(|y| {
                (0..w).map(move |x| Rgba::new((x * 255 / w) as u8, (y * 255 / h) as u8, ((x + y) * 7) as u8, 255))
            })
            .collect();
        RawImage::new(w, h, pixels).unwrap()
    }

    #[test]
    fn test_reduces_to_requested_count() {
        let mut img = rainbow(64, 64);
        let palette = quantize(&mut img, 10, 6);
        assert!(palette.len() <= 10);
        assert!(img.distinct_colors() <= 10);
        assert!(img.pixels().iter().all(|p| palette.colors.contains(p)));
    }

    #[test]
    fn test_few_colors_left_untouched() {
        let a = Rgba::opaque(10, 20, 30);
        let b = Rgba::opaque(200, 20, 30);
        let mut img = RawImage::new(2, 2, vec![a, b, b, a]).unwrap();
        let before = img.clone();
        let palette = quantize(&mut img, 4, 6);
        assert_eq!(img, before);
        assert_eq!(palette.len(), 2);
    }

    #[test]
    fn test_two_clusters_separate() {
        let mut pixels = Vec::new();
        for i in 0..50u8 {
            pixels.push(Rgba::opaque(250 - i % 5, 0, 0));
            pixels.push(Rgba::opaque(0, 0, 250 - i % 5));
        }
        let mut img = RawImage::new(10, 10, pixels).unwrap();
        quantize(&mut img, 2, 6);
        assert_eq!(img.distinct_colors(), 2);
        let reds = img.pixels().iter().filter(|p| p.r > p.b).count();
        assert_eq!(reds, 50);
    }

    #[test]
    fn test_deterministic() {
        let mut a = rainbow(40, 30);
        let mut b = rainbow(40, 30);
        assert_eq!(quantize(&mut a, 7, 6), quantize(&mut b, 7, 6));
        assert_eq!(a, b);
    }

    #[test]
    fn test_single_color_palette() {
        let mut img = rainbow(16, 16);
        quantize(&mut img, 1, 3);
        assert_eq!(img.distinct_colors(), 1);
    }

    proptest! {
        #[test]
        fn never_exceeds_color_count(
            raw in proptest::collection::vec(any::<[u8; 4]>(), 1..200),
            count in 1usize..26,
        ) {
            let pixels: Vec<Rgba> = raw.into_iter().map(Rgba::from_array).collect();
            let mut img = RawImage::new(pixels.len(), 1, pixels).unwrap();
            let palette = quantize(&mut img, count, 4);
            prop_assert!(palette.len() <= count);
            prop_assert!(img.distinct_colors() <= count);
        }
    }
}
