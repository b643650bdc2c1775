//! Nearest-neighbor resampling of a source crop onto the tile-sized output.

use crate::raster::{OutputImage, RawImage};

/// Where and how densely the output samples the source.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sampling {
    /// Source pixels per output pixel
    pub zoom: f64,
    /// Crop origin in source pixels; may be negative when the crop overhangs
    pub offset_x: i64,
    pub offset_y: i64,
}

impl Sampling {
    /// Free mode: fit the output inside the source, then zoom in by
    /// `user_zoom` and slide the crop by the offset fractions.
    pub fn free(
        src_width: usize,
        src_height: usize,
        dst_width: usize,
        dst_height: usize,
        user_zoom: f64,
        offset: (f64, f64),
    ) -> Self {
        let fx = src_width as f64 / dst_width as f64;
        let fy = src_height as f64 / dst_height as f64;
        let zoom = fx.min(fy) / user_zoom;
        Self {
            zoom,
            offset_x: crop_origin(src_width, dst_width, zoom, offset.0),
            offset_y: crop_origin(src_height, dst_height, zoom, offset.1),
        }
    }

    /// Pixel-art mode: one output pixel per source cell, with the crop origin
    /// snapped down onto the cell grid.
    pub fn pixel_art(
        src_width: usize,
        src_height: usize,
        dst_width: usize,
        dst_height: usize,
        cell_size: usize,
        offset: (f64, f64),
    ) -> Self {
        let zoom = cell_size.max(1) as f64;
        let step = cell_size.max(1) as i64;
        let ox = crop_origin(src_width, dst_width, zoom, offset.0);
        let oy = crop_origin(src_height, dst_height, zoom, offset.1);
        Self {
            zoom,
            offset_x: ox.div_euclid(step) * step,
            offset_y: oy.div_euclid(step) * step,
        }
    }
}

#[inline]
fn crop_origin(src: usize, dst: usize, zoom: f64, fraction: f64) -> i64 {
    ((src as f64 - dst as f64 * zoom) * fraction) as i64
}

/// Source index for each destination coordinate along one axis, clamped to
/// the source bounds.
fn axis_lookup(dst_len: usize, src_len: usize, offset: i64, zoom: f64) -> Vec<usize> {
    let max = src_len as i64 - 1;
    (0..dst_len)
        .map(|d| {
            let s = (offset as f64 + d as f64 * zoom).floor() as i64;
            s.clamp(0, max) as usize
        })
        .collect()
}

/// Fill every pixel of `dst` from `src` by point sampling.
pub fn resample(src: &RawImage, dst: &mut OutputImage, sampling: &Sampling) {
    let dst_width = dst.width();
    let xs = axis_lookup(dst_width, src.width(), sampling.offset_x, sampling.zoom);
    let ys = axis_lookup(dst.height(), src.height(), sampling.offset_y, sampling.zoom);

    for (row, &sy) in dst.pixels_mut().chunks_exact_mut(dst_width).zip(ys.iter()) {
        for (out, &sx) in row.iter_mut().zip(xs.iter()) {
            *out = src.get(sx, sy);
        }
    }
}
