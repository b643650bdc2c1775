//! Pixelator pipeline: resample → disperse → quantize.
//!
//! The pipeline is a pure function of the source image, the parameters and
//! the config. It keeps no state between calls; any parameter change is
//! handled by simply running it again.

use serde::{Deserialize, Serialize};

use crate::color::Rgba;
use crate::config::PixelatorConfig;
use crate::dither::{disperse, effective_strength};
use crate::error::PixelatorError;
use crate::grid::detect_cell_size;
use crate::quantize::quantize;
use crate::raster::{OutputImage, RawImage};
use crate::resample::{resample, Sampling};

/// Upper bound on tiles along either axis
pub const MAX_TILES: u32 = 16;
/// Allowed pixels-per-tile edge lengths
pub const TILE_RESOLUTIONS: [u32; 4] = [16, 32, 64, 128];
pub const MAX_COLORS: u32 = 25;

/// Candidate diagonal magnitudes scanned by [`derive_defaults`]
const DIAGONAL_MIN: f64 = 3.0;
const DIAGONAL_MAX: f64 = 8.0;
const DIAGONAL_STEP: f64 = 0.1;

/// User-facing pixelation parameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PixelatorParameters {
    /// Dither strength [0.0, 1.0]
    pub dither_strength: f64,
    /// Target palette size [1, 25]; 1 disables quantization
    pub color_count: u32,
    /// Pixels per tile edge, one of 16, 32, 64, 128
    pub tile_resolution: u32,
    /// Tiles across [1, 16]
    pub tiles_wide: u32,
    /// Tiles down [1, 16]
    pub tiles_high: u32,
    /// Horizontal crop origin as a fraction of the slack [0.0, 1.0]
    pub offset_x: f64,
    /// Vertical crop origin as a fraction of the slack [0.0, 1.0]
    pub offset_y: f64,
    /// Extra zoom in free mode, >= 1
    pub zoom: f64,
    /// Sample on the detected source grid; disables dithering and quantization
    pub pixel_art_mode: bool,
}

impl Default for PixelatorParameters {
    fn default() -> Self {
        Self {
            dither_strength: 0.25,
            color_count: 10,
            tile_resolution: 32,
            tiles_wide: 1,
            tiles_high: 1,
            offset_x: 0.5,
            offset_y: 0.5,
            zoom: 1.0,
            pixel_art_mode: false,
        }
    }
}

impl PixelatorParameters {
    /// Output dimensions in pixels: `tile_resolution * tiles`.
    pub(crate) fn output_size(&self) -> (usize, usize) {
        let res = self.tile_resolution as usize;
        (
            res.saturating_mul(self.tiles_wide as usize),
            res.saturating_mul(self.tiles_high as usize),
        )
    }

    /// Reject any field outside its declared range.
    pub fn validate(&self) -> Result<(), PixelatorError> {
        if !(0.0..=1.0).contains(&self.dither_strength) {
            return Err(PixelatorError::violation("ditherStrength", self.dither_strength));
        }
        if !(1..=MAX_COLORS).contains(&self.color_count) {
            return Err(PixelatorError::violation("colorCount", self.color_count));
        }
        if !TILE_RESOLUTIONS.contains(&self.tile_resolution) {
            return Err(PixelatorError::violation("tileResolution", self.tile_resolution));
        }
        if !(1..=MAX_TILES).contains(&self.tiles_wide) {
            return Err(PixelatorError::violation("tilesWide", self.tiles_wide));
        }
        if !(1..=MAX_TILES).contains(&self.tiles_high) {
            return Err(PixelatorError::violation("tilesHigh", self.tiles_high));
        }
        if !(0.0..=1.0).contains(&self.offset_x) {
            return Err(PixelatorError::violation("offsetX", self.offset_x));
        }
        if !(0.0..=1.0).contains(&self.offset_y) {
            return Err(PixelatorError::violation("offsetY", self.offset_y));
        }
        if !(self.zoom >= 1.0 && self.zoom.is_finite()) {
            return Err(PixelatorError::violation("zoom", self.zoom));
        }

        let width = self.tile_resolution as u64 * self.tiles_wide as u64;
        let height = self.tile_resolution as u64 * self.tiles_high as u64;
        if width > i32::MAX as u64 || height > i32::MAX as u64 {
            return Err(PixelatorError::OutputTooLarge { width, height });
        }
        Ok(())
    }
}

/// Pick tile counts whose aspect best matches the source, favoring smaller
/// grids. All other fields take their defaults.
///
/// Diagonal magnitudes are scanned upwards; each candidate scores
/// `|pw/ph - aspect| * sqrt(5 + pw + ph)` and the first strictly best wins.
pub fn derive_defaults(image: &RawImage) -> PixelatorParameters {
    let (w, h) = (image.width() as f64, image.height() as f64);
    let target = w / h;
    let diagonal = (w * w + h * h).sqrt();
    let (dw, dh) = (w / diagonal, h / diagonal);

    let mut best = (1, 1);
    let mut best_score = f64::INFINITY;

    let steps = ((DIAGONAL_MAX - DIAGONAL_MIN) / DIAGONAL_STEP).round() as usize;
    for i in 0..steps {
        let d = DIAGONAL_MIN + i as f64 * DIAGONAL_STEP;
        let pw = ((dw * d + 0.5) as u32).clamp(1, MAX_TILES);
        let ph = ((dh * d + 0.5) as u32).clamp(1, MAX_TILES);
        let score = (pw as f64 / ph as f64 - target).abs() * (5.0 + (pw + ph) as f64).sqrt();
        if score < best_score {
            best = (pw, ph);
            best_score = score;
        }
    }

    PixelatorParameters {
        tiles_wide: best.0,
        tiles_high: best.1,
        ..Default::default()
    }
}

/// Resize the tile grid so each source cell maps to one output pixel.
///
/// Applied when pixel-art mode is switched on, or when the tile resolution
/// changes while it is on.
pub fn adapt_to_pixel_art(params: &mut PixelatorParameters, image: &RawImage, cell_size: usize) {
    let cell = cell_size.max(1);
    let res = params.tile_resolution.max(1) as usize;
    let fit = |extent: usize| ((extent / cell / res) as u32).clamp(1, MAX_TILES);
    params.tiles_wide = fit(image.width());
    params.tiles_high = fit(image.height());
}

/// Stateless pixelation pipeline
#[derive(Clone, Debug, Default)]
pub struct Pixelator {
    pub config: PixelatorConfig,
}

impl Pixelator {
    pub fn new(config: PixelatorConfig) -> Self {
        Self { config }
    }

    /// Run the full pipeline, detecting the source grid when needed.
    pub fn process(
        &self,
        image: &RawImage,
        params: &PixelatorParameters,
    ) -> Result<OutputImage, PixelatorError> {
        let cell_size = if params.pixel_art_mode {
            detect_cell_size(image, &self.config)
        } else {
            1
        };
        self.process_with_cell_size(image, params, cell_size)
    }

    /// Run the full pipeline with an already known cell size.
    pub fn process_with_cell_size(
        &self,
        image: &RawImage,
        params: &PixelatorParameters,
        cell_size: usize,
    ) -> Result<OutputImage, PixelatorError> {
        params.validate()?;

        // Step 1: Allocate the tile-sized output
        let (out_w, out_h) = params.output_size();
        let mut output = RawImage::filled(out_w, out_h, Rgba::default())?;

        // Step 2: Zoom and crop origin
        let offset = (params.offset_x, params.offset_y);
        let sampling = if params.pixel_art_mode {
            Sampling::pixel_art(image.width(), image.height(), out_w, out_h, cell_size, offset)
        } else {
            Sampling::free(image.width(), image.height(), out_w, out_h, params.zoom, offset)
        };
        log::debug!(
            "resampling {}x{} -> {}x{} (zoom {:.3}, offset {},{})",
            image.width(),
            image.height(),
            out_w,
            out_h,
            sampling.zoom,
            sampling.offset_x,
            sampling.offset_y
        );

        // Step 3: Resample
        resample(image, &mut output, &sampling);

        if params.pixel_art_mode {
            return Ok(output);
        }

        // Step 4: Disperse
        if params.dither_strength > 0.0 {
            let strength = effective_strength(params.dither_strength, params.color_count);
            disperse(&mut output, strength, self.config.dither_seed);
        }

        // Step 5: Reduce colors
        if params.color_count > 1 {
            quantize(&mut output, params.color_count as usize, self.config.kmeans_iterations);
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::tests::block_image;
    use proptest::prelude::*;

    fn photo(w: usize, h: usize) -> RawImage {
        let pixels = (0..h)
            .flat_map(|y| {
                (0..w).map(move |x| {
                    Rgba::opaque((x * 255 / w) as u8, (y * 255 / h) as u8, ((x * y) % 251) as u8)
                })
            })
            .collect();
        RawImage::new(w, h, pixels).unwrap()
    }

    #[test]
    fn test_defaults_for_4_3_image() {
        let params = derive_defaults(&photo(400, 300));
        assert_eq!((params.tiles_wide, params.tiles_high), (4, 3));
        assert_eq!(params.color_count, 10);
        assert_eq!(params.tile_resolution, 32);
        assert_eq!(params.dither_strength, 0.25);
        assert!(!params.pixel_art_mode);
    }

    #[test]
    fn test_defaults_for_extreme_aspect() {
        let params = derive_defaults(&photo(1000, 2));
        assert!(params.tiles_wide <= MAX_TILES && params.tiles_high >= 1);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_out_of_range() {
        let cases: Vec<Box<dyn Fn(&mut PixelatorParameters)>> = vec![
            Box::new(|p| p.dither_strength = 1.5),
            Box::new(|p| p.dither_strength = f64::NAN),
            Box::new(|p| p.color_count = 0),
            Box::new(|p| p.color_count = 26),
            Box::new(|p| p.tile_resolution = 48),
            Box::new(|p| p.tiles_wide = 0),
            Box::new(|p| p.tiles_high = 17),
            Box::new(|p| p.offset_x = -0.1),
            Box::new(|p| p.offset_y = 1.01),
            Box::new(|p| p.zoom = 0.5),
        ];
        for mutate in cases {
            let mut params = PixelatorParameters::default();
            mutate(&mut params);
            assert!(matches!(
                Pixelator::default().process(&photo(8, 8), &params),
                Err(PixelatorError::ParameterViolation { .. })
            ));
        }
    }

    #[test]
    fn test_output_size_saturates() {
        let params = PixelatorParameters { tile_resolution: u32::MAX, tiles_wide: 16, tiles_high: 16, ..Default::default() };
        let (w, h) = params.output_size();
        assert_eq!(w, h);
        assert!(w >= u32::MAX as usize);
        assert!(matches!(params.validate(), Err(PixelatorError::ParameterViolation { field: "tileResolution", .. })));
    }

    #[test]
    fn test_pixel_art_mode_still_validates() {
        let params = PixelatorParameters { pixel_art_mode: true, tiles_wide: 17, ..Default::default() };
        assert!(matches!(
            Pixelator::default().process(&block_image(4, 4, 2), &params),
            Err(PixelatorError::ParameterViolation { field: "tilesWide", .. })
        ));
    }

    #[test]
    fn test_output_is_tile_sized() {
        let params = PixelatorParameters { tiles_wide: 3, tiles_high: 2, tile_resolution: 16, ..Default::default() };
        let out = Pixelator::default().process(&photo(97, 41), &params).unwrap();
        assert_eq!((out.width(), out.height()), (48, 32));
        assert!(out.distinct_colors() <= 10);
    }

    #[test]
    fn test_pixel_art_mode_preserves_cells() {
        let src = block_image(8, 8, 4);
        let mut params = PixelatorParameters { tile_resolution: 16, pixel_art_mode: true, ..Default::default() };
        adapt_to_pixel_art(&mut params, &src, 4);
        assert_eq!((params.tiles_wide, params.tiles_high), (1, 1));

        params.tiles_wide = 1;
        params.tiles_high = 1;
        params.offset_x = 0.0;
        params.offset_y = 0.0;
        let out = Pixelator::default().process(&src, &params).unwrap();
        // 32 source pixels / cell 4 = 8 distinct columns, then clamped to the edge
        for x in 0..8 {
            assert_eq!(out.get(x, 0), src.get(x * 4, 0));
        }
        assert_eq!(out.get(15, 0), src.get(31, 0));
    }

    #[test]
    fn test_pixel_art_mode_on_photo_still_full_size() {
        let params = PixelatorParameters { pixel_art_mode: true, tiles_wide: 2, tiles_high: 2, ..Default::default() };
        let out = Pixelator::default().process(&photo(30, 20), &params).unwrap();
        assert_eq!((out.width(), out.height()), (64, 64));
    }

    #[test]
    fn test_pixel_art_mode_skips_dither_and_quantize() {
        let src = photo(128, 128);
        let params = PixelatorParameters {
            pixel_art_mode: true,
            color_count: 2,
            dither_strength: 1.0,
            tiles_wide: 4,
            tiles_high: 4,
            ..Default::default()
        };
        let out = Pixelator::default().process_with_cell_size(&src, &params, 1).unwrap();
        assert_eq!(out, src);
    }

    #[test]
    fn test_adapt_to_pixel_art_caps_tiles() {
        let src = RawImage::filled(8192, 40, Rgba::default()).unwrap();
        let mut params = PixelatorParameters { tile_resolution: 16, ..Default::default() };
        adapt_to_pixel_art(&mut params, &src, 2);
        assert_eq!((params.tiles_wide, params.tiles_high), (16, 1));
    }

    #[test]
    fn test_rerun_is_byte_identical() {
        let src = photo(120, 90);
        let params = derive_defaults(&src);
        let pixelator = Pixelator::default();
        let a = pixelator.process(&src, &params).unwrap();
        let b = pixelator.process(&src, &params).unwrap();
        assert_eq!(a.to_rgba_bytes(), b.to_rgba_bytes());
    }

    proptest! {
        #[test]
        fn output_size_independent_of_source(
            sw in 1usize..40,
            sh in 1usize..40,
            tw in 1u32..4,
            th in 1u32..4,
            pixel_art in any::<bool>(),
        ) {
            let params = PixelatorParameters {
                tiles_wide: tw,
                tiles_high: th,
                tile_resolution: 16,
                pixel_art_mode: pixel_art,
                ..Default::default()
            };
            let out = Pixelator::default().process(&photo(sw, sh), &params).unwrap();
            prop_assert_eq!(out.width(), 16 * tw as usize);
            prop_assert_eq!(out.height(), 16 * th as usize);
        }

        #[test]
        fn defaults_track_aspect(w in 8usize..600, h in 8usize..600) {
            let params = derive_defaults(&RawImage::filled(w, h, Rgba::default()).unwrap());
            prop_assert!(params.tiles_wide <= MAX_TILES && params.tiles_high <= MAX_TILES);
            prop_assert!(params.validate().is_ok());
        }
    }
}
