//! Row-major RGBA pixel buffers.

use crate::color::Rgba;
use crate::error::PixelatorError;

/// A decoded RGBA image.
///
/// `pixels.len() == width * height` always holds and both dimensions are at
/// least one. Pipeline stages read one buffer and write a freshly allocated
/// one, so a `RawImage` handed to [`crate::Pixelator::process`] is never
/// mutated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawImage {
    width: usize,
    height: usize,
    pixels: Vec<Rgba>,
}

/// The pipeline's product: same shape as [`RawImage`], sized in whole tiles.
pub type OutputImage = RawImage;

impl RawImage {
    pub fn new(width: usize, height: usize, pixels: Vec<Rgba>) -> Result<Self, PixelatorError> {
        if width == 0 || height == 0 {
            return Err(PixelatorError::ZeroDimension);
        }
        if width.checked_mul(height) != Some(pixels.len()) {
            return Err(PixelatorError::DimensionMismatch { len: pixels.len(), width, height });
        }
        Ok(Self { width, height, pixels })
    }

    /// A buffer filled with a single color.
    pub fn filled(width: usize, height: usize, color: Rgba) -> Result<Self, PixelatorError> {
        let len = width
            .checked_mul(height)
            .ok_or(PixelatorError::OutputTooLarge { width: width as u64, height: height as u64 })?;
        Self::new(width, height, vec![color; len])
    }

    /// Build from interleaved RGBA bytes (4 per pixel).
    pub fn from_rgba_bytes(width: usize, height: usize, bytes: &[u8]) -> Result<Self, PixelatorError> {
        if bytes.len() % 4 != 0 {
            return Err(PixelatorError::DimensionMismatch { len: bytes.len() / 4, width, height });
        }
        let pixels = bytes
            .chunks_exact(4)
            .map(|p| Rgba::new(p[0], p[1], p[2], p[3]))
            .collect();
        Self::new(width, height, pixels)
    }

    pub fn width(&self) -> usize { self.width }
    pub fn height(&self) -> usize { self.height }
    pub fn pixels(&self) -> &[Rgba] { &self.pixels }

    pub(crate) fn pixels_mut(&mut self) -> &mut [Rgba] {
        &mut self.pixels
    }

    #[inline(always)]
    pub fn get(&self, x: usize, y: usize) -> Rgba {
        self.pixels[y * self.width + x]
    }

    /// Serialize to interleaved RGBA bytes; this is the upload payload.
    pub fn to_rgba_bytes(&self) -> Vec<u8> {
        self.pixels.iter().flat_map(|p| p.to_array()).collect()
    }

    /// Count of distinct RGBA values.
    pub fn distinct_colors(&self) -> usize {
        let mut seen: Vec<Rgba> = self.pixels.clone();
        seen.sort_unstable();
        seen.dedup();
        seen.len()
    }

    /// Decode any format the `image` crate understands.
    #[cfg(feature = "native")]
    pub fn decode(bytes: &[u8]) -> Result<Self, PixelatorError> {
        let img = image::load_from_memory(bytes).map_err(|e| PixelatorError::Decode(e.to_string()))?;
        Self::from_image(&img.to_rgba8())
    }

    #[cfg(feature = "native")]
    pub fn from_image(img: &image::RgbaImage) -> Result<Self, PixelatorError> {
        let pixels = img.pixels().map(|&p| p.into()).collect();
        Self::new(img.width() as usize, img.height() as usize, pixels)
    }

    /// Convert to image::RgbaImage (requires 'native' feature)
    #[cfg(feature = "native")]
    pub fn to_image(&self) -> image::RgbaImage {
        let mut img = image::RgbaImage::new(self.width as u32, self.height as u32);
        for (i, pixel) in self.pixels.iter().enumerate() {
            let x = (i % self.width) as u32;
            let y = (i / self.width) as u32;
            img.put_pixel(x, y, (*pixel).into());
        }
        img
    }
}
