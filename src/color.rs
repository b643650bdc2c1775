//! Pixel type and perceptual color space conversions.
//!
//! The pipeline stores pixels as 8-bit sRGB with straight alpha. Palette
//! clustering happens in Oklab, with alpha carried as a fourth axis so a
//! reduced palette never multiplies its size through varying transparency.

use std::ops::{Add, Div, Mul};

/// RGBA color in 8-bit per channel format (sRGB gamma-encoded, straight alpha)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
#[repr(C)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    #[inline(always)]
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    #[inline(always)]
    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub fn from_array(arr: [u8; 4]) -> Self {
        Self { r: arr[0], g: arr[1], b: arr[2], a: arr[3] }
    }

    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    pub fn to_oklaba(self) -> OklabA {
        OklabA::from_rgba(self)
    }

    pub fn to_linear(self) -> LinearRgb {
        LinearRgb::from_srgb(self)
    }

    /// Largest per-channel absolute difference, alpha included.
    #[inline(always)]
    pub fn max_channel_delta(self, other: Self) -> u8 {
        self.r
            .abs_diff(other.r)
            .max(self.g.abs_diff(other.g))
            .max(self.b.abs_diff(other.b))
            .max(self.a.abs_diff(other.a))
    }
}

#[cfg(feature = "native")]
impl From<image::Rgba<u8>> for Rgba {
    fn from(p: image::Rgba<u8>) -> Self {
        Self::from_array(p.0)
    }
}

#[cfg(feature = "native")]
impl From<Rgba> for image::Rgba<u8> {
    fn from(p: Rgba) -> Self {
        image::Rgba(p.to_array())
    }
}

// =============================================================================
// Oklab (Modern perceptual color space)
// =============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Oklab {
    pub l: f32,
    pub a: f32,
    pub b: f32,
}

impl Oklab {
    pub fn from_rgba(rgba: Rgba) -> Self {
        Self::from_linear_rgb(rgba.to_linear())
    }

    pub fn from_linear_rgb(lin: LinearRgb) -> Self {
        let l = 0.4122214708 * lin.r + 0.5363325363 * lin.g + 0.0514459929 * lin.b;
        let m = 0.2119034982 * lin.r + 0.6806995451 * lin.g + 0.1073969566 * lin.b;
        let s = 0.0883024619 * lin.r + 0.2817188376 * lin.g + 0.6299787005 * lin.b;

        let l_ = l.cbrt();
        let m_ = m.cbrt();
        let s_ = s.cbrt();

        Oklab {
            l: 0.2104542553 * l_ + 0.7936177850 * m_ - 0.0040720468 * s_,
            a: 1.9779984951 * l_ - 2.4285922050 * m_ + 0.4505937099 * s_,
            b: 0.0259040371 * l_ + 0.7827717662 * m_ - 0.8086757660 * s_,
        }
    }

    pub fn to_linear_rgb(self) -> LinearRgb {
        let l_ = self.l + 0.3963377774 * self.a + 0.2158037573 * self.b;
        let m_ = self.l - 0.1055613458 * self.a - 0.0638541728 * self.b;
        let s_ = self.l - 0.0894841775 * self.a - 1.2914855480 * self.b;

        let l = l_ * l_ * l_;
        let m = m_ * m_ * m_;
        let s = s_ * s_ * s_;

        LinearRgb {
            r: (4.0767416621 * l - 3.3077115913 * m + 0.2309699292 * s).clamp(0.0, 1.0),
            g: (-1.2684380046 * l + 2.6097574011 * m - 0.3413193965 * s).clamp(0.0, 1.0),
            b: (-0.0041960863 * l - 0.7034186147 * m + 1.7076147010 * s).clamp(0.0, 1.0),
        }
    }

    #[inline(always)]
    pub fn distance_squared(self, other: Self) -> f32 {
        let dl = self.l - other.l;
        let da = self.a - other.a;
        let db = self.b - other.b;
        dl * dl + da * da + db * db
    }
}

impl Add for Oklab {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Oklab { l: self.l + other.l, a: self.a + other.a, b: self.b + other.b }
    }
}

impl Mul<f32> for Oklab {
    type Output = Self;
    fn mul(self, scalar: f32) -> Self {
        Oklab { l: self.l * scalar, a: self.a * scalar, b: self.b * scalar }
    }
}

impl Div<f32> for Oklab {
    type Output = Self;
    fn div(self, scalar: f32) -> Self {
        Oklab { l: self.l / scalar, a: self.a / scalar, b: self.b / scalar }
    }
}

// =============================================================================
// Oklab + alpha (clustering space)
// =============================================================================

/// Oklab color with alpha in `[0, 1]` as a fourth clustering axis.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct OklabA {
    pub lab: Oklab,
    pub alpha: f32,
}

impl OklabA {
    pub fn from_rgba(rgba: Rgba) -> Self {
        Self { lab: Oklab::from_rgba(rgba), alpha: rgba.a as f32 / 255.0 }
    }

    pub fn to_rgba(self) -> Rgba {
        let lin = self.lab.to_linear_rgb();
        Rgba {
            r: clamp_u8_f32(linear_to_srgb(lin.r) * 255.0 + 0.5),
            g: clamp_u8_f32(linear_to_srgb(lin.g) * 255.0 + 0.5),
            b: clamp_u8_f32(linear_to_srgb(lin.b) * 255.0 + 0.5),
            a: clamp_u8_f32(self.alpha * 255.0 + 0.5),
        }
    }

    /// Component along clustering axis `0..4` (L, a, b, alpha).
    #[inline(always)]
    pub fn axis(self, axis: usize) -> f32 {
        match axis {
            0 => self.lab.l,
            1 => self.lab.a,
            2 => self.lab.b,
            _ => self.alpha,
        }
    }

    #[inline(always)]
    pub fn distance_squared(self, other: Self) -> f32 {
        let da = self.alpha - other.alpha;
        self.lab.distance_squared(other.lab) + da * da
    }
}

impl Add for OklabA {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self { lab: self.lab + other.lab, alpha: self.alpha + other.alpha }
    }
}

impl Mul<f32> for OklabA {
    type Output = Self;
    fn mul(self, scalar: f32) -> Self {
        Self { lab: self.lab * scalar, alpha: self.alpha * scalar }
    }
}

impl Div<f32> for OklabA {
    type Output = Self;
    fn div(self, scalar: f32) -> Self {
        Self { lab: self.lab / scalar, alpha: self.alpha / scalar }
    }
}

// =============================================================================
// Linear RGB
// =============================================================================

#[derive(Clone, Copy, Debug, Default)]
pub struct LinearRgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl LinearRgb {
    pub fn from_srgb(rgba: Rgba) -> Self {
        Self {
            r: srgb_to_linear(rgba.r as f32 / 255.0),
            g: srgb_to_linear(rgba.g as f32 / 255.0),
            b: srgb_to_linear(rgba.b as f32 / 255.0),
        }
    }
}

// =============================================================================
// Constants & Utils
// =============================================================================

#[inline]
pub fn srgb_to_linear(v: f32) -> f32 {
    if v > 0.04045 { ((v + 0.055) / 1.055).powf(2.4) } else { v / 12.92 }
}

#[inline]
pub fn linear_to_srgb(v: f32) -> f32 {
    if v > 0.0031308 { 1.055 * v.powf(1.0 / 2.4) - 0.055 } else { 12.92 * v }
}

#[inline(always)]
pub fn clamp_u8_f32(v: f32) -> u8 {
    v.max(0.0).min(255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oklab_roundtrip_primaries() {
        for c in [
            Rgba::opaque(0, 0, 0),
            Rgba::opaque(255, 255, 255),
            Rgba::opaque(255, 0, 0),
            Rgba::opaque(0, 128, 255),
            Rgba::new(12, 200, 90, 40),
        ] {
            let back = c.to_oklaba().to_rgba();
            assert!(c.max_channel_delta(back) <= 1, "{:?} -> {:?}", c, back);
        }
    }

    #[test]
    fn test_alpha_is_a_clustering_axis() {
        let opaque = Rgba::opaque(100, 100, 100).to_oklaba();
        let clear = Rgba::new(100, 100, 100, 0).to_oklaba();
        assert!((opaque.distance_squared(clear) - 1.0).abs() < 1e-4);
        assert_eq!(opaque.axis(3), 1.0);
    }

    #[test]
    fn test_max_channel_delta() {
        let a = Rgba::new(10, 20, 30, 255);
        let b = Rgba::new(14, 18, 30, 250);
        assert_eq!(a.max_channel_delta(b), 5);
    }
}
