//! Disperser: seeded noise that breaks up quantization banding.

use crate::raster::OutputImage;

/// Scale the user's dither strength to the palette step size.
///
/// With a palette of `color_count > 1` colors the strength is divided by the
/// count; otherwise the quantizer is off and a fixed divisor of 16 applies.
pub fn effective_strength(strength: f64, color_count: u32) -> f64 {
    if color_count > 1 {
        strength / color_count as f64
    } else {
        strength / 16.0
    }
}

/// SplitMix64 finalizer: a stateless hash, so noise is addressable by pixel.
#[inline(always)]
fn mix(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Uniform sample in `[-1, 1)` for one channel of one pixel.
#[inline(always)]
fn noise(seed: u64, index: usize, channel: u64) -> f64 {
    let h = mix(seed ^ mix((index as u64) << 2 | channel));
    (h >> 11) as f64 / (1u64 << 52) as f64 - 1.0
}

/// Offset every color channel by at most `strength * 255`, then clamp.
///
/// Alpha is left untouched. The same `(image, strength, seed)` always
/// produces the same result.
pub fn disperse(image: &mut OutputImage, strength: f64, seed: u64) {
    if strength <= 0.0 {
        return;
    }
    let amplitude = strength.min(1.0) * 255.0;

    for (i, p) in image.pixels_mut().iter_mut().enumerate() {
        let jitter = |c: u8, ch: u64| -> u8 {
            (c as f64 + noise(seed, i, ch) * amplitude).round().clamp(0.0, 255.0) as u8
        };
        p.r = jitter(p.r, 0);
        p.g = jitter(p.g, 1);
        p.b = jitter(p.b, 2);
    }
}
