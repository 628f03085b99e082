//! Gamma tone curve.
//!
//! E-paper inks have a much steeper response than a monitor, so mid-tones are
//! usually pushed before quantization picks palette entries.

use crate::RasterImage;

/// 256-entry lookup table for one gamma exponent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GammaTable([u8; 256]);

impl GammaTable {
    /// Build the table: `round(clamp((i / 255) ^ gamma * 255, 0, 255))`.
    pub fn new(gamma: f64) -> Self {
        let mut table = [0u8; 256];
        for (i, entry) in table.iter_mut().enumerate() {
            let value = (i as f64 / 255.0).powf(gamma) * 255.0;
            *entry = value.clamp(0.0, 255.0).round() as u8;
        }
        Self(table)
    }

    /// Map one channel value.
    pub fn map(&self, value: u8) -> u8 {
        self.0[value as usize]
    }

    /// Remap red, green and blue of every pixel in place; alpha is untouched.
    pub fn apply(&self, image: &mut RasterImage) {
        for pixel in image.pixels_mut() {
            let [r, g, b, _] = &mut pixel.0;
            *r = self.map(*r);
            *g = self.map(*g);
            *b = self.map(*b);
        }
    }
}

/// Apply the tone curve for `gamma`; exactly 1.0 leaves the image alone.
#[allow(clippy::float_cmp)]
pub fn apply_gamma(image: &mut RasterImage, gamma: f64) {
    if gamma == 1.0 {
        return;
    }
    tracing::debug!("Applying gamma {} to {}x{}", gamma, image.width(), image.height());
    GammaTable::new(gamma).apply(image);
}
