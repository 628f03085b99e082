//! Palette quantization.
//!
//! Every pixel is replaced by its nearest palette color, without error
//! diffusion. The same input always produces the same bits, and the native
//! packer downstream thresholds the quantized colors directly.

use image::Rgb;

use crate::error::Error;
use crate::request::ColormapMode;
use crate::RasterImage;

/// Channel steps of the web-safe color cube.
pub const WEB_SAFE_STEPS: [u8; 6] = [0x00, 0x33, 0x66, 0x99, 0xcc, 0xff];

/// The 216 web-safe colors, red-major.
pub fn web_safe_palette() -> Vec<Rgb<u8>> {
    let mut palette = Vec::with_capacity(216);
    for r in WEB_SAFE_STEPS {
        for g in WEB_SAFE_STEPS {
            for b in WEB_SAFE_STEPS {
                palette.push(Rgb([r, g, b]));
            }
        }
    }
    palette
}

fn distance_sq(a: [u8; 3], b: [u8; 3]) -> u32 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| {
            let d = x as i32 - y as i32;
            (d * d) as u32
        })
        .sum()
}

/// Index of the palette entry closest to `color`; ties go to the earlier entry.
pub fn nearest(palette: &[Rgb<u8>], color: [u8; 3]) -> Option<usize> {
    palette
        .iter()
        .enumerate()
        .min_by_key(|(i, entry)| (distance_sq(entry.0, color), *i))
        .map(|(i, _)| i)
}

fn snap_web_safe(value: u8) -> u8 {
    // Steps are 51 apart; round to the closest one.
    ((value as u32 + 25) / 51 * 51) as u8
}

/// Map every pixel onto an explicit palette, using at most `max_colors` entries.
pub fn quantize_to_palette(
    image: &mut RasterImage,
    palette: &[Rgb<u8>],
    max_colors: usize,
) -> Result<(), Error> {
    let palette = &palette[..palette.len().min(max_colors)];
    if palette.is_empty() {
        return Err(Error::EmptyPalette);
    }

    for pixel in image.pixels_mut() {
        let [r, g, b, a] = pixel.0;
        if let Some(index) = nearest(palette, [r, g, b]) {
            let [nr, ng, nb] = palette[index].0;
            pixel.0 = [nr, ng, nb, a];
        }
    }
    Ok(())
}

/// Map every pixel onto the web-safe cube.
pub fn quantize_web_safe(image: &mut RasterImage) {
    for pixel in image.pixels_mut() {
        let [r, g, b, a] = pixel.0;
        pixel.0 = [snap_web_safe(r), snap_web_safe(g), snap_web_safe(b), a];
    }
}

/// Quantize according to `mode`.
pub fn quantize(
    image: &mut RasterImage,
    mode: ColormapMode,
    palette: &[Rgb<u8>],
    target_colors: u32,
) -> Result<(), Error> {
    match mode {
        ColormapMode::Explicit => {
            tracing::debug!(
                "Quantizing to {} of {} palette colors",
                target_colors,
                palette.len()
            );
            quantize_to_palette(image, palette, target_colors as usize)
        }
        ColormapMode::WebSafe => {
            tracing::debug!("Quantizing to web-safe palette");
            quantize_web_safe(image);
            Ok(())
        }
    }
}
