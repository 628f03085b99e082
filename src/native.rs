//! Device-native bit-plane packing.
//!
//! Pixels are thresholded to single bits and packed 8 per byte, most
//! significant bit first, row by row. Each row starts on a fresh byte; when the
//! width is not a multiple of 8 the low bits of the row's last byte are zero.
//!
//! | Family   | Planes | Row layout                          |
//! |----------|--------|-------------------------------------|
//! | Bilevel  | 1      | BW bytes                            |
//! | Ternary  | 2      | BW bytes, then color bytes, per row |
//!
//! BW bit: 1 = white, 0 = black. Color bit: 0 = show the accent ink,
//! 1 = defer to the BW bit.
//!
//! Each panel family gets its own branch. A new plane count needs its own
//! variant, verified against the firmware that reads it.

use image::Rgba;

use crate::error::Error;
use crate::palette::ColorModel;
use crate::request::AccentHeuristic;
use crate::RasterImage;

/// Gray level above which a pixel counts as white.
pub const WHITE_THRESHOLD: u8 = 128;

/// Panel families with a known native frame layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayFamily {
    /// One BW plane
    Bilevel,
    /// BW plane plus accent-color plane, interleaved per row
    Ternary,
}

impl TryFrom<&ColorModel> for DisplayFamily {
    type Error = Error;

    fn try_from(model: &ColorModel) -> Result<Self, Error> {
        match model.planes {
            1 => Ok(DisplayFamily::Bilevel),
            2 => Ok(DisplayFamily::Ternary),
            planes => Err(Error::UnsupportedDisplayType {
                code: model.code.clone(),
                planes,
            }),
        }
    }
}

impl DisplayFamily {
    /// Number of bit planes in the frame.
    pub fn planes(self) -> usize {
        match self {
            DisplayFamily::Bilevel => 1,
            DisplayFamily::Ternary => 2,
        }
    }

    /// Exact payload size for a `width` x `height` frame.
    pub fn payload_len(self, width: u32, height: u32) -> usize {
        row_bytes(width) * height as usize * self.planes()
    }

    /// Pack `image` into this family's native layout.
    pub fn encode(self, image: &RasterImage, accent: &AccentHeuristic) -> Vec<u8> {
        match self {
            DisplayFamily::Bilevel => pack_bilevel(image),
            DisplayFamily::Ternary => pack_ternary(image, accent),
        }
    }
}

/// Bytes needed for one packed row.
pub fn row_bytes(width: u32) -> usize {
    (width as usize).div_ceil(8)
}

/// Integer average of red, green and blue.
pub fn gray(pixel: &Rgba<u8>) -> u8 {
    let [r, g, b, _] = pixel.0;
    ((r as u16 + g as u16 + b as u16) / 3) as u8
}

/// BW plane bit: `true` for white.
pub fn is_white(pixel: &Rgba<u8>) -> bool {
    gray(pixel) > WHITE_THRESHOLD
}

/// Append `bits` MSB-first, zero-padding the final byte.
fn pack_bits<I: IntoIterator<Item = bool>>(bits: I, out: &mut Vec<u8>) {
    let mut byte = 0u8;
    let mut count = 0u32;
    for bit in bits {
        byte = (byte << 1) | bit as u8;
        count += 1;
        if count == 8 {
            out.push(byte);
            byte = 0;
            count = 0;
        }
    }
    if count > 0 {
        out.push(byte << (8 - count));
    }
}

/// One bit per pixel: 1 = white.
pub fn pack_bilevel(image: &RasterImage) -> Vec<u8> {
    let mut out = Vec::with_capacity(DisplayFamily::Bilevel.payload_len(image.width(), image.height()));
    for row in image.rows() {
        pack_bits(row.map(is_white), &mut out);
    }
    out
}

/// Two planes, written row by row: the row's BW bytes, then its color bytes.
pub fn pack_ternary(image: &RasterImage, accent: &AccentHeuristic) -> Vec<u8> {
    let mut out = Vec::with_capacity(DisplayFamily::Ternary.payload_len(image.width(), image.height()));
    for row in image.rows() {
        let pixels: Vec<&Rgba<u8>> = row.collect();
        pack_bits(pixels.iter().map(|p| is_white(p)), &mut out);
        pack_bits(
            pixels.iter().map(|p| !accent.is_accent(p.0[0], p.0[2])),
            &mut out,
        );
    }
    out
}
