//! # epaper-bitmap
//!
//! Turns a rendered page into the exact bytes an e-paper display needs.
//!
//! An upstream rasterizer captures the page as a PNG at the display's virtual
//! (reading-orientation) size. This crate takes that raster and runs it through
//! a fixed pipeline:
//!
//! ```text
//! crop -> rotate -> flip -> gamma -> quantize -> encode -> frame
//! ```
//!
//! and produces either a lossless PNG for browser preview or a checksum-framed,
//! bit-packed buffer the firmware streams straight into the panel.
//!
//! ## Quick Start
//!
//! ```
//! use epaper_bitmap::{encode, palette::registry, Frame, OutputFormat, RasterImage, TransformRequest};
//! use image::Rgba;
//!
//! let (model, variant) = registry().resolve("BWR").unwrap();
//! let request = TransformRequest::new(8, 4)
//!     .with_palette(model.num_colors, variant.palette(false))
//!     .with_format(OutputFormat::Native);
//!
//! let raster = RasterImage::from_pixel(8, 4, Rgba([250, 10, 10, 255]));
//! let result = encode(raster, &request, model).unwrap();
//!
//! let frame = Frame::parse(&result.bytes).unwrap();
//! // Two planes, one byte per row each
//! assert_eq!(frame.payload.len(), 8);
//! ```
//!
//! ## Native Frame
//!
//! | Part        | Content                                       |
//! |-------------|-----------------------------------------------|
//! | Magic line  | `MM\n`                                        |
//! | Digest line | 40 lowercase hex chars of SHA-1(payload), `\n` |
//! | Payload     | Packed bit planes, row by row, MSB first      |
//!
//! Firmware skips the refresh when the digest equals the last one it showed.
//!
//! ## Feature Flags
//!
//! - `axum` - `IntoResponse` for results and errors, blocking-pool offload
//! - `full` - All features

pub mod display;
mod error;
pub mod framing;
pub mod geometry;
pub mod native;
pub mod palette;
pub mod pipeline;
pub mod quantize;
pub mod request;
pub mod tone;

pub use display::{encode_for_display, Borders, DisplayProfile, DisplayProfiles};
pub use error::Error;
pub use framing::Frame;
pub use native::DisplayFamily;
pub use palette::{ColorModel, ColorVariant, EpdColor, Registry};
pub use pipeline::{encode, encode_file, EncodedResult};
pub use request::{
    AccentHeuristic, BitmapParams, ColormapMode, Flip, OutputFormat, Rotation, TransformRequest,
};

/// In-memory raster the pipeline works on (8-bit RGBA).
pub type RasterImage = image::RgbaImage;

/// Color count at or above which quantization is skipped
pub const FULL_COLOR_RANGE: u32 = 256;

/// Content type of PNG output
pub const PNG_CONTENT_TYPE: &str = "image/png";

/// Content type of native frames
pub const NATIVE_CONTENT_TYPE: &str = "application/octet-stream";

// Re-export axum integration
#[cfg(feature = "axum")]
pub mod axum_ext;
#[cfg(feature = "axum")]
pub use axum_ext::encode_file_blocking;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert_eq!(FULL_COLOR_RANGE, 256);
        assert_eq!(OutputFormat::Image.content_type(), PNG_CONTENT_TYPE);
        assert_eq!(OutputFormat::GrayscaleImage.content_type(), PNG_CONTENT_TYPE);
        assert_eq!(OutputFormat::Native.content_type(), NATIVE_CONTENT_TYPE);
    }

    #[test]
    fn test_identity_request_skips_quantizer() {
        let request = TransformRequest::new(800, 480);
        assert!(!request.quantizes());
        assert!(!request.clone().with_web_safe(FULL_COLOR_RANGE).quantizes());
        assert!(request.with_web_safe(FULL_COLOR_RANGE - 1).quantizes());
    }
}
