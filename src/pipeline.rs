//! The end-to-end encode: normalize, tone-map, quantize, encode, frame.
//!
//! ```text
//! crop -> rotate -> flip -> gamma -> quantize (< 256 colors) -> encode -> frame (native only)
//! ```
//!
//! Every parameter is validated before the first pixel is touched, and any
//! failing stage aborts the whole encode.

use std::fs::File;
use std::io::{BufReader, Cursor, ErrorKind};
use std::path::Path;

use image::{DynamicImage, ImageFormat, ImageReader};

use crate::error::Error;
use crate::framing::frame;
use crate::geometry::normalize;
use crate::native::DisplayFamily;
use crate::palette::ColorModel;
use crate::quantize::quantize;
use crate::request::{OutputFormat, TransformRequest};
use crate::tone::apply_gamma;
use crate::RasterImage;

/// Header sent alongside native frames.
pub const TRANSFER_ENCODING_HEADER: (&str, &str) = ("Content-Transfer-Encoding", "binary");

/// Encoded bytes plus what the HTTP layer needs to relay them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedResult {
    /// Response body
    pub bytes: Vec<u8>,
    /// MIME type of `bytes`
    pub content_type: &'static str,
    /// Extra response headers
    pub headers: Vec<(&'static str, &'static str)>,
}

impl EncodedResult {
    fn png(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            content_type: crate::PNG_CONTENT_TYPE,
            headers: Vec::new(),
        }
    }

    fn native(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            content_type: crate::NATIVE_CONTENT_TYPE,
            headers: vec![TRANSFER_ENCODING_HEADER],
        }
    }
}

/// Final stage, picked before any pixel work so an unsupported panel fails early.
#[derive(Debug, Clone, Copy)]
enum Encoder {
    Png,
    GrayscalePng,
    Native(DisplayFamily),
}

impl Encoder {
    fn for_format(format: OutputFormat, model: &ColorModel) -> Result<Self, Error> {
        Ok(match format {
            OutputFormat::Image => Encoder::Png,
            OutputFormat::GrayscaleImage => Encoder::GrayscalePng,
            OutputFormat::Native => Encoder::Native(DisplayFamily::try_from(model)?),
        })
    }
}

fn encode_png(image: DynamicImage) -> Result<Vec<u8>, Error> {
    let mut buf = Vec::new();
    image.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    Ok(buf)
}

/// Run the full pipeline on an in-memory raster.
///
/// # Example
///
/// ```
/// use epaper_bitmap::{encode, palette::registry, OutputFormat, RasterImage, TransformRequest};
/// use image::Rgba;
///
/// let raster = RasterImage::from_pixel(16, 2, Rgba([255, 255, 255, 255]));
/// let model = registry().model("BW").unwrap();
/// let request = TransformRequest::new(16, 2).with_format(OutputFormat::Native);
///
/// let result = encode(raster, &request, model).unwrap();
/// assert_eq!(result.content_type, "application/octet-stream");
/// assert!(result.bytes.starts_with(b"MM\n"));
/// assert_eq!(&result.bytes[44..], &[0xFF; 4]);
/// ```
pub fn encode(
    raster: RasterImage,
    request: &TransformRequest,
    model: &ColorModel,
) -> Result<EncodedResult, Error> {
    request.validate()?;
    let encoder = Encoder::for_format(request.format, model)?;

    let mut image = normalize(
        raster,
        request.virtual_width,
        request.virtual_height,
        request.rotation,
        request.flip,
    );

    apply_gamma(&mut image, request.gamma);

    if request.quantizes() {
        quantize(
            &mut image,
            request.colormap,
            &request.palette,
            request.target_colors,
        )?;
    }

    let result = match encoder {
        Encoder::Native(family) => {
            let payload = family.encode(&image, &request.accent);
            let framed = frame(&payload);
            tracing::info!(
                "Encoded {:?} frame {}x{}: {} payload bytes",
                family,
                image.width(),
                image.height(),
                payload.len()
            );
            EncodedResult::native(framed)
        }
        Encoder::GrayscalePng => {
            let gray = DynamicImage::ImageRgba8(image).grayscale();
            EncodedResult::png(encode_png(gray)?)
        }
        Encoder::Png => EncodedResult::png(encode_png(DynamicImage::ImageRgba8(image))?),
    };

    tracing::debug!(
        "Encoded {} bytes as {}",
        result.bytes.len(),
        result.content_type
    );
    Ok(result)
}

/// Load the rasterizer's output from disk.
///
/// Only a missing file is [`Error::SourceNotFound`]; any other I/O failure
/// (permissions, a directory in its place) is reported as [`Error::Io`].
pub fn load_source(path: &Path) -> Result<RasterImage, Error> {
    let file = File::open(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => Error::SourceNotFound(path.to_path_buf()),
        _ => Error::from(e),
    })?;
    tracing::debug!("Loading source raster {}", path.display());
    let image = ImageReader::new(BufReader::new(file))
        .with_guessed_format()?
        .decode()?;
    Ok(image.to_rgba8())
}

/// Validate `request`, then load `path` and run the pipeline.
pub fn encode_file(
    path: &Path,
    request: &TransformRequest,
    model: &ColorModel,
) -> Result<EncodedResult, Error> {
    request.validate()?;
    let raster = load_source(path)?;
    encode(raster, request, model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framing::{checksum_hex, Frame, HEADER_LEN};
    use crate::palette::Registry;
    use crate::request::{AccentHeuristic, Flip, Rotation};
    use image::Rgba;

    fn gradient(width: u32, height: u32) -> RasterImage {
        RasterImage::from_fn(width, height, |x, y| {
            Rgba([(x * 7) as u8, (y * 11) as u8, ((x + y) * 3) as u8, 255])
        })
    }

    fn decode_png(bytes: &[u8]) -> DynamicImage {
        image::load_from_memory_with_format(bytes, ImageFormat::Png).unwrap()
    }

    #[test]
    fn test_identity_image() {
        let registry = Registry::builtin();
        let model = registry.model("3C").unwrap();
        let source = gradient(20, 10);

        let result = encode(source.clone(), &TransformRequest::new(20, 10), model).unwrap();
        assert_eq!(result.content_type, "image/png");
        assert!(result.headers.is_empty());
        assert_eq!(decode_png(&result.bytes).to_rgba8(), source);
    }

    #[test]
    fn test_identity_after_geometry() {
        let registry = Registry::builtin();
        let model = registry.model("BW").unwrap();
        let source = gradient(6, 12);

        let request = TransformRequest::new(6, 8)
            .with_rotation(Rotation::Rotate90)
            .with_flip(Flip::Vertical);
        let result = encode(source.clone(), &request, model).unwrap();

        let expected = normalize(source, 6, 8, Rotation::Rotate90, Flip::Vertical);
        let decoded = decode_png(&result.bytes).to_rgba8();
        assert_eq!(decoded.dimensions(), (8, 6));
        assert_eq!(decoded, expected);
    }

    #[test]
    fn test_native_bilevel() {
        let registry = Registry::builtin();
        let model = registry.model("BW").unwrap();
        let source = RasterImage::from_fn(10, 3, |x, _| {
            if x % 2 == 0 {
                Rgba([0, 0, 0, 255])
            } else {
                Rgba([255, 255, 255, 255])
            }
        });

        let request = TransformRequest::new(10, 3)
            .with_palette_hex(2, &["#000000", "#ffffff"])
            .unwrap()
            .with_format(OutputFormat::Native);
        let result = encode(source, &request, model).unwrap();

        assert_eq!(result.content_type, "application/octet-stream");
        assert_eq!(result.headers, vec![("Content-Transfer-Encoding", "binary")]);

        let frame = Frame::parse(&result.bytes).unwrap();
        assert_eq!(frame.payload.len(), 2 * 3);
        assert_eq!(frame.payload, &[0x55, 0x40, 0x55, 0x40, 0x55, 0x40]);
        assert_eq!(result.bytes.len(), HEADER_LEN + 6);
    }

    #[test]
    fn test_native_ternary_with_gamma_and_palette() {
        let registry = Registry::builtin();
        let (model, variant) = registry.resolve("BWR").unwrap();
        // Dark red pixels become red after quantization, light gray becomes white
        let source = RasterImage::from_fn(8, 1, |x, _| {
            if x < 4 {
                Rgba([180, 20, 20, 255])
            } else {
                Rgba([230, 230, 230, 255])
            }
        });

        let request = TransformRequest::new(8, 1)
            .with_gamma(1.2)
            .with_palette(3, variant.palette(false))
            .with_format(OutputFormat::Native);
        let result = encode(source, &request, model).unwrap();
        let frame = Frame::parse(&result.bytes).unwrap();

        // BW plane: red is dark (0), white is 1 -> 0x0F; color plane: red -> 0 -> 0x0F
        assert_eq!(frame.payload, &[0x0F, 0x0F]);
    }

    #[test]
    fn test_native_digest_is_deterministic() {
        let registry = Registry::builtin();
        let model = registry.model("3C").unwrap();
        let request = TransformRequest::new(24, 8).with_format(OutputFormat::Native);

        let a = encode(gradient(24, 8), &request, model).unwrap();
        let b = encode(gradient(24, 8), &request, model).unwrap();
        assert_eq!(a, b);

        let frame = Frame::parse(&a.bytes).unwrap();
        assert_eq!(frame.checksum, checksum_hex(frame.payload));
    }

    #[test]
    fn test_native_accent_threshold_only_changes_color_plane() {
        let registry = Registry::builtin();
        let model = registry.model("3C").unwrap();
        let request = TransformRequest::new(16, 4).with_format(OutputFormat::Native);
        let strict = request.clone().with_accent_heuristic(AccentHeuristic {
            red_min: 100,
            blue_max: 20,
        });

        let a = encode(gradient(16, 4), &request, model).unwrap();
        let b = encode(gradient(16, 4), &strict, model).unwrap();
        let a = Frame::parse(&a.bytes).unwrap().payload.to_vec();
        let b = Frame::parse(&b.bytes).unwrap().payload.to_vec();

        for (row_a, row_b) in a.chunks(4).zip(b.chunks(4)) {
            assert_eq!(row_a[..2], row_b[..2]);
        }
    }

    #[test]
    fn test_native_unsupported_family() {
        let registry = Registry::builtin();
        let model = registry.model("4C").unwrap();
        let request = TransformRequest::new(8, 8).with_format(OutputFormat::Native);
        let err = encode(gradient(8, 8), &request, model).unwrap_err();
        assert!(matches!(err, Error::UnsupportedDisplayType { .. }));

        // Image output still works for the same panel
        let request = TransformRequest::new(8, 8);
        assert!(encode(gradient(8, 8), &request, model).is_ok());
    }

    #[test]
    fn test_grayscale_image() {
        let registry = Registry::builtin();
        let model = registry.model("BW").unwrap();
        let source = RasterImage::from_pixel(4, 4, Rgba([255, 0, 0, 255]));

        let request = TransformRequest::new(4, 4).with_format(OutputFormat::GrayscaleImage);
        let result = encode(source, &request, model).unwrap();
        assert_eq!(result.content_type, "image/png");

        let decoded = decode_png(&result.bytes).to_rgba8();
        let pixel = decoded.get_pixel(0, 0);
        assert_eq!(pixel.0[0], pixel.0[1]);
        assert_eq!(pixel.0[1], pixel.0[2]);
        assert!(pixel.0[0] > 0 && pixel.0[0] < 255);
    }

    #[test]
    fn test_web_safe_quantization() {
        let registry = Registry::builtin();
        let model = registry.model("BW").unwrap();
        let source = RasterImage::from_pixel(2, 2, Rgba([100, 160, 240, 255]));

        let request = TransformRequest::new(2, 2).with_web_safe(16);
        let result = encode(source, &request, model).unwrap();
        let decoded = decode_png(&result.bytes).to_rgba8();
        assert_eq!(decoded.get_pixel(1, 1), &Rgba([0x66, 0x99, 0xff, 255]));
    }

    #[test]
    fn test_validation_precedes_pixels() {
        let registry = Registry::builtin();
        let model = registry.model("BW").unwrap();
        let request = TransformRequest::new(8, 8).with_palette(2, vec![]);
        assert!(matches!(
            encode(gradient(8, 8), &request, model),
            Err(Error::EmptyPalette)
        ));

        // Parameters are checked before the source is even looked for
        let missing = Path::new("/nonexistent/current_calendar_0.png");
        assert!(matches!(
            encode_file(missing, &request, model),
            Err(Error::EmptyPalette)
        ));
    }

    #[test]
    fn test_encode_file() {
        let registry = Registry::builtin();
        let model = registry.model("BW").unwrap();
        let dir = std::env::temp_dir().join(format!("epaper-bitmap-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("source.png");
        // Over-rendered source: 8 rows, canvas only 2
        RasterImage::from_pixel(8, 8, Rgba([255, 255, 255, 255]))
            .save(&path)
            .unwrap();

        let request = TransformRequest::new(8, 2).with_format(OutputFormat::Native);
        let result = encode_file(&path, &request, model).unwrap();
        assert_eq!(Frame::parse(&result.bytes).unwrap().payload, &[0xFF, 0xFF]);

        std::fs::remove_dir_all(&dir).unwrap();

        assert!(matches!(
            encode_file(&path, &request, model),
            Err(Error::SourceNotFound(_))
        ));
    }

    #[test]
    fn test_unreadable_source_is_not_missing() {
        let dir = std::env::temp_dir().join(format!("epaper-bitmap-dir-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        // The path exists but is not a readable image file
        let result = load_source(&dir);
        std::fs::remove_dir_all(&dir).unwrap();

        assert!(result.is_err());
        assert!(!matches!(result, Err(Error::SourceNotFound(_))));
    }

    #[test]
    fn test_encoder_chosen_from_format() {
        let registry = Registry::builtin();
        let tri = registry.model("3C").unwrap();
        let quad = registry.model("4C").unwrap();

        assert!(matches!(
            Encoder::for_format(OutputFormat::Native, tri).unwrap(),
            Encoder::Native(DisplayFamily::Ternary)
        ));
        assert!(matches!(
            Encoder::for_format(OutputFormat::Image, quad).unwrap(),
            Encoder::Png
        ));
        assert!(matches!(
            Encoder::for_format(OutputFormat::GrayscaleImage, quad).unwrap(),
            Encoder::GrayscalePng
        ));
        assert!(matches!(
            Encoder::for_format(OutputFormat::Native, quad),
            Err(Error::UnsupportedDisplayType { planes: 4, .. })
        ));
    }
}
