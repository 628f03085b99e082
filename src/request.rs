//! Transform parameters.
//!
//! Every knob that reaches the pipeline is a closed enumeration. Raw values
//! arriving from a query string are parsed here, and anything outside the known
//! set is rejected with a descriptive error instead of being defaulted.
//!
//! # Example
//!
//! ```
//! use epaper_bitmap::{Flip, OutputFormat, Rotation, TransformRequest};
//!
//! let request = TransformRequest::new(800, 480)
//!     .with_rotation(Rotation::try_from(1_i64).unwrap())
//!     .with_flip("xy".parse::<Flip>().unwrap())
//!     .with_format(OutputFormat::Native);
//!
//! assert!(request.validate().is_ok());
//! ```

use std::str::FromStr;

use image::Rgb;
use serde::Deserialize;

use crate::error::Error;
use crate::palette::parse_hex;
use crate::FULL_COLOR_RANGE;

/// Clockwise rotation in quarter turns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Rotation {
    /// No rotation
    #[default]
    Rotate0,
    /// 90 degrees clockwise
    Rotate90,
    /// 180 degrees
    Rotate180,
    /// 270 degrees clockwise
    Rotate270,
}

impl Rotation {
    /// Number of clockwise quarter turns (0-3).
    pub fn quarter_turns(self) -> u8 {
        match self {
            Rotation::Rotate0 => 0,
            Rotation::Rotate90 => 1,
            Rotation::Rotate180 => 2,
            Rotation::Rotate270 => 3,
        }
    }

    /// Whether width and height trade places.
    pub fn swaps_dimensions(self) -> bool {
        matches!(self, Rotation::Rotate90 | Rotation::Rotate270)
    }
}

impl TryFrom<i64> for Rotation {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self, Error> {
        match value {
            0 => Ok(Rotation::Rotate0),
            1 => Ok(Rotation::Rotate90),
            2 => Ok(Rotation::Rotate180),
            3 => Ok(Rotation::Rotate270),
            other => Err(Error::UnsupportedRotation(other)),
        }
    }
}

/// Axis mirroring, applied after rotation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Flip {
    /// Leave the image as is
    #[default]
    None,
    /// Mirror left-right
    Horizontal,
    /// Mirror top-bottom
    Vertical,
    /// Mirror on both axes
    Both,
}

impl FromStr for Flip {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s.to_ascii_lowercase().as_str() {
            "" => Ok(Flip::None),
            "x" => Ok(Flip::Horizontal),
            "y" => Ok(Flip::Vertical),
            "xy" => Ok(Flip::Both),
            _ => Err(Error::UnsupportedFlip(s.to_string())),
        }
    }
}

/// How the palette quantizer picks its target colors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ColormapMode {
    /// Map onto the supplied palette colors
    #[default]
    Explicit,
    /// Map onto the 216-color web-safe cube
    WebSafe,
}

impl FromStr for ColormapMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "none" | "explicit" => Ok(ColormapMode::Explicit),
            "web-safe" | "webmap" => Ok(ColormapMode::WebSafe),
            _ => Err(Error::UnknownColormap(s.to_string())),
        }
    }
}

/// What the pipeline produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Lossless PNG of the processed raster
    #[default]
    Image,
    /// Lossless grayscale PNG
    GrayscaleImage,
    /// Checksum-framed, bit-packed buffer for the firmware
    Native,
}

impl OutputFormat {
    /// Content type of the encoded bytes.
    pub fn content_type(self) -> &'static str {
        match self {
            OutputFormat::Image | OutputFormat::GrayscaleImage => crate::PNG_CONTENT_TYPE,
            OutputFormat::Native => crate::NATIVE_CONTENT_TYPE,
        }
    }
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "image" | "png" => Ok(OutputFormat::Image),
            "grayscale-image" | "png_gray" => Ok(OutputFormat::GrayscaleImage),
            "native" | "epaper_native" => Ok(OutputFormat::Native),
            _ => Err(Error::UnknownFormat(s.to_string())),
        }
    }
}

/// Thresholds deciding when a ternary-panel pixel shows the accent ink.
///
/// A pixel takes the accent when its red channel is above `red_min` and its
/// blue channel is below `blue_max`. This cannot tell a red accent from a
/// yellow one; deployed firmware is tuned against exactly this rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccentHeuristic {
    /// Red must be strictly greater than this
    pub red_min: u8,
    /// Blue must be strictly less than this
    pub blue_max: u8,
}

impl Default for AccentHeuristic {
    fn default() -> Self {
        Self {
            red_min: 128,
            blue_max: 128,
        }
    }
}

impl AccentHeuristic {
    /// Whether this pixel should show the accent color.
    pub fn is_accent(&self, r: u8, b: u8) -> bool {
        r > self.red_min && b < self.blue_max
    }
}

/// Fully parsed parameters for one pipeline invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformRequest {
    /// Width of the canvas the rasterizer was asked to fill
    pub virtual_width: u32,
    /// Height of the canvas the rasterizer was asked to fill
    pub virtual_height: u32,
    /// Rotation, applied first
    pub rotation: Rotation,
    /// Mirroring, applied after rotation
    pub flip: Flip,
    /// Tone curve exponent (1.0 = identity)
    pub gamma: f64,
    /// Quantize when this is below the full 256 range
    pub target_colors: u32,
    /// Palette for [`ColormapMode::Explicit`], in priority order
    pub palette: Vec<Rgb<u8>>,
    /// Quantizer palette source
    pub colormap: ColormapMode,
    /// Output kind
    pub format: OutputFormat,
    /// Ternary color-plane rule
    pub accent: AccentHeuristic,
}

impl TransformRequest {
    /// Identity request for a canvas: no rotation, gamma 1.0, no quantization, PNG output.
    pub fn new(virtual_width: u32, virtual_height: u32) -> Self {
        Self {
            virtual_width,
            virtual_height,
            rotation: Rotation::Rotate0,
            flip: Flip::None,
            gamma: 1.0,
            target_colors: FULL_COLOR_RANGE,
            palette: Vec::new(),
            colormap: ColormapMode::Explicit,
            format: OutputFormat::Image,
            accent: AccentHeuristic::default(),
        }
    }

    /// Set rotation.
    #[must_use]
    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    /// Set flip mode.
    #[must_use]
    pub fn with_flip(mut self, flip: Flip) -> Self {
        self.flip = flip;
        self
    }

    /// Set gamma.
    #[must_use]
    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma;
        self
    }

    /// Quantize onto an explicit palette, limited to `target_colors` entries.
    #[must_use]
    pub fn with_palette(mut self, target_colors: u32, palette: Vec<Rgb<u8>>) -> Self {
        self.target_colors = target_colors;
        self.palette = palette;
        self.colormap = ColormapMode::Explicit;
        self
    }

    /// Quantize onto an explicit palette given as hex strings.
    pub fn with_palette_hex<S: AsRef<str>>(
        self,
        target_colors: u32,
        palette: &[S],
    ) -> Result<Self, Error> {
        let palette = palette
            .iter()
            .map(|c| parse_hex(c.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.with_palette(target_colors, palette))
    }

    /// Quantize onto the web-safe cube.
    #[must_use]
    pub fn with_web_safe(mut self, target_colors: u32) -> Self {
        self.target_colors = target_colors;
        self.colormap = ColormapMode::WebSafe;
        self
    }

    /// Set output format.
    #[must_use]
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the ternary accent rule.
    #[must_use]
    pub fn with_accent_heuristic(mut self, accent: AccentHeuristic) -> Self {
        self.accent = accent;
        self
    }

    /// Whether the quantizer stage runs.
    pub fn quantizes(&self) -> bool {
        self.target_colors < FULL_COLOR_RANGE
    }

    /// Check the parameters that cannot be made unrepresentable by types.
    ///
    /// Runs before any pixel is touched.
    pub fn validate(&self) -> Result<(), Error> {
        if !self.gamma.is_finite() || self.gamma <= 0.0 {
            return Err(Error::InvalidGamma(self.gamma));
        }
        let usable = self.palette.len().min(self.target_colors as usize);
        if self.quantizes() && self.colormap == ColormapMode::Explicit && usable == 0 {
            return Err(Error::EmptyPalette);
        }
        Ok(())
    }
}

/// Raw bitmap parameters as they arrive from a device or preview request.
///
/// Missing values are filled in from the display profile when resolved.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BitmapParams {
    /// Quarter turns (0-3)
    #[serde(default)]
    pub rotate: i64,
    /// "", "x", "y" or "xy"
    #[serde(default)]
    pub flip: String,
    /// Tone curve exponent; display default when absent
    #[serde(default)]
    pub gamma: Option<f64>,
    /// Target color count; color model default when absent
    #[serde(default)]
    pub colors: Option<u32>,
    /// "none" (explicit palette) or "web-safe"
    #[serde(default = "default_colormap_name")]
    pub colormap_name: String,
    /// Comma-separated hex colors replacing the display's palette
    #[serde(default)]
    pub colormap_colors: String,
    /// "image", "grayscale-image" or "native"
    #[serde(default = "default_format")]
    pub format: String,
    /// Use proofing colors instead of pure inks
    #[serde(default)]
    pub preview_colors: bool,
    /// Query values that failed to parse, as (name, raw value)
    #[serde(skip)]
    pub unparsed: Vec<(String, String)>,
}

fn default_colormap_name() -> String {
    "none".to_string()
}

fn default_format() -> String {
    "image".to_string()
}

impl Default for BitmapParams {
    fn default() -> Self {
        Self {
            rotate: 0,
            flip: String::new(),
            gamma: None,
            colors: None,
            colormap_name: default_colormap_name(),
            colormap_colors: String::new(),
            format: default_format(),
            preview_colors: false,
            unparsed: Vec::new(),
        }
    }
}

impl BitmapParams {
    /// Extract parameters from a query string.
    ///
    /// Unknown keys are ignored. Numeric values that fail to parse are kept
    /// verbatim in [`BitmapParams::unparsed`] and reported by
    /// [`BitmapParams::parse_enums`] instead of falling back to a default.
    ///
    /// ```
    /// use epaper_bitmap::BitmapParams;
    ///
    /// let params = BitmapParams::from_query_string("rotate=1&flip=x&colors=2&format=native");
    /// assert_eq!(params.rotate, 1);
    /// assert_eq!(params.flip, "x");
    /// assert_eq!(params.colors, Some(2));
    /// assert_eq!(params.format, "native");
    /// ```
    pub fn from_query_string(query: &str) -> Self {
        let mut params = Self::default();
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "rotate" => match value.parse() {
                    Ok(rotate) => params.rotate = rotate,
                    Err(_) => params.reject("rotate", &value),
                },
                "flip" => params.flip = value.into_owned(),
                "gamma" => match value.parse() {
                    Ok(gamma) => params.gamma = Some(gamma),
                    Err(_) => params.reject("gamma", &value),
                },
                "colors" => match value.parse() {
                    Ok(colors) => params.colors = Some(colors),
                    Err(_) => params.reject("colors", &value),
                },
                "colormap_name" => params.colormap_name = value.into_owned(),
                "colormap_colors" => params.colormap_colors = value.into_owned(),
                "format" => params.format = value.into_owned(),
                "preview_colors" => {
                    params.preview_colors = matches!(value.as_ref(), "1" | "true" | "True")
                }
                _ => {}
            }
        }
        params
    }

    fn reject(&mut self, name: &str, value: &str) {
        self.unparsed.push((name.to_string(), value.to_string()));
    }

    /// Parse the palette override, if one was given.
    pub fn palette_override(&self) -> Result<Option<Vec<Rgb<u8>>>, Error> {
        if self.colormap_colors.trim().is_empty() {
            return Ok(None);
        }
        self.colormap_colors
            .split(',')
            .map(parse_hex)
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }

    /// Parse the enumerated fields, failing on the first unsupported value.
    ///
    /// Values that did not parse as numbers are reported first.
    pub fn parse_enums(&self) -> Result<(Rotation, Flip, ColormapMode, OutputFormat), Error> {
        if let Some((name, value)) = self.unparsed.first() {
            return Err(Error::InvalidParameter {
                name: name.clone(),
                value: value.clone(),
            });
        }
        Ok((
            Rotation::try_from(self.rotate)?,
            self.flip.parse()?,
            self.colormap_name.parse()?,
            self.format.parse()?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_try_from() {
        assert_eq!(Rotation::try_from(0_i64).unwrap(), Rotation::Rotate0);
        assert_eq!(Rotation::try_from(3_i64).unwrap(), Rotation::Rotate270);
        assert!(matches!(
            Rotation::try_from(5_i64),
            Err(Error::UnsupportedRotation(5))
        ));
        assert!(matches!(
            Rotation::try_from(-1_i64),
            Err(Error::UnsupportedRotation(-1))
        ));
        assert!(Rotation::Rotate90.swaps_dimensions());
        assert!(!Rotation::Rotate180.swaps_dimensions());
    }

    #[test]
    fn test_flip_from_str() {
        assert_eq!("".parse::<Flip>().unwrap(), Flip::None);
        assert_eq!("x".parse::<Flip>().unwrap(), Flip::Horizontal);
        assert_eq!("Y".parse::<Flip>().unwrap(), Flip::Vertical);
        assert_eq!("xy".parse::<Flip>().unwrap(), Flip::Both);
        assert!(matches!("yx".parse::<Flip>(), Err(Error::UnsupportedFlip(_))));
    }

    #[test]
    fn test_colormap_and_format_names() {
        assert_eq!("none".parse::<ColormapMode>().unwrap(), ColormapMode::Explicit);
        assert_eq!("webmap".parse::<ColormapMode>().unwrap(), ColormapMode::WebSafe);
        assert_eq!("web-safe".parse::<ColormapMode>().unwrap(), ColormapMode::WebSafe);
        assert!(matches!(
            "median-cut".parse::<ColormapMode>(),
            Err(Error::UnknownColormap(_))
        ));

        assert_eq!("png".parse::<OutputFormat>().unwrap(), OutputFormat::Image);
        assert_eq!(
            "png_gray".parse::<OutputFormat>().unwrap(),
            OutputFormat::GrayscaleImage
        );
        assert_eq!("native".parse::<OutputFormat>().unwrap(), OutputFormat::Native);
        assert!(matches!("bmp".parse::<OutputFormat>(), Err(Error::UnknownFormat(_))));
    }

    #[test]
    fn test_validate() {
        let request = TransformRequest::new(8, 8);
        assert!(request.validate().is_ok());

        let request = TransformRequest::new(8, 8).with_gamma(0.0);
        assert!(matches!(request.validate(), Err(Error::InvalidGamma(_))));

        let request = TransformRequest::new(8, 8).with_gamma(f64::NAN);
        assert!(matches!(request.validate(), Err(Error::InvalidGamma(_))));

        let request = TransformRequest::new(8, 8).with_palette(2, vec![]);
        assert!(matches!(request.validate(), Err(Error::EmptyPalette)));

        // Empty palette is irrelevant when nothing is quantized
        let request = TransformRequest::new(8, 8).with_palette(256, vec![]);
        assert!(request.validate().is_ok());

        // Zero colors leaves nothing of a non-empty palette
        let request = TransformRequest::new(8, 8)
            .with_palette(0, vec![Rgb([0, 0, 0]), Rgb([255, 255, 255])]);
        assert!(matches!(request.validate(), Err(Error::EmptyPalette)));

        let request = TransformRequest::new(8, 8).with_web_safe(0);
        assert!(request.validate().is_ok());

        let request = TransformRequest::new(8, 8).with_web_safe(16);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_with_palette_hex() {
        let request = TransformRequest::new(8, 8)
            .with_palette_hex(3, &["#000000", "#ffffff", "#ff0000"])
            .unwrap();
        assert_eq!(request.palette[2], Rgb([255, 0, 0]));
        assert!(request.quantizes());

        let err = TransformRequest::new(8, 8).with_palette_hex(2, &["#nothex"]);
        assert!(matches!(err, Err(Error::InvalidColor(_))));
    }

    #[test]
    fn test_accent_heuristic() {
        let accent = AccentHeuristic::default();
        assert!(accent.is_accent(255, 0));
        assert!(!accent.is_accent(128, 0));
        assert!(!accent.is_accent(255, 128));
    }

    #[test]
    fn test_params_from_query_string() {
        let params = BitmapParams::from_query_string(
            "mac=aa:bb&rotate=2&flip=xy&gamma=1.8&colors=3&colormap_name=webmap&format=png_gray&preview_colors=true",
        );
        assert_eq!(params.rotate, 2);
        assert_eq!(params.flip, "xy");
        assert_eq!(params.gamma, Some(1.8));
        assert_eq!(params.colors, Some(3));
        assert_eq!(params.colormap_name, "webmap");
        assert_eq!(params.format, "png_gray");
        assert!(params.preview_colors);
    }

    #[test]
    fn test_params_defaults_and_garbage() {
        let params = BitmapParams::from_query_string("");
        assert_eq!(params, BitmapParams::default());
        assert_eq!(params.colormap_name, "none");
        assert_eq!(params.format, "image");

        let params = BitmapParams::from_query_string("rotate=left");
        assert!(matches!(
            params.parse_enums(),
            Err(Error::InvalidParameter { name, value }) if name == "rotate" && value == "left"
        ));

        let params = BitmapParams::from_query_string("colors=lots");
        assert_eq!(params.colors, None);
        assert!(matches!(
            params.parse_enums(),
            Err(Error::InvalidParameter { name, value }) if name == "colors" && value == "lots"
        ));

        let params = BitmapParams::from_query_string("gamma=bright&rotate=1");
        let err = params.parse_enums().unwrap_err();
        assert_eq!(err.to_string(), "Invalid value for gamma: \"bright\"");
    }

    #[test]
    fn test_params_palette_override() {
        let params = BitmapParams::default();
        assert_eq!(params.palette_override().unwrap(), None);

        let params = BitmapParams::from_query_string("colormap_colors=%23000000,ffffff,%23f00");
        assert_eq!(
            params.palette_override().unwrap(),
            Some(vec![Rgb([0, 0, 0]), Rgb([255, 255, 255]), Rgb([255, 0, 0])])
        );

        let params = BitmapParams::from_query_string("colormap_colors=000000,purple");
        assert!(matches!(params.palette_override(), Err(Error::InvalidColor(_))));
    }

    #[test]
    fn test_params_deserialize() {
        let params: BitmapParams =
            serde_json::from_str(r#"{"rotate": 1, "format": "native"}"#).unwrap();
        assert_eq!(params.rotate, 1);
        assert_eq!(params.flip, "");
        assert_eq!(params.colormap_name, "none");
        let (rotation, flip, colormap, format) = params.parse_enums().unwrap();
        assert_eq!(rotation, Rotation::Rotate90);
        assert_eq!(flip, Flip::None);
        assert_eq!(colormap, ColormapMode::Explicit);
        assert_eq!(format, OutputFormat::Native);
    }
}
