//! Color model and color variant registry.
//!
//! A *color model* describes what a panel can physically show: how many colors
//! and how many bit planes the firmware expects. A *color variant* is a concrete,
//! ordered palette for one model (the same 3-color model ships as
//! black/white/red and black/white/yellow panels).
//!
//! The registry is built once and only read afterwards, so it can be shared
//! freely between concurrent encodes.
//!
//! # Example
//!
//! ```
//! use epaper_bitmap::palette::registry;
//!
//! let variant = registry().variant("BWR").unwrap();
//! assert_eq!(variant.model, "3C");
//! assert_eq!(variant.palette_hex(false), ["#000000", "#ffffff", "#ff0000"]);
//! ```

use std::collections::HashMap;
use std::sync::OnceLock;

use image::Rgb;

use crate::error::Error;

/// Parse a hex color such as `#ff0000`, `ff0000` or `#f00`.
pub fn parse_hex(s: &str) -> Result<Rgb<u8>, Error> {
    let hex = s.trim().trim_start_matches('#');
    if !hex.is_ascii() {
        return Err(Error::InvalidColor(s.to_string()));
    }
    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&hex[range], 16).map_err(|_| Error::InvalidColor(s.to_string()))
    };

    match hex.len() {
        6 => Ok(Rgb([channel(0..2)?, channel(2..4)?, channel(4..6)?])),
        3 => {
            let r = channel(0..1)?;
            let g = channel(1..2)?;
            let b = channel(2..3)?;
            Ok(Rgb([r * 17, g * 17, b * 17]))
        }
        _ => Err(Error::InvalidColor(s.to_string())),
    }
}

/// Format a color as lowercase `#rrggbb`.
pub fn to_hex(color: Rgb<u8>) -> String {
    let [r, g, b] = color.0;
    format!("#{:02x}{:02x}{:02x}", r, g, b)
}

/// One ink a panel can show.
#[derive(Debug, Clone, PartialEq)]
pub struct EpdColor {
    /// Short code ("black", "red", ...)
    pub code: String,
    /// Human-readable name
    pub name: String,
    /// Pure color sent to the quantizer for device output
    pub value: Rgb<u8>,
    /// Muted color used for on-screen proofing, if it differs
    pub preview: Option<Rgb<u8>>,
}

impl EpdColor {
    /// Create a color from hex strings.
    pub fn new(
        code: impl Into<String>,
        name: impl Into<String>,
        value: &str,
        preview: Option<&str>,
    ) -> Result<Self, Error> {
        Ok(Self {
            code: code.into(),
            name: name.into(),
            value: parse_hex(value)?,
            preview: preview.map(parse_hex).transpose()?,
        })
    }

    /// The color to use, falling back to the true value when no preview exists.
    pub fn rgb(&self, preview: bool) -> Rgb<u8> {
        if preview {
            self.preview.unwrap_or(self.value)
        } else {
            self.value
        }
    }

    fn is_neutral(&self) -> bool {
        matches!(self.code.as_str(), "black" | "white")
    }
}

/// What a panel family can display and how many bit planes its firmware reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorModel {
    /// Display type code ("BW", "3C", "4C")
    pub code: String,
    /// Human-readable name
    pub name: String,
    /// Number of distinct colors the panel shows
    pub num_colors: u32,
    /// Bit planes in the native frame buffer
    pub planes: u8,
}

impl ColorModel {
    /// Create a color model.
    pub fn new(code: impl Into<String>, name: impl Into<String>, num_colors: u32, planes: u8) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            num_colors,
            planes,
        }
    }
}

/// Ordered palette for one color model.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorVariant {
    /// Variant code ("BW", "BWR", ...)
    pub code: String,
    /// Human-readable name
    pub name: String,
    /// Code of the owning color model
    pub model: String,
    /// Palette colors, in quantizer priority order
    pub colors: Vec<EpdColor>,
}

impl ColorVariant {
    /// Palette as RGB values.
    pub fn palette(&self, preview: bool) -> Vec<Rgb<u8>> {
        self.colors.iter().map(|c| c.rgb(preview)).collect()
    }

    /// Palette as `#rrggbb` strings.
    pub fn palette_hex(&self, preview: bool) -> Vec<String> {
        self.colors.iter().map(|c| to_hex(c.rgb(preview))).collect()
    }

    /// The first palette color that is neither black nor white.
    pub fn accent(&self) -> Option<&EpdColor> {
        self.colors.iter().find(|c| !c.is_neutral())
    }
}

/// Immutable lookup of color models and variants by code.
#[derive(Debug, Clone)]
pub struct Registry {
    models: HashMap<String, ColorModel>,
    variants: HashMap<String, ColorVariant>,
}

impl Registry {
    /// Build a registry, checking that every variant belongs to a known model.
    pub fn new(models: Vec<ColorModel>, variants: Vec<ColorVariant>) -> Result<Self, Error> {
        let registry = Self::from_tables(models, variants);
        match registry.orphan_variant() {
            Some(variant) => Err(Error::UnknownColorModel(variant.model.clone())),
            None => Ok(registry),
        }
    }

    /// The panel families this server knows how to drive.
    pub fn builtin() -> Self {
        let registry = Self::from_tables(builtin_models(), builtin_variants());
        debug_assert!(
            registry.orphan_variant().is_none(),
            "built-in color variant references an unknown model"
        );
        registry
    }

    fn from_tables(models: Vec<ColorModel>, variants: Vec<ColorVariant>) -> Self {
        Self {
            models: models.into_iter().map(|m| (m.code.clone(), m)).collect(),
            variants: variants.into_iter().map(|v| (v.code.clone(), v)).collect(),
        }
    }

    fn orphan_variant(&self) -> Option<&ColorVariant> {
        self.variants
            .values()
            .find(|v| !self.models.contains_key(&v.model))
    }

    /// Look up a color model by code.
    pub fn model(&self, code: &str) -> Result<&ColorModel, Error> {
        self.models
            .get(code)
            .ok_or_else(|| Error::UnknownColorModel(code.to_string()))
    }

    /// Look up a color variant by code.
    pub fn variant(&self, code: &str) -> Result<&ColorVariant, Error> {
        self.variants
            .get(code)
            .ok_or_else(|| Error::UnknownColorVariant(code.to_string()))
    }

    /// Resolve a variant together with its color model.
    pub fn resolve(&self, variant_code: &str) -> Result<(&ColorModel, &ColorVariant), Error> {
        let variant = self.variant(variant_code)?;
        Ok((self.model(&variant.model)?, variant))
    }

    /// All variants of one color model, sorted by code.
    pub fn variants_of(&self, model_code: &str) -> Vec<&ColorVariant> {
        let mut variants: Vec<_> = self
            .variants
            .values()
            .filter(|v| v.model == model_code)
            .collect();
        variants.sort_by(|a, b| a.code.cmp(&b.code));
        variants
    }
}

fn builtin_colors() -> [EpdColor; 4] {
    let color = |code: &str, name: &str, value: [u8; 3], preview: [u8; 3]| EpdColor {
        code: code.to_string(),
        name: name.to_string(),
        value: Rgb(value),
        preview: Some(Rgb(preview)),
    };
    [
        color("black", "Black", [0x00, 0x00, 0x00], [0x11, 0x11, 0x11]),
        color("white", "White", [0xff, 0xff, 0xff], [0xdd, 0xdd, 0xdd]),
        color("red", "Red", [0xff, 0x00, 0x00], [0xaa, 0x00, 0x00]),
        color("yellow", "Yellow", [0xff, 0xff, 0x00], [0xdd, 0xdd, 0x00]),
    ]
}

fn builtin_models() -> Vec<ColorModel> {
    vec![
        ColorModel::new("BW", "Black and White", 2, 1),
        ColorModel::new("3C", "3 Colors", 3, 2),
        // No firmware-verified native framing yet; image output only.
        ColorModel::new("4C", "4 Colors", 4, 4),
    ]
}

fn builtin_variants() -> Vec<ColorVariant> {
    let [black, white, red, yellow] = builtin_colors();
    let variant = |code: &str, name: &str, model: &str, colors: &[&EpdColor]| ColorVariant {
        code: code.to_string(),
        name: name.to_string(),
        model: model.to_string(),
        colors: colors.iter().map(|c| (*c).clone()).collect(),
    };
    vec![
        variant("BW", "Black and White", "BW", &[&black, &white]),
        variant("BWY", "Black, White, Yellow", "3C", &[&black, &white, &yellow]),
        variant("BWR", "Black, White, Red", "3C", &[&black, &white, &red]),
        variant(
            "BWRY",
            "Black, White, Red, Yellow",
            "4C",
            &[&black, &white, &red, &yellow],
        ),
    ]
}

/// Process-wide built-in registry, constructed on first use.
static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// Get the process-wide built-in registry.
pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(|| {
        let registry = Registry::builtin();
        tracing::info!(
            "Loaded color registry with {} models, {} variants",
            registry.models.len(),
            registry.variants.len()
        );
        registry
    })
}
