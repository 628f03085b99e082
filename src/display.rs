//! Per-display configuration and request resolution.
//!
//! The configuration store hands over one [`DisplayProfile`] per physical
//! panel. Combined with the raw [`BitmapParams`] of a request it yields the
//! fully parsed [`TransformRequest`] and the [`ColorModel`] the pipeline needs.
//!
//! # Example Profiles (YAML)
//!
//! ```yaml
//! displays:
//!   - name: "Kitchen"
//!     mac: "AA:BB:CC:DD:EE:01"
//!     width: 800
//!     height: 480
//!     rotation: 1          # quarter turns, the panel is mounted portrait
//!     color_variant: BWR
//!     gamma: 1.8
//!     border: { top: 0, right: 4, bottom: 0, left: 4 }
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use epaper_bitmap::{encode_for_display, palette::registry, BitmapParams, DisplayProfiles};
//!
//! let profiles = DisplayProfiles::load("config/displays.yaml")?;
//! let display = profiles.by_mac("aa:bb:cc:dd:ee:01")?;
//! let params = BitmapParams::from_query_string("format=native&rotate=1");
//! let result = encode_for_display(&source_path, display, &params, registry())?;
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::error::Error;
use crate::palette::{ColorModel, Registry};
use crate::pipeline::{encode_file, EncodedResult};
use crate::request::{BitmapParams, ColormapMode, TransformRequest};

/// Blank margins the page template keeps clear, in pixels.
///
/// Some panels hide a few pixels under the bezel. Borders are carried through
/// for the rasterizer, which pads the page by these amounts; the bitmap
/// pipeline itself never reads them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct Borders {
    /// Top margin
    #[serde(default)]
    pub top: u32,
    /// Right margin
    #[serde(default)]
    pub right: u32,
    /// Bottom margin
    #[serde(default)]
    pub bottom: u32,
    /// Left margin
    #[serde(default)]
    pub left: u32,
}

/// Stored configuration of one physical display.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DisplayProfile {
    /// Friendly name
    pub name: String,
    /// Device MAC address (matched case-insensitively)
    pub mac: String,
    /// Panel width in its native orientation
    pub width: u32,
    /// Panel height in its native orientation
    pub height: u32,
    /// Mounting rotation in quarter turns (0-3)
    #[serde(default)]
    pub rotation: i64,
    /// Color variant code ("BW", "BWR", ...)
    pub color_variant: String,
    /// Default tone curve exponent
    #[serde(default)]
    pub gamma: Option<f64>,
    /// Bezel margins
    #[serde(default)]
    pub border: Borders,
}

impl DisplayProfile {
    /// Create a profile with no rotation, default gamma and no borders.
    pub fn new(
        name: impl Into<String>,
        mac: impl Into<String>,
        width: u32,
        height: u32,
        color_variant: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            mac: mac.into(),
            width,
            height,
            rotation: 0,
            color_variant: color_variant.into(),
            gamma: None,
            border: Borders::default(),
        }
    }

    /// Set mounting rotation.
    #[must_use]
    pub fn with_rotation(mut self, quarter_turns: i64) -> Self {
        self.rotation = quarter_turns;
        self
    }

    /// Set default gamma.
    #[must_use]
    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = Some(gamma);
        self
    }

    /// Set bezel margins.
    #[must_use]
    pub fn with_border(mut self, border: Borders) -> Self {
        self.border = border;
        self
    }

    fn swaps_dimensions(&self) -> bool {
        self.rotation.rem_euclid(2) == 1
    }

    /// Width of the page as laid out for reading (before mounting rotation).
    pub fn virtual_width(&self) -> u32 {
        if self.swaps_dimensions() {
            self.height
        } else {
            self.width
        }
    }

    /// Height of the page as laid out for reading (before mounting rotation).
    pub fn virtual_height(&self) -> u32 {
        if self.swaps_dimensions() {
            self.width
        } else {
            self.height
        }
    }

    /// Resolve request parameters against this display's configuration.
    ///
    /// Gamma defaults to the display's own, the color count to the model's,
    /// and the palette comes from the display's color variant unless the request
    /// names its own colors. When that leaves no colors the quantizer falls
    /// back to the web-safe palette.
    pub fn resolve<'r>(
        &self,
        params: &BitmapParams,
        registry: &'r Registry,
    ) -> Result<(TransformRequest, &'r ColorModel), Error> {
        let (rotation, flip, colormap, format) = params.parse_enums()?;
        let (model, variant) = registry.resolve(&self.color_variant)?;

        let gamma = params.gamma.or(self.gamma).unwrap_or(1.0);
        let target_colors = params.colors.unwrap_or(model.num_colors);
        let palette = match params.palette_override()? {
            Some(colors) => colors,
            None => variant.palette(params.preview_colors),
        };

        let colormap = if palette.is_empty() {
            tracing::debug!("Variant {} has no colors, using web-safe palette", variant.code);
            ColormapMode::WebSafe
        } else {
            colormap
        };

        let mut request = TransformRequest::new(self.virtual_width(), self.virtual_height())
            .with_rotation(rotation)
            .with_flip(flip)
            .with_gamma(gamma)
            .with_format(format);
        request.target_colors = target_colors;
        request.palette = palette;
        request.colormap = colormap;

        request.validate()?;
        Ok((request, model))
    }

    /// Resolve the firmware's fixed request.
    ///
    /// Devices always get the native frame in their mounting rotation. With
    /// `web_format` the same page is produced as an unrotated PNG for preview.
    pub fn epaper_request<'r>(
        &self,
        web_format: bool,
        preview_colors: bool,
        registry: &'r Registry,
    ) -> Result<(TransformRequest, &'r ColorModel), Error> {
        let params = BitmapParams {
            rotate: if web_format { 0 } else { self.rotation },
            format: if web_format { "image" } else { "native" }.to_string(),
            preview_colors,
            ..BitmapParams::default()
        };
        self.resolve(&params, registry)
    }
}

/// Resolve `params` for `profile` and encode the rasterizer output at `source`.
///
/// All configuration faults are reported before the source is read.
pub fn encode_for_display(
    source: &Path,
    profile: &DisplayProfile,
    params: &BitmapParams,
    registry: &Registry,
) -> Result<EncodedResult, Error> {
    let (request, model) = profile.resolve(params, registry)?;
    tracing::debug!(
        "Encoding {} for display {} ({:?})",
        source.display(),
        profile.name,
        request.format
    );
    encode_file(source, &request, model)
}

/// Collection of display profiles loaded from the configuration store.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DisplayProfiles {
    /// All configured displays
    #[serde(default)]
    pub displays: Vec<DisplayProfile>,
}

impl DisplayProfiles {
    /// Load profiles from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::Config(format!(
                "Failed to read display profiles '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_yaml(&content)
    }

    /// Parse profiles from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, Error> {
        let profiles: Self = serde_yaml::from_str(yaml)?;
        tracing::info!("Loaded {} display profiles", profiles.displays.len());
        Ok(profiles)
    }

    /// Find a display by MAC address, ignoring case.
    pub fn by_mac(&self, mac: &str) -> Result<&DisplayProfile, Error> {
        self.displays
            .iter()
            .find(|d| d.mac.eq_ignore_ascii_case(mac.trim()))
            .ok_or_else(|| Error::UnknownDisplay(mac.to_string()))
    }
}
