//! Error types for the bitmap pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while resolving parameters or encoding a bitmap.
#[derive(Debug, Error)]
pub enum Error {
    /// Rotation outside the four cardinal quarter turns
    #[error("Unsupported rotation: {0} (expected 0, 1, 2 or 3)")]
    UnsupportedRotation(i64),

    /// Request parameter that is not a valid number
    #[error("Invalid value for {name}: {value:?}")]
    InvalidParameter {
        /// Parameter name
        name: String,
        /// Raw value as received
        value: String,
    },

    /// Flip mode other than "", "x", "y" or "xy"
    #[error("Unsupported flip: {0:?} (expected \"\", \"x\", \"y\" or \"xy\")")]
    UnsupportedFlip(String),

    /// Colormap name not recognized
    #[error("Unknown colormap: {0:?}")]
    UnknownColormap(String),

    /// Output format not recognized
    #[error("Unknown format requested: {0:?}")]
    UnknownFormat(String),

    /// Color model has no native encoder for its plane count
    #[error("Unsupported display type {code} ({planes} planes)")]
    UnsupportedDisplayType {
        /// Color model code
        code: String,
        /// Plane count declared by the model
        planes: u8,
    },

    /// Explicit colormap requested without any palette colors
    #[error("Explicit colormap requested with an empty palette")]
    EmptyPalette,

    /// Gamma must be a positive, finite number
    #[error("Invalid gamma: {0}")]
    InvalidGamma(f64),

    /// Hex color string could not be parsed
    #[error("Invalid color: {0:?}")]
    InvalidColor(String),

    /// No color model registered under this code
    #[error("Unknown color model: {0}")]
    UnknownColorModel(String),

    /// No color variant registered under this code
    #[error("Unknown color variant: {0}")]
    UnknownColorVariant(String),

    /// No display profile matches this MAC address
    #[error("Unknown display: {0}")]
    UnknownDisplay(String),

    /// The rasterizer has not produced the source image (yet)
    #[error("Source image not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    /// Image decoding or encoding failed
    #[error("Image error: {0}")]
    Image(String),

    /// File I/O failed
    #[error("I/O error: {0}")]
    Io(String),

    /// Configuration could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Framed payload is malformed or its digest does not match
    #[error("Invalid frame: {0}")]
    Frame(String),
}

impl Error {
    /// Whether this error is caused by bad caller parameters or device configuration.
    ///
    /// These are always reported, never defaulted.
    pub fn is_configuration_fault(&self) -> bool {
        matches!(
            self,
            Error::UnsupportedRotation(_)
                | Error::InvalidParameter { .. }
                | Error::UnsupportedFlip(_)
                | Error::UnknownColormap(_)
                | Error::UnknownFormat(_)
                | Error::UnsupportedDisplayType { .. }
                | Error::EmptyPalette
                | Error::InvalidGamma(_)
                | Error::InvalidColor(_)
                | Error::UnknownColorModel(_)
                | Error::UnknownColorVariant(_)
                | Error::Config(_)
        )
    }

    /// Whether this error means something to encode does not exist (yet).
    pub fn is_resource_fault(&self) -> bool {
        matches!(self, Error::SourceNotFound(_) | Error::UnknownDisplay(_))
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::Image(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Config(err.to_string())
    }
}
