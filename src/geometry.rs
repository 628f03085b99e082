//! Crop, rotation and mirroring.
//!
//! The rasterizer sometimes renders past the bottom of the declared canvas
//! (runaway page styling). The surplus is cut off here, anchored at the
//! top-left corner, before anything else looks at the pixels. Rotation then
//! establishes reading direction for the mounted panel and mirroring is
//! applied last.

use image::imageops;

use crate::request::{Flip, Rotation};
use crate::RasterImage;

/// Crop `image` to at most `width` x `height`, keeping the top-left corner.
///
/// Images already within bounds are returned untouched.
pub fn crop_to_canvas(image: RasterImage, width: u32, height: u32) -> RasterImage {
    let (src_width, src_height) = image.dimensions();
    if src_width <= width && src_height <= height {
        if src_width < width || src_height < height {
            tracing::warn!(
                "Source {}x{} is smaller than canvas {}x{}, leaving as is",
                src_width,
                src_height,
                width,
                height
            );
        }
        return image;
    }

    let crop_width = src_width.min(width);
    let crop_height = src_height.min(height);
    tracing::debug!(
        "Cropping over-rendered source {}x{} to {}x{}",
        src_width,
        src_height,
        crop_width,
        crop_height
    );
    imageops::crop_imm(&image, 0, 0, crop_width, crop_height).to_image()
}

/// Rotate clockwise by whole quarter turns.
pub fn rotate(image: RasterImage, rotation: Rotation) -> RasterImage {
    match rotation {
        Rotation::Rotate0 => image,
        Rotation::Rotate90 => imageops::rotate90(&image),
        Rotation::Rotate180 => imageops::rotate180(&image),
        Rotation::Rotate270 => imageops::rotate270(&image),
    }
}

/// Mirror along the requested axes.
pub fn flip(mut image: RasterImage, flip: Flip) -> RasterImage {
    match flip {
        Flip::None => {}
        Flip::Horizontal => imageops::flip_horizontal_in_place(&mut image),
        Flip::Vertical => imageops::flip_vertical_in_place(&mut image),
        Flip::Both => {
            imageops::flip_horizontal_in_place(&mut image);
            imageops::flip_vertical_in_place(&mut image);
        }
    }
    image
}

/// Crop, then rotate, then flip.
pub fn normalize(
    image: RasterImage,
    width: u32,
    height: u32,
    rotation: Rotation,
    mirror: Flip,
) -> RasterImage {
    let image = crop_to_canvas(image, width, height);
    let image = rotate(image, rotation);
    flip(image, mirror)
}
