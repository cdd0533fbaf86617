//! Thumbnail geometry resolution
//!
//! Turns the dimensions of a source image and the constraints of a thumbnail
//! request (`max_width`, `max_height`, `square`) into the final output size and
//! the region of the source to sample from.
//!
//! All functions here are pure and testable without any I/O or images.

use serde::{Deserialize, Serialize};

/// Upper bound on fitting iterations. Fitting settles after one or two steps.
const MAX_FIT_STEPS: usize = 8;

/// Width and height of an image in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Size constraints requested by a client. Zero means unconstrained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraints {
    pub max_width: u32,
    pub max_height: u32,
    pub square: bool,
}

/// Resolved thumbnail geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geometry {
    /// Output width
    pub width: u32,
    /// Output height
    pub height: u32,
    /// Left edge of the sampled source region
    pub crop_x: u32,
    /// Top edge of the sampled source region
    pub crop_y: u32,
    /// Width of the sampled source region
    pub source_width: u32,
    /// Height of the sampled source region
    pub source_height: u32,
    /// The original already fits inside the resolved size, so resizing would upscale
    pub fits_original: bool,
}

impl Geometry {
    /// True when there is nothing to render (no usable constraint or an empty source)
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    fn empty(original: Dimensions) -> Self {
        Self {
            width: 0,
            height: 0,
            crop_x: 0,
            crop_y: 0,
            source_width: original.width,
            source_height: original.height,
            fits_original: false,
        }
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Truncate a fractional side to whole pixels, keeping requested sides non-zero.
fn to_pixels(value: f64) -> u32 {
    if value <= 0.0 {
        0
    } else {
        (value.trunc() as u32).max(1)
    }
}

/// Resolve the final thumbnail geometry for a source image.
///
/// # Examples
/// ```
/// use thumb_geometry::{resolve, Constraints, Dimensions};
///
/// // 1000x600 landscape bounded by a 100x100 box → 100x60
/// let g = resolve(
///     Dimensions::new(1000, 600),
///     Constraints { max_width: 100, max_height: 100, square: false },
/// );
/// assert_eq!((g.width, g.height), (100, 60));
/// ```
pub fn resolve(original: Dimensions, constraints: Constraints) -> Geometry {
    if original.width == 0 || original.height == 0 {
        return Geometry::empty(original);
    }

    let ow = f64::from(original.width);
    let oh = f64::from(original.height);
    let (w, h) = (f64::from(constraints.max_width), f64::from(constraints.max_height));

    // A box already matching the source's aspect is used as-is, square or not
    if constraints.square && !matches_aspect(ow, oh, w, h) {
        return resolve_square(original, constraints);
    }

    let (w, h) = fit(ow, oh, w, h);

    if w <= 0.0 || h <= 0.0 {
        return Geometry::empty(original);
    }

    Geometry {
        width: to_pixels(w),
        height: to_pixels(h),
        crop_x: 0,
        crop_y: 0,
        source_width: original.width,
        source_height: original.height,
        fits_original: ow <= w && oh <= h,
    }
}

/// Centre a square on the shorter side of the source.
fn resolve_square(original: Dimensions, constraints: Constraints) -> Geometry {
    let mut w = constraints.max_width;
    let mut h = constraints.max_height;
    if w == 0 {
        w = h;
    }
    if h == 0 {
        h = w;
    }

    if w == 0 {
        return Geometry::empty(original);
    }

    let side = original.width.min(original.height);
    let crop_x = (original.width - side).div_ceil(2);
    let crop_y = (original.height - side).div_ceil(2);

    Geometry {
        width: w,
        height: h,
        crop_x,
        crop_y,
        source_width: side,
        source_height: side,
        fits_original: original.width <= w && original.height <= h,
    }
}

/// The box fits inside the source and scales both sides equally.
fn matches_aspect(ow: f64, oh: f64, w: f64, h: f64) -> bool {
    w > 0.0 && h > 0.0 && w <= ow && h <= oh && w / ow == h / oh
}

/// Shrink the requested box until it matches the source aspect ratio.
fn fit(ow: f64, oh: f64, mut w: f64, mut h: f64) -> (f64, f64) {
    let xscale = w / ow;
    let yscale = h / oh;

    if matches_aspect(ow, oh, w, h) {
        return (w, h);
    }

    if w > 0.0 && h == 0.0 {
        return (w, xscale * oh);
    }
    if w == 0.0 && h > 0.0 {
        return (yscale * ow, h);
    }

    for _ in 0..MAX_FIT_STEPS {
        let xscale = w / ow;
        let yscale = h / oh;

        if xscale != yscale {
            if ow * yscale <= w {
                w = ow * yscale;
            }
            if oh * xscale <= h {
                h = oh * xscale;
            }
        }

        if round3(w / ow) == round3(h / oh) {
            break;
        }
    }

    (w, h)
}
