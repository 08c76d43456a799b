//! Captured screen contents and their place on the desktop
//!
//! Captures are in physical pixels while window bounds and input
//! coordinates are in desktop points. On a scaled display one point covers
//! `scale` pixels in each direction.

use image::{imageops, DynamicImage, GrayImage, ImageBuffer, Luma, Pixel, Rgba};

use super::matcher::{self, Hit, Matches};
use super::Region;
use crate::common::{Error, Result};

/// A capture plus the desktop position of its top-left pixel
pub struct Frame<P: Pixel = Luma<u8>> {
    pub image: ImageBuffer<P, Vec<P::Subpixel>>,
    /// Desktop point of pixel (0, 0)
    origin: (f64, f64),
    /// Pixels per point
    scale: f64,
}

impl<P: Pixel + 'static> Frame<P> {
    pub fn new(image: ImageBuffer<P, Vec<P::Subpixel>>, origin: (i32, i32), scale: f64) -> Self {
        let scale = if scale.is_finite() && scale > 0.0 { scale } else { 1.0 };
        Self {
            image,
            origin: (f64::from(origin.0), f64::from(origin.1)),
            scale,
        }
    }

    /// Frame of a monitor capture whose logical width is `points_wide`
    pub fn of_monitor(
        image: ImageBuffer<P, Vec<P::Subpixel>>,
        origin: (i32, i32),
        points_wide: u32,
    ) -> Self {
        let scale = if points_wide == 0 {
            1.0
        } else {
            f64::from(image.width()) / f64::from(points_wide)
        };
        Self::new(image, origin, scale)
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Part of the frame inside `bounds` (desktop points)
    ///
    /// `None` when the bounds do not overlap the capture.
    pub fn crop(&self, bounds: Region) -> Option<Frame<P>> {
        let to_px = |points: f64, origin: f64| ((points - origin) * self.scale).round();
        let left = to_px(f64::from(bounds.x), self.origin.0).max(0.0);
        let top = to_px(f64::from(bounds.y), self.origin.1).max(0.0);
        let right = to_px(f64::from(bounds.x) + f64::from(bounds.width), self.origin.0)
            .min(f64::from(self.image.width()));
        let bottom = to_px(f64::from(bounds.y) + f64::from(bounds.height), self.origin.1)
            .min(f64::from(self.image.height()));

        if right <= left || bottom <= top {
            return None;
        }

        let (x, y) = (left as u32, top as u32);
        let (width, height) = ((right - left) as u32, (bottom - top) as u32);
        Some(Frame {
            image: imageops::crop_imm(&self.image, x, y, width, height).to_image(),
            origin: (
                self.origin.0 + f64::from(x) / self.scale,
                self.origin.1 + f64::from(y) / self.scale,
            ),
            scale: self.scale,
        })
    }

    /// Desktop region covered by a `width` x `height` pixel template at `hit`
    pub fn region(&self, hit: &Hit, width: u32, height: u32) -> Region {
        let point = |px: u32, origin: f64| (origin + f64::from(px) / self.scale).round() as i32;
        let length = |px: u32| ((f64::from(px) / self.scale).round() as u32).max(1);
        Region::new(
            point(hit.x, self.origin.0),
            point(hit.y, self.origin.1),
            length(width),
            length(height),
        )
    }
}

impl Frame<Rgba<u8>> {
    /// Same frame in grayscale, converted the way templates are
    pub fn to_gray(&self) -> Frame {
        Frame {
            image: DynamicImage::ImageRgba8(self.image.clone()).to_luma8(),
            origin: self.origin,
            scale: self.scale,
        }
    }
}

impl Frame {
    /// Look for `template` in this frame
    ///
    /// More than one distinct match is an error.
    pub fn locate(&self, name: &str, template: &GrayImage, confidence: f32) -> Result<Option<(Region, Hit)>> {
        match matcher::find(name, &self.image, template, confidence)? {
            Matches::None => Ok(None),
            Matches::One(hit) => Ok(Some((
                self.region(&hit, template.width(), template.height()),
                hit,
            ))),
            Matches::Many(count) => Err(Error::AmbiguousMatch {
                template: name.to_string(),
                count,
            }),
        }
    }
}
