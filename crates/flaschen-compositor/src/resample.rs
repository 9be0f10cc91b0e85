//! Resampling boundary between composited canvases and the target display.

use image::{
    imageops::{self, FilterType},
    RgbImage,
};

/// Contrast boost, in percent, applied after every resize.
pub const CONTRAST_BOOST: f32 = 20.0;

/// Canvas in, canvas out. Implementations must return an image no larger than
/// `width` x `height`.
pub trait Resampler: Send + Sync {
    fn resample(&self, canvas: &RgbImage, width: u32, height: u32) -> RgbImage;
}

/// Fit-to-box, aspect preserving cubic resize followed by [`CONTRAST_BOOST`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FitContrastResampler;

impl Resampler for FitContrastResampler {
    fn resample(&self, canvas: &RgbImage, width: u32, height: u32) -> RgbImage {
        let (fit_width, fit_height) = fit_dimensions(canvas.width(), canvas.height(), width, height);
        let resized = imageops::resize(canvas, fit_width, fit_height, FilterType::CatmullRom);
        imageops::contrast(&resized, CONTRAST_BOOST)
    }
}

/// Largest size with the source aspect ratio that fits inside the box, never
/// collapsing an axis below one pixel.
pub fn fit_dimensions(src_width: u32, src_height: u32, box_width: u32, box_height: u32) -> (u32, u32) {
    if src_width == 0 || src_height == 0 {
        return (box_width.max(1), box_height.max(1));
    }
    let scale = f64::min(
        f64::from(box_width) / f64::from(src_width),
        f64::from(box_height) / f64::from(src_height),
    );
    let width = (f64::from(src_width) * scale).round().clamp(1.0, f64::from(box_width.max(1)));
    let height = (f64::from(src_height) * scale)
        .round()
        .clamp(1.0, f64::from(box_height.max(1)));
    (width as u32, height as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_preserves_aspect_ratio() {
        assert_eq!(fit_dimensions(64, 32, 32, 32), (32, 16));
        assert_eq!(fit_dimensions(10, 40, 32, 32), (8, 32));
        assert_eq!(fit_dimensions(8, 8, 32, 32), (32, 32));
        assert_eq!(fit_dimensions(1000, 1, 32, 32), (32, 1));
    }

    #[test]
    fn resample_stays_inside_target_box() {
        let canvas = RgbImage::from_pixel(50, 20, image::Rgb([90, 90, 90]));
        let out = FitContrastResampler.resample(&canvas, 32, 32);
        assert_eq!(out.dimensions(), (32, 13));
    }

    #[test]
    fn contrast_pushes_values_away_from_midpoint() {
        let canvas = RgbImage::from_fn(4, 4, |x, _| {
            if x < 2 {
                image::Rgb([60, 60, 60])
            } else {
                image::Rgb([200, 200, 200])
            }
        });
        let out = FitContrastResampler.resample(&canvas, 4, 4);
        assert!(out.get_pixel(0, 0)[0] < 60);
        assert!(out.get_pixel(3, 0)[0] > 200);
    }
}
