//! Frame composition: delta descriptors folded onto a running canvas, then
//! resampled into display-sized rasters.
//!
//! Only the accumulate disposal model is supported. Every descriptor is drawn
//! over whatever the previous descriptor left on the canvas; restore-to-background
//! and restore-to-previous hints are reported and then composited as accumulate.

use flaschen_types::{
    frame::{AnimationFrame, DisposalHint, FrameDescriptor},
    raster::{ImageOptions, RasterBuffer, Rgb},
    FlaschenError, Result,
};
use image::RgbImage;
use tracing::{debug, warn};

pub mod resample;
mod still;

pub use resample::{FitContrastResampler, Resampler, CONTRAST_BOOST};

/// Full-size RGB accumulator carried from one descriptor to the next.
pub type Canvas = RgbImage;

/// Turns decoded frames into display-ready [`AnimationFrame`]s.
pub struct FrameCompositor<R = FitContrastResampler> {
    resampler: R,
    target: ImageOptions,
}

impl FrameCompositor<FitContrastResampler> {
    pub fn fit_contrast(target: ImageOptions) -> Result<Self> {
        Self::new(FitContrastResampler, target)
    }
}

impl<R: Resampler> FrameCompositor<R> {
    pub fn new(resampler: R, target: ImageOptions) -> Result<Self> {
        if target.width == 0 || target.height == 0 {
            return Err(FlaschenError::InvalidDimensions {
                width: target.width,
                height: target.height,
            });
        }
        Ok(Self { resampler, target })
    }

    pub fn target(&self) -> ImageOptions {
        self.target
    }

    /// Composites every descriptor in order. Any failing descriptor aborts the
    /// whole pass.
    pub fn composite(&self, descriptors: &[FrameDescriptor]) -> Result<Vec<AnimationFrame>> {
        let first = descriptors.first().ok_or(FlaschenError::EmptyAnimation)?;
        if first.region.width == 0 || first.region.height == 0 {
            return Err(composition_error("first frame has an empty region"));
        }

        let unsupported = descriptors
            .iter()
            .filter(|d| d.disposal != DisposalHint::Accumulate)
            .count();
        if unsupported > 0 {
            warn!(
                "{} of {} frames request a disposal other than accumulate; compositing them as accumulate",
                unsupported,
                descriptors.len()
            );
        }

        let canvas = Canvas::new(first.region.width, first.region.height);
        let (_, frames) = descriptors.iter().enumerate().try_fold(
            (canvas, Vec::with_capacity(descriptors.len())),
            |(canvas, mut frames), (index, descriptor)| {
                let canvas = apply_descriptor(canvas, descriptor)
                    .map_err(|err| composition_error(format!("frame {index}: {err}")))?;
                frames.push(self.render(&canvas, descriptor.delay_ms)?);
                Ok::<_, FlaschenError>((canvas, frames))
            },
        )?;

        debug!(
            "composited {} frames onto {}x{} target",
            frames.len(),
            self.target.width,
            self.target.height
        );
        Ok(frames)
    }

    /// Resamples a canvas and plots it, top-left anchored, into a fresh raster.
    pub fn render(&self, canvas: &Canvas, delay_ms: u64) -> Result<AnimationFrame> {
        let resized = self
            .resampler
            .resample(canvas, self.target.width, self.target.height);
        let mut image = RasterBuffer::new(self.target)?;
        let (width, height) = (
            resized.width().min(self.target.width),
            resized.height().min(self.target.height),
        );
        for y in 0..height {
            for x in 0..width {
                let px = resized.get_pixel(x, y);
                image.plot(x, y, Rgb::new(px[0], px[1], px[2]));
            }
        }
        Ok(AnimationFrame::new(image, delay_ms))
    }
}

/// Draws one descriptor over the canvas. Transparent indices keep the pixel
/// underneath; pixels landing outside the canvas are clipped.
pub fn apply_descriptor(mut canvas: Canvas, descriptor: &FrameDescriptor) -> Result<Canvas> {
    let region = descriptor.region;
    if descriptor.pixel_indices.len() != region.area() {
        return Err(composition_error(format!(
            "expected {} pixel indices for {}x{} region, found {}",
            region.area(),
            region.width,
            region.height,
            descriptor.pixel_indices.len()
        )));
    }
    if region.width == 0 {
        return Ok(canvas);
    }

    let (canvas_width, canvas_height) = canvas.dimensions();
    for (pixel_idx, &color_index) in descriptor.pixel_indices.iter().enumerate() {
        if descriptor.transparent_index == Some(color_index) {
            continue;
        }
        let color = descriptor
            .color_table
            .get(usize::from(color_index))
            .ok_or_else(|| {
                composition_error(format!(
                    "color index {color_index} outside table of {} entries",
                    descriptor.color_table.len()
                ))
            })?;
        let local_x = (pixel_idx % region.width as usize) as u32;
        let local_y = (pixel_idx / region.width as usize) as u32;
        let (x, y) = (region.x + local_x, region.y + local_y);
        if x < canvas_width && y < canvas_height {
            canvas.put_pixel(x, y, image::Rgb([color.r, color.g, color.b]));
        }
    }
    Ok(canvas)
}

pub fn composition_error(message: impl Into<String>) -> FlaschenError {
    FlaschenError::Composition(message.into())
}
