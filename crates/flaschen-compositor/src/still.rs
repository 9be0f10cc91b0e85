use flaschen_types::{
    frame::{AnimationFrame, STATIC_FRAME_DELAY_MS},
    Result,
};
use image::DynamicImage;

use crate::{FrameCompositor, Resampler};

impl<R: Resampler> FrameCompositor<R> {
    /// A still image becomes a one-frame animation so it can share the scheduler.
    pub fn render_still(&self, image: &DynamicImage) -> Result<Vec<AnimationFrame>> {
        let canvas = image.to_rgb8();
        Ok(vec![self.render(&canvas, STATIC_FRAME_DELAY_MS)?])
    }
}
