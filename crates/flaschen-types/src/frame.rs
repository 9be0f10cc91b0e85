use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::raster::{RasterBuffer, Rgb};

/// Delay attached to the single frame produced from a still image.
pub const STATIC_FRAME_DELAY_MS: u64 = 1000;

/// Sub-rectangle of the logical screen touched by a delta frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// How a decoded frame relates to the canvas left behind by its predecessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DisposalHint {
    #[default]
    Accumulate,
    RestoreBackground,
    RestorePrevious,
}

/// Delta frame as reported by an animated-format decoder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameDescriptor {
    pub region: Region,
    pub color_table: Vec<Rgb>,
    /// Row-major indices into `color_table`, `region.area()` entries long.
    pub pixel_indices: Vec<u8>,
    pub transparent_index: Option<u8>,
    pub disposal: DisposalHint,
    pub delay_ms: u64,
}

/// A fully rendered frame ready for the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimationFrame {
    pub image: RasterBuffer,
    pub delay_ms: u64,
}

impl AnimationFrame {
    pub fn new(image: RasterBuffer, delay_ms: u64) -> Self {
        Self { image, delay_ms }
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}
