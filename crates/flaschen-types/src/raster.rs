//! PPM raster buffers carrying the Flaschen Taschen header.
//!
//! The wire layout is a binary PPM (`P6`) whose comment line carries the
//! placement metadata understood by the display:
//!
//! ```text
//! P6\n<width> <height>\n#FT: <offset_x> <offset_y> <layer>\n255\n<width*height*3 RGB bytes>
//! ```

use std::{borrow::Cow, fs, path::Path};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{FlaschenError, Result};

pub const FORMAT_TAG: &str = "P6";
pub const HEADER_MARKER: &str = "FT";
pub const MAX_CHANNEL_VALUE: u16 = 255;

/// Naive 24-bit colour value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Canvas geometry and placement metadata for a raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageOptions {
    pub width: u32,
    pub height: u32,
    pub layer: i32,
    pub offset_x: i32,
    pub offset_y: i32,
}

impl ImageOptions {
    pub const DEFAULT_WIDTH: u32 = 32;
    pub const DEFAULT_HEIGHT: u32 = 32;
    pub const DEFAULT_LAYER: i32 = 15;

    pub fn sized(width: u32, height: u32, layer: i32) -> Self {
        Self {
            width,
            height,
            layer,
            offset_x: 0,
            offset_y: 0,
        }
    }
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self::sized(Self::DEFAULT_WIDTH, Self::DEFAULT_HEIGHT, Self::DEFAULT_LAYER)
    }
}

/// Partial options merged over a client's defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageOverrides {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub layer: Option<i32>,
    pub offset_x: Option<i32>,
    pub offset_y: Option<i32>,
}

impl ImageOverrides {
    pub fn merge_onto(self, base: ImageOptions) -> ImageOptions {
        ImageOptions {
            width: self.width.unwrap_or(base.width),
            height: self.height.unwrap_or(base.height),
            layer: self.layer.unwrap_or(base.layer),
            offset_x: self.offset_x.unwrap_or(base.offset_x),
            offset_y: self.offset_y.unwrap_or(base.offset_y),
        }
    }
}

/// Header plus row-major RGB pixel data, sized exactly once at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterBuffer {
    options: ImageOptions,
    header_len: usize,
    data: Vec<u8>,
}

impl RasterBuffer {
    pub fn create(
        width: u32,
        height: u32,
        layer: i32,
        offset_x: i32,
        offset_y: i32,
    ) -> Result<Self> {
        Self::new(ImageOptions {
            width,
            height,
            layer,
            offset_x,
            offset_y,
        })
    }

    /// Allocates a black raster with the header already written.
    pub fn new(options: ImageOptions) -> Result<Self> {
        let invalid = || FlaschenError::InvalidDimensions {
            width: options.width,
            height: options.height,
        };
        if options.width == 0 || options.height == 0 {
            return Err(invalid());
        }

        let header = format!(
            "{FORMAT_TAG}\n{} {}\n#{HEADER_MARKER}: {} {} {}\n{MAX_CHANNEL_VALUE}\n",
            options.width, options.height, options.offset_x, options.offset_y, options.layer
        );
        let pixel_len = (options.width as usize)
            .checked_mul(options.height as usize)
            .and_then(|count| count.checked_mul(3))
            .ok_or_else(invalid)?;

        let mut data = Vec::with_capacity(header.len() + pixel_len);
        data.extend_from_slice(header.as_bytes());
        data.resize(header.len() + pixel_len, 0);

        Ok(Self {
            options,
            header_len: header.len(),
            data,
        })
    }

    pub fn options(&self) -> ImageOptions {
        self.options
    }

    pub fn width(&self) -> u32 {
        self.options.width
    }

    pub fn height(&self) -> u32 {
        self.options.height
    }

    pub fn header_len(&self) -> usize {
        self.header_len
    }

    pub fn header(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.data[..self.header_len])
    }

    fn offset(&self, x: u32, y: u32) -> Option<usize> {
        if x < self.options.width && y < self.options.height {
            let index = x as usize + y as usize * self.options.width as usize;
            Some(self.header_len + index * 3)
        } else {
            None
        }
    }

    /// Writes one pixel. Coordinates outside the canvas are ignored and
    /// reported through `false` so header bytes are never overwritten.
    pub fn plot(&mut self, x: u32, y: u32, color: Rgb) -> bool {
        let Some(offset) = self.offset(x, y) else {
            warn!(
                "plot outside {}x{} canvas ignored: ({x}, {y})",
                self.options.width, self.options.height
            );
            return false;
        };
        self.data[offset..offset + 3].copy_from_slice(&[color.r, color.g, color.b]);
        true
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgb> {
        let offset = self.offset(x, y)?;
        let px = &self.data[offset..offset + 3];
        Some(Rgb::new(px[0], px[1], px[2]))
    }

    /// Resets every pixel to black; the header is left untouched.
    pub fn clear(&mut self) {
        self.data[self.header_len..].fill(0);
    }

    pub fn pixel_bytes(&self) -> &[u8] {
        &self.data[self.header_len..]
    }

    /// Full wire representation: header followed by pixel data.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path_ref = path.as_ref();
        fs::write(path_ref, &self.data).map_err(|err| {
            FlaschenError::Storage(format!(
                "unable to write raster to {}: {err}",
                path_ref.display()
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_length_matches_header_and_pixels() {
        for (w, h) in [(1, 1), (32, 32), (45, 7), (128, 64)] {
            let raster = RasterBuffer::create(w, h, 15, 0, 0).expect("raster");
            assert_eq!(
                raster.as_bytes().len(),
                raster.header_len() + 3 * (w as usize) * (h as usize)
            );
        }
    }

    #[test]
    fn header_carries_geometry_and_placement() {
        let raster = RasterBuffer::create(16, 8, 3, -2, 5).expect("raster");
        assert_eq!(raster.header(), "P6\n16 8\n#FT: -2 5 3\n255\n");
        assert!(raster.as_bytes().starts_with(b"P6\n16 8\n#FT: -2 5 3\n255\n"));
    }

    #[test]
    fn zero_dimensions_are_rejected() {
        assert!(matches!(
            RasterBuffer::create(0, 4, 0, 0, 0),
            Err(FlaschenError::InvalidDimensions { width: 0, height: 4 })
        ));
        assert!(matches!(
            RasterBuffer::create(4, 0, 0, 0, 0),
            Err(FlaschenError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn plot_touches_only_its_window() {
        let mut raster = RasterBuffer::create(4, 3, 0, 0, 0).expect("raster");
        let before = raster.as_bytes().to_vec();
        assert!(raster.plot(2, 1, Rgb::new(10, 20, 30)));
        assert_eq!(raster.pixel(2, 1), Some(Rgb::new(10, 20, 30)));

        let window = raster.header_len() + (2 + 4) * 3;
        for (idx, (a, b)) in before.iter().zip(raster.as_bytes()).enumerate() {
            if !(window..window + 3).contains(&idx) {
                assert_eq!(a, b, "byte {idx} changed");
            }
        }
    }

    #[test]
    fn out_of_range_plot_leaves_buffer_intact() {
        let mut raster = RasterBuffer::create(2, 2, 0, 0, 0).expect("raster");
        let before = raster.as_bytes().to_vec();
        assert!(!raster.plot(2, 0, Rgb::new(255, 255, 255)));
        assert!(!raster.plot(0, 2, Rgb::new(255, 255, 255)));
        assert_eq!(before, raster.as_bytes());
        assert_eq!(raster.pixel(5, 5), None);
    }

    #[test]
    fn clear_blacks_out_pixels_only() {
        let mut raster = RasterBuffer::create(3, 3, 1, 0, 0).expect("raster");
        for y in 0..3 {
            for x in 0..3 {
                raster.plot(x, y, Rgb::new(200, 100, 50));
            }
        }
        let header = raster.header().into_owned();
        raster.clear();
        assert_eq!(raster.header(), header);
        for y in 0..3 {
            for x in 0..3 {
                assert_eq!(raster.pixel(x, y), Some(Rgb::BLACK));
            }
        }
    }

    #[test]
    fn overrides_merge_onto_defaults() {
        let merged = ImageOverrides {
            width: Some(64),
            layer: Some(2),
            ..Default::default()
        }
        .merge_onto(ImageOptions::default());
        assert_eq!(merged.width, 64);
        assert_eq!(merged.height, 32);
        assert_eq!(merged.layer, 2);
        assert_eq!(merged.offset_x, 0);
    }

    #[test]
    fn write_emits_wire_bytes() {
        let path = std::env::temp_dir().join("flaschen-raster-write-test.ppm");
        let mut raster = RasterBuffer::create(2, 1, 0, 0, 0).expect("raster");
        raster.plot(1, 0, Rgb::new(1, 2, 3));
        raster.write(&path).expect("write raster");
        let on_disk = fs::read(&path).expect("read back");
        assert_eq!(on_disk, raster.as_bytes());
        fs::remove_file(&path).expect("cleanup raster");
    }

    #[test]
    fn write_to_missing_directory_is_storage_error() {
        let raster = RasterBuffer::create(1, 1, 0, 0, 0).expect("raster");
        let path = std::env::temp_dir()
            .join("flaschen-missing-dir")
            .join("nested")
            .join("frame.ppm");
        assert!(matches!(raster.write(path), Err(FlaschenError::Storage(_))));
    }
}
