//! Decoder boundary: animated bytes into delta frame descriptors, still bytes into an image.

use std::io::Cursor;

use flaschen_types::{
    frame::{DisposalHint, FrameDescriptor, Region},
    raster::Rgb,
    FlaschenError, Result,
};
use image::DynamicImage;
use tracing::debug;

/// GIF delays are expressed in hundredths of a second.
const GIF_DELAY_UNIT_MS: u64 = 10;

pub trait AnimationDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<Vec<FrameDescriptor>>;
}

/// Reads GIF frames as indexed delta regions without compositing them.
#[derive(Debug, Clone, Copy, Default)]
pub struct GifFrameDecoder;

impl GifFrameDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl AnimationDecoder for GifFrameDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Vec<FrameDescriptor>> {
        let mut options = gif::DecodeOptions::new();
        options.set_color_output(gif::ColorOutput::Indexed);
        let mut decoder = options
            .read_info(Cursor::new(bytes))
            .map_err(|err| decode_error(format!("invalid GIF header: {err}")))?;
        let global_table = decoder.global_palette().map(palette_to_table);

        let mut descriptors = Vec::new();
        while let Some(frame) = decoder
            .read_next_frame()
            .map_err(|err| decode_error(format!("frame {}: {err}", descriptors.len())))?
        {
            let color_table = match (&frame.palette, &global_table) {
                (Some(local), _) => palette_to_table(local),
                (None, Some(global)) => global.clone(),
                (None, None) => {
                    return Err(decode_error(format!(
                        "frame {} has no color table",
                        descriptors.len()
                    )))
                }
            };
            let disposal = match frame.dispose {
                gif::DisposalMethod::Background => DisposalHint::RestoreBackground,
                gif::DisposalMethod::Previous => DisposalHint::RestorePrevious,
                gif::DisposalMethod::Any | gif::DisposalMethod::Keep => DisposalHint::Accumulate,
            };

            descriptors.push(FrameDescriptor {
                region: Region::new(
                    u32::from(frame.left),
                    u32::from(frame.top),
                    u32::from(frame.width),
                    u32::from(frame.height),
                ),
                color_table,
                pixel_indices: frame.buffer.to_vec(),
                transparent_index: frame.transparent,
                disposal,
                delay_ms: u64::from(frame.delay) * GIF_DELAY_UNIT_MS,
            });
        }

        debug!("decoded {} GIF frame descriptors", descriptors.len());
        Ok(descriptors)
    }
}

fn palette_to_table(palette: &[u8]) -> Vec<Rgb> {
    palette
        .chunks_exact(3)
        .map(|rgb| Rgb::new(rgb[0], rgb[1], rgb[2]))
        .collect()
}

/// Decodes a still image of any format the image crate was built with.
pub fn decode_still(bytes: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(bytes)
        .map_err(|err| decode_error(format!("unable to decode still image: {err}")))
}

pub fn decode_error(message: impl Into<String>) -> FlaschenError {
    FlaschenError::Composition(message.into())
}
