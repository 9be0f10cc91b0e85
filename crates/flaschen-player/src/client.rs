use std::sync::Arc;

use flaschen_compositor::FrameCompositor;
use flaschen_ops::EventBus;
use flaschen_source::{DefaultSourceLoader, GifFrameDecoder};
use flaschen_transport::{Transport, UdpTransport};
use flaschen_types::{
    config::{DisplayConfig, PlayerConfig, DEFAULT_PORT},
    raster::{ImageOptions, ImageOverrides, RasterBuffer},
    Result,
};
use tracing::warn;

use crate::player::Player;

/// Handle on one display endpoint.
pub struct FlaschenClient<T: Transport + 'static = UdpTransport> {
    transport: Arc<T>,
    defaults: ImageOptions,
    events: EventBus,
}

impl FlaschenClient<UdpTransport> {
    pub fn new(host: impl Into<String>, port: Option<u16>) -> Self {
        let transport = UdpTransport::new(host, port.unwrap_or(DEFAULT_PORT));
        Self::with_transport(transport, ImageOptions::default())
    }

    pub fn from_config(config: &DisplayConfig) -> Self {
        let transport = UdpTransport::new(config.host.clone(), config.port);
        Self::with_transport(transport, config.image_options())
    }
}

impl<T: Transport + 'static> FlaschenClient<T> {
    pub fn with_transport(transport: T, defaults: ImageOptions) -> Self {
        Self {
            transport: Arc::new(transport),
            defaults,
            events: EventBus::default(),
        }
    }

    pub fn defaults(&self) -> ImageOptions {
        self.defaults
    }

    pub fn target(&self) -> String {
        self.transport.target()
    }

    /// A blank raster using the client defaults with `overrides` applied.
    pub fn create(&self, overrides: ImageOverrides) -> Result<RasterBuffer> {
        RasterBuffer::new(overrides.merge_onto(self.defaults))
    }

    /// Sends the raster immediately as one datagram.
    pub async fn render(&self, image: &RasterBuffer) -> Result<usize> {
        self.transport.send(image.as_bytes()).await.map_err(|err| {
            warn!("render to {} failed: {err}", self.transport.target());
            err
        })
    }

    /// Player on a `width` x `height` canvas, 32x32 when unspecified.
    pub fn create_player(&self, width: Option<u32>, height: Option<u32>) -> Result<Player<T>> {
        let defaults = PlayerConfig::default();
        self.create_player_with(&PlayerConfig {
            width: width.unwrap_or(defaults.width),
            height: height.unwrap_or(defaults.height),
            ..defaults
        })
    }

    pub fn create_player_with(&self, config: &PlayerConfig) -> Result<Player<T>> {
        let compositor =
            FrameCompositor::fit_contrast(ImageOptions::sized(config.width, config.height, config.layer))?;
        Ok(Player::new(
            Arc::clone(&self.transport),
            DefaultSourceLoader::new()?,
            GifFrameDecoder::new(),
            compositor,
            self.events.clone(),
        ))
    }

    /// Event bus shared by every player created from this client.
    pub fn events(&self) -> &EventBus {
        &self.events
    }
}
