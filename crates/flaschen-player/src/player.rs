use std::sync::Arc;

use flaschen_compositor::FrameCompositor;
use flaschen_ops::EventBus;
use flaschen_source::{
    decode_still, AnimationDecoder, DefaultSourceLoader, GifFrameDecoder, SourceBytes,
    SourceLoader,
};
use flaschen_transport::Transport;
use flaschen_types::{
    events::PlaybackEvent, frame::AnimationFrame, raster::ImageOptions, Result,
};
use futures::stream::BoxStream;
use tracing::{info, warn};
use uuid::Uuid;

use crate::scheduler::{PlaybackScheduler, SchedulerState};

/// Loads, composites and loops images on one display canvas.
pub struct Player<T, L = DefaultSourceLoader, D = GifFrameDecoder>
where
    T: Transport + 'static,
    L: SourceLoader,
    D: AnimationDecoder,
{
    loader: L,
    decoder: D,
    compositor: FrameCompositor,
    scheduler: PlaybackScheduler<T>,
    events: EventBus,
}

impl<T, L, D> Player<T, L, D>
where
    T: Transport + 'static,
    L: SourceLoader,
    D: AnimationDecoder,
{
    pub fn new(
        transport: Arc<T>,
        loader: L,
        decoder: D,
        compositor: FrameCompositor,
        events: EventBus,
    ) -> Self {
        Self {
            loader,
            decoder,
            compositor,
            scheduler: PlaybackScheduler::new(transport, events.clone()),
            events,
        }
    }

    /// Replaces whatever is playing with `location`. Loading or composition
    /// failures are returned and leave the current playback running.
    pub async fn play(&self, location: &str) -> Result<Uuid> {
        let frames = self.prepare(location).await.map_err(|err| {
            warn!("play({location}) aborted: {err}");
            err
        })?;
        info!("Playing {} ({} frames)", location, frames.len());
        self.scheduler.play(frames)
    }

    /// Loads and composites a source without touching playback.
    pub async fn prepare(&self, location: &str) -> Result<Vec<AnimationFrame>> {
        match self.loader.load(location).await? {
            SourceBytes::Animated(bytes) => {
                let descriptors = self.decoder.decode(&bytes)?;
                self.compositor.composite(&descriptors)
            }
            SourceBytes::Static(bytes) => {
                let image = decode_still(&bytes)?;
                self.compositor.render_still(&image)
            }
        }
    }

    pub fn stop(&self) {
        self.scheduler.stop();
    }

    pub fn state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    pub fn target(&self) -> ImageOptions {
        self.compositor.target()
    }

    pub fn subscribe(&self) -> BoxStream<'static, PlaybackEvent> {
        self.events.subscribe()
    }
}
