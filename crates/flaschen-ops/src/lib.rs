//! Operational helpers: logging, playback event fan-out, capture directories.

use std::path::PathBuf;

use flaschen_types::{config::OpsConfig, events::PlaybackEvent, FlaschenError, Result};
use futures::{stream::BoxStream, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

pub fn init_tracing(config: &OpsConfig) -> Result<()> {
    let filter = EnvFilter::try_new(config.log_level.clone())
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|err| FlaschenError::Ops(format!("failed to create log filter: {err}")))?;

    fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|err| FlaschenError::Ops(format!("tracing init error: {err}")))?;
    Ok(())
}

/// In-process playback event bus backed by a broadcast channel.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PlaybackEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publishing with no subscribers is not an error.
    pub fn publish(&self, event: PlaybackEvent) {
        let _ = self.tx.send(event);
    }

    /// Lagged receivers skip the events they missed.
    pub fn subscribe(&self) -> BoxStream<'static, PlaybackEvent> {
        BroadcastStream::new(self.tx.subscribe())
            .filter_map(|event| async move { event.ok() })
            .boxed()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

pub fn ensure_capture_dir(path: &str) -> Result<PathBuf> {
    let dir = PathBuf::from(path);
    std::fs::create_dir_all(&dir).map_err(|err| {
        FlaschenError::Storage(format!("failed to create capture dir {:?}: {err}", dir))
    })?;
    info!("Capture directory ready at {:?}", dir);
    Ok(dir)
}
