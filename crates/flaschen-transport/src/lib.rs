//! Datagram transport toward a Flaschen Taschen display.

use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use flaschen_types::{FlaschenError, Result};
use tokio::{net::UdpSocket, sync::OnceCell, time::Instant};
use tracing::debug;

/// Fire-and-forget delivery of one whole raster per datagram.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, datagram: &[u8]) -> Result<usize>;
    fn target(&self) -> String;
}

/// UDP transport bound lazily on first send.
pub struct UdpTransport {
    host: String,
    port: u16,
    socket: OnceCell<UdpSocket>,
}

impl UdpTransport {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            socket: OnceCell::new(),
        }
    }

    async fn resolve(&self) -> Result<SocketAddr> {
        let mut addrs = tokio::net::lookup_host((self.host.as_str(), self.port))
            .await
            .map_err(|err| transport_error(format!("failed to resolve {}: {err}", self.target())))?;
        addrs
            .next()
            .ok_or_else(|| transport_error(format!("no address found for {}", self.target())))
    }

    async fn socket(&self, remote: SocketAddr) -> Result<&UdpSocket> {
        self.socket
            .get_or_try_init(|| async move {
                let local = if remote.is_ipv4() {
                    "0.0.0.0:0"
                } else {
                    "[::]:0"
                };
                UdpSocket::bind(local)
                    .await
                    .map_err(|err| transport_error(format!("failed to bind UDP socket: {err}")))
            })
            .await
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn send(&self, datagram: &[u8]) -> Result<usize> {
        let remote = self.resolve().await?;
        let socket = self.socket(remote).await?;
        let bytes = socket
            .send_to(datagram, remote)
            .await
            .map_err(|err| transport_error(format!("send to {remote} failed: {err}")))?;
        debug!("UDP message sent to {} ({} bytes)", self.target(), bytes);
        Ok(bytes)
    }

    fn target(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// A datagram captured by [`RecordingTransport`].
#[derive(Debug, Clone)]
pub struct RecordedDatagram {
    pub payload: Vec<u8>,
    pub sent_at: Instant,
}

/// In-memory transport used for integration and testing.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    sent: Arc<Mutex<Vec<RecordedDatagram>>>,
    failing: bool,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport that rejects every datagram without recording it.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn datagrams(&self) -> Vec<RecordedDatagram> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.sent.lock().map(|sent| sent.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, datagram: &[u8]) -> Result<usize> {
        if self.failing {
            return Err(transport_error("recording transport configured to fail"));
        }
        let mut sent = self
            .sent
            .lock()
            .map_err(|_| transport_error("failed to lock recorded datagrams"))?;
        sent.push(RecordedDatagram {
            payload: datagram.to_vec(),
            sent_at: Instant::now(),
        });
        Ok(datagram.len())
    }

    fn target(&self) -> String {
        "recording".into()
    }
}

/// Generate an error aligned with transport semantics.
pub fn transport_error(message: impl Into<String>) -> FlaschenError {
    FlaschenError::Transport(message.into())
}
