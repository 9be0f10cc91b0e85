//! Source loading: resolve a location string to raw image bytes and classify them.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use flaschen_types::{FlaschenError, Result};
use reqwest::{header::CONTENT_TYPE, Client, Url};
use tracing::{debug, info};

pub mod decode;

pub use decode::{decode_still, AnimationDecoder, GifFrameDecoder};

const ANIMATED_CONTENT_TYPE: &str = "image/gif";
const ANIMATED_EXTENSION: &str = "gif";

/// Where a location string points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Network(Url),
    Local(PathBuf),
}

impl Location {
    /// Anything that parses as a URL is fetched over the network, except
    /// `file://` URLs which are read from disk.
    pub fn parse(location: &str) -> Self {
        match Url::parse(location) {
            Ok(url) if url.scheme() == "file" => match url.to_file_path() {
                Ok(path) => Location::Local(path),
                Err(()) => Location::Network(url),
            },
            Ok(url) => Location::Network(url),
            Err(_) => Location::Local(PathBuf::from(location)),
        }
    }
}

/// Raw bytes tagged with the pipeline that should decode them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceBytes {
    Static(Vec<u8>),
    Animated(Vec<u8>),
}

impl SourceBytes {
    pub fn is_animated(&self) -> bool {
        matches!(self, SourceBytes::Animated(_))
    }

    pub fn len(&self) -> usize {
        match self {
            SourceBytes::Static(bytes) | SourceBytes::Animated(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
pub trait SourceLoader: Send + Sync {
    async fn load(&self, location: &str) -> Result<SourceBytes>;
}

/// Loads from HTTP(S) with reqwest and from the local filesystem with tokio.
#[derive(Clone)]
pub struct DefaultSourceLoader {
    client: Client,
}

impl DefaultSourceLoader {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("flaschen/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| source_error(format!("failed to build HTTP client: {err}")))?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn fetch(&self, url: Url) -> Result<SourceBytes> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|err| source_error(format!("request to {url} failed: {err}")))?;

        let animated = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(is_animated_content_type)
            .unwrap_or(false);
        let bytes = response
            .bytes()
            .await
            .map_err(|err| source_error(format!("failed to read body of {url}: {err}")))?
            .to_vec();

        info!("Fetched {} bytes from {} (animated: {})", bytes.len(), url, animated);
        Ok(classified(bytes, animated))
    }

    async fn read(&self, path: &Path) -> Result<SourceBytes> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|err| source_error(format!("unable to read {}: {err}", path.display())))?;
        let animated = is_animated_extension(path);
        debug!(
            "Read {} bytes from {} (animated: {})",
            bytes.len(),
            path.display(),
            animated
        );
        Ok(classified(bytes, animated))
    }
}

#[async_trait]
impl SourceLoader for DefaultSourceLoader {
    async fn load(&self, location: &str) -> Result<SourceBytes> {
        match Location::parse(location) {
            Location::Network(url) => self.fetch(url).await,
            Location::Local(path) => self.read(&path).await,
        }
    }
}

fn classified(bytes: Vec<u8>, animated: bool) -> SourceBytes {
    if animated {
        SourceBytes::Animated(bytes)
    } else {
        SourceBytes::Static(bytes)
    }
}

/// Only `image/gif` is animated; media type parameters are ignored.
pub fn is_animated_content_type(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(|media| media.trim().eq_ignore_ascii_case(ANIMATED_CONTENT_TYPE))
        .unwrap_or(false)
}

pub fn is_animated_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase().contains(ANIMATED_EXTENSION))
        .unwrap_or(false)
}

pub fn source_error(message: impl Into<String>) -> FlaschenError {
    FlaschenError::SourceUnavailable(message.into())
}
