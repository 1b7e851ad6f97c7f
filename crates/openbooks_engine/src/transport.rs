use async_trait::async_trait;
use reqwest::Url;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("http status {0}")]
    Status(u16),
    #[error("stream error: {0}")]
    Stream(String),
    #[error("send failed: {0}")]
    Send(String),
}

/// Inbound half of a connection.
#[async_trait]
pub trait FrameStream: Send {
    /// Next complete payload, or `None` once the peer closed the stream.
    ///
    /// Must be cancel safe: the supervisor polls it inside `select!`.
    async fn next_frame(&mut self) -> Option<Result<String, TransportError>>;
}

/// Outbound half of a connection.
#[async_trait]
pub trait RequestSink: Send {
    async fn send(&mut self, frame: &str) -> Result<(), TransportError>;
}

pub struct Connection {
    pub frames: Box<dyn FrameStream>,
    pub requests: Box<dyn RequestSink>,
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self) -> Result<Connection, TransportError>;
}

/// Parse a base URL so that relative joins append to its path.
pub(crate) fn parse_base_url(raw: &str) -> Result<Url, String> {
    let mut url = Url::parse(raw.trim()).map_err(|err| format!("{raw}: {err}"))?;
    if url.cannot_be_a_base() {
        return Err(format!("{raw}: not a base URL"));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
