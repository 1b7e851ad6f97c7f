//! Server-Sent Events inbound stream paired with HTTP POST for requests.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Url;

use crate::transport::{
    parse_base_url, Connection, FrameStream, RequestSink, Transport, TransportError,
};

#[derive(Debug, Clone)]
pub struct SseSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub stream_path: String,
    pub request_path: String,
}

impl Default for SseSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            stream_path: "stream".to_string(),
            request_path: "request".to_string(),
        }
    }
}

/// Incremental `text/event-stream` parser yielding the `data` of each event.
///
/// Lines may end in LF, CR or CRLF, mixed freely within one stream.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    /// Bytes of `buffer` already returned as lines.
    consumed: usize,
    /// Bytes past `consumed` already searched for a line terminator.
    scanned: usize,
    /// The last line ended in CR; a following LF belongs to it.
    skip_lf: bool,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, chunk: &[u8]) {
        if self.consumed > 0 {
            self.buffer.drain(..self.consumed);
            self.consumed = 0;
        }
        self.buffer.extend_from_slice(chunk);
    }

    /// Pop the next complete event. Events without data lines are skipped.
    pub fn next_event(&mut self) -> Option<String> {
        while let Some(line) = self.next_line() {
            if line.is_empty() {
                if !self.data.is_empty() {
                    return Some(std::mem::take(&mut self.data).join("\n"));
                }
                continue;
            }
            if line == "data" {
                self.data.push(String::new());
            } else if let Some(value) = line.strip_prefix("data:") {
                self.data
                    .push(value.strip_prefix(' ').unwrap_or(value).to_string());
            }
        }
        None
    }

    fn next_line(&mut self) -> Option<String> {
        if self.skip_lf {
            match self.buffer.get(self.consumed) {
                None => return None,
                Some(b'\n') => self.consumed += 1,
                Some(_) => {}
            }
            self.skip_lf = false;
        }

        let pending = &self.buffer[self.consumed..];
        let Some(offset) = pending[self.scanned..]
            .iter()
            .position(|b| *b == b'\n' || *b == b'\r')
        else {
            self.scanned = pending.len();
            return None;
        };
        let end = self.scanned + offset;
        let line = String::from_utf8_lossy(&pending[..end]).into_owned();
        self.skip_lf = pending[end] == b'\r';
        self.consumed += end + 1;
        self.scanned = 0;
        Some(line)
    }
}

struct SseFrames {
    stream: BoxStream<'static, reqwest::Result<Bytes>>,
    decoder: SseDecoder,
}

#[async_trait]
impl FrameStream for SseFrames {
    async fn next_frame(&mut self) -> Option<Result<String, TransportError>> {
        loop {
            if let Some(event) = self.decoder.next_event() {
                return Some(Ok(event));
            }
            match self.stream.next().await {
                Some(Ok(chunk)) => self.decoder.feed(&chunk),
                Some(Err(err)) => return Some(Err(TransportError::Stream(err.to_string()))),
                None => return None,
            }
        }
    }
}

struct HttpRequestSink {
    client: reqwest::Client,
    url: Url,
    timeout: Duration,
}

#[async_trait]
impl RequestSink for HttpRequestSink {
    async fn send(&mut self, frame: &str) -> Result<(), TransportError> {
        let response = self
            .client
            .post(self.url.clone())
            .timeout(self.timeout)
            .header(CONTENT_TYPE, "application/json")
            .body(frame.to_string())
            .send()
            .await
            .map_err(|err| TransportError::Send(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SseTransport {
    client: reqwest::Client,
    stream_url: Url,
    request_url: Url,
    request_timeout: Duration,
}

impl SseTransport {
    pub fn new(base_url: &str, settings: SseSettings) -> Result<Self, TransportError> {
        let base = parse_base_url(base_url).map_err(TransportError::InvalidEndpoint)?;
        let join = |path: &str| {
            base.join(path.trim_start_matches('/'))
                .map_err(|err| TransportError::InvalidEndpoint(format!("{path}: {err}")))
        };
        let stream_url = join(&settings.stream_path)?;
        let request_url = join(&settings.request_path)?;

        // No overall timeout: the event stream is expected to stay open.
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .build()
            .map_err(|err| TransportError::Connect(err.to_string()))?;

        Ok(Self {
            client,
            stream_url,
            request_url,
            request_timeout: settings.request_timeout,
        })
    }
}

#[async_trait]
impl Transport for SseTransport {
    async fn connect(&self) -> Result<Connection, TransportError> {
        let response = self
            .client
            .get(self.stream_url.clone())
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|err| TransportError::Connect(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        Ok(Connection {
            frames: Box::new(SseFrames {
                stream: response.bytes_stream().boxed(),
                decoder: SseDecoder::new(),
            }),
            requests: Box::new(HttpRequestSink {
                client: self.client.clone(),
                url: self.request_url.clone(),
                timeout: self.request_timeout,
            }),
        })
    }
}
