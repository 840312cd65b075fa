use std::pin::Pin;

use futures::TryStreamExt as _;

use crate::config::ApiConfig;
use crate::errors::{ChatError, TransportError};
use crate::wire::ChatTurnRequest;

/// Readable byte sequence with an end signal. Dropping it aborts the
/// underlying request.
pub type ByteStream =
    Pin<Box<dyn futures::Stream<Item = Result<bytes::Bytes, TransportError>> + Send + 'static>>;

/// Seam over the chat endpoint: issues the turn request and hands back the
/// raw response body. The streaming client knows nothing beyond this.
#[async_trait::async_trait]
pub trait StreamTransport: Send + Sync {
    async fn post_stream(&self, request: &ChatTurnRequest) -> Result<ByteStream, TransportError>;
}

/// reqwest-backed transport for the workspace backend.
///
/// Credentials ride on the session cookie, so the client is built with a
/// cookie store; the auth flow itself lives outside this crate.
pub struct HttpTransport {
    client: reqwest::Client,
    config: ApiConfig,
}

impl HttpTransport {
    pub fn new(config: ApiConfig) -> Result<Self, ChatError> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(config.timeout)
            .build()
            .map_err(|e| ChatError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }
}

#[async_trait::async_trait]
impl StreamTransport for HttpTransport {
    async fn post_stream(&self, request: &ChatTurnRequest) -> Result<ByteStream, TransportError> {
        let response = self
            .client
            .post(self.config.chat_url())
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(request)
            .send()
            .await
            .map_err(|e| TransportError::request(format!("chat request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(TransportError::status(status.as_u16(), body));
        }

        let stream = response
            .bytes_stream()
            .map_err(|e| TransportError::read(format!("chat stream read failed: {e}")));
        Ok(Box::pin(stream))
    }
}
