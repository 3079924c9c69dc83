//! Byte-stream transport for manifests and artifacts.
//!
//! The pipeline treats the network as a black box behind the [`Transport`]
//! trait: it asks for a [`ByteStream`] (artifacts) or a string (manifests)
//! and drives everything else itself. The production implementation is
//! [`HttpTransport`] over reqwest; tests substitute an in-memory transport.

use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use futures::stream::{Stream, StreamExt};

use super::error::{ModuleError, Result};

/// A readable stream of bytes with an optional known total length.
pub struct ByteStream {
    total_len: Option<u64>,
    inner: Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send>>,
}

impl ByteStream {
    /// Wrap a chunk stream.
    ///
    /// # Arguments
    ///
    /// * `total_len` - Total byte length if the producer knows it
    /// * `inner` - The chunk stream
    pub fn new(
        total_len: Option<u64>,
        inner: impl Stream<Item = std::io::Result<Bytes>> + Send + 'static,
    ) -> Self {
        Self {
            total_len,
            inner: Box::pin(inner),
        }
    }

    /// Build a stream over an in-memory buffer with a known length.
    pub fn from_vec(data: Vec<u8>) -> Self {
        let total = data.len() as u64;
        let chunks = vec![Ok(Bytes::from(data))];
        Self::new(Some(total), futures::stream::iter(chunks))
    }

    /// Total length reported by the producer, if known.
    pub fn total_len(&self) -> Option<u64> {
        self.total_len
    }

    /// Read the next chunk, or `None` at end of stream.
    pub async fn next_chunk(&mut self) -> Option<std::io::Result<Bytes>> {
        self.inner.next().await
    }
}

impl std::fmt::Debug for ByteStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteStream")
            .field("total_len", &self.total_len)
            .finish_non_exhaustive()
    }
}

/// Download collaborator used by the module pipeline.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Open a byte stream for the resource at `url`.
    ///
    /// # Errors
    ///
    /// Returns an error on connect/read failure or a non-success HTTP
    /// status.
    async fn fetch(&self, url: &str) -> Result<ByteStream>;

    /// Fetch the resource at `url` as text.
    ///
    /// # Errors
    ///
    /// Returns an error on connect/read failure or a non-success HTTP
    /// status.
    async fn fetch_text(&self, url: &str) -> Result<String>;
}

/// HTTP transport with connect and read timeouts.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build a transport with the given timeouts.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying client cannot be constructed.
    pub fn new(connect_timeout: Duration, read_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .read_timeout(read_timeout)
            .build()?;
        Ok(Self { client })
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ModuleError::Download {
                url: url.to_string(),
                source: e,
            })?;

        if !response.status().is_success() {
            return Err(ModuleError::Http {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        Ok(response)
    }
}

impl Transport for HttpTransport {
    async fn fetch(&self, url: &str) -> Result<ByteStream> {
        let response = self.get(url).await?;
        let total_len = response.content_length();
        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(std::io::Error::other));
        Ok(ByteStream::new(total_len, stream))
    }

    async fn fetch_text(&self, url: &str) -> Result<String> {
        let response = self.get(url).await?;
        response.text().await.map_err(|e| ModuleError::Download {
            url: url.to_string(),
            source: e,
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    /// In-memory transport serving canned responses and counting fetches.
    #[derive(Debug, Default)]
    pub(crate) struct MockTransport {
        responses: HashMap<String, Vec<u8>>,
        failing: Vec<String>,
        hide_length: bool,
        fetch_counts: Mutex<HashMap<String, u32>>,
    }

    impl MockTransport {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn with_response(mut self, url: &str, body: Vec<u8>) -> Self {
            self.responses.insert(url.to_string(), body);
            self
        }

        pub(crate) fn with_failure(mut self, url: &str) -> Self {
            self.failing.push(url.to_string());
            self
        }

        /// Serve streams without a known total length.
        pub(crate) fn with_hidden_length(mut self) -> Self {
            self.hide_length = true;
            self
        }

        pub(crate) fn fetch_count(&self, url: &str) -> u32 {
            match self.fetch_counts.lock() {
                Ok(counts) => counts.get(url).copied().unwrap_or(0),
                Err(_) => panic!("fetch count lock poisoned"),
            }
        }

        fn body(&self, url: &str) -> Result<Vec<u8>> {
            match self.fetch_counts.lock() {
                Ok(mut counts) => *counts.entry(url.to_string()).or_insert(0) += 1,
                Err(_) => panic!("fetch count lock poisoned"),
            }

            if self.failing.iter().any(|u| u == url) {
                return Err(ModuleError::Http {
                    url: url.to_string(),
                    status: 500,
                });
            }

            match self.responses.get(url) {
                Some(body) => Ok(body.clone()),
                None => Err(ModuleError::Http {
                    url: url.to_string(),
                    status: 404,
                }),
            }
        }
    }

    impl Transport for MockTransport {
        async fn fetch(&self, url: &str) -> Result<ByteStream> {
            let body = self.body(url)?;
            let mut stream = ByteStream::from_vec(body);
            if self.hide_length {
                stream.total_len = None;
            }
            Ok(stream)
        }

        async fn fetch_text(&self, url: &str) -> Result<String> {
            let body = self.body(url)?;
            String::from_utf8(body)
                .map_err(|e| ModuleError::Io {
                    source: std::io::Error::other(e),
                })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::MockTransport;
    use super::*;

    #[tokio::test]
    async fn test_byte_stream_from_vec() {
        let mut stream = ByteStream::from_vec(vec![1, 2, 3, 4]);
        assert_eq!(stream.total_len(), Some(4));

        let mut collected = Vec::new();
        while let Some(chunk) = stream.next_chunk().await {
            match chunk {
                Ok(bytes) => collected.extend_from_slice(&bytes),
                Err(e) => panic!("Unexpected stream error: {e}"),
            }
        }
        assert_eq!(collected, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_mock_transport_counts_fetches() {
        let transport =
            MockTransport::new().with_response("http://x/demo.jar", vec![0xca, 0xfe]);

        for _ in 0..2 {
            match transport.fetch("http://x/demo.jar").await {
                Ok(_) => {}
                Err(e) => panic!("Unexpected fetch failure: {e}"),
            }
        }
        assert_eq!(transport.fetch_count("http://x/demo.jar"), 2);
        assert_eq!(transport.fetch_count("http://x/other.jar"), 0);
    }

    #[tokio::test]
    async fn test_mock_transport_missing_url_is_http_error() {
        let transport = MockTransport::new();
        match transport.fetch("http://x/missing.jar").await {
            Err(ModuleError::Http { status: 404, .. }) => {}
            Err(e) => panic!("Expected HTTP 404, got: {e}"),
            Ok(_) => panic!("Expected failure for unknown URL"),
        }
    }

    #[tokio::test]
    async fn test_mock_transport_fetch_text() {
        let transport = MockTransport::new()
            .with_response("http://x/manifest.json", b"{\"name\":\"demo\"}".to_vec());
        match transport.fetch_text("http://x/manifest.json").await {
            Ok(text) => assert_eq!(text, "{\"name\":\"demo\"}"),
            Err(e) => panic!("Unexpected failure: {e}"),
        }
    }

    #[tokio::test]
    async fn test_mock_transport_hidden_length() {
        let transport = MockTransport::new()
            .with_response("http://x/demo.jar", vec![1, 2, 3])
            .with_hidden_length();
        match transport.fetch("http://x/demo.jar").await {
            Ok(stream) => assert_eq!(stream.total_len(), None),
            Err(e) => panic!("Unexpected failure: {e}"),
        }
    }
}
