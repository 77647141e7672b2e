use reqwest::{
    header::{ACCEPT, ACCEPT_ENCODING, RANGE},
    StatusCode,
};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::{
    dash::SegmentRef,
    error::{SponsrError, SponsrResult},
    util::http::HttpClient,
};

pub const DEFAULT_SEGMENT_RETRIES: u32 = 5;

/// Downloads single segments, retrying transport failures.
#[derive(Clone)]
pub struct SegmentFetcher {
    client: HttpClient,
    attempts: u32,
}

impl SegmentFetcher {
    pub fn new(client: HttpClient) -> Self {
        Self {
            client,
            attempts: DEFAULT_SEGMENT_RETRIES,
        }
    }

    /// Total number of attempts per segment, at least one.
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    /// Appends the bytes of `segment` to `writer`.
    ///
    /// Connection errors and truncated bodies are retried immediately. An HTTP error
    /// status is returned at once. The writer is flushed but never closed.
    pub async fn fetch<W>(&self, segment: &SegmentRef, writer: &mut W) -> SponsrResult<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        for attempt in 1..=self.attempts {
            match self.fetch_once(segment).await {
                Ok(bytes) => {
                    writer.write_all(&bytes).await?;
                    writer.flush().await?;
                    return Ok(());
                }
                Err(SponsrError::RequestError(e)) if !e.is_builder() => {
                    tracing::warn!(
                        "Attempt {attempt}/{} failed for {}: {e}",
                        self.attempts,
                        segment.url
                    );
                }
                Err(e) => return Err(e),
            }
        }

        Err(SponsrError::SegmentDownloadError {
            url: segment.url.clone(),
        })
    }

    async fn fetch_once(&self, segment: &SegmentRef) -> SponsrResult<bytes::Bytes> {
        let mut request = self.client.get(&segment.url);
        if let Some(range) = &segment.range {
            request = request
                .header(ACCEPT, "*/*")
                .header(ACCEPT_ENCODING, "identity")
                .header(RANGE, range.to_http_range());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            if status == StatusCode::FORBIDDEN {
                tracing::error!("Access denied for {}. Check the referer.", segment.url);
            }
            if let Ok(body) = response.text().await {
                tracing::debug!("Error body: {body}");
            }
            return Err(SponsrError::HttpError(status));
        }

        // a body cut short surfaces here as a transport error
        let bytes = response.bytes().await?;
        Ok(bytes)
    }
}
