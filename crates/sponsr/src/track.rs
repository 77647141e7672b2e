use std::path::Path;

use tokio::{fs::File, io::AsyncWriteExt};

use crate::{dash::SegmentRef, error::SponsrResult, fetch::SegmentFetcher};

/// Concatenates the segments of one track into a single file.
pub struct TrackAssembler {
    fetcher: SegmentFetcher,
}

impl TrackAssembler {
    pub fn new(fetcher: SegmentFetcher) -> Self {
        Self { fetcher }
    }

    /// Fetches `segments` strictly in order into `output`.
    ///
    /// `output` is truncated first, so leftovers of an earlier failed attempt are never
    /// kept. Repeated references are fetched only once.
    pub async fn assemble(&self, segments: &[SegmentRef], output: &Path, label: &str) -> SponsrResult<()> {
        let mut seen = std::collections::HashSet::with_capacity(segments.len());
        let segments: Vec<_> = segments.iter().filter(|s| seen.insert(*s)).collect();
        let total = segments.len();

        let mut file = File::create(output).await?;
        for (index, segment) in segments.into_iter().enumerate() {
            self.fetcher.fetch(segment, &mut file).await?;
            tracing::debug!("{label}: {}/{total} segments", index + 1);
        }
        file.shutdown().await?;

        tracing::info!("{label}: {total} segments saved to {}", output.display());
        Ok(())
    }
}
