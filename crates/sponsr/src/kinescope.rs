use reqwest::{header::REFERER, StatusCode};

use crate::{
    error::{SponsrError, SponsrResult},
    util::http::HttpClient,
};

/// Hosts serving manifests and clear-key licenses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KinescopeEndpoints {
    pub player_base: String,
    pub license_base: String,
}

impl Default for KinescopeEndpoints {
    fn default() -> Self {
        Self {
            player_base: "https://kinescope.io".to_string(),
            license_base: "https://license.kinescope.io".to_string(),
        }
    }
}

/// A video hosted on kinescope, identified by its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KinescopeVideo {
    pub video_id: String,
    endpoints: KinescopeEndpoints,
}

impl KinescopeVideo {
    pub fn new(video_id: impl Into<String>) -> Self {
        Self {
            video_id: video_id.into(),
            endpoints: KinescopeEndpoints::default(),
        }
    }

    pub fn with_endpoints(mut self, endpoints: KinescopeEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Extracts the id from `https://kinescope.io/<id>/master.mpd`.
    pub fn from_manifest_url(url: &str) -> SponsrResult<Self> {
        let parsed = url::Url::parse(url)?;
        let mut segments: Vec<_> = parsed
            .path_segments()
            .map(|s| s.filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();

        if segments.len() < 2 || !segments[segments.len() - 1].ends_with(".mpd") {
            return Err(SponsrError::InvalidVideoUrl(url.to_string()));
        }
        segments.pop();
        let video_id = segments
            .pop()
            .ok_or_else(|| SponsrError::InvalidVideoUrl(url.to_string()))?;

        Ok(Self::new(video_id))
    }

    /// Looks the id up in an embed page, e.g. `https://kinescope.io/embed/<slug>`.
    ///
    /// Embeds are only served to an allowed referer.
    pub async fn resolve(client: &HttpClient, embed_url: &str, referer: Option<&str>) -> SponsrResult<Self> {
        let mut request = client.get(embed_url);
        if let Some(referer) = referer {
            request = request.header(REFERER, referer);
        }

        let response = request.send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(SponsrError::VideoNotFound);
        }
        if !response.status().is_success() {
            return Err(SponsrError::HttpError(response.status()));
        }

        let body = response.text().await?;
        let video_id = extract_video_id(&body).ok_or(SponsrError::AccessDenied)?;
        tracing::debug!("Resolved {embed_url} to video {video_id}");
        Ok(Self::new(video_id))
    }

    pub fn manifest_url(&self) -> String {
        format!("{}/{}/master.mpd", self.endpoints.player_base, self.video_id)
    }

    pub fn license_url(&self) -> String {
        format!(
            "{}/v1/vod/{}/acquire/clearkey?token=",
            self.endpoints.license_base, self.video_id
        )
    }
}

fn extract_video_id(body: &str) -> Option<&str> {
    let (_, rest) = body.split_once("id: \"")?;
    let (id, _) = rest.split_once('"')?;
    (!id.is_empty()).then_some(id)
}
