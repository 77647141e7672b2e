use std::{
    fmt,
    future::Future,
    path::{Path, PathBuf},
};

use reqwest::header::ACCEPT;

use crate::{
    dash::{parse_manifest, Manifest, MediaTracks, QualityKey, Track},
    decrypt::{get_license_key, ClearKey, Mp4Decrypt},
    error::{SponsrError, SponsrResult},
    fetch::{SegmentFetcher, DEFAULT_SEGMENT_RETRIES},
    kinescope::KinescopeVideo,
    merge::FfmpegMuxer,
    track::TrackAssembler,
    util::{command::resolve_executable, http::HttpClient, path::SponsrPathExt},
};

/// Container extension of every produced file.
pub const OUTPUT_EXTENSION: &str = "mp4";

// Only these are replaced, anything else after a dot is part of the name.
const MEDIA_EXTENSIONS: &[&str] = &["mp4", "m4v", "m4a", "mkv", "webm", "mov", "ts"];

/// `dest` with its container forced to `.mp4`.
///
/// `001. Intro` becomes `001. Intro.mp4`, `video.mkv` becomes `video.mp4`.
pub fn output_path(dest: &Path) -> PathBuf {
    let is_media = dest
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| MEDIA_EXTENSIONS.iter().any(|m| ext.eq_ignore_ascii_case(m)));
    if is_media {
        return dest.with_extension(OUTPUT_EXTENSION);
    }

    let mut path = dest.as_os_str().to_owned();
    path.push(".");
    path.push(OUTPUT_EXTENSION);
    PathBuf::from(path)
}

#[derive(Debug, Clone)]
pub struct VideoDownloaderConfig {
    /// Explicit `ffmpeg` location, looked up in `PATH` when absent
    pub ffmpeg_path: Option<PathBuf>,
    /// Explicit `mp4decrypt` location, looked up in `PATH` when absent
    pub mp4decrypt_path: Option<PathBuf>,
    /// Parent of the per-download temporary directories
    pub temp_dir: PathBuf,
    pub segment_attempts: u32,
}

impl Default for VideoDownloaderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            mp4decrypt_path: None,
            temp_dir: std::env::temp_dir(),
            segment_attempts: DEFAULT_SEGMENT_RETRIES,
        }
    }
}

/// Preferred qualities, `best` unless told otherwise.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoPreference {
    pub frame: QualityKey,
    pub sound: QualityKey,
}

impl fmt::Display for VideoPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame={}, sound={}", self.frame, self.sound)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    FetchManifest,
    SelectResolution,
    FetchVideoTrack,
    FetchAudioTrack,
    Decrypt,
    Mux,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::FetchManifest => "fetch manifest",
            Stage::SelectResolution => "select resolution",
            Stage::FetchVideoTrack => "fetch video track",
            Stage::FetchAudioTrack => "fetch audio track",
            Stage::Decrypt => "decrypt",
            Stage::Mux => "mux",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

/// What happens to assembled tracks before muxing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackPipeline {
    Clear,
    Encrypted(ClearKey),
}

impl From<Option<ClearKey>> for TrackPipeline {
    fn from(key: Option<ClearKey>) -> Self {
        match key {
            Some(key) => Self::Encrypted(key),
            None => Self::Clear,
        }
    }
}

impl TrackPipeline {
    /// Returns the files to mux. Decrypted copies are written next to the originals.
    pub async fn apply(&self, decryptor: &Mp4Decrypt, tracks: Vec<PathBuf>) -> SponsrResult<Vec<PathBuf>> {
        let key = match self {
            Self::Clear => return Ok(tracks),
            Self::Encrypted(key) => key,
        };

        tracing::info!("Decrypting {} track(s)...", tracks.len());
        let mut decrypted = Vec::with_capacity(tracks.len());
        for track in tracks {
            let mut target = track.clone();
            target.add_suffix("dec");
            decryptor.decrypt(&track, &target, key).await?;
            decrypted.push(target);
        }
        Ok(decrypted)
    }
}

/// Downloads one kinescope video: manifest, tracks, optional decryption, mux.
pub struct VideoDownloader {
    video: KinescopeVideo,
    client: HttpClient,
    assembler: TrackAssembler,
    decryptor: Mp4Decrypt,
    muxer: FfmpegMuxer,
    temp_dir: PathBuf,
}

impl VideoDownloader {
    /// Resolves the external tools before anything touches the network.
    pub fn new(video: KinescopeVideo, client: HttpClient, config: VideoDownloaderConfig) -> SponsrResult<Self> {
        let ffmpeg = resolve_executable("ffmpeg", config.ffmpeg_path.as_deref())?;
        let mp4decrypt = resolve_executable("mp4decrypt", config.mp4decrypt_path.as_deref())?;

        let fetcher = SegmentFetcher::new(client.clone()).with_attempts(config.segment_attempts);
        Ok(Self {
            video,
            client,
            assembler: TrackAssembler::new(fetcher),
            decryptor: Mp4Decrypt::new(mp4decrypt),
            muxer: FfmpegMuxer::new(ffmpeg),
            temp_dir: config.temp_dir,
        })
    }

    pub fn video(&self) -> &KinescopeVideo {
        &self.video
    }

    pub async fn fetch_manifest(&self) -> SponsrResult<Manifest> {
        let url = self.video.manifest_url();
        tracing::debug!("Fetching manifest {url}");

        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "application/dash+xml,video/vnd.mpeg.dash.mpd")
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(SponsrError::HttpError(response.status()));
        }

        let text = response.text().await?;
        parse_manifest(&text)
    }

    /// Available qualities, for listing.
    pub async fn media_tracks(&self) -> SponsrResult<MediaTracks> {
        let manifest = self.fetch_manifest().await?;
        MediaTracks::from_manifest(&manifest)
    }

    /// Downloads the video to `dest` with its extension forced to `.mp4`.
    ///
    /// All intermediate files live in a private temporary directory which is removed
    /// before this returns, whether it succeeds or not.
    pub async fn download(&self, dest: &Path, preference: &VideoPreference) -> SponsrResult<PathBuf> {
        let dest = output_path(dest);
        tracing::info!(
            "Downloading video {} ({preference}) to {}",
            self.video.video_id,
            dest.display()
        );

        tokio::fs::create_dir_all(&self.temp_dir).await?;
        let temp_dir = tempfile::Builder::new()
            .prefix(&format!("sponsr_{}_", self.video.video_id))
            .tempdir_in(&self.temp_dir)?;

        let result = self.run(temp_dir.path(), &dest, preference).await;

        let temp_path = temp_dir.path().to_path_buf();
        if let Err(e) = temp_dir.close() {
            tracing::warn!("Failed to remove {}: {e}", temp_path.display());
        }
        result.map(|_| dest)
    }

    async fn run(&self, temp_dir: &Path, dest: &Path, preference: &VideoPreference) -> SponsrResult<()> {
        let video_id = &self.video.video_id;

        let manifest = self.stage(Stage::FetchManifest, self.fetch_manifest()).await?;

        let tracks = self
            .stage(Stage::SelectResolution, async {
                let tracks = MediaTracks::from_manifest(&manifest)?;
                if tracks.is_empty() {
                    return Err(SponsrError::NoSegmentsFound);
                }
                Ok(tracks)
            })
            .await?;
        let video = tracks.select_video(&preference.frame);
        let audio = tracks.select_audio(&preference.sound);
        tracing::debug!(
            "Found: video {}; audio {}.",
            video.map_or(0, Track::len),
            audio.map_or(0, Track::len)
        );

        let mut assembled = Vec::with_capacity(2);
        if let Some(video) = video {
            tracing::info!("Selected video {}", video.key);
            let path = temp_dir.join(format!("video_{video_id}.mp4"));
            self.stage(
                Stage::FetchVideoTrack,
                self.assembler.assemble(&video.segments, &path, "Video"),
            )
            .await?;
            assembled.push(path);
        }
        if let Some(audio) = audio {
            tracing::info!("Selected audio {}", audio.key);
            let path = temp_dir.join(format!("audio_{video_id}.m4a"));
            self.stage(
                Stage::FetchAudioTrack,
                self.assembler.assemble(&audio.segments, &path, "Audio"),
            )
            .await?;
            assembled.push(path);
        }

        let assembled = if manifest.is_protected() {
            self.stage(Stage::Decrypt, async {
                let key = get_license_key(&self.client, &manifest, &self.video.license_url()).await?;
                TrackPipeline::from(key).apply(&self.decryptor, assembled).await
            })
            .await?
        } else {
            tracing::info!("Video {video_id}: {} skipped, content is not encrypted", Stage::Decrypt);
            assembled
        };

        self.stage(Stage::Mux, async {
            if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await?;
            }
            tracing::info!("Merging video and audio tracks...");
            self.muxer.merge(&assembled, dest).await
        })
        .await?;

        tracing::info!("Video {video_id}: {}", Stage::Done);
        Ok(())
    }

    async fn stage<T, F>(&self, stage: Stage, future: F) -> SponsrResult<T>
    where
        F: Future<Output = SponsrResult<T>>,
    {
        tracing::debug!("Video {}: {stage}", self.video.video_id);
        future.await.inspect_err(|e| {
            tracing::error!("Video {} failed at {stage}: {e}", self.video.video_id);
        })
    }
}
