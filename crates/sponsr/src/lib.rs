pub mod dash;
pub mod decrypt;
pub mod download;
pub mod error;
pub mod fetch;
pub mod kinescope;
pub mod ledger;
pub mod merge;
pub mod track;
pub mod util;

pub use download::{Stage, VideoDownloader, VideoDownloaderConfig, VideoPreference};
pub use error::{SponsrError, SponsrResult};
pub use kinescope::{KinescopeEndpoints, KinescopeVideo};
pub use ledger::DumpLedger;
pub use util::http::HttpClient;

/// ┌────────────┐    ┌───────────────┐    ┌────────────────┐
/// │ master.mpd ├────► MediaTracks   ├────► TrackAssembler ├───┐
/// └────────────┘    │ (select)      │    │ SegmentFetcher │   │ video_<id>.mp4
///                   └───────────────┘    └────────────────┘   │ audio_<id>.m4a
///                                                             │
/// ┌────────────┐    ┌───────────────┐    ┌────────────────┐   │
/// │  dest.mp4  ◄────┤ FfmpegMuxer   ◄────┤ TrackPipeline  ◄───┘
/// └────────────┘    │ -c copy       │    │ clear/decrypt  │
///                   └───────────────┘    └────────────────┘
pub async fn download_video(
    video: KinescopeVideo,
    client: HttpClient,
    config: VideoDownloaderConfig,
    dest: &std::path::Path,
    preference: &VideoPreference,
) -> SponsrResult<std::path::PathBuf> {
    VideoDownloader::new(video, client, config)?
        .download(dest, preference)
        .await
}
