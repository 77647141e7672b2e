use std::{path::PathBuf, time::Duration};

use clap::Parser;
use sponsr::{
    dash::QualityKey, DumpLedger, HttpClient, KinescopeVideo, VideoDownloader,
    VideoDownloaderConfig, VideoPreference,
};

mod config;

use config::Config;

#[derive(Parser, Clone, Debug)]
#[clap(name = "sponsrdump", version, about)]
struct SponsrDumpArgs {
    /// Video id, embed page URL or `master.mpd` URL
    source: String,

    /// Output file, `.mp4` is appended when missing
    #[clap(short, long)]
    output: Option<PathBuf>,

    /// Preferred video resolution: `best`, `1920x1080` or `720p`
    #[clap(long, visible_alias = "resolution")]
    prefer_video: Option<String>,

    /// Preferred audio sampling rate: `best` or `44100`
    #[clap(long)]
    prefer_audio: Option<String>,

    /// Path to the ffmpeg executable
    #[clap(long = "ffmpeg", env = "SPONSR_FFMPEG")]
    ffmpeg_path: Option<PathBuf>,

    /// Path to the mp4decrypt executable
    #[clap(long = "mp4decrypt", env = "SPONSR_MP4DECRYPT")]
    mp4decrypt_path: Option<PathBuf>,

    /// Referer sent to kinescope, the page the video is embedded in
    #[clap(long, env = "SPONSR_REFERER")]
    referer: Option<String>,

    /// Temporary directory
    #[clap(long, env = "TEMP")]
    temp_dir: Option<PathBuf>,

    /// JSON config file
    #[clap(long, default_value = "sponsrdump.config.json")]
    config: PathBuf,

    /// Ledger of already dumped videos
    #[clap(long, default_value = "sponsrdump.json")]
    ledger: PathBuf,

    /// Segment retry limit
    #[clap(long, default_value = "5")]
    segment_retries: u32,

    /// HTTP timeout, in seconds
    #[clap(short, long, default_value = "30")]
    timeout: u64,

    /// List available qualities and exit
    #[clap(long)]
    list: bool,
}

impl SponsrDumpArgs {
    /// CLI flags win over the config file.
    fn merge(mut self, config: Config) -> Self {
        self.prefer_video = self.prefer_video.or(config.prefer_video);
        self.prefer_audio = self.prefer_audio.or(config.prefer_audio);
        self.ffmpeg_path = self.ffmpeg_path.or(config.ffmpeg_path);
        self.mp4decrypt_path = self.mp4decrypt_path.or(config.mp4decrypt_path);
        self.referer = self.referer.or(config.referer);
        self.temp_dir = self.temp_dir.or(config.temp_dir);
        self
    }

    fn preference(&self) -> anyhow::Result<VideoPreference> {
        let parse = |key: &Option<String>| -> anyhow::Result<QualityKey> {
            Ok(key.as_deref().map(str::parse::<QualityKey>).transpose()?.unwrap_or_default())
        };
        Ok(VideoPreference {
            frame: parse(&self.prefer_video)?,
            sound: parse(&self.prefer_audio)?,
        })
    }

    fn downloader_config(&self) -> VideoDownloaderConfig {
        let mut config = VideoDownloaderConfig {
            ffmpeg_path: self.ffmpeg_path.clone(),
            mp4decrypt_path: self.mp4decrypt_path.clone(),
            segment_attempts: self.segment_retries,
            ..Default::default()
        };
        if let Some(temp_dir) = &self.temp_dir {
            config.temp_dir = temp_dir.clone();
        }
        config
    }

    async fn video(&self, client: &HttpClient) -> anyhow::Result<KinescopeVideo> {
        let source = self.source.trim();
        let video = if !source.starts_with("http") {
            KinescopeVideo::new(source)
        } else if source.contains(".mpd") {
            KinescopeVideo::from_manifest_url(source)?
        } else {
            KinescopeVideo::resolve(client, source, self.referer.as_deref()).await?
        };
        Ok(video)
    }
}

async fn run(args: SponsrDumpArgs) -> anyhow::Result<()> {
    let builder = reqwest::Client::builder().timeout(Duration::from_secs(args.timeout));
    let client = HttpClient::new(builder, args.referer.as_deref())?;

    let video = args.video(&client).await?;

    if args.list {
        let tracks = VideoDownloader::new(video, client, args.downloader_config())?
            .media_tracks()
            .await?;
        println!("video: {}", tracks.resolutions().join(", "));
        println!("audio: {}", tracks.sampling_rates().join(", "));
        return Ok(());
    }

    let video_id = video.video_id.clone();
    let mut ledger = DumpLedger::open(&args.ledger).await?;
    if let Some(filename) = ledger.get(&video_id) {
        tracing::info!("Video {video_id} was already dumped to {filename}, skipping");
        return Ok(());
    }

    let dest = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(&video_id));
    let output = sponsr::download_video(
        video,
        client,
        args.downloader_config(),
        &dest,
        &args.preference()?,
    )
    .await?;

    let filename = output
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| output.display().to_string());
    ledger.record(&video_id, &filename).await?;
    tracing::info!(
        "Saved {}, recorded in {}",
        output.display(),
        ledger.path().display()
    );

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
                .try_from_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = SponsrDumpArgs::parse();
    let config = Config::load(&args.config)?;
    run(args.merge(config)).await
}
