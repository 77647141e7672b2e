use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Settings that may be kept in a JSON file instead of passed on every run.
#[derive(Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub ffmpeg_path: Option<PathBuf>,
    pub mp4decrypt_path: Option<PathBuf>,
    pub referer: Option<String>,
    pub temp_dir: Option<PathBuf>,
    pub prefer_video: Option<String>,
    pub prefer_audio: Option<String>,
}

impl Config {
    /// A missing file yields the defaults.
    pub fn load(file: &Path) -> anyhow::Result<Self> {
        let data = match std::fs::read_to_string(file) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };
        let config = serde_json::from_str(&data)?;
        tracing::debug!("Configuration is loaded from {}", file.display());
        Ok(config)
    }
}
