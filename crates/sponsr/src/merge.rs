use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use crate::{error::SponsrResult, util::command::run_command};

/// Muxes separately downloaded tracks with the ffmpeg CLI.
#[derive(Debug, Clone)]
pub struct FfmpegMuxer {
    executable: PathBuf,
}

impl FfmpegMuxer {
    pub fn new(executable: PathBuf) -> Self {
        Self { executable }
    }

    /// Stream-copies every track into `output`, replacing an existing file.
    pub async fn merge<P>(&self, tracks: &[P], output: &Path) -> SponsrResult<()>
    where
        P: AsRef<Path>,
    {
        tracing::debug!("Merging {} track(s) with ffmpeg...", tracks.len());
        run_command(&self.executable, merge_args(tracks, output), None).await?;
        Ok(())
    }
}

fn merge_args<P>(tracks: &[P], output: &Path) -> Vec<OsString>
where
    P: AsRef<Path>,
{
    let mut args: Vec<OsString> = vec!["-y".into(), "-loglevel".into(), "error".into()];

    for track in tracks {
        args.push("-i".into());
        args.push(track.as_ref().as_os_str().to_owned());
    }
    // map all streams and use copy codec
    for i in 0..tracks.len() {
        args.push("-map".into());
        args.push(i.to_string().into());
    }

    args.push("-c".into());
    args.push("copy".into());
    args.push(output.as_os_str().to_owned());
    args
}
