use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SponsrError {
    #[error("HTTP error: {0}")]
    HttpError(reqwest::StatusCode),

    #[error("Failed to download segment {url}")]
    SegmentDownloadError { url: String },

    #[error("Invalid mpd file: {0}")]
    MpdParsing(String),

    #[error(transparent)]
    XmlError(#[from] quick_xml::Error),

    #[error(transparent)]
    XmlAttributeError(#[from] quick_xml::events::attributes::AttrError),

    #[error("No video or audio segments found")]
    NoSegmentsFound,

    #[error("Command error:\n{command}\n\nexit status: {status}\n\n{stdout}\n\n{stderr}\n----------")]
    CommandFailed {
        command: String,
        status: std::process::ExitStatus,
        stdout: String,
        stderr: String,
    },

    #[error("{name} not found at {path}")]
    ExecutableNotFound { name: &'static str, path: PathBuf },

    #[error(transparent)]
    MissingExecutable(#[from] which::Error),

    #[error("Invalid clear-key license: {0}")]
    InvalidLicense(String),

    #[error(transparent)]
    HexDecodeError(#[from] hex::FromHexError),

    #[error(transparent)]
    Base64DecodeError(#[from] base64::DecodeError),

    #[error("Video not found")]
    VideoNotFound,

    #[error("Access denied. Wrong referer?")]
    AccessDenied,

    #[error("Can not extract video id from {0}")]
    InvalidVideoUrl(String),

    #[error(transparent)]
    IOError(#[from] std::io::Error),

    #[error(transparent)]
    UrlParseError(#[from] url::ParseError),

    #[error(transparent)]
    RequestError(#[from] reqwest::Error),

    #[error(transparent)]
    JsonError(#[from] serde_json::Error),
}

pub type SponsrResult<T> = Result<T, SponsrError>;
