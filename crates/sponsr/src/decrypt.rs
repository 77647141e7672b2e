use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
    sync::LazyLock,
};

use base64::{
    engine::{general_purpose::STANDARD_NO_PAD, DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine,
};
use reqwest::header::ORIGIN;
use serde::{Deserialize, Serialize};

use crate::{
    dash::Manifest,
    error::{SponsrError, SponsrResult},
    util::{command::run_command, http::HttpClient},
};

// License servers answer with unpadded base64url.
static KEY_ENGINE: LazyLock<GeneralPurpose> = LazyLock::new(|| {
    GeneralPurpose::new(
        &base64::alphabet::URL_SAFE,
        GeneralPurposeConfig::new()
            .with_decode_padding_mode(DecodePaddingMode::Indifferent)
            .with_decode_allow_trailing_bits(true),
    )
});

/// A content key in lowercase hex, as accepted by `mp4decrypt --key`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClearKey(String);

impl ClearKey {
    /// Decodes the `k` member of a clear-key license.
    pub fn from_license_key(k: &str) -> SponsrResult<Self> {
        let bytes = KEY_ENGINE.decode(k.trim())?;
        if bytes.is_empty() {
            return Err(SponsrError::InvalidLicense("empty key".to_string()));
        }
        Ok(Self(hex::encode(bytes)))
    }

    pub fn as_hex(&self) -> &str {
        &self.0
    }
}

/// Normalizes a `cenc:default_KID` (`0a1b2c3d-...`) to unpadded base64.
pub fn encode_kid(kid: &str) -> SponsrResult<String> {
    let kid: String = kid.chars().filter(|c| c.is_ascii_hexdigit()).collect();
    let bytes = hex::decode(kid)?;
    Ok(STANDARD_NO_PAD.encode(bytes))
}

#[derive(Debug, Serialize)]
struct LicenseRequest<'a> {
    kids: Vec<String>,
    r#type: &'a str,
}

#[derive(Debug, Deserialize)]
struct LicenseResponse {
    keys: Vec<LicenseKey>,
}

#[derive(Debug, Deserialize)]
struct LicenseKey {
    k: String,
}

/// Requests the content key for a protected manifest.
///
/// Returns `None` without any request when the manifest has no `ContentProtection`.
pub async fn get_license_key(
    client: &HttpClient,
    manifest: &Manifest,
    license_url: &str,
) -> SponsrResult<Option<ClearKey>> {
    let Some(kid) = manifest.default_kid() else {
        return Ok(None);
    };

    let body = LicenseRequest {
        kids: vec![encode_kid(kid)?],
        r#type: "temporary",
    };
    tracing::debug!("Requesting clear-key license for kid {kid}");

    let response = client
        .post(license_url)
        .header(ORIGIN, client.origin())
        .json(&body)
        .send()
        .await?;
    if !response.status().is_success() {
        return Err(SponsrError::HttpError(response.status()));
    }

    let license: LicenseResponse = serde_json::from_slice(&response.bytes().await?)?;
    let key = license
        .keys
        .first()
        .ok_or_else(|| SponsrError::InvalidLicense("no keys in license".to_string()))?;
    ClearKey::from_license_key(&key.k).map(Some)
}

/// Decrypts whole files with Bento4's `mp4decrypt`.
#[derive(Debug, Clone)]
pub struct Mp4Decrypt {
    executable: PathBuf,
}

impl Mp4Decrypt {
    pub fn new(executable: PathBuf) -> Self {
        Self { executable }
    }

    pub async fn decrypt(&self, source: &Path, target: &Path, key: &ClearKey) -> SponsrResult<()> {
        let key = format!("1:{}", key.as_hex());
        run_command(
            &self.executable,
            [
                OsStr::new("--key"),
                OsStr::new(&key),
                source.as_os_str(),
                target.as_os_str(),
            ],
            source.parent().filter(|p| !p.as_os_str().is_empty()),
        )
        .await?;
        Ok(())
    }
}
