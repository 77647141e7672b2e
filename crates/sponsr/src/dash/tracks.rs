use std::{collections::HashSet, fmt, str::FromStr};

use super::manifest::{Manifest, MediaKind, Representation};
use crate::{
    error::{SponsrError, SponsrResult},
    util::range::ByteRange,
};

/// One addressable chunk of a track.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SegmentRef {
    pub url: String,
    pub range: Option<ByteRange>,
}

/// Segments of one selectable quality, in playback order and without repeats.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    /// `{width}x{height}` for video, the sampling rate for audio.
    ///
    /// Audio without a sampling rate is keyed by its representation id, or by its
    /// position as `audio{n}`.
    pub key: String,
    pub segments: Vec<SegmentRef>,
    sort_key: (u64, u64),
}

impl Track {
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// Quality preference for one bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum QualityKey {
    #[default]
    Best,
    /// `1920x1080`, or a sampling rate such as `44100`
    Exact(String),
    /// `720` or `720p`, matched against video heights
    Height(u64),
}

impl FromStr for QualityKey {
    type Err = SponsrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("best") {
            return Ok(Self::Best);
        }
        if let Some(height) = s.strip_suffix(['p', 'P']) {
            if let Ok(height) = height.parse() {
                return Ok(Self::Height(height));
            }
        }
        Ok(Self::Exact(s.to_string()))
    }
}

impl fmt::Display for QualityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Best => write!(f, "best"),
            Self::Exact(key) => write!(f, "{key}"),
            Self::Height(height) => write!(f, "{height}p"),
        }
    }
}

/// Video and audio qualities found in a manifest, each sorted ascending so the
/// last entry is the best one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaTracks {
    video: Vec<Track>,
    audio: Vec<Track>,
}

impl MediaTracks {
    pub fn from_manifest(manifest: &Manifest) -> SponsrResult<Self> {
        let mut video = Vec::new();
        let mut audio = Vec::new();

        for set in manifest.adaptation_sets() {
            let kind = set.kind();
            let bucket = match kind {
                MediaKind::Video => &mut video,
                MediaKind::Audio => &mut audio,
                MediaKind::Other => continue,
            };

            for (index, representation) in set.representations.iter().enumerate() {
                let Some((key, sort_key)) = quality_of(kind, representation, index) else {
                    tracing::debug!(
                        "Skipped {} representation {:?} without quality attributes",
                        set.mime_type,
                        representation.id
                    );
                    continue;
                };
                let Some(segments) = resolve_segments(representation)? else {
                    tracing::debug!("Skipped representation {key} without SegmentList");
                    continue;
                };
                append_segments(bucket, key, sort_key, segments);
            }
        }

        video.retain(|track| !track.is_empty());
        audio.retain(|track| !track.is_empty());
        // stable, equal qualities keep document order
        video.sort_by_key(|track| track.sort_key);
        audio.sort_by_key(|track| track.sort_key);

        let tracks = Self { video, audio };
        tracing::info!(
            "Found media formats: video - {}; audio - {}.",
            tracks.resolutions().join(", "),
            tracks.sampling_rates().join(", ")
        );
        Ok(tracks)
    }

    pub fn video(&self) -> &[Track] {
        &self.video
    }

    pub fn audio(&self) -> &[Track] {
        &self.audio
    }

    pub fn resolutions(&self) -> Vec<&str> {
        self.video.iter().map(|t| t.key.as_str()).collect()
    }

    pub fn sampling_rates(&self) -> Vec<&str> {
        self.audio.iter().map(|t| t.key.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.video.is_empty() && self.audio.is_empty()
    }

    /// Picks a video track, falling back to the best one when the preference is absent.
    pub fn select_video(&self, preference: &QualityKey) -> Option<&Track> {
        select(&self.video, preference, |track, height| {
            track.key.rsplit_once('x').map(|(_, h)| h) == Some(height.to_string().as_str())
        })
    }

    /// Picks an audio track, falling back to the best one when the preference is absent.
    pub fn select_audio(&self, preference: &QualityKey) -> Option<&Track> {
        select(&self.audio, preference, |_, _| false)
    }
}

fn select<'a, F>(tracks: &'a [Track], preference: &QualityKey, height_matches: F) -> Option<&'a Track>
where
    F: Fn(&Track, u64) -> bool,
{
    let preferred = match preference {
        QualityKey::Best => None,
        // a bare number may also name a video height
        QualityKey::Exact(key) => tracks.iter().find(|track| &track.key == key).or_else(|| {
            let height = key.parse().ok()?;
            tracks.iter().find(|track| height_matches(track, height))
        }),
        QualityKey::Height(height) => tracks.iter().find(|track| height_matches(track, *height)),
    };

    if preferred.is_none() && *preference != QualityKey::Best {
        tracing::warn!("Quality {preference} not found, falling back to the best available");
    }
    preferred.or_else(|| tracks.last())
}

fn quality_of(
    kind: MediaKind,
    representation: &Representation,
    index: usize,
) -> Option<(String, (u64, u64))> {
    match kind {
        MediaKind::Video => {
            let (width, height) = representation.resolution()?;
            Some((format!("{width}x{height}"), (width.saturating_mul(height), width)))
        }
        MediaKind::Audio => match &representation.audio_sampling_rate {
            Some(rate) => Some((rate.clone(), (rate.parse().unwrap_or(0), 0))),
            None => {
                let key = representation
                    .id
                    .clone()
                    .filter(|id| !id.is_empty())
                    .unwrap_or_else(|| format!("audio{index}"));
                tracing::debug!("Audio representation without sampling rate, keyed as {key}");
                Some((key, (0, 0)))
            }
        },
        MediaKind::Other => None,
    }
}

/// Resolves every segment against the representation's `BaseURL`.
///
/// The base is a plain string prefix, not a RFC 3986 reference resolution.
/// A segment with a range but no URL addresses the base itself.
fn resolve_segments(representation: &Representation) -> SponsrResult<Option<Vec<SegmentRef>>> {
    let Some(segment_list) = &representation.segment_list else {
        return Ok(None);
    };
    let base_url = representation.base_url.as_deref().unwrap_or_default();

    let mut segments = Vec::with_capacity(segment_list.segments.len());
    for segment in &segment_list.segments {
        let range = segment.range.as_deref().map(ByteRange::parse).transpose()?;
        let url = match (&segment.url, &range) {
            (Some(url), _) if !url.is_empty() => format!("{base_url}{url}"),
            (_, Some(_)) => base_url.to_string(),
            _ => continue,
        };
        segments.push(SegmentRef { url, range });
    }
    Ok(Some(segments))
}

fn append_segments(bucket: &mut Vec<Track>, key: String, sort_key: (u64, u64), segments: Vec<SegmentRef>) {
    // Representations sharing a quality key would interleave two encodings.
    if bucket.iter().any(|track| track.key == key) {
        tracing::debug!("Duplicate representation {key} ignored");
        return;
    }

    let mut seen = HashSet::new();
    let segments = segments
        .into_iter()
        .filter(|segment| seen.insert(segment.clone()))
        .collect();
    bucket.push(Track {
        key,
        segments,
        sort_key,
    });
}
