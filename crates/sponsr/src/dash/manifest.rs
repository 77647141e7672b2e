//! Immutable view of an MPEG-DASH manifest.
//!
//! Only the parts needed to address `SegmentList` based representations are kept.
//! The tree is built once by [crate::dash::parse_manifest] and never mutated.

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Manifest {
    pub periods: Vec<Period>,
}

impl Manifest {
    pub fn adaptation_sets(&self) -> impl Iterator<Item = &AdaptationSet> {
        self.periods.iter().flat_map(|p| p.adaptation_sets.iter())
    }

    /// The first `cenc:default_KID` advertised by any adaptation set.
    ///
    /// `None` means the content is not encrypted.
    pub fn default_kid(&self) -> Option<&str> {
        self.adaptation_sets()
            .flat_map(|set| set.content_protections.iter())
            .find_map(|protection| protection.default_kid.as_deref())
    }

    pub fn is_protected(&self) -> bool {
        self.default_kid().is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Period {
    pub adaptation_sets: Vec<AdaptationSet>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdaptationSet {
    pub mime_type: String,
    pub content_protections: Vec<ContentProtection>,
    pub representations: Vec<Representation>,
}

impl AdaptationSet {
    pub fn kind(&self) -> MediaKind {
        MediaKind::from_mime_type(&self.mime_type)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Representation {
    pub id: Option<String>,
    pub width: Option<u64>,
    pub height: Option<u64>,
    pub audio_sampling_rate: Option<String>,
    /// Effective `BaseURL`: the representation's own, or the nearest ancestor's.
    pub base_url: Option<String>,
    pub segment_list: Option<SegmentList>,
}

impl Representation {
    pub fn resolution(&self) -> Option<(u64, u64)> {
        self.width.zip(self.height)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentList {
    /// `Initialization` (if any) followed by every `SegmentURL`, in document order.
    pub segments: Vec<SegmentUrl>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentUrl {
    /// `sourceURL` or `media`
    pub url: Option<String>,
    /// `range` or `mediaRange`
    pub range: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentProtection {
    pub default_kid: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Video,
    Audio,
    Other,
}

impl MediaKind {
    pub fn from_mime_type(mime_type: &str) -> Self {
        if mime_type.starts_with("video") {
            Self::Video
        } else if mime_type.starts_with("audio") {
            Self::Audio
        } else {
            Self::Other
        }
    }
}
