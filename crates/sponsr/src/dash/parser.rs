use std::{borrow::Cow, collections::HashMap, sync::LazyLock};

use quick_xml::{
    events::{BytesStart, Event},
    Reader,
};
use regex::Regex;

use super::manifest::{
    AdaptationSet, ContentProtection, Manifest, Period, Representation, SegmentList, SegmentUrl,
};
use crate::error::{SponsrError, SponsrResult};

// Manifests in the wild carry namespace URIs that strict parsers reject, and the
// prefixes are irrelevant for the elements we read.
static NAMESPACE_DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\s*xmlns(:[^=\s]*)?\s*=\s*("[^"]*"|'[^']*')"#).unwrap()
});

pub fn strip_namespaces(xml: &str) -> Cow<'_, str> {
    NAMESPACE_DECLARATION.replace_all(xml, "")
}

/// Parses a manifest document.
///
/// Namespace declarations are removed first. Doctype declarations are skipped and custom
/// entities are never expanded, nothing is ever fetched while parsing.
pub fn parse_manifest(xml: &str) -> SponsrResult<Manifest> {
    let xml = strip_namespaces(xml);
    let mut reader = Reader::from_str(&xml);
    reader.config_mut().trim_text(true);

    let mut builder = ManifestBuilder::default();
    loop {
        match reader.read_event()? {
            Event::Start(e) => builder.open(&e)?,
            Event::Empty(e) => {
                builder.open(&e)?;
                builder.close()?;
            }
            Event::End(_) => builder.close()?,
            Event::Text(text) => builder.text(&text.unescape()?),
            Event::CData(data) => builder.text(&String::from_utf8_lossy(&data)),
            Event::Eof => break,
            // DocType, comments, processing instructions
            _ => {}
        }
    }

    builder.finish()
}

enum Frame {
    Root {
        base_url: Option<String>,
    },
    Period {
        base_url: Option<String>,
        adaptation_sets: Vec<AdaptationSet>,
    },
    AdaptationSet {
        set: AdaptationSet,
        base_url: Option<String>,
        width: Option<u64>,
        height: Option<u64>,
        audio_sampling_rate: Option<String>,
    },
    Representation(Representation),
    ContentProtection(ContentProtection),
    SegmentList(Vec<SegmentUrl>),
    Segment(SegmentUrl),
    BaseUrl(String),
    Other,
}

impl Frame {
    fn base_url(&self) -> Option<&str> {
        match self {
            Frame::Root { base_url }
            | Frame::Period { base_url, .. }
            | Frame::AdaptationSet { base_url, .. } => base_url.as_deref(),
            Frame::Representation(representation) => representation.base_url.as_deref(),
            _ => None,
        }
    }
}

#[derive(Default)]
struct ManifestBuilder {
    stack: Vec<Frame>,
    periods: Vec<Period>,
    /// Adaptation sets found outside of any `Period`.
    orphan_sets: Vec<AdaptationSet>,
    adaptation_set_count: usize,
}

impl ManifestBuilder {
    fn open(&mut self, element: &BytesStart) -> SponsrResult<()> {
        let frame = match element.local_name().as_ref() {
            b"MPD" => Frame::Root { base_url: None },
            b"Period" => Frame::Period {
                base_url: None,
                adaptation_sets: Vec::new(),
            },
            b"AdaptationSet" => {
                let mut attrs = attributes(element)?;
                let mime_type = attrs.remove("mimeType").ok_or_else(|| {
                    SponsrError::MpdParsing("AdaptationSet without mimeType".to_string())
                })?;
                self.adaptation_set_count += 1;
                Frame::AdaptationSet {
                    set: AdaptationSet {
                        mime_type,
                        content_protections: Vec::new(),
                        representations: Vec::new(),
                    },
                    base_url: None,
                    width: attrs.get("width").and_then(|w| w.parse().ok()),
                    height: attrs.get("height").and_then(|h| h.parse().ok()),
                    audio_sampling_rate: attrs.remove("audioSamplingRate"),
                }
            }
            b"Representation" => {
                let mut attrs = attributes(element)?;
                tracing::debug!("Representation found: {attrs:?}");
                Frame::Representation(Representation {
                    id: attrs.remove("id"),
                    width: attrs.get("width").and_then(|w| w.parse().ok()),
                    height: attrs.get("height").and_then(|h| h.parse().ok()),
                    audio_sampling_rate: attrs.remove("audioSamplingRate"),
                    base_url: None,
                    segment_list: None,
                })
            }
            b"ContentProtection" => {
                let mut attrs = attributes(element)?;
                Frame::ContentProtection(ContentProtection {
                    default_kid: attrs.remove("default_KID"),
                })
            }
            b"SegmentList" => Frame::SegmentList(Vec::new()),
            b"SegmentURL" | b"Initialization" => {
                let mut attrs = attributes(element)?;
                Frame::Segment(SegmentUrl {
                    url: attrs.remove("sourceURL").or_else(|| attrs.remove("media")),
                    range: attrs.remove("range").or_else(|| attrs.remove("mediaRange")),
                })
            }
            b"BaseURL" => Frame::BaseUrl(String::new()),
            _ => Frame::Other,
        };

        self.stack.push(frame);
        Ok(())
    }

    fn text(&mut self, text: &str) {
        if let Some(Frame::BaseUrl(base_url)) = self.stack.last_mut() {
            base_url.push_str(text.trim());
        }
    }

    fn close(&mut self) -> SponsrResult<()> {
        let frame = self
            .stack
            .pop()
            .ok_or_else(|| SponsrError::MpdParsing("Unexpected closing tag".to_string()))?;

        match frame {
            Frame::BaseUrl(url) => match self.stack.last_mut() {
                Some(
                    Frame::Root { base_url }
                    | Frame::Period { base_url, .. }
                    | Frame::AdaptationSet { base_url, .. },
                ) => *base_url = Some(url),
                Some(Frame::Representation(representation)) => {
                    representation.base_url = Some(url)
                }
                _ => {}
            },
            Frame::Segment(segment) => {
                if let Some(Frame::SegmentList(segments)) = self.stack.last_mut() {
                    segments.push(segment);
                }
            }
            Frame::SegmentList(segments) => {
                if let Some(Frame::Representation(representation)) = self.stack.last_mut() {
                    representation.segment_list = Some(SegmentList { segments });
                }
            }
            Frame::ContentProtection(protection) => {
                let set = self.stack.iter_mut().rev().find_map(|frame| match frame {
                    Frame::AdaptationSet { set, .. } => Some(set),
                    _ => None,
                });
                if let Some(set) = set {
                    set.content_protections.push(protection);
                }
            }
            Frame::Representation(mut representation) => {
                if representation.base_url.is_none() {
                    representation.base_url = self
                        .stack
                        .iter()
                        .rev()
                        .find_map(Frame::base_url)
                        .map(ToString::to_string);
                }

                if let Some(Frame::AdaptationSet {
                    set,
                    width,
                    height,
                    audio_sampling_rate,
                    ..
                }) = self.stack.last_mut()
                {
                    representation.width = representation.width.or(*width);
                    representation.height = representation.height.or(*height);
                    if representation.audio_sampling_rate.is_none() {
                        representation.audio_sampling_rate = audio_sampling_rate.clone();
                    }
                    set.representations.push(representation);
                }
            }
            Frame::AdaptationSet { set, .. } => {
                let period = self.stack.iter_mut().rev().find_map(|frame| match frame {
                    Frame::Period {
                        adaptation_sets, ..
                    } => Some(adaptation_sets),
                    _ => None,
                });
                match period {
                    Some(adaptation_sets) => adaptation_sets.push(set),
                    None => self.orphan_sets.push(set),
                }
            }
            Frame::Period {
                adaptation_sets, ..
            } => self.periods.push(Period { adaptation_sets }),
            Frame::Root { .. } | Frame::Other => {}
        }

        Ok(())
    }

    fn finish(mut self) -> SponsrResult<Manifest> {
        if !self.stack.is_empty() {
            return Err(SponsrError::MpdParsing(
                "Unexpected end of document".to_string(),
            ));
        }
        if self.adaptation_set_count == 0 {
            return Err(SponsrError::MpdParsing("No AdaptationSet found".to_string()));
        }

        if !self.orphan_sets.is_empty() {
            self.periods.push(Period {
                adaptation_sets: self.orphan_sets,
            });
        }

        Ok(Manifest {
            periods: self.periods,
        })
    }
}

/// Collects attributes by local name, so `cenc:default_KID` becomes `default_KID`.
fn attributes(element: &BytesStart) -> SponsrResult<HashMap<String, String>> {
    let mut result = HashMap::new();
    for attr in element.attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        result.insert(key, value);
    }
    Ok(result)
}
