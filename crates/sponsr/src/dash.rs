pub mod manifest;
pub mod parser;
pub mod tracks;

pub use manifest::*;
pub use parser::parse_manifest;
pub use tracks::{MediaTracks, QualityKey, SegmentRef, Track};
