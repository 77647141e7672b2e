use crate::error::{SponsrError, SponsrResult};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ByteRange {
    pub offset: u64,
    pub length: Option<u64>,
}

impl ByteRange {
    pub fn new(offset: u64, length: Option<u64>) -> Self {
        Self { offset, length }
    }

    /// Parses a byte-range-spec as used by `SegmentURL@mediaRange`, e.g. `0-499`.
    ///
    /// `0-499` means 500 bytes, and an open end (`500-`) means "until the end".
    pub fn parse<S>(s: S) -> SponsrResult<Self>
    where
        S: AsRef<str>,
    {
        let s = s.as_ref().trim();
        let invalid = || SponsrError::MpdParsing(format!("Invalid media range: {s}"));

        let (start, end) = s.split_once('-').ok_or_else(invalid)?;
        let first_byte_pos = start.trim().parse::<u64>().map_err(|_| invalid())?;
        let end = end.trim();
        let last_byte_pos = if end.is_empty() {
            None
        } else {
            Some(end.parse::<u64>().map_err(|_| invalid())?)
        };

        let length = match last_byte_pos {
            Some(last) if last < first_byte_pos => return Err(invalid()),
            Some(last) => Some(last - first_byte_pos + 1),
            None => None,
        };

        Ok(Self::new(first_byte_pos, length))
    }

    pub fn to_http_range(&self) -> String {
        if let Some(length) = self.length {
            format!("bytes={}-{}", self.offset, self.offset + length - 1)
        } else {
            format!("bytes={}-", self.offset)
        }
    }
}
