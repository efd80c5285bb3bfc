//! Media segments submitted for transcoding.

use crate::{Hash, VideoProfile};

/// One unit of work: a media segment of a broadcast stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub seq_no: u64,
    pub name: String,
    pub data: Vec<u8>,
    /// Duration in seconds.
    pub duration: f64,
}

impl Segment {
    pub fn new(seq_no: u64, name: impl Into<String>, data: Vec<u8>, duration: f64) -> Self {
        Self {
            seq_no,
            name: name.into(),
            data,
            duration,
        }
    }

    /// Hash of the segment payload.
    pub fn hash(&self) -> Hash {
        Hash::from_bytes(&self.data)
    }

    /// Duration rounded up to whole seconds. Negative or NaN durations
    /// count as zero.
    pub fn whole_seconds(&self) -> u64 {
        if self.duration.is_nan() || self.duration <= 0.0 {
            return 0;
        }
        self.duration.ceil() as u64
    }
}

/// One output rendition produced by a transcoder.
#[derive(Debug, Clone, PartialEq)]
pub struct Rendition {
    pub profile: VideoProfile,
    pub data: Vec<u8>,
    /// Pixels encoded in this rendition, the unit of billing.
    pub pixels: i64,
}

impl Rendition {
    pub fn hash(&self) -> Hash {
        Hash::from_bytes(&self.data)
    }
}
