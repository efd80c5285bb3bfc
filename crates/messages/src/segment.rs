//! Segment credentials and profile descriptors.

use crate::codec::wire_codec;
use probpay_types::{parse_resolution, ProfileError, VideoProfile};
use sbor::prelude::BasicSbor;

/// A fully-specified output profile.
#[derive(Debug, Clone, PartialEq, Eq, Default, BasicSbor)]
pub struct VideoProfileWire {
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// Bits per second.
    pub bitrate: u32,
    pub fps: u32,
}

impl TryFrom<&VideoProfile> for VideoProfileWire {
    type Error = ProfileError;

    fn try_from(profile: &VideoProfile) -> Result<Self, Self::Error> {
        let (width, height) = parse_resolution(&profile.resolution)?;
        let narrow = |v: u64| {
            u32::try_from(v)
                .map_err(|_| ProfileError::InvalidResolution(profile.resolution.clone()))
        };
        Ok(Self {
            name: profile.name.clone(),
            width: narrow(width)?,
            height: narrow(height)?,
            bitrate: parse_bitrate(&profile.bitrate).unwrap_or(0),
            fps: profile.framerate,
        })
    }
}

/// `"400k"` is 400000, `"1500"` is 1500.
fn parse_bitrate(bitrate: &str) -> Option<u32> {
    let trimmed = bitrate.trim();
    match trimmed.strip_suffix(['k', 'K']) {
        Some(kbps) => kbps.parse::<u32>().ok()?.checked_mul(1000),
        None => trimmed.parse().ok(),
    }
}

/// Credentials a broadcaster attaches to a segment.
///
/// The signature covers manifest id, sequence number, segment hash and the
/// requested profiles.
#[derive(Debug, Clone, PartialEq, Eq, Default, BasicSbor)]
pub struct SegData {
    pub manifest_id: String,
    pub seq: u64,
    pub hash: Vec<u8>,
    /// Concatenated 4-byte preset short codes.
    pub profiles: Vec<u8>,
    /// Fully-specified profiles; take precedence over `profiles`.
    pub full_profiles: Vec<VideoProfileWire>,
    pub sig: Vec<u8>,
}

wire_codec!(SegData);
