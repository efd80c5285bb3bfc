//! Output rendition profiles.
//!
//! A profile names a target resolution, framerate and bitrate. Well-known
//! presets can be referenced on the wire by a 4-byte short code, the first
//! four bytes of the keccak hash of the preset name.

use crate::Hash;

/// Length of a preset short code in bytes.
pub const PROFILE_ID_LENGTH: usize = 4;

/// A requested output rendition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VideoProfile {
    pub name: String,
    /// Target bitrate, e.g. `"400k"`.
    pub bitrate: String,
    pub framerate: u32,
    /// `"{width}x{height}"`.
    pub resolution: String,
}

impl VideoProfile {
    pub fn new(
        name: impl Into<String>,
        bitrate: impl Into<String>,
        framerate: u32,
        resolution: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            bitrate: bitrate.into(),
            framerate,
            resolution: resolution.into(),
        }
    }

    /// Parsed `(width, height)`.
    pub fn dimensions(&self) -> Result<(u64, u64), ProfileError> {
        parse_resolution(&self.resolution)
    }

    /// Short code identifying this profile by name.
    pub fn id(&self) -> [u8; PROFILE_ID_LENGTH] {
        profile_id(&self.name)
    }
}

fn profile_id(name: &str) -> [u8; PROFILE_ID_LENGTH] {
    let hash = Hash::from_bytes(name.as_bytes());
    let mut id = [0u8; PROFILE_ID_LENGTH];
    id.copy_from_slice(&hash.as_bytes()[..PROFILE_ID_LENGTH]);
    id
}

/// Parse a `"{width}x{height}"` resolution string.
pub fn parse_resolution(resolution: &str) -> Result<(u64, u64), ProfileError> {
    let invalid = || ProfileError::InvalidResolution(resolution.to_string());
    let (w, h) = resolution.split_once('x').ok_or_else(invalid)?;
    let width = w.trim().parse::<u64>().map_err(|_| invalid())?;
    let height = h.trim().parse::<u64>().map_err(|_| invalid())?;
    Ok((width, height))
}

struct Preset {
    name: &'static str,
    bitrate: &'static str,
    framerate: u32,
    resolution: &'static str,
}

const PRESETS: &[Preset] = &[
    Preset { name: "P144p30fps16x9", bitrate: "400k", framerate: 30, resolution: "256x144" },
    Preset { name: "P144p25fps16x9", bitrate: "400k", framerate: 25, resolution: "256x144" },
    Preset { name: "P240p30fps16x9", bitrate: "600k", framerate: 30, resolution: "426x240" },
    Preset { name: "P240p30fps4x3", bitrate: "600k", framerate: 30, resolution: "320x240" },
    Preset { name: "P360p30fps16x9", bitrate: "1200k", framerate: 30, resolution: "640x360" },
    Preset { name: "P576p30fps16x9", bitrate: "1500k", framerate: 30, resolution: "1024x576" },
    Preset { name: "P720p30fps16x9", bitrate: "4000k", framerate: 30, resolution: "1280x720" },
    Preset { name: "P720p60fps16x9", bitrate: "6000k", framerate: 60, resolution: "1280x720" },
];

impl From<&Preset> for VideoProfile {
    fn from(p: &Preset) -> Self {
        VideoProfile::new(p.name, p.bitrate, p.framerate, p.resolution)
    }
}

/// Look up a preset by name.
pub fn preset(name: &str) -> Option<VideoProfile> {
    PRESETS.iter().find(|p| p.name == name).map(VideoProfile::from)
}

/// Look up a preset by short code.
pub fn preset_by_id(id: &[u8]) -> Option<VideoProfile> {
    PRESETS
        .iter()
        .find(|p| profile_id(p.name).as_slice() == id)
        .map(VideoProfile::from)
}

/// All known presets.
pub fn presets() -> Vec<VideoProfile> {
    PRESETS.iter().map(VideoProfile::from).collect()
}

/// Decode a concatenation of preset short codes.
pub fn profiles_from_ids(ids: &[u8]) -> Result<Vec<VideoProfile>, ProfileError> {
    if ids.len() % PROFILE_ID_LENGTH != 0 {
        return Err(ProfileError::InvalidShortCodes(ids.len()));
    }
    ids.chunks(PROFILE_ID_LENGTH)
        .map(|id| preset_by_id(id).ok_or_else(|| ProfileError::UnknownProfile(hex::encode(id))))
        .collect()
}

/// Encode profiles as concatenated short codes.
pub fn profiles_to_ids(profiles: &[VideoProfile]) -> Vec<u8> {
    profiles.iter().flat_map(|p| p.id()).collect()
}

pub fn p144p30fps16x9() -> VideoProfile {
    VideoProfile::from(&PRESETS[0])
}

pub fn p144p25fps16x9() -> VideoProfile {
    VideoProfile::from(&PRESETS[1])
}

pub fn p240p30fps16x9() -> VideoProfile {
    VideoProfile::from(&PRESETS[2])
}

pub fn p240p30fps4x3() -> VideoProfile {
    VideoProfile::from(&PRESETS[3])
}

pub fn p360p30fps16x9() -> VideoProfile {
    VideoProfile::from(&PRESETS[4])
}

pub fn p576p30fps16x9() -> VideoProfile {
    VideoProfile::from(&PRESETS[5])
}

pub fn p720p30fps16x9() -> VideoProfile {
    VideoProfile::from(&PRESETS[6])
}

pub fn p720p60fps16x9() -> VideoProfile {
    VideoProfile::from(&PRESETS[7])
}

/// Errors in profile parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProfileError {
    #[error("Invalid resolution {0:?}")]
    InvalidResolution(String),

    #[error("Invalid profile short codes: length {0} is not a multiple of 4")]
    InvalidShortCodes(usize),

    #[error("Unknown profile id {0}")]
    UnknownProfile(String),
}
