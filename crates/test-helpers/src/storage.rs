//! In-memory storage and transcoding doubles.

use async_trait::async_trait;
use parking_lot::Mutex;
use probpay_core::{ObjectStore, SettlementError, Transcoder};
use probpay_types::{ManifestId, Rendition, Segment, VideoProfile};
use std::collections::BTreeMap;

/// An [`ObjectStore`] backed by a map.
///
/// Can be told to fail every save from the n-th onwards.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    attempts: Mutex<usize>,
    fail_from: Option<usize>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the save with zero-based index `n` and every one after it.
    pub fn failing_from(n: usize) -> Self {
        Self {
            fail_from: Some(n),
            ..Self::default()
        }
    }

    pub fn paths(&self) -> Vec<String> {
        self.objects.lock().keys().cloned().collect()
    }

    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.objects.lock().get(path).cloned()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn save(&self, path: &str, data: Vec<u8>) -> Result<String, SettlementError> {
        let attempt = {
            let mut attempts = self.attempts.lock();
            let n = *attempts;
            *attempts += 1;
            n
        };
        if matches!(self.fail_from, Some(n) if attempt >= n) {
            return Err(SettlementError::Storage(format!("cannot save {}", path)));
        }
        self.objects.lock().insert(path.to_string(), data);
        Ok(format!("memory://{}", path))
    }
}

/// A [`Transcoder`] producing one rendition per profile with a fixed pixel
/// count, or a scripted error.
pub struct StubTranscoder {
    pixels_per_rendition: i64,
    error: Option<String>,
}

impl StubTranscoder {
    pub fn new(pixels_per_rendition: i64) -> Self {
        Self {
            pixels_per_rendition,
            error: None,
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            pixels_per_rendition: 0,
            error: Some(message.into()),
        }
    }
}

#[async_trait]
impl Transcoder for StubTranscoder {
    async fn transcode(
        &self,
        _manifest_id: &ManifestId,
        segment: &Segment,
        profiles: &[VideoProfile],
    ) -> Result<Vec<Rendition>, SettlementError> {
        if let Some(message) = &self.error {
            return Err(SettlementError::Transcode(message.clone()));
        }
        Ok(profiles
            .iter()
            .map(|profile| Rendition {
                profile: profile.clone(),
                data: [segment.data.as_slice(), profile.name.as_bytes()].concat(),
                pixels: self.pixels_per_rendition,
            })
            .collect())
    }
}
