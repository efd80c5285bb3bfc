//! Segment credentials.
//!
//! The broadcaster signs the manifest id, sequence number, payload hash and
//! requested profiles of every segment. The orchestrator checks the
//! signature against the payment's sender before doing any work.

use crate::session::BroadcastSession;
use probpay_core::{Orchestrator, SettlementError};
use probpay_messages::{SegData, VideoProfileWire};
use probpay_types::profile::{profiles_from_ids, profiles_to_ids, PROFILE_ID_LENGTH};
use probpay_types::signing::segment_creds_message;
use probpay_types::{Address, Hash, ManifestId, ProfileError, Segment, Signature, VideoProfile};

/// What a verified set of credentials says about a segment.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentMetadata {
    pub manifest_id: ManifestId,
    pub seq_no: u64,
    pub hash: Hash,
    pub profiles: Vec<VideoProfile>,
}

fn profile_ids(raw: &[u8]) -> Result<Vec<[u8; PROFILE_ID_LENGTH]>, ProfileError> {
    if raw.len() % PROFILE_ID_LENGTH != 0 {
        return Err(ProfileError::InvalidShortCodes(raw.len()));
    }
    Ok(raw
        .chunks_exact(PROFILE_ID_LENGTH)
        .map(|c| {
            let mut id = [0u8; PROFILE_ID_LENGTH];
            id.copy_from_slice(c);
            id
        })
        .collect())
}

/// Sign credentials for `segment` as the session's broadcaster.
pub fn gen_seg_creds(
    session: &BroadcastSession,
    segment: &Segment,
) -> Result<String, SettlementError> {
    let hash = segment.hash();
    let ids: Vec<_> = session.profiles.iter().map(VideoProfile::id).collect();
    let full_profiles = session
        .profiles
        .iter()
        .map(VideoProfileWire::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    let message = segment_creds_message(&session.manifest_id, segment.seq_no, &hash, &ids);
    let seg = SegData {
        manifest_id: session.manifest_id.0.clone(),
        seq: segment.seq_no,
        hash: hash.as_bytes().to_vec(),
        profiles: profiles_to_ids(&session.profiles),
        full_profiles,
        sig: session.broadcaster.sign(&message).to_bytes(),
    };
    Ok(seg.to_header()?)
}

/// Check credentials signed by `broadcaster` and admit the stream.
///
/// Credentials that cannot be decoded are rejected like a bad signature.
pub fn verify_seg_creds(
    orch: &dyn Orchestrator,
    creds: &str,
    broadcaster: &Address,
) -> Result<SegmentMetadata, SettlementError> {
    let seg = SegData::from_header(creds)
        .map_err(|e| SettlementError::Signature(format!("Invalid segment creds ({})", e)))?;

    let profiles = if seg.full_profiles.is_empty() {
        profiles_from_ids(&seg.profiles)?
    } else {
        make_video_profiles(&seg.full_profiles)
    };

    let manifest_id = ManifestId::new(seg.manifest_id);
    let hash = Hash::from_hash_bytes(&seg.hash);
    let ids = profile_ids(&seg.profiles)?;
    let message = segment_creds_message(&manifest_id, seg.seq, &hash, &ids);
    if !orch.verify_sig(broadcaster, &message, &Signature(seg.sig)) {
        return Err(SettlementError::Signature("Segment sig check failed".into()));
    }

    orch.check_capacity(&manifest_id)?;

    Ok(SegmentMetadata {
        manifest_id,
        seq_no: seg.seq,
        hash,
        profiles,
    })
}

/// Profiles from their full wire description. Unnamed profiles are named
/// after their dimensions and bitrate.
pub fn make_video_profiles(wire: &[VideoProfileWire]) -> Vec<VideoProfile> {
    wire.iter()
        .map(|p| {
            let name = if p.name.is_empty() {
                format!("net_{}x{}_{}", p.width, p.height, p.bitrate)
            } else {
                p.name.clone()
            };
            VideoProfile::new(
                name,
                p.bitrate.to_string(),
                p.fps,
                format!("{}x{}", p.width, p.height),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BroadcastConfig;
    use probpay_test_helpers::{keypair, test_segment, StubBroadcaster, StubOrchestrator};
    use probpay_types::profile::{p144p30fps16x9, p240p30fps16x9};
    use std::sync::Arc;

    fn session(profiles: Vec<VideoProfile>) -> BroadcastSession {
        BroadcastSession::new(
            Arc::new(StubBroadcaster::new(keypair(1))),
            ManifestId::new("manifest"),
            profiles,
            Arc::new(BroadcastConfig::new()),
        )
    }

    #[test]
    fn test_creds_verify() {
        let profiles = vec![p144p30fps16x9(), p240p30fps16x9()];
        let seg = test_segment(4, 2.0);
        let creds = gen_seg_creds(&session(profiles.clone()), &seg).unwrap();
        let orch = StubOrchestrator::new(keypair(2));

        let md = verify_seg_creds(&orch, &creds, &keypair(1).address()).unwrap();

        assert_eq!(md.manifest_id, ManifestId::new("manifest"));
        assert_eq!(md.seq_no, 4);
        assert_eq!(md.hash, seg.hash());
        assert_eq!(md.profiles.len(), 2);
        assert_eq!(md.profiles[0].name, profiles[0].name);
        assert_eq!(md.profiles[1].resolution, profiles[1].resolution);
    }

    #[test]
    fn test_creds_wrong_broadcaster() {
        let s = session(vec![p144p30fps16x9()]);
        let creds = gen_seg_creds(&s, &test_segment(0, 1.0)).unwrap();
        let orch = StubOrchestrator::new(keypair(2));

        let err = verify_seg_creds(&orch, &creds, &keypair(3).address()).unwrap_err();
        assert!(matches!(err, SettlementError::Signature(_)));
        assert_eq!(err.status_code(), 403);
    }

    #[test]
    fn test_creds_at_capacity() {
        let creds = gen_seg_creds(&session(vec![]), &test_segment(0, 1.0)).unwrap();
        let orch = StubOrchestrator::new(keypair(2)).with_capacity_error("At capacity");

        let err = verify_seg_creds(&orch, &creds, &keypair(1).address()).unwrap_err();
        assert!(matches!(err, SettlementError::Capacity(_)));
        assert_eq!(err.to_string(), "At capacity");
    }

    #[test]
    fn test_creds_bad_encoding() {
        let orch = StubOrchestrator::new(keypair(2));
        let broadcaster = keypair(1).address();

        let err = verify_seg_creds(&orch, "%%%", &broadcaster).unwrap_err();
        assert!(matches!(err, SettlementError::Signature(_)));
        assert_eq!(err.status_code(), 403);

        // "3q2+7w==" is valid base64 but not a SegData.
        let err = verify_seg_creds(&orch, "3q2+7w==", &broadcaster).unwrap_err();
        assert!(err.to_string().starts_with("Signature error: Invalid segment creds"));
        assert_eq!(err.status_code(), 403);
    }

    #[test]
    fn test_creds_short_codes_only() {
        let seg = test_segment(1, 1.0);
        let s = session(vec![p144p30fps16x9()]);
        let hash = seg.hash();
        let message = segment_creds_message(&s.manifest_id, 1, &hash, &[p144p30fps16x9().id()]);
        let creds = SegData {
            manifest_id: "manifest".into(),
            seq: 1,
            hash: hash.as_bytes().to_vec(),
            profiles: profiles_to_ids(&s.profiles),
            full_profiles: vec![],
            sig: keypair(1).sign(&message).to_bytes(),
        }
        .to_header()
        .unwrap();

        let orch = StubOrchestrator::new(keypair(2));
        let md = verify_seg_creds(&orch, &creds, &keypair(1).address()).unwrap();
        assert_eq!(md.profiles, vec![p144p30fps16x9()]);
    }

    #[test]
    fn test_creds_malformed_short_codes() {
        let creds = SegData {
            manifest_id: "manifest".into(),
            seq: 1,
            hash: vec![0; 32],
            profiles: vec![1, 2, 3],
            full_profiles: vec![],
            sig: vec![],
        }
        .to_header()
        .unwrap();

        let orch = StubOrchestrator::new(keypair(2));
        assert!(matches!(
            verify_seg_creds(&orch, &creds, &keypair(1).address()),
            Err(SettlementError::Profile(ProfileError::InvalidShortCodes(3)))
        ));
    }

    #[test]
    fn test_make_video_profiles() {
        let wire = vec![
            VideoProfileWire {
                name: "prof1".into(),
                width: 432,
                height: 240,
                bitrate: 1_000_000,
                fps: 30,
            },
            VideoProfileWire {
                name: String::new(),
                width: 1280,
                height: 720,
                bitrate: 3_000_000,
                fps: 60,
            },
        ];

        let profiles = make_video_profiles(&wire);

        assert_eq!(profiles[0].name, "prof1");
        assert_eq!(profiles[0].bitrate, "1000000");
        assert_eq!(profiles[0].resolution, "432x240");
        assert_eq!(profiles[0].framerate, 30);
        assert_eq!(profiles[1].name, "net_1280x720_3000000");
        assert_eq!(profiles[1].framerate, 60);
    }
}
