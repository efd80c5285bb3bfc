//! Domain-separated signing messages.
//!
//! Every signature in the payment protocol is computed over the
//! personal-message hash of its input (see [`personal_message_hash`]).
//! Messages other than tickets additionally carry a domain tag so a
//! signature from one context cannot be replayed in another. Tickets are
//! signed over their bare hash so the escrow contract can check them.
//!
//! # Domain Tags
//!
//! | Tag | Purpose |
//! |-----|---------|
//! | `segment_creds:` | Broadcaster credentials attached to a segment |
//! | `orchestrator_req:` | Broadcaster request for orchestrator terms |
//! | `transcode_result:` | Orchestrator signature over transcoded output |

use crate::{Address, Hash, ManifestId};

/// Prefix used by the personal-message scheme.
pub const PERSONAL_MESSAGE_PREFIX: &[u8] = b"\x19Ethereum Signed Message:\n32";

/// Domain tag for segment credentials.
///
/// Format: `segment_creds:` || manifest_id || seq_no || segment_hash || profile ids
pub const DOMAIN_SEGMENT_CREDS: &[u8] = b"segment_creds:";

/// Domain tag for orchestrator info requests.
///
/// Format: `orchestrator_req:` || broadcaster address
pub const DOMAIN_ORCHESTRATOR_REQ: &[u8] = b"orchestrator_req:";

/// Domain tag for transcode results.
///
/// Format: `transcode_result:` || hash of each output rendition
pub const DOMAIN_TRANSCODE_RESULT: &[u8] = b"transcode_result:";

/// `keccak256(PREFIX || keccak256(message))`.
pub fn personal_message_hash(message: &[u8]) -> Hash {
    let inner = Hash::from_bytes(message);
    Hash::from_parts(&[PERSONAL_MESSAGE_PREFIX, inner.as_bytes()])
}

/// Build the signing message for segment credentials.
pub fn segment_creds_message(
    manifest_id: &ManifestId,
    seq_no: u64,
    segment_hash: &Hash,
    profile_ids: &[[u8; 4]],
) -> Vec<u8> {
    let mut message = Vec::with_capacity(
        DOMAIN_SEGMENT_CREDS.len() + manifest_id.0.len() + 8 + 32 + profile_ids.len() * 4,
    );
    message.extend_from_slice(DOMAIN_SEGMENT_CREDS);
    message.extend_from_slice(manifest_id.0.as_bytes());
    message.extend_from_slice(&seq_no.to_be_bytes());
    message.extend_from_slice(segment_hash.as_bytes());
    for id in profile_ids {
        message.extend_from_slice(id);
    }
    message
}

/// Build the signing message for an orchestrator info request.
pub fn orchestrator_request_message(broadcaster: &Address) -> Vec<u8> {
    let mut message = Vec::with_capacity(DOMAIN_ORCHESTRATOR_REQ.len() + Address::BYTES);
    message.extend_from_slice(DOMAIN_ORCHESTRATOR_REQ);
    message.extend_from_slice(broadcaster.as_bytes());
    message
}

/// Build the signing message for a set of transcoded renditions.
pub fn transcode_result_message(rendition_hashes: &[Hash]) -> Vec<u8> {
    let mut message =
        Vec::with_capacity(DOMAIN_TRANSCODE_RESULT.len() + rendition_hashes.len() * 32);
    message.extend_from_slice(DOMAIN_TRANSCODE_RESULT);
    for hash in rendition_hashes {
        message.extend_from_slice(hash.as_bytes());
    }
    message
}
