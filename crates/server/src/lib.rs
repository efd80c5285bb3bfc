//! Payment protocol for segment exchanges.
//!
//! A broadcaster stages credit, signs tickets for the shortfall and submits
//! a segment with its credentials and payment ([`submit_segment`]). The
//! orchestrator verifies both, credits the payment, transcodes and debits
//! what it actually delivered ([`serve_segment`]). Both sides reconcile
//! against the same price terms, which the orchestrator may rotate on every
//! response.
//!
//! # Status codes
//!
//! | Status | Meaning |
//! |--------|---------|
//! | 200 | Transcode result, possibly carrying a transcode error |
//! | 400 | Price, payment or balance rejected |
//! | 402 | Malformed payment encoding |
//! | 403 | Bad or malformed credentials, unknown profile or no capacity |
//! | 500 | Internal failure assembling the response |

mod config;
mod creds;
mod discovery;
mod payment;
mod serve;
mod session;
mod submit;
mod transport;

pub use config::BroadcastConfig;
pub use creds::{gen_seg_creds, make_video_profiles, verify_seg_creds, SegmentMetadata};
pub use discovery::{
    gen_orchestrator_req, get_orchestrator, orchestrator_info, verify_orchestrator_req,
};
pub use payment::{gen_payment, get_payment, get_payment_sender};
pub use serve::serve_segment;
pub use session::BroadcastSession;
pub use submit::{submit_segment, SubmitOutcome};
pub use transport::{HttpTransport, HttpTransportConfig, LocalTransport};
