//! Wire messages for the payment protocol.

pub mod codec;
pub mod orchestrator;
pub mod payment;
pub mod segment;

// Re-export commonly used types
pub use codec::{decode_header, encode_header, CodecError};
pub use orchestrator::{
    OrchestratorInfo, OrchestratorRequest, TranscodeData, TranscodeOutcome, TranscodeResult,
    TranscodedSegmentData,
};
pub use payment::{Payment, TicketParamsWire, TicketSenderParamsWire};
pub use segment::{SegData, VideoProfileWire};
