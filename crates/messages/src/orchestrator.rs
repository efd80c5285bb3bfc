//! Orchestrator discovery messages and transcode responses.

use crate::codec::{wire_codec, CodecError};
use crate::payment::TicketParamsWire;
use probpay_types::PriceInfo;
use sbor::prelude::BasicSbor;

/// A broadcaster's signed request for an orchestrator's current terms.
#[derive(Debug, Clone, PartialEq, Eq, Default, BasicSbor)]
pub struct OrchestratorRequest {
    pub address: Vec<u8>,
    pub sig: Vec<u8>,
}

wire_codec!(OrchestratorRequest);

/// An orchestrator's current terms.
///
/// Returned from discovery and attached to every transcode response; the
/// broadcaster adopts the latest one it sees.
#[derive(Debug, Clone, PartialEq, Eq, Default, BasicSbor)]
pub struct OrchestratorInfo {
    /// Service URI of the transcoder.
    pub transcoder: String,
    pub ticket_params: Option<TicketParamsWire>,
    pub price_info: Option<PriceInfo>,
    pub address: Vec<u8>,
}

wire_codec!(OrchestratorInfo);

/// Location and size of one transcoded rendition.
#[derive(Debug, Clone, PartialEq, Eq, Default, BasicSbor)]
pub struct TranscodedSegmentData {
    pub url: String,
    pub pixels: i64,
}

/// Successful transcode output.
#[derive(Debug, Clone, PartialEq, Eq, Default, BasicSbor)]
pub struct TranscodeData {
    pub segments: Vec<TranscodedSegmentData>,
    pub sig: Vec<u8>,
}

impl TranscodeData {
    /// Pixels billed across all renditions. Negative counts and sums that
    /// overflow are rejected.
    pub fn total_pixels(&self) -> Result<i64, CodecError> {
        self.segments.iter().try_fold(0i64, |total, s| {
            if s.pixels < 0 {
                return Err(CodecError::invalid("pixels", s.pixels));
            }
            total
                .checked_add(s.pixels)
                .ok_or_else(|| CodecError::invalid("pixels", "total overflows"))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub enum TranscodeOutcome {
    Data(TranscodeData),
    Error(String),
}

/// Body of a segment submission response.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct TranscodeResult {
    pub info: Option<OrchestratorInfo>,
    pub result: TranscodeOutcome,
}

wire_codec!(TranscodeResult);
