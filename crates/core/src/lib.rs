//! Core abstractions for off-chain ticket settlement.
//!
//! This crate defines the capability traits every settlement component is
//! written against, the error taxonomy they share and the transport-neutral
//! envelopes of a segment exchange.

mod error;
mod request;
mod traits;

pub use error::{
    ChainError, PriceError, SenderError, SettlementError, TicketError, TransportError,
};
pub use request::{
    SegmentRequest, SegmentResponse, PAYMENT_HEADER, SEGMENT_HEADER, SEGMENT_PATH,
};
pub use traits::{
    Broadcaster, ChainBackend, ObjectStore, Orchestrator, SegmentTransport, SessionBalance,
    TicketBroker, TicketSender, Transcoder,
};
