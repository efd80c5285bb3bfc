//! Error types for the settlement subsystem.

use probpay_messages::CodecError;
use probpay_types::{CryptoError, PriceInfo, ProfileError, SessionId};
use thiserror::Error;

/// Problems with an orchestrator's advertised price.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PriceError {
    #[error("missing orchestrator price")]
    Missing,

    #[error("pixels per unit is 0")]
    ZeroPixelsPerUnit,

    #[error(
        "Orchestrator price higher than the set maximum price of {} wei per {} pixels",
        .max.price_per_unit,
        .max.pixels_per_unit
    )]
    TooHigh { max: PriceInfo },
}

/// Reasons a recipient rejects a ticket batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TicketError {
    #[error("invalid ticket signature")]
    InvalidSignature,

    #[error("invalid ticket recipient")]
    InvalidRecipient,

    #[error("invalid recipientRand for recipientRandHash")]
    InvalidRecipientRand,

    #[error("ticket params expired at block {0}")]
    Expired(u64),

    #[error("ticket sender nonce {0} already seen")]
    ReplayedNonce(u32),

    #[error("missing ticket sender")]
    MissingSender,

    #[error("missing expected price")]
    MissingExpectedPrice,

    #[error("expected price {expected} is lower than the orchestrator price {actual}")]
    ExpectedPriceTooLow { expected: PriceInfo, actual: PriceInfo },

    #[error("invalid ticket faceValue")]
    FaceValueMismatch,

    #[error("invalid ticket winProb")]
    WinProbMismatch,
}

/// Errors from the local ticket sender.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SenderError {
    #[error("unknown session {0}")]
    UnknownSession(SessionId),

    #[error("signer error: {0}")]
    Signer(String),
}

/// Errors from chain interaction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("EOF")]
    Eof,

    #[error("use of closed connection")]
    ConnectionClosed,

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("transaction rejected: {0}")]
    Rejected(String),
}

impl ChainError {
    /// Transport hiccups worth retrying for read-only calls.
    pub fn is_transient(&self) -> bool {
        matches!(self, ChainError::Eof | ChainError::ConnectionClosed)
    }
}

/// Connection-level failures of a segment exchange.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// No response arrived; the counterparty is assumed not to have
    /// seen the request.
    #[error("connection failed: {0}")]
    Connect(String),

    /// A response arrived but its body could not be read.
    #[error("response failed: {0}")]
    Response(String),
}

/// Errors surfaced by the payment protocol.
#[derive(Debug, Error)]
pub enum SettlementError {
    /// Malformed base64 payload.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Malformed binary payload.
    #[error("Decoding error: {0}")]
    Decoding(String),

    #[error("Signature error: {0}")]
    Signature(String),

    #[error(transparent)]
    Price(#[from] PriceError),

    #[error("{0}")]
    Capacity(String),

    #[error("Insufficient balance")]
    InsufficientBalance,

    #[error("Transcode error: {0}")]
    Transcode(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Profile(#[from] ProfileError),

    #[error(transparent)]
    Ticket(#[from] TicketError),

    #[error(transparent)]
    Sender(#[from] SenderError),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error("Storage error: {0}")]
    Storage(String),

    /// The counterparty answered with a non-success status.
    #[error("{message}")]
    Remote { status: u16, message: String },

    /// Detail is kept for logs, never rendered.
    #[error("Internal Server Error")]
    Internal(String),
}

impl SettlementError {
    /// HTTP-style status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            SettlementError::Encoding(_) | SettlementError::Decoding(_) => 402,
            SettlementError::Signature(_)
            | SettlementError::Capacity(_)
            | SettlementError::Profile(_) => 403,
            SettlementError::Price(_)
            | SettlementError::InsufficientBalance
            | SettlementError::Ticket(_)
            | SettlementError::Sender(_)
            | SettlementError::Transcode(_) => 400,
            SettlementError::Remote { status, .. } => *status,
            SettlementError::Transport(_)
            | SettlementError::Chain(_)
            | SettlementError::Storage(_)
            | SettlementError::Internal(_) => 500,
        }
    }
}

impl From<CodecError> for SettlementError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Base64(_) => SettlementError::Encoding(err.to_string()),
            CodecError::SborEncode(_) => SettlementError::Internal(err.to_string()),
            _ => SettlementError::Decoding(err.to_string()),
        }
    }
}

impl From<CryptoError> for SettlementError {
    fn from(err: CryptoError) -> Self {
        SettlementError::Signature(err.to_string())
    }
}
