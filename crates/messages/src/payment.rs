//! Payment header message.
//!
//! A payment travels base64-encoded in a request header alongside the
//! segment it pays for. It carries the ticket params issued by the
//! orchestrator, one entry per ticket in the batch, the sender's address
//! and the price the sender expects to be charged.

use crate::codec::{wire_codec, CodecError};
use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};
use probpay_types::{
    Address, BlockNumber, Hash, PriceInfo, Signature, TicketBatch, TicketParams,
    TicketSenderParams,
};
use sbor::prelude::BasicSbor;

/// Unsigned integers travel as minimal big-endian bytes; zero is empty.
pub(crate) fn uint_to_bytes(value: &BigUint) -> Vec<u8> {
    if value.is_zero() {
        Vec::new()
    } else {
        value.to_bytes_be()
    }
}

pub(crate) fn uint_from_bytes(bytes: &[u8]) -> BigUint {
    BigUint::from_bytes_be(bytes)
}

/// Ticket params as carried on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Default, BasicSbor)]
pub struct TicketParamsWire {
    pub recipient: Vec<u8>,
    pub face_value: Vec<u8>,
    pub win_prob: Vec<u8>,
    pub recipient_rand_hash: Vec<u8>,
    pub seed: Vec<u8>,
    pub expiration_block: Vec<u8>,
}

impl From<&TicketParams> for TicketParamsWire {
    fn from(params: &TicketParams) -> Self {
        Self {
            recipient: params.recipient.as_bytes().to_vec(),
            face_value: uint_to_bytes(&params.face_value),
            win_prob: uint_to_bytes(&params.win_prob),
            recipient_rand_hash: params.recipient_rand_hash.as_bytes().to_vec(),
            seed: uint_to_bytes(&params.seed),
            expiration_block: uint_to_bytes(&BigUint::from(params.expiration_block.0)),
        }
    }
}

impl TryFrom<&TicketParamsWire> for TicketParams {
    type Error = CodecError;

    fn try_from(wire: &TicketParamsWire) -> Result<Self, Self::Error> {
        let recipient = Address::from_slice(&wire.recipient)
            .map_err(|e| CodecError::invalid("recipient", e))?;
        if wire.recipient_rand_hash.len() != Hash::BYTES {
            return Err(CodecError::invalid(
                "recipient_rand_hash",
                format!("expected 32 bytes, got {}", wire.recipient_rand_hash.len()),
            ));
        }
        let expiration_block = uint_from_bytes(&wire.expiration_block)
            .to_u64()
            .ok_or_else(|| CodecError::invalid("expiration_block", "out of range"))?;

        Ok(TicketParams {
            recipient,
            face_value: uint_from_bytes(&wire.face_value),
            win_prob: uint_from_bytes(&wire.win_prob),
            recipient_rand_hash: Hash::from_hash_bytes(&wire.recipient_rand_hash),
            seed: uint_from_bytes(&wire.seed),
            expiration_block: BlockNumber(expiration_block),
        })
    }
}

/// Per-ticket sender data.
#[derive(Debug, Clone, PartialEq, Eq, Default, BasicSbor)]
pub struct TicketSenderParamsWire {
    pub sender_nonce: u32,
    pub sig: Vec<u8>,
}

impl From<&TicketSenderParams> for TicketSenderParamsWire {
    fn from(params: &TicketSenderParams) -> Self {
        Self {
            sender_nonce: params.sender_nonce,
            sig: params.sig.to_bytes(),
        }
    }
}

impl From<&TicketSenderParamsWire> for TicketSenderParams {
    fn from(wire: &TicketSenderParamsWire) -> Self {
        Self {
            sender_nonce: wire.sender_nonce,
            sig: Signature(wire.sig.clone()),
        }
    }
}

/// The payment header.
///
/// An empty header decodes to `Payment::default()`.
#[derive(Debug, Clone, PartialEq, Eq, Default, BasicSbor)]
pub struct Payment {
    pub sender: Vec<u8>,
    pub ticket_params: Option<TicketParamsWire>,
    pub ticket_sender_params: Vec<TicketSenderParamsWire>,
    pub expected_price: Option<PriceInfo>,
}

wire_codec!(Payment);

impl Payment {
    /// Build a payment carrying `batch`.
    pub fn from_batch(batch: &TicketBatch, expected_price: PriceInfo) -> Self {
        Self {
            sender: batch.sender.as_bytes().to_vec(),
            ticket_params: Some(TicketParamsWire::from(&batch.params)),
            ticket_sender_params: batch
                .sender_params
                .iter()
                .map(TicketSenderParamsWire::from)
                .collect(),
            expected_price: Some(expected_price),
        }
    }

    /// Build a payment with no tickets.
    pub fn without_tickets(sender: Address, expected_price: PriceInfo) -> Self {
        Self {
            sender: sender.as_bytes().to_vec(),
            ticket_params: None,
            ticket_sender_params: Vec::new(),
            expected_price: Some(expected_price),
        }
    }

    /// The sender address, or `None` when absent.
    pub fn sender_address(&self) -> Result<Option<Address>, CodecError> {
        if self.sender.is_empty() {
            return Ok(None);
        }
        Address::from_slice(&self.sender)
            .map(Some)
            .map_err(|e| CodecError::invalid("sender", e))
    }

    /// Reassemble the ticket batch, or `None` when the payment carries no
    /// ticket params.
    pub fn ticket_batch(&self) -> Result<Option<TicketBatch>, CodecError> {
        let Some(wire) = &self.ticket_params else {
            return Ok(None);
        };
        let sender = self
            .sender_address()?
            .ok_or_else(|| CodecError::invalid("sender", "missing"))?;

        Ok(Some(TicketBatch {
            params: TicketParams::try_from(wire)?,
            sender,
            sender_params: self
                .ticket_sender_params
                .iter()
                .map(TicketSenderParams::from)
                .collect(),
        }))
    }
}
