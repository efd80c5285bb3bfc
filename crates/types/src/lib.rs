//! Core types for probabilistic micropayments.
//!
//! This crate provides the fundamental types shared by the payment workspace:
//!
//! - Primitives: [`Hash`], [`Address`], [`KeyPair`], [`Signature`]
//! - Identifiers: [`ManifestId`], [`SessionId`], [`BlockNumber`]
//! - Tickets: [`TicketParams`], [`Ticket`], [`SignedTicket`], [`TicketBatch`]
//! - Work description: [`Segment`], [`Rendition`], [`VideoProfile`], [`PriceInfo`]
//! - Chain submissions: [`Transaction`], [`SignedTransaction`]

mod crypto;
mod hash;
mod identifiers;
mod price;
pub mod profile;
mod segment;
pub mod signing;
mod ticket;
mod transaction;

pub use crypto::{verify_sig, CryptoError, KeyPair, Signature, SIGNATURE_LENGTH};
pub use hash::{Hash, HexError};
pub use identifiers::{Address, BlockNumber, ManifestId, SessionId};
pub use price::PriceInfo;
pub use profile::{parse_resolution, ProfileError, VideoProfile};
pub use segment::{Rendition, Segment};
pub use transaction::{ContractCall, SignedTransaction, Transaction};
pub use ticket::{
    expected_value, is_winning_ticket, max_win_prob, pad_u256, recipient_rand,
    recipient_rand_hash, SignedTicket, Ticket, TicketBatch, TicketParams, TicketSenderParams,
};

/// Re-exported arithmetic types used across the public API.
pub use num_bigint::{BigInt, BigUint};
pub use num_rational::BigRational;
