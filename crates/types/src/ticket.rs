//! Probabilistic payment tickets.
//!
//! A recipient issues [`TicketParams`] once per session. The sender then
//! issues any number of [`Ticket`]s against those params, each with its own
//! nonce and signature. A ticket pays out `face_value` when the lottery
//! draw derived from its signature and the recipient's revealed random
//! value falls below `win_prob`.

use crate::{Address, BlockNumber, Hash, Signature};
use num_bigint::{BigInt, BigUint};
use num_rational::BigRational;
use num_traits::{One, Zero};

/// Largest representable win probability, `2^256 - 1`. A ticket with this
/// win probability always wins.
pub fn max_win_prob() -> BigUint {
    (BigUint::one() << 256usize) - BigUint::one()
}

/// Big-endian, left-padded 32-byte encoding of an unsigned integer.
///
/// Values wider than 256 bits keep their low 256 bits.
pub fn pad_u256(value: &BigUint) -> [u8; 32] {
    let bytes = value.to_bytes_be();
    let mut out = [0u8; 32];
    if bytes.len() >= 32 {
        out.copy_from_slice(&bytes[bytes.len() - 32..]);
    } else {
        out[32 - bytes.len()..].copy_from_slice(&bytes);
    }
    out
}

/// Expected value of a ticket: `face_value * win_prob / (2^256 - 1)`.
pub fn expected_value(face_value: &BigUint, win_prob: &BigUint) -> BigRational {
    BigRational::new(
        BigInt::from(face_value * win_prob),
        BigInt::from(max_win_prob()),
    )
}

/// `keccak256(secret || seed)`, the random value a recipient reveals when
/// redeeming tickets issued against a seed.
pub fn recipient_rand(secret: &[u8; 32], seed: &BigUint) -> BigUint {
    Hash::from_parts(&[secret, &pad_u256(seed)]).to_uint()
}

/// Commitment to a recipient random value, published in ticket params.
pub fn recipient_rand_hash(rand: &BigUint) -> Hash {
    Hash::from_bytes(&pad_u256(rand))
}

/// Whether a ticket with signature `sig` wins given the revealed random.
pub fn is_winning_ticket(sig: &Signature, recipient_rand: &BigUint, win_prob: &BigUint) -> bool {
    let draw = Hash::from_parts(&[sig.as_bytes(), &pad_u256(recipient_rand)]);
    draw.to_uint() < *win_prob
}

/// Economics of every ticket issued in one session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TicketParams {
    pub recipient: Address,
    pub face_value: BigUint,
    pub win_prob: BigUint,
    pub recipient_rand_hash: Hash,
    pub seed: BigUint,
    pub expiration_block: BlockNumber,
}

impl TicketParams {
    /// Expected value of one ticket issued against these params.
    pub fn ev(&self) -> BigRational {
        expected_value(&self.face_value, &self.win_prob)
    }

    /// Build the ticket a sender issues with `sender_nonce`.
    pub fn ticket(&self, sender: Address, sender_nonce: u32) -> Ticket {
        Ticket {
            recipient: self.recipient,
            sender,
            face_value: self.face_value.clone(),
            win_prob: self.win_prob.clone(),
            sender_nonce,
            recipient_rand_hash: self.recipient_rand_hash,
            params_expiration_block: self.expiration_block,
        }
    }
}

/// A single lottery ticket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ticket {
    pub recipient: Address,
    pub sender: Address,
    pub face_value: BigUint,
    pub win_prob: BigUint,
    pub sender_nonce: u32,
    pub recipient_rand_hash: Hash,
    pub params_expiration_block: BlockNumber,
}

impl Ticket {
    /// Canonical byte encoding.
    ///
    /// Format: recipient(20) || sender(20) || face_value(32) || win_prob(32)
    /// || sender_nonce(32) || recipient_rand_hash(32) || expiration_block(32)
    pub fn flatten(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(20 + 20 + 32 * 5);
        buf.extend_from_slice(self.recipient.as_bytes());
        buf.extend_from_slice(self.sender.as_bytes());
        buf.extend_from_slice(&pad_u256(&self.face_value));
        buf.extend_from_slice(&pad_u256(&self.win_prob));
        buf.extend_from_slice(&pad_u256(&BigUint::from(self.sender_nonce)));
        buf.extend_from_slice(self.recipient_rand_hash.as_bytes());
        buf.extend_from_slice(&pad_u256(&BigUint::from(self.params_expiration_block.0)));
        buf
    }

    /// Keccak-256 of the canonical encoding. Senders sign this hash.
    pub fn hash(&self) -> Hash {
        Hash::from_bytes(&self.flatten())
    }

    pub fn ev(&self) -> BigRational {
        expected_value(&self.face_value, &self.win_prob)
    }
}

/// A ticket together with its signature and the recipient's revealed random.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTicket {
    pub ticket: Ticket,
    pub sig: Signature,
    pub recipient_rand: BigUint,
}

impl SignedTicket {
    pub fn is_winning(&self) -> bool {
        is_winning_ticket(&self.sig, &self.recipient_rand, &self.ticket.win_prob)
    }
}

/// Per-ticket data carried in a batch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TicketSenderParams {
    pub sender_nonce: u32,
    pub sig: Signature,
}

/// Many tickets sharing the same params and sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketBatch {
    pub params: TicketParams,
    pub sender: Address,
    pub sender_params: Vec<TicketSenderParams>,
}

impl TicketBatch {
    pub fn len(&self) -> usize {
        self.sender_params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sender_params.is_empty()
    }

    /// Reconstruct the tickets in the batch, in order.
    pub fn tickets(&self) -> Vec<Ticket> {
        self.sender_params
            .iter()
            .map(|p| self.params.ticket(self.sender, p.sender_nonce))
            .collect()
    }

    /// Total expected value of every ticket in the batch.
    pub fn total_ev(&self) -> BigRational {
        if self.sender_params.is_empty() {
            return BigRational::zero();
        }
        self.params.ev() * BigRational::from_integer(BigInt::from(self.sender_params.len()))
    }
}
