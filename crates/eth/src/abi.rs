//! Ticket broker call encoding.

use probpay_types::{pad_u256, BigUint, Hash, SignedTicket};

/// Ticket broker methods this node invokes or may see in its logs.
const BROKER_METHODS: &[&str] = &[
    "redeemWinningTicket((address,address,uint256,uint256,uint256,bytes32,bytes),bytes,uint256)",
    "fundDeposit()",
    "fundReserve()",
    "unlock()",
    "cancelUnlock()",
    "withdraw()",
];

const REDEEM_WINNING_TICKET: usize = 0;

/// First four bytes of the keccak-256 of a method signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = Hash::from_bytes(signature.as_bytes());
    let mut out = [0u8; 4];
    out.copy_from_slice(&hash.as_bytes()[..4]);
    out
}

/// Name of the broker method `data` invokes, or `"unknown"`.
pub fn method_name(data: &[u8]) -> &'static str {
    let Some(prefix) = data.get(..4) else {
        return "unknown";
    };
    BROKER_METHODS
        .iter()
        .find(|sig| selector(sig) == prefix)
        .and_then(|sig| sig.split('(').next())
        .unwrap_or("unknown")
}

/// Call data redeeming `ticket`.
///
/// Format: selector(4) || ticket.flatten() || sig_len(32) || sig ||
/// recipient_rand(32)
pub fn encode_redeem_winning_ticket(ticket: &SignedTicket) -> Vec<u8> {
    let flat = ticket.ticket.flatten();
    let sig = ticket.sig.as_bytes();

    let mut data = Vec::with_capacity(4 + flat.len() + 32 + sig.len() + 32);
    data.extend_from_slice(&selector(BROKER_METHODS[REDEEM_WINNING_TICKET]));
    data.extend_from_slice(&flat);
    data.extend_from_slice(&pad_u256(&BigUint::from(sig.len())));
    data.extend_from_slice(sig);
    data.extend_from_slice(&pad_u256(&ticket.recipient_rand));
    data
}
