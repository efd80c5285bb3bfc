//! Deterministic fixtures.

use probpay_types::{
    max_win_prob, recipient_rand, recipient_rand_hash, Address, BigInt, BigRational, BigUint,
    BlockNumber, KeyPair, Segment, TicketParams,
};

/// A keypair derived from a single seed byte. `seed` must be non-zero.
pub fn keypair(seed: u8) -> KeyPair {
    let mut bytes = [seed; 32];
    // Keep the scalar well inside the curve order.
    bytes[0] = 0x01;
    KeyPair::from_seed(&bytes).expect("fixture seed produces a valid key")
}

/// Integer rational.
pub fn rat(n: i64) -> BigRational {
    BigRational::from_integer(BigInt::from(n))
}

/// `n / d` as a rational.
pub fn ratio(n: i64, d: i64) -> BigRational {
    BigRational::new(BigInt::from(n), BigInt::from(d))
}

/// Ticket params for `recipient` whose rand hash commits to `secret`/`seed`.
///
/// Tickets always win, so every accepted ticket reaches the queue.
pub fn test_ticket_params(recipient: Address, secret: &[u8; 32], seed: u64) -> TicketParams {
    let seed = BigUint::from(seed);
    TicketParams {
        recipient,
        face_value: BigUint::from(1_000u32),
        win_prob: max_win_prob(),
        recipient_rand_hash: recipient_rand_hash(&recipient_rand(secret, &seed)),
        seed,
        expiration_block: BlockNumber(1_000),
    }
}

/// A segment with `duration` seconds of placeholder media.
pub fn test_segment(seq_no: u64, duration: f64) -> Segment {
    Segment::new(
        seq_no,
        format!("seg-{}.ts", seq_no),
        format!("media-{}", seq_no).into_bytes(),
        duration,
    )
}
