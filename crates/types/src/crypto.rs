//! Cryptographic key pairs and signatures.
//!
//! Keys are secp256k1. Signatures are 65-byte recoverable `[R || S || V]`
//! with `V` in `{27, 28}`, computed over the personal-message hash of the
//! input. Verification recovers the signer and compares addresses, so a
//! verifier only needs the expected [`Address`].

use crate::{signing::personal_message_hash, Address, Hash};
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{All, Message, PublicKey, Secp256k1, SecretKey};
use sbor::prelude::*;
use std::fmt;
use std::sync::OnceLock;

/// Length of a recoverable signature in bytes.
pub const SIGNATURE_LENGTH: usize = 65;

fn context() -> &'static Secp256k1<All> {
    static CONTEXT: OnceLock<Secp256k1<All>> = OnceLock::new();
    CONTEXT.get_or_init(Secp256k1::new)
}

/// A secp256k1 key pair with its derived address.
#[derive(Clone)]
pub struct KeyPair {
    secret: SecretKey,
    address: Address,
}

impl KeyPair {
    /// Generate a new random keypair.
    pub fn generate() -> Self {
        loop {
            let mut bytes = [0u8; 32];
            rand::RngCore::fill_bytes(&mut rand::rngs::OsRng, &mut bytes);
            // Out-of-range scalars are astronomically rare; draw again.
            if let Ok(kp) = Self::from_seed(&bytes) {
                return kp;
            }
        }
    }

    /// Build a keypair from 32 secret bytes (for testing/simulation).
    pub fn from_seed(seed: &[u8; 32]) -> Result<Self, CryptoError> {
        let secret = SecretKey::from_slice(seed).map_err(|_| CryptoError::InvalidSecretKey)?;
        let public = PublicKey::from_secret_key(context(), &secret);
        Ok(Self {
            secret,
            address: public_key_to_address(&public),
        })
    }

    /// The address controlled by this key.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Sign a message.
    ///
    /// The message is hashed, wrapped in the personal-message prefix and
    /// hashed again before signing.
    pub fn sign(&self, message: &[u8]) -> Signature {
        self.sign_digest(&personal_message_hash(message))
    }

    fn sign_digest(&self, digest: &Hash) -> Signature {
        let msg = Message::from_digest(digest.to_bytes());
        let sig = context().sign_ecdsa_recoverable(&msg, &self.secret);
        let (rec_id, compact) = sig.serialize_compact();

        let mut bytes = Vec::with_capacity(SIGNATURE_LENGTH);
        bytes.extend_from_slice(&compact);
        bytes.push(rec_id.to_i32() as u8 + 27);
        Signature(bytes)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyPair({})", self.address)
    }
}

fn public_key_to_address(public: &PublicKey) -> Address {
    let uncompressed = public.serialize_uncompressed();
    let hash = Hash::from_bytes(&uncompressed[1..]);
    let mut addr = [0u8; 20];
    addr.copy_from_slice(&hash.as_bytes()[12..]);
    Address(addr)
}

/// A recoverable secp256k1 signature.
///
/// Stored as raw bytes so signatures arriving off the wire can be carried
/// around before their shape is checked.
#[derive(Clone, PartialEq, Eq, Hash, Default, BasicSbor)]
#[sbor(transparent)]
pub struct Signature(pub Vec<u8>);

impl Signature {
    /// Create a zero/placeholder signature for testing.
    pub fn zero() -> Self {
        Signature(vec![0u8; SIGNATURE_LENGTH])
    }

    /// Get signature as byte slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Get signature as bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Recover the address that produced this signature over `message`.
    pub fn recover(&self, message: &[u8]) -> Result<Address, CryptoError> {
        if self.0.len() != SIGNATURE_LENGTH {
            return Err(CryptoError::InvalidLength(self.0.len()));
        }
        let v = self.0[64];
        if v != 27 && v != 28 {
            return Err(CryptoError::InvalidRecoveryId(v));
        }

        let rec_id = RecoveryId::from_i32(i32::from(v - 27))
            .map_err(|_| CryptoError::InvalidRecoveryId(v))?;
        let sig = RecoverableSignature::from_compact(&self.0[..64], rec_id)
            .map_err(|_| CryptoError::Malformed)?;
        let digest = personal_message_hash(message);
        let msg = Message::from_digest(digest.to_bytes());
        let public = context()
            .recover_ecdsa(&msg, &sig)
            .map_err(|_| CryptoError::RecoveryFailed)?;

        Ok(public_key_to_address(&public))
    }
}

impl From<Vec<u8>> for Signature {
    fn from(bytes: Vec<u8>) -> Self {
        Signature(bytes)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = hex::encode(&self.0);
        write!(f, "Signature({}..)", &hex[..hex.len().min(16)])
    }
}

/// Check that `sig` over `message` was produced by `address`.
///
/// Malformed signatures verify as false.
pub fn verify_sig(address: &Address, message: &[u8], sig: &Signature) -> bool {
    matches!(sig.recover(message), Ok(signer) if signer == *address)
}

/// Errors that can occur in key handling and signature recovery.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    #[error("Invalid secret key")]
    InvalidSecretKey,

    #[error("Invalid signature length: expected 65, got {0}")]
    InvalidLength(usize),

    #[error("Invalid recovery id {0}")]
    InvalidRecoveryId(u8),

    #[error("Malformed signature")]
    Malformed,

    #[error("Public key recovery failed")]
    RecoveryFailed,
}
