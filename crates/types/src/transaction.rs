//! On-chain transactions.

use crate::{pad_u256, Address, Hash, KeyPair, Signature};
use num_bigint::BigUint;

/// An unsigned contract transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub to: Address,
    pub nonce: u64,
    pub value: BigUint,
    pub data: Vec<u8>,
}

impl Transaction {
    pub fn new(to: Address, nonce: u64, data: Vec<u8>) -> Self {
        Self {
            to,
            nonce,
            value: BigUint::default(),
            data,
        }
    }

    /// Hash committed to by the signature.
    ///
    /// Format: keccak256(to || nonce || value || data)
    pub fn hash(&self) -> Hash {
        Hash::from_parts(&[
            self.to.as_bytes(),
            &self.nonce.to_be_bytes(),
            &pad_u256(&self.value),
            &self.data,
        ])
    }

    pub fn sign(self, key: &KeyPair) -> SignedTransaction {
        let sig = key.sign(self.hash().as_bytes());
        SignedTransaction {
            from: key.address(),
            tx: self,
            sig,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub tx: Transaction,
    pub from: Address,
    pub sig: Signature,
}

impl SignedTransaction {
    pub fn hash(&self) -> Hash {
        Hash::from_parts(&[self.tx.hash().as_bytes(), self.sig.as_bytes()])
    }
}

/// A read-only contract call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractCall {
    pub to: Address,
    pub data: Vec<u8>,
}
