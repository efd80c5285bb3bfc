//! Per-address transaction nonce serialization.
//!
//! Each address owns an async mutex around its next nonce. Holding the
//! [`NonceGuard`] across "read nonce, sign, send, update" guarantees that
//! concurrent submissions from one address never reuse a nonce, while
//! different addresses never contend.

use dashmap::DashMap;
use probpay_core::{ChainBackend, ChainError};
use probpay_types::Address;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::trace;

pub struct NonceManager {
    chain: Arc<dyn ChainBackend>,
    entries: DashMap<Address, Arc<Mutex<Option<u64>>>>,
}

impl NonceManager {
    pub fn new(chain: Arc<dyn ChainBackend>) -> Self {
        Self {
            chain,
            entries: DashMap::new(),
        }
    }

    /// Take exclusive access to `address`'s nonce. Released on drop.
    pub async fn lock(&self, address: Address) -> NonceGuard {
        let slot = self
            .entries
            .entry(address)
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone();
        NonceGuard {
            address,
            slot: slot.lock_owned().await,
            chain: self.chain.clone(),
        }
    }
}

/// Exclusive handle on one address's nonce.
pub struct NonceGuard {
    address: Address,
    slot: OwnedMutexGuard<Option<u64>>,
    chain: Arc<dyn ChainBackend>,
}

impl NonceGuard {
    pub fn address(&self) -> Address {
        self.address
    }

    /// The next unused nonce. Read from the chain's pending state on first
    /// use, then served from memory.
    pub async fn next(&mut self) -> Result<u64, ChainError> {
        if let Some(nonce) = *self.slot {
            return Ok(nonce);
        }
        let nonce = self.chain.pending_nonce_at(&self.address).await?;
        trace!(address = %self.address, nonce, "Loaded pending nonce");
        *self.slot = Some(nonce);
        Ok(nonce)
    }

    /// Advance past `used` after a successful submission.
    pub fn update(&mut self, used: u64) {
        let next = used.saturating_add(1);
        if self.slot.map_or(true, |current| next > current) {
            *self.slot = Some(next);
        }
    }

    /// Forget the cached nonce so the next read goes back to the chain.
    pub fn reset(&mut self) {
        *self.slot = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use probpay_test_helpers::MockChain;
    use std::time::Duration;
    use tokio::time::timeout;

    fn manager(pending: u64) -> (NonceManager, Arc<MockChain>) {
        let chain = Arc::new(MockChain::new(pending));
        (NonceManager::new(chain.clone()), chain)
    }

    #[tokio::test]
    async fn test_next_is_lazy_and_cached() {
        let (nonces, chain) = manager(7);
        let addr = Address([1u8; 20]);

        assert_eq!(chain.pending_nonce_calls(), 0);
        {
            let mut guard = nonces.lock(addr).await;
            assert_eq!(guard.next().await.unwrap(), 7);
            assert_eq!(guard.next().await.unwrap(), 7);
        }
        let mut guard = nonces.lock(addr).await;
        assert_eq!(guard.next().await.unwrap(), 7);
        assert_eq!(chain.pending_nonce_calls(), 1);
    }

    #[tokio::test]
    async fn test_update_advances_and_never_rewinds() {
        let (nonces, _) = manager(0);
        let mut guard = nonces.lock(Address([1u8; 20])).await;

        guard.update(4);
        assert_eq!(guard.next().await.unwrap(), 5);
        guard.update(2);
        assert_eq!(guard.next().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_reset_reloads_from_chain() {
        let (nonces, chain) = manager(3);
        let mut guard = nonces.lock(Address([1u8; 20])).await;

        guard.update(9);
        guard.reset();
        assert_eq!(guard.next().await.unwrap(), 3);
        assert_eq!(chain.pending_nonce_calls(), 1);
    }

    #[tokio::test]
    async fn test_same_address_is_exclusive() {
        let (nonces, _) = manager(0);
        let addr = Address([1u8; 20]);

        let _held = nonces.lock(addr).await;
        let second = timeout(Duration::from_millis(50), nonces.lock(addr)).await;
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn test_other_addresses_do_not_block() {
        let (nonces, _) = manager(0);

        let _held = nonces.lock(Address([1u8; 20])).await;
        let other = timeout(Duration::from_millis(500), nonces.lock(Address([2u8; 20]))).await;
        assert!(other.is_ok());
    }
}
