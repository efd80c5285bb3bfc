//! Chain access with nonce-serialized submission and retrying reads.

use crate::abi::method_name;
use crate::nonce::NonceManager;
use probpay_core::{ChainBackend, ChainError};
use probpay_types::{Address, BlockNumber, ContractCall, Hash, KeyPair, Transaction};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Configuration for [`Backend`].
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Attempts made for a read-only call when the node connection drops.
    /// Other errors are returned after the first attempt.
    pub max_call_attempts: usize,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            max_call_attempts: 3,
        }
    }
}

impl BackendConfig {
    pub fn with_max_call_attempts(mut self, attempts: usize) -> Self {
        self.max_call_attempts = attempts;
        self
    }
}

pub struct Backend {
    chain: Arc<dyn ChainBackend>,
    nonces: NonceManager,
    config: BackendConfig,
}

impl Backend {
    pub fn new(chain: Arc<dyn ChainBackend>, config: BackendConfig) -> Self {
        Self {
            nonces: NonceManager::new(chain.clone()),
            chain,
            config,
        }
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    pub fn nonces(&self) -> &NonceManager {
        &self.nonces
    }

    /// Next nonce `address` would use, under the address lock.
    pub async fn pending_nonce_at(&self, address: Address) -> Result<u64, ChainError> {
        self.nonces.lock(address).await.next().await
    }

    /// Sign and send a transaction from `key` to `to`.
    ///
    /// The sender's nonce lock is held from reading the nonce until the
    /// send returns. A failed send drops the cached nonce so the next
    /// submission re-reads it from the chain.
    pub async fn submit(
        &self,
        key: &KeyPair,
        to: Address,
        data: Vec<u8>,
    ) -> Result<Hash, ChainError> {
        let from = key.address();
        let method = method_name(&data);
        let mut nonce_guard = self.nonces.lock(from).await;
        let nonce = nonce_guard.next().await?;

        let tx = Transaction::new(to, nonce, data).sign(key);
        match self.chain.send_transaction(&tx).await {
            Ok(hash) => {
                nonce_guard.update(nonce);
                info!(method, from = %from, to = %to, nonce, tx = %hash, "Sent transaction");
                Ok(hash)
            }
            Err(e) => {
                nonce_guard.reset();
                warn!(method, from = %from, to = %to, nonce, error = %e, "Transaction failed");
                Err(e)
            }
        }
    }

    /// Read-only contract call, retried on dropped connections.
    pub async fn call_contract(&self, call: &ContractCall) -> Result<Vec<u8>, ChainError> {
        let attempts = self.config.max_call_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.chain.call_contract(call).await {
                Err(e) if e.is_transient() && attempt < attempts => {
                    debug!(attempt, error = %e, "Retrying call to remote chain node");
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    pub async fn block_number(&self) -> Result<BlockNumber, ChainError> {
        self.chain.block_number().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use probpay_test_helpers::{keypair, MockChain};
    use tracing_test::traced_test;

    fn backend(pending: u64) -> (Arc<Backend>, Arc<MockChain>) {
        let chain = Arc::new(MockChain::new(pending));
        let backend = Backend::new(chain.clone(), BackendConfig::default());
        (Arc::new(backend), chain)
    }

    fn call() -> ContractCall {
        ContractCall {
            to: Address([8u8; 20]),
            data: vec![1, 2, 3],
        }
    }

    #[traced_test]
    #[tokio::test]
    async fn test_submit_uses_consecutive_nonces() {
        let (backend, chain) = backend(5);
        let key = keypair(1);

        for _ in 0..3 {
            backend.submit(&key, Address([9u8; 20]), vec![0xaa]).await.unwrap();
        }

        assert_eq!(chain.sent_nonces(), vec![5, 6, 7]);
        assert_eq!(chain.pending_nonce_calls(), 1);
        assert!(chain.sent().iter().all(|tx| tx.from == key.address()));
    }

    #[tokio::test]
    async fn test_concurrent_submits_never_reuse_nonce() {
        let (backend, chain) = backend(0);

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let backend = backend.clone();
                tokio::spawn(async move {
                    backend.submit(&keypair(1), Address([9u8; 20]), vec![]).await
                })
            })
            .collect();
        for h in handles {
            h.await.unwrap().unwrap();
        }

        let mut nonces = chain.sent_nonces();
        nonces.sort();
        assert_eq!(nonces, (0..10).collect::<Vec<_>>());
    }

    #[traced_test]
    #[tokio::test]
    async fn test_failed_submit_reloads_nonce() {
        let (backend, chain) = backend(4);
        let key = keypair(1);
        chain.push_send_error(ChainError::Rejected("nonce too low".into()));

        let err = backend.submit(&key, Address([9u8; 20]), vec![]).await.unwrap_err();
        assert_eq!(err, ChainError::Rejected("nonce too low".into()));

        backend.submit(&key, Address([9u8; 20]), vec![]).await.unwrap();
        assert_eq!(chain.sent_nonces(), vec![4]);
        assert_eq!(chain.pending_nonce_calls(), 2);
    }

    #[tokio::test]
    async fn test_pending_nonce_at() {
        let (backend, _) = backend(12);
        assert_eq!(backend.pending_nonce_at(keypair(1).address()).await, Ok(12));
    }

    #[traced_test]
    #[tokio::test]
    async fn test_call_contract_retries_transient_errors() {
        let (backend, chain) = backend(0);
        chain.push_call_error(ChainError::Eof);
        chain.push_call_error(ChainError::ConnectionClosed);

        assert_eq!(backend.call_contract(&call()).await, Ok(vec![1, 2, 3]));
        assert_eq!(chain.call_attempts(), 3);
    }

    #[tokio::test]
    async fn test_call_contract_gives_up_after_max_attempts() {
        let (backend, chain) = backend(0);
        for _ in 0..4 {
            chain.push_call_error(ChainError::Eof);
        }

        assert_eq!(backend.call_contract(&call()).await, Err(ChainError::Eof));
        assert_eq!(chain.call_attempts(), 3);
    }

    #[tokio::test]
    async fn test_call_contract_does_not_retry_other_errors() {
        let (backend, chain) = backend(0);
        chain.push_call_error(ChainError::Rpc("execution reverted".into()));

        assert_eq!(
            backend.call_contract(&call()).await,
            Err(ChainError::Rpc("execution reverted".into()))
        );
        assert_eq!(chain.call_attempts(), 1);
    }
}
