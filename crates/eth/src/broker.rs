use crate::abi::encode_redeem_winning_ticket;
use crate::backend::Backend;
use crate::units::format_eth;
use async_trait::async_trait;
use probpay_core::{ChainError, TicketBroker};
use probpay_types::{Address, BlockNumber, Hash, KeyPair, SignedTicket};
use std::sync::Arc;
use tracing::debug;

/// [`TicketBroker`] that submits redemptions through a [`Backend`].
pub struct TicketBrokerClient {
    backend: Arc<Backend>,
    key: KeyPair,
    broker: Address,
}

impl TicketBrokerClient {
    /// Redeem with `key` against the broker contract at `broker`.
    pub fn new(backend: Arc<Backend>, key: KeyPair, broker: Address) -> Self {
        Self {
            backend,
            key,
            broker,
        }
    }

    pub fn broker_address(&self) -> Address {
        self.broker
    }
}

#[async_trait]
impl TicketBroker for TicketBrokerClient {
    async fn redeem_winning_ticket(&self, ticket: &SignedTicket) -> Result<Hash, ChainError> {
        debug!(
            sender = %ticket.ticket.sender,
            nonce = ticket.ticket.sender_nonce,
            face_value = %format_eth(&ticket.ticket.face_value),
            "Redeeming winning ticket"
        );
        let data = encode_redeem_winning_ticket(ticket);
        self.backend.submit(&self.key, self.broker, data).await
    }

    async fn current_block(&self) -> Result<BlockNumber, ChainError> {
        self.backend.block_number().await
    }
}
