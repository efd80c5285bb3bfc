//! Scriptable chain backend.

use async_trait::async_trait;
use parking_lot::Mutex;
use probpay_core::{ChainBackend, ChainError, TicketBroker};
use probpay_types::{
    Address, BlockNumber, ContractCall, Hash, SignedTicket, SignedTransaction,
};
use std::collections::VecDeque;

#[derive(Default)]
struct State {
    pending_nonce: u64,
    pending_nonce_calls: usize,
    block: u64,
    sent: Vec<SignedTransaction>,
    send_errors: VecDeque<ChainError>,
    call_errors: VecDeque<ChainError>,
    call_attempts: usize,
}

/// A [`ChainBackend`] that records sent transactions and replays scripted
/// errors in order.
#[derive(Default)]
pub struct MockChain {
    state: Mutex<State>,
}

impl MockChain {
    pub fn new(pending_nonce: u64) -> Self {
        let chain = Self::default();
        chain.state.lock().pending_nonce = pending_nonce;
        chain
    }

    pub fn set_block(&self, block: u64) {
        self.state.lock().block = block;
    }

    /// Queue an error for the next `send_transaction`.
    pub fn push_send_error(&self, err: ChainError) {
        self.state.lock().send_errors.push_back(err);
    }

    /// Queue an error for the next `call_contract`.
    pub fn push_call_error(&self, err: ChainError) {
        self.state.lock().call_errors.push_back(err);
    }

    pub fn sent(&self) -> Vec<SignedTransaction> {
        self.state.lock().sent.clone()
    }

    pub fn sent_nonces(&self) -> Vec<u64> {
        self.state.lock().sent.iter().map(|tx| tx.tx.nonce).collect()
    }

    pub fn call_attempts(&self) -> usize {
        self.state.lock().call_attempts
    }

    pub fn pending_nonce_calls(&self) -> usize {
        self.state.lock().pending_nonce_calls
    }
}

#[async_trait]
impl ChainBackend for MockChain {
    async fn pending_nonce_at(&self, _address: &Address) -> Result<u64, ChainError> {
        let mut state = self.state.lock();
        state.pending_nonce_calls += 1;
        Ok(state.pending_nonce)
    }

    async fn send_transaction(&self, tx: &SignedTransaction) -> Result<Hash, ChainError> {
        let mut state = self.state.lock();
        if let Some(err) = state.send_errors.pop_front() {
            return Err(err);
        }
        state.sent.push(tx.clone());
        Ok(tx.hash())
    }

    async fn call_contract(&self, call: &ContractCall) -> Result<Vec<u8>, ChainError> {
        let mut state = self.state.lock();
        state.call_attempts += 1;
        if let Some(err) = state.call_errors.pop_front() {
            return Err(err);
        }
        Ok(call.data.clone())
    }

    async fn block_number(&self) -> Result<BlockNumber, ChainError> {
        Ok(BlockNumber(self.state.lock().block))
    }
}

#[derive(Default)]
struct BrokerState {
    block: u64,
    redeemed: Vec<SignedTicket>,
    errors: VecDeque<ChainError>,
}

/// A [`TicketBroker`] that records redeemed tickets.
#[derive(Default)]
pub struct MockBroker {
    state: Mutex<BrokerState>,
}

impl MockBroker {
    pub fn new(block: u64) -> Self {
        let broker = Self::default();
        broker.state.lock().block = block;
        broker
    }

    pub fn set_block(&self, block: u64) {
        self.state.lock().block = block;
    }

    /// Queue an error for the next redemption.
    pub fn push_error(&self, err: ChainError) {
        self.state.lock().errors.push_back(err);
    }

    pub fn redeemed(&self) -> Vec<SignedTicket> {
        self.state.lock().redeemed.clone()
    }

    pub fn redeemed_nonces(&self) -> Vec<u32> {
        self.state
            .lock()
            .redeemed
            .iter()
            .map(|t| t.ticket.sender_nonce)
            .collect()
    }
}

#[async_trait]
impl TicketBroker for MockBroker {
    async fn redeem_winning_ticket(&self, ticket: &SignedTicket) -> Result<Hash, ChainError> {
        let mut state = self.state.lock();
        if let Some(err) = state.errors.pop_front() {
            return Err(err);
        }
        state.redeemed.push(ticket.clone());
        Ok(ticket.ticket.hash())
    }

    async fn current_block(&self) -> Result<BlockNumber, ChainError> {
        Ok(BlockNumber(self.state.lock().block))
    }
}
