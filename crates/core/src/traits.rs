//! Capability traits for the settlement subsystem.
//!
//! Every collaborator of the payment protocol is reached through one of
//! these traits, so production components and test doubles are
//! interchangeable.

use crate::error::{ChainError, SenderError, SettlementError, TransportError};
use crate::request::{SegmentRequest, SegmentResponse};
use async_trait::async_trait;
use probpay_messages::Payment;
use probpay_types::{
    Address, BigRational, BlockNumber, ContractCall, Hash, ManifestId, PriceInfo, Rendition,
    Segment, SessionId, Signature, SignedTicket, SignedTransaction, TicketBatch, TicketParams,
    VideoProfile,
};

/// The credit ledger for one (counterparty, stream) key.
///
/// Calls for the same key are linearizable.
pub trait SessionBalance: Send + Sync {
    /// Reserve at least `min_credit` of spending capacity.
    ///
    /// Returns `(num_tickets, new_credit, existing_credit)`. The whole
    /// existing credit is reserved. When it already covers `min_credit` no
    /// tickets are needed; otherwise enough tickets of value `ev` are
    /// requested to cover the shortfall.
    fn stage_update(
        &self,
        min_credit: &BigRational,
        ev: &BigRational,
    ) -> (usize, BigRational, BigRational);

    /// Add `amount` to the balance. Negative amounts debit.
    fn credit(&self, amount: &BigRational);
}

/// Issues signed tickets against recipient-provided params.
pub trait TicketSender: Send + Sync {
    /// Begin a session for `params`, returning its id.
    fn start_session(&self, params: TicketParams) -> SessionId;

    /// Expected value of one ticket in `session`.
    fn ev(&self, session: &SessionId) -> Result<BigRational, SenderError>;

    /// Create `size` signed tickets with consecutive nonces.
    fn create_ticket_batch(
        &self,
        session: &SessionId,
        size: usize,
    ) -> Result<TicketBatch, SenderError>;
}

/// The local identity of a segment requester.
pub trait Broadcaster: Send + Sync {
    fn address(&self) -> Address;
    fn sign(&self, message: &[u8]) -> Signature;
}

/// Transcodes a segment into renditions.
#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn transcode(
        &self,
        manifest_id: &ManifestId,
        segment: &Segment,
        profiles: &[VideoProfile],
    ) -> Result<Vec<Rendition>, SettlementError>;
}

/// Persists transcoded renditions.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `data` under `path`, returning its URL.
    async fn save(&self, path: &str, data: Vec<u8>) -> Result<String, SettlementError>;
}

/// The responder side of a segment exchange.
#[async_trait]
pub trait Orchestrator: Send + Sync {
    fn address(&self) -> Address;
    fn service_uri(&self) -> String;
    fn sign(&self, message: &[u8]) -> Signature;
    fn verify_sig(&self, address: &Address, message: &[u8], sig: &Signature) -> bool;
    fn current_block(&self) -> BlockNumber;

    /// Admission check for a stream. Fails with `Capacity`.
    fn check_capacity(&self, manifest_id: &ManifestId) -> Result<(), SettlementError>;

    /// Verify a payment and credit its value to the sender's balance.
    fn process_payment(
        &self,
        payment: &Payment,
        manifest_id: &ManifestId,
    ) -> Result<(), SettlementError>;

    fn sufficient_balance(&self, sender: Option<&Address>, manifest_id: &ManifestId) -> bool;

    /// Charge `pixels` at `price`, or at the node's own price when that is
    /// higher.
    fn debit_fees(
        &self,
        sender: Option<&Address>,
        manifest_id: &ManifestId,
        price: Option<&PriceInfo>,
        pixels: i64,
    );

    /// Ticket params to hand to `sender`, or `None` when running without
    /// payments.
    fn ticket_params(&self, sender: &Address) -> Result<Option<TicketParams>, SettlementError>;

    fn price_info(&self, sender: &Address) -> Result<Option<PriceInfo>, SettlementError>;

    async fn transcode_seg(
        &self,
        manifest_id: &ManifestId,
        segment: &Segment,
        profiles: &[VideoProfile],
    ) -> Result<Vec<Rendition>, SettlementError>;

    /// Persist a rendition, returning its URL.
    async fn save_rendition(
        &self,
        manifest_id: &ManifestId,
        seq_no: u64,
        rendition: &Rendition,
    ) -> Result<String, SettlementError>;
}

/// Carries a segment exchange to an orchestrator.
#[async_trait]
pub trait SegmentTransport: Send + Sync {
    async fn send(&self, request: SegmentRequest) -> Result<SegmentResponse, TransportError>;
}

/// Low-level chain access.
#[async_trait]
pub trait ChainBackend: Send + Sync {
    async fn pending_nonce_at(&self, address: &Address) -> Result<u64, ChainError>;
    async fn send_transaction(&self, tx: &SignedTransaction) -> Result<Hash, ChainError>;
    async fn call_contract(&self, call: &ContractCall) -> Result<Vec<u8>, ChainError>;
    async fn block_number(&self) -> Result<BlockNumber, ChainError>;
}

/// On-chain ticket redemption.
#[async_trait]
pub trait TicketBroker: Send + Sync {
    /// Submit a winning ticket, returning the transaction hash.
    async fn redeem_winning_ticket(&self, ticket: &SignedTicket) -> Result<Hash, ChainError>;

    async fn current_block(&self) -> Result<BlockNumber, ChainError>;
}
