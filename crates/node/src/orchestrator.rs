//! The responder side of segment exchanges.

use crate::config::OrchestratorConfig;
use async_trait::async_trait;
use parking_lot::Mutex;
use probpay_balance::{BalanceKey, Balances};
use probpay_core::{
    ObjectStore, Orchestrator, PriceError, SettlementError, TicketBroker, TicketError,
    Transcoder,
};
use probpay_messages::Payment;
use probpay_pm::{Recipient, Redeemer};
use probpay_pricing::rat_price_info;
use probpay_types::{
    verify_sig, Address, BigInt, BigRational, BlockNumber, KeyPair, ManifestId, PriceInfo,
    Rendition, Segment, Signature, TicketParams, VideoProfile,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

struct Payments {
    recipient: Arc<Recipient>,
    balances: Arc<Balances>,
}

/// An orchestrator that takes payment in probabilistic tickets.
///
/// Without a recipient the node runs off-chain: it advertises no ticket
/// params or price, accepts any signature and never checks balances.
pub struct OrchestratorNode {
    key: KeyPair,
    config: OrchestratorConfig,
    transcoder: Arc<dyn Transcoder>,
    store: Arc<dyn ObjectStore>,
    payments: Option<Payments>,
    block: AtomicU64,
    sessions: Mutex<HashSet<ManifestId>>,
}

impl OrchestratorNode {
    pub fn new(
        key: KeyPair,
        config: OrchestratorConfig,
        transcoder: Arc<dyn Transcoder>,
        store: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            key,
            config,
            transcoder,
            store,
            payments: None,
            block: AtomicU64::new(0),
            sessions: Mutex::new(HashSet::new()),
        }
    }

    /// Take payment through `recipient`, crediting senders in `balances`.
    pub fn with_recipient(mut self, recipient: Arc<Recipient>, balances: Arc<Balances>) -> Self {
        self.payments = Some(Payments {
            recipient,
            balances,
        });
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn is_offchain(&self) -> bool {
        self.payments.is_none()
    }

    /// Credit held by `sender` for `manifest_id`.
    pub fn balance(&self, sender: &Address, manifest_id: &ManifestId) -> Option<BigRational> {
        let payments = self.payments.as_ref()?;
        payments
            .balances
            .balance(&BalanceKey::new(*sender, manifest_id.clone()))
    }

    /// Advance to `block`: expired replay state is pruned and queued
    /// winners are released for redemption.
    pub fn new_block(&self, block: BlockNumber) {
        self.block.fetch_max(block.0, Ordering::SeqCst);
        let Some(payments) = &self.payments else {
            return;
        };
        let pruned = payments.recipient.prune_seen(block);
        payments.recipient.queue().trigger(block);
        debug!(block = block.0, pruned, "Processed new block");
    }

    /// Redeem released winners through `broker` until `shutdown` is set.
    ///
    /// Returns `None` when the node is off-chain or a redeemer already
    /// holds the queue.
    pub fn spawn_redeemer(
        &self,
        broker: Arc<dyn TicketBroker>,
        shutdown: watch::Receiver<bool>,
    ) -> Option<JoinHandle<()>> {
        let redeemable = self.payments.as_ref()?.recipient.queue().redeemable()?;
        Some(Redeemer::new(broker).spawn(redeemable, shutdown))
    }

    /// Release the capacity slot held by `manifest_id`.
    pub fn end_session(&self, manifest_id: &ManifestId) -> bool {
        self.sessions.lock().remove(manifest_id)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Drop balances idle longer than the ledger's TTL. Returns how many
    /// were removed.
    pub fn cleanup_balances(&self) -> usize {
        self.payments
            .as_ref()
            .map(|p| p.balances.cleanup_stale())
            .unwrap_or(0)
    }
}

#[async_trait]
impl Orchestrator for OrchestratorNode {
    fn address(&self) -> Address {
        self.key.address()
    }

    fn service_uri(&self) -> String {
        self.config.service_uri.clone()
    }

    fn sign(&self, message: &[u8]) -> Signature {
        self.key.sign(message)
    }

    fn verify_sig(&self, address: &Address, message: &[u8], sig: &Signature) -> bool {
        if self.is_offchain() {
            return true;
        }
        verify_sig(address, message, sig)
    }

    fn current_block(&self) -> BlockNumber {
        BlockNumber(self.block.load(Ordering::SeqCst))
    }

    fn check_capacity(&self, manifest_id: &ManifestId) -> Result<(), SettlementError> {
        let mut sessions = self.sessions.lock();
        if sessions.contains(manifest_id) {
            return Ok(());
        }
        if sessions.len() >= self.config.max_sessions {
            warn!(
                manifest_id = %manifest_id,
                max_sessions = self.config.max_sessions,
                "Rejecting stream at capacity"
            );
            return Err(SettlementError::Capacity("At capacity".into()));
        }
        sessions.insert(manifest_id.clone());
        Ok(())
    }

    fn process_payment(
        &self,
        payment: &Payment,
        manifest_id: &ManifestId,
    ) -> Result<(), SettlementError> {
        let Some(payments) = &self.payments else {
            return Ok(());
        };
        let sender = payment.sender_address()?;
        if payment.ticket_params.is_none() && sender.is_none() {
            return Ok(());
        }

        // Ticketless payments spend existing credit, so their price is
        // checked the same way.
        let sender = sender.ok_or(TicketError::MissingSender)?;
        let expected = payment
            .expected_price
            .ok_or(TicketError::MissingExpectedPrice)?;
        let expected_rat =
            rat_price_info(Some(&expected))?.ok_or(TicketError::MissingExpectedPrice)?;
        let own = self.config.price();
        let own_rat = rat_price_info(Some(&own))?.ok_or(PriceError::Missing)?;
        if expected_rat < own_rat {
            return Err(TicketError::ExpectedPriceTooLow {
                expected,
                actual: own,
            }
            .into());
        }

        let Some(batch) = payment.ticket_batch()? else {
            return Ok(());
        };
        let ev = payments
            .recipient
            .receive_batch(&batch, self.current_block())?;
        payments
            .balances
            .credit(&BalanceKey::new(sender, manifest_id.clone()), &ev);

        info!(
            sender = %sender,
            manifest_id = %manifest_id,
            tickets = batch.len(),
            ev = %ev,
            "Received payment"
        );
        Ok(())
    }

    fn sufficient_balance(&self, sender: Option<&Address>, manifest_id: &ManifestId) -> bool {
        let Some(payments) = &self.payments else {
            return true;
        };
        let Some(sender) = sender else {
            return false;
        };
        match payments
            .balances
            .balance(&BalanceKey::new(*sender, manifest_id.clone()))
        {
            Some(balance) => balance >= payments.recipient.ev(),
            None => false,
        }
    }

    fn debit_fees(
        &self,
        sender: Option<&Address>,
        manifest_id: &ManifestId,
        price: Option<&PriceInfo>,
        pixels: i64,
    ) {
        let (Some(payments), Some(sender)) = (&self.payments, sender) else {
            return;
        };
        // Never below our own price, whatever the sender expected.
        let own = self.config.price().per_pixel();
        let expected = price.and_then(PriceInfo::per_pixel);
        let Some(per_pixel) = own.into_iter().chain(expected).max() else {
            warn!(sender = %sender, manifest_id = %manifest_id, "No usable price to debit fees");
            return;
        };
        let fee = per_pixel * BigRational::from_integer(BigInt::from(pixels.max(0)));
        debug!(sender = %sender, manifest_id = %manifest_id, pixels, fee = %fee, "Debiting fees");
        payments
            .balances
            .debit(&BalanceKey::new(*sender, manifest_id.clone()), &fee);
    }

    fn ticket_params(&self, sender: &Address) -> Result<Option<TicketParams>, SettlementError> {
        Ok(self
            .payments
            .as_ref()
            .map(|p| p.recipient.ticket_params(sender, self.current_block())))
    }

    fn price_info(&self, _sender: &Address) -> Result<Option<PriceInfo>, SettlementError> {
        if self.is_offchain() {
            return Ok(None);
        }
        if self.config.pixels_per_unit <= 0 {
            return Err(PriceError::ZeroPixelsPerUnit.into());
        }
        Ok(Some(self.config.price()))
    }

    async fn transcode_seg(
        &self,
        manifest_id: &ManifestId,
        segment: &Segment,
        profiles: &[VideoProfile],
    ) -> Result<Vec<Rendition>, SettlementError> {
        self.transcoder
            .transcode(manifest_id, segment, profiles)
            .await
    }

    async fn save_rendition(
        &self,
        manifest_id: &ManifestId,
        seq_no: u64,
        rendition: &Rendition,
    ) -> Result<String, SettlementError> {
        let path = format!("{}/{}/{}.ts", manifest_id, rendition.profile.name, seq_no);
        self.store.save(&path, rendition.data.clone()).await
    }
}
