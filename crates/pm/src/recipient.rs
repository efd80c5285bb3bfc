//! Ticket params issuance and batch verification on the paid side.

use crate::queue::{QueueError, TicketQueue};
use parking_lot::Mutex;
use probpay_core::TicketError;
use probpay_types::{
    expected_value, max_win_prob, recipient_rand, recipient_rand_hash, verify_sig, Address,
    BigRational, BigUint, BlockNumber, Hash, SignedTicket, TicketBatch, TicketParams,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Economics of the tickets a recipient accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipientConfig {
    /// Payout of a winning ticket, in wei.
    pub face_value: BigUint,

    /// Win probability scaled to `2^256 - 1`.
    pub win_prob: BigUint,

    /// Blocks for which issued params stay valid.
    pub expiration_blocks: u64,
}

impl Default for RecipientConfig {
    fn default() -> Self {
        Self {
            face_value: BigUint::from(1_000_000_000_000_000u64),
            win_prob: max_win_prob() / BigUint::from(1_000u32),
            expiration_blocks: 10,
        }
    }
}

impl RecipientConfig {
    pub fn with_face_value(mut self, face_value: BigUint) -> Self {
        self.face_value = face_value;
        self
    }

    pub fn with_win_prob(mut self, win_prob: BigUint) -> Self {
        self.win_prob = win_prob;
        self
    }

    pub fn with_expiration_blocks(mut self, blocks: u64) -> Self {
        self.expiration_blocks = blocks;
        self
    }
}

/// Params are unusable from their expiration block onwards.
pub(crate) fn params_expired(expiration_block: BlockNumber, current: BlockNumber) -> bool {
    expiration_block <= current
}

struct SeenNonces {
    expiration_block: BlockNumber,
    nonces: HashSet<u32>,
}

/// Issues ticket params and accepts ticket batches paid against them.
pub struct Recipient {
    address: Address,
    secret: [u8; 32],
    config: RecipientConfig,
    queue: Arc<TicketQueue>,
    seen: Mutex<HashMap<(Address, Hash), SeenNonces>>,
}

impl Recipient {
    pub fn new(
        address: Address,
        secret: [u8; 32],
        config: RecipientConfig,
        queue: Arc<TicketQueue>,
    ) -> Self {
        Self {
            address,
            secret,
            config,
            queue,
            seen: Mutex::new(HashMap::new()),
        }
    }

    /// A recipient with a freshly generated secret.
    pub fn with_random_secret(
        address: Address,
        config: RecipientConfig,
        queue: Arc<TicketQueue>,
    ) -> Self {
        Self::new(address, rand::random(), config, queue)
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn config(&self) -> &RecipientConfig {
        &self.config
    }

    pub fn queue(&self) -> &Arc<TicketQueue> {
        &self.queue
    }

    /// Issue params for `sender`, valid for the configured number of blocks
    /// after `current_block`.
    pub fn ticket_params(&self, sender: &Address, current_block: BlockNumber) -> TicketParams {
        let seed = BigUint::from_bytes_be(&rand::random::<[u8; 32]>());
        let rand = recipient_rand(&self.secret, &seed);
        let params = TicketParams {
            recipient: self.address,
            face_value: self.config.face_value.clone(),
            win_prob: self.config.win_prob.clone(),
            recipient_rand_hash: recipient_rand_hash(&rand),
            seed,
            expiration_block: current_block.saturating_add(self.config.expiration_blocks),
        };
        debug!(
            sender = %sender,
            rand_hash = %params.recipient_rand_hash,
            expiration_block = params.expiration_block.0,
            "Issued ticket params"
        );
        params
    }

    /// Verify `batch` and accept its tickets.
    ///
    /// Either every ticket is accepted or none is. Accepted winners are
    /// queued for redemption. Returns the batch's total expected value.
    pub fn receive_batch(
        &self,
        batch: &TicketBatch,
        current_block: BlockNumber,
    ) -> Result<BigRational, TicketError> {
        let params = &batch.params;

        if params.recipient != self.address {
            return Err(TicketError::InvalidRecipient);
        }
        if params.face_value != self.config.face_value {
            return Err(TicketError::FaceValueMismatch);
        }
        if params.win_prob != self.config.win_prob {
            return Err(TicketError::WinProbMismatch);
        }
        let rand = recipient_rand(&self.secret, &params.seed);
        if recipient_rand_hash(&rand) != params.recipient_rand_hash {
            return Err(TicketError::InvalidRecipientRand);
        }
        if params_expired(params.expiration_block, current_block) {
            return Err(TicketError::Expired(params.expiration_block.0));
        }

        let tickets = batch.tickets();
        for (ticket, sender_params) in tickets.iter().zip(&batch.sender_params) {
            if !verify_sig(&batch.sender, ticket.hash().as_bytes(), &sender_params.sig) {
                return Err(TicketError::InvalidSignature);
            }
        }

        self.record_nonces(batch)?;

        let mut winners = 0usize;
        for (ticket, sender_params) in tickets.into_iter().zip(&batch.sender_params) {
            let signed = SignedTicket {
                ticket,
                sig: sender_params.sig.clone(),
                recipient_rand: rand.clone(),
            };
            if !signed.is_winning() {
                continue;
            }
            winners += 1;
            if let Err(QueueError::Stopped(ticket)) = self.queue.add(signed) {
                warn!(
                    sender = %batch.sender,
                    nonce = ticket.ticket.sender_nonce,
                    "Ticket queue stopped, dropping winning ticket"
                );
            }
        }

        let ev = batch.total_ev();
        info!(
            sender = %batch.sender,
            tickets = batch.len(),
            winners,
            ev = %ev,
            "Received ticket batch"
        );
        Ok(ev)
    }

    /// Reject nonces repeated within the batch or seen before for the same
    /// params, then record them. Nothing is recorded on rejection.
    fn record_nonces(&self, batch: &TicketBatch) -> Result<(), TicketError> {
        let key = (batch.sender, batch.params.recipient_rand_hash);
        let mut seen = self.seen.lock();

        let previous = seen.get(&key).map(|s| &s.nonces);
        let mut fresh = HashSet::with_capacity(batch.len());
        for p in &batch.sender_params {
            let replayed = previous.is_some_and(|n| n.contains(&p.sender_nonce));
            if replayed || !fresh.insert(p.sender_nonce) {
                return Err(TicketError::ReplayedNonce(p.sender_nonce));
            }
        }

        if fresh.is_empty() {
            return Ok(());
        }
        seen.entry(key)
            .or_insert_with(|| SeenNonces {
                expiration_block: batch.params.expiration_block,
                nonces: HashSet::new(),
            })
            .nonces
            .extend(fresh);
        Ok(())
    }

    /// Forget nonces of params that have expired by `current_block`. Their
    /// tickets are rejected as expired anyway.
    pub fn prune_seen(&self, current_block: BlockNumber) -> usize {
        let mut seen = self.seen.lock();
        let before = seen.len();
        seen.retain(|_, s| !params_expired(s.expiration_block, current_block));
        let removed = before - seen.len();
        if removed > 0 {
            debug!(removed, remaining = seen.len(), "Pruned expired ticket nonces");
        }
        removed
    }

    /// Expected value of one ticket under the current configuration.
    pub fn ev(&self) -> BigRational {
        expected_value(&self.config.face_value, &self.config.win_prob)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Sender;
    use probpay_core::TicketSender;
    use probpay_test_helpers::keypair;
    use num_traits::Zero;
    use probpay_types::{Signature, TicketSenderParams};
    use std::time::Duration;
    use tokio::time::timeout;
    use tracing_test::traced_test;

    const SECRET: [u8; 32] = [5u8; 32];

    fn always_wins() -> RecipientConfig {
        RecipientConfig::default()
            .with_face_value(BigUint::from(1_000u32))
            .with_win_prob(max_win_prob())
    }

    fn setup(config: RecipientConfig) -> (Recipient, Sender) {
        let queue = Arc::new(TicketQueue::start_without_blocks());
        let recipient = Recipient::new(keypair(2).address(), SECRET, config, queue);
        (recipient, Sender::new(keypair(1)))
    }

    fn batch(recipient: &Recipient, sender: &Sender, size: usize) -> TicketBatch {
        let params = recipient.ticket_params(&sender.key().address(), BlockNumber(100));
        let session = sender.start_session(params);
        sender.create_ticket_batch(&session, size).unwrap()
    }

    #[tokio::test]
    async fn test_ticket_params_commit_to_secret() {
        let (recipient, sender) = setup(RecipientConfig::default());
        let params = recipient.ticket_params(&sender.key().address(), BlockNumber(100));

        assert_eq!(params.recipient, recipient.address());
        assert_eq!(params.expiration_block, BlockNumber(110));
        assert_eq!(
            params.recipient_rand_hash,
            recipient_rand_hash(&recipient_rand(&SECRET, &params.seed))
        );

        // Seeds are fresh per issuance.
        let other = recipient.ticket_params(&sender.key().address(), BlockNumber(100));
        assert_ne!(params.seed, other.seed);
    }

    #[traced_test]
    #[tokio::test]
    async fn test_receive_batch_queues_winners() {
        let (recipient, sender) = setup(always_wins());
        let mut redeemable = recipient.queue().redeemable().unwrap();
        let b = batch(&recipient, &sender, 3);

        let ev = recipient.receive_batch(&b, BlockNumber(101)).unwrap();

        assert_eq!(ev, b.total_ev());
        assert_eq!(recipient.queue().len(), 3);

        recipient.queue().trigger(BlockNumber(102));
        for expected in 0..3 {
            let t = timeout(Duration::from_secs(5), redeemable.recv())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(t.ticket.sender_nonce, expected);
            assert!(t.is_winning());
        }
    }

    #[traced_test]
    #[tokio::test]
    async fn test_losing_tickets_are_not_queued() {
        let config = RecipientConfig::default().with_win_prob(BigUint::zero());
        let (recipient, sender) = setup(config);
        let b = batch(&recipient, &sender, 3);

        let ev = recipient.receive_batch(&b, BlockNumber(101)).unwrap();

        assert_eq!(ev, BigRational::zero());
        assert_eq!(recipient.queue().len(), 0);
    }

    #[tokio::test]
    async fn test_wrong_recipient() {
        let (recipient, sender) = setup(always_wins());
        let mut b = batch(&recipient, &sender, 1);
        b.params.recipient = Address([9u8; 20]);

        assert_eq!(
            recipient.receive_batch(&b, BlockNumber(101)),
            Err(TicketError::InvalidRecipient)
        );
    }

    #[tokio::test]
    async fn test_face_value_and_win_prob_must_match() {
        let (recipient, sender) = setup(always_wins());

        let mut b = batch(&recipient, &sender, 1);
        b.params.face_value += 1u32;
        assert_eq!(
            recipient.receive_batch(&b, BlockNumber(101)),
            Err(TicketError::FaceValueMismatch)
        );

        let mut b = batch(&recipient, &sender, 1);
        b.params.win_prob = BigUint::from(1u32);
        assert_eq!(
            recipient.receive_batch(&b, BlockNumber(101)),
            Err(TicketError::WinProbMismatch)
        );
    }

    #[tokio::test]
    async fn test_foreign_seed_rejected() {
        let (recipient, sender) = setup(always_wins());
        let mut b = batch(&recipient, &sender, 1);
        b.params.seed += 1u32;

        assert_eq!(
            recipient.receive_batch(&b, BlockNumber(101)),
            Err(TicketError::InvalidRecipientRand)
        );
    }

    #[tokio::test]
    async fn test_expired_params() {
        let (recipient, sender) = setup(always_wins());
        let b = batch(&recipient, &sender, 1);

        assert_eq!(
            recipient.receive_batch(&b, BlockNumber(110)),
            Err(TicketError::Expired(110))
        );
        assert_eq!(recipient.queue().len(), 0);
    }

    #[tokio::test]
    async fn test_bad_signature_rejects_whole_batch() {
        let (recipient, sender) = setup(always_wins());
        let mut b = batch(&recipient, &sender, 3);
        b.sender_params[2].sig = Signature::zero();

        assert_eq!(
            recipient.receive_batch(&b, BlockNumber(101)),
            Err(TicketError::InvalidSignature)
        );
        assert_eq!(recipient.queue().len(), 0);

        // Nonces of the rejected batch were not recorded.
        b.sender_params.truncate(2);
        assert!(recipient.receive_batch(&b, BlockNumber(101)).is_ok());
    }

    #[tokio::test]
    async fn test_signature_from_other_key() {
        let (recipient, sender) = setup(always_wins());
        let mut b = batch(&recipient, &sender, 1);
        b.sender = keypair(3).address();

        assert_eq!(
            recipient.receive_batch(&b, BlockNumber(101)),
            Err(TicketError::InvalidSignature)
        );
    }

    #[traced_test]
    #[tokio::test]
    async fn test_replayed_batch_rejected() {
        let (recipient, sender) = setup(always_wins());
        let b = batch(&recipient, &sender, 2);

        recipient.receive_batch(&b, BlockNumber(101)).unwrap();
        assert_eq!(
            recipient.receive_batch(&b, BlockNumber(101)),
            Err(TicketError::ReplayedNonce(0))
        );
        assert_eq!(recipient.queue().len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_nonce_within_batch() {
        let (recipient, sender) = setup(always_wins());
        let mut b = batch(&recipient, &sender, 1);
        let dup: TicketSenderParams = b.sender_params[0].clone();
        b.sender_params.push(dup);

        assert_eq!(
            recipient.receive_batch(&b, BlockNumber(101)),
            Err(TicketError::ReplayedNonce(0))
        );
        assert_eq!(recipient.queue().len(), 0);
    }

    #[tokio::test]
    async fn test_same_nonce_other_params_accepted() {
        let (recipient, sender) = setup(always_wins());

        recipient
            .receive_batch(&batch(&recipient, &sender, 1), BlockNumber(101))
            .unwrap();
        // A new session restarts nonces at zero under fresh params.
        recipient
            .receive_batch(&batch(&recipient, &sender, 1), BlockNumber(101))
            .unwrap();
    }

    #[tokio::test]
    async fn test_prune_seen() {
        let (recipient, sender) = setup(always_wins());
        recipient
            .receive_batch(&batch(&recipient, &sender, 1), BlockNumber(101))
            .unwrap();

        assert_eq!(recipient.prune_seen(BlockNumber(105)), 0);
        assert_eq!(recipient.prune_seen(BlockNumber(110)), 1);
    }

    #[traced_test]
    #[tokio::test]
    async fn test_stopped_queue_drops_winners() {
        let (recipient, sender) = setup(always_wins());
        recipient.queue().stop();

        let b = batch(&recipient, &sender, 1);
        assert!(recipient.receive_batch(&b, BlockNumber(101)).is_ok());
        assert!(logs_contain("dropping winning ticket"));
    }
}
