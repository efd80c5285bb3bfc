//! Redemption queue for winning tickets.
//!
//! Winning tickets are buffered until a new block arrives, then emitted
//! oldest first on the redeemable stream. A single task owns the buffer;
//! additions and block triggers reach it as messages on one inbox and are
//! handled strictly in arrival order, so emission order always equals
//! insertion order.
//!
//! Block numbers from a broadcast channel are forwarded into the same inbox
//! by a second task.

use parking_lot::Mutex;
use probpay_types::{BlockNumber, SignedTicket};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info, warn};

/// Errors returned by [`TicketQueue::add`].
#[derive(Debug, Error)]
pub enum QueueError {
    /// The queue was stopped; the ticket is handed back.
    #[error("ticket queue is stopped")]
    Stopped(Box<SignedTicket>),
}

enum QueueMessage {
    Add(SignedTicket),
    Trigger(BlockNumber),
}

/// Buffers winning tickets until the next block.
pub struct TicketQueue {
    inbox: mpsc::UnboundedSender<QueueMessage>,
    len: Arc<AtomicUsize>,
    stopped: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
    redeemable: Mutex<Option<mpsc::UnboundedReceiver<SignedTicket>>>,
}

impl TicketQueue {
    /// Start the queue, draining on every block received from `blocks`.
    ///
    /// Must be called within a tokio runtime.
    pub fn start(blocks: broadcast::Receiver<BlockNumber>) -> Self {
        let queue = Self::start_without_blocks();
        spawn_block_forwarder(blocks, queue.inbox.clone(), queue.shutdown_tx.subscribe());
        queue
    }

    /// Start the queue with no block source; drains happen only via
    /// [`TicketQueue::trigger`].
    pub fn start_without_blocks() -> Self {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let (redeemable_tx, redeemable_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let len = Arc::new(AtomicUsize::new(0));

        tokio::spawn(run_queue(inbox_rx, redeemable_tx, len.clone(), shutdown_rx));

        Self {
            inbox: inbox_tx,
            len,
            stopped: AtomicBool::new(false),
            shutdown_tx,
            redeemable: Mutex::new(Some(redeemable_rx)),
        }
    }

    /// Enqueue a ticket. Never blocks.
    pub fn add(&self, ticket: SignedTicket) -> Result<(), QueueError> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(QueueError::Stopped(Box::new(ticket)));
        }
        self.len.fetch_add(1, Ordering::AcqRel);
        if let Err(mpsc::error::SendError(msg)) = self.inbox.send(QueueMessage::Add(ticket)) {
            self.len.fetch_sub(1, Ordering::AcqRel);
            let QueueMessage::Add(ticket) = msg else {
                unreachable!("only Add messages are sent here");
            };
            return Err(QueueError::Stopped(Box::new(ticket)));
        }
        Ok(())
    }

    /// Drain everything queued so far, as if `block` had just arrived.
    pub fn trigger(&self, block: BlockNumber) {
        if self.inbox.send(QueueMessage::Trigger(block)).is_err() {
            debug!(block = block.0, "Ignoring trigger on stopped ticket queue");
        }
    }

    /// Number of tickets waiting for redemption.
    ///
    /// Settles at zero once a stopped queue's task has exited, including
    /// tickets whose `add` raced with [`TicketQueue::stop`].
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take the stream of tickets ready for redemption. Returns `None` after
    /// the first call.
    pub fn redeemable(&self) -> Option<mpsc::UnboundedReceiver<SignedTicket>> {
        self.redeemable.lock().take()
    }

    /// Stop the queue. Later additions are rejected and tickets still
    /// queued are dropped without being emitted.
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Err(e) = self.shutdown_tx.send(true) {
            warn!("Failed to signal ticket queue shutdown: {e}");
        }
        info!(pending = self.len(), "Ticket queue stopped");
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

impl Drop for TicketQueue {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_queue(
    mut inbox: mpsc::UnboundedReceiver<QueueMessage>,
    redeemable: mpsc::UnboundedSender<SignedTicket>,
    len: Arc<AtomicUsize>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut queue: VecDeque<SignedTicket> = VecDeque::new();

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
            msg = inbox.recv() => match msg {
                Some(QueueMessage::Add(ticket)) => {
                    debug!(
                        sender = %ticket.ticket.sender,
                        nonce = ticket.ticket.sender_nonce,
                        queued = queue.len() + 1,
                        "Queued winning ticket"
                    );
                    queue.push_back(ticket);
                }
                Some(QueueMessage::Trigger(block)) => {
                    if queue.is_empty() {
                        continue;
                    }
                    info!(block = block.0, tickets = queue.len(), "Draining ticket queue");
                    while let Some(ticket) = queue.pop_front() {
                        // Decrement first so the count is settled by the
                        // time a consumer sees the last ticket.
                        len.fetch_sub(1, Ordering::AcqRel);
                        if redeemable.send(ticket).is_err() {
                            warn!("Redeemable stream closed, dropping ticket");
                        }
                    }
                }
                None => break,
            }
        }
    }

    // Sends that slipped in before the close are abandoned with the rest;
    // later ones fail and undo their own increment.
    inbox.close();
    while let Ok(msg) = inbox.try_recv() {
        if let QueueMessage::Add(ticket) = msg {
            queue.push_back(ticket);
        }
    }
    len.fetch_sub(queue.len(), Ordering::AcqRel);

    debug!(abandoned = queue.len(), "Ticket queue loop exited");
}

fn spawn_block_forwarder(
    mut blocks: broadcast::Receiver<BlockNumber>,
    inbox: mpsc::UnboundedSender<QueueMessage>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
                block = blocks.recv() => match block {
                    Ok(block) => {
                        if inbox.send(QueueMessage::Trigger(block)).is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Block subscription lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    });
}
