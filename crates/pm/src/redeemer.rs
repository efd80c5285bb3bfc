//! Redeems winning tickets on chain as the queue releases them.

use crate::recipient::params_expired;
use probpay_core::{ChainError, TicketBroker};
use probpay_types::{Hash, SignedTicket};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Consumes a queue's redeemable stream and submits each ticket.
///
/// Failed redemptions are logged and not retried.
pub struct Redeemer {
    broker: Arc<dyn TicketBroker>,
}

impl Redeemer {
    pub fn new(broker: Arc<dyn TicketBroker>) -> Self {
        Self { broker }
    }

    /// Redeem one ticket. Returns `None` for tickets whose params have
    /// expired.
    pub async fn redeem(&self, ticket: &SignedTicket) -> Result<Option<Hash>, ChainError> {
        let current = self.broker.current_block().await?;
        let expiration = ticket.ticket.params_expiration_block;
        if params_expired(expiration, current) {
            warn!(
                sender = %ticket.ticket.sender,
                nonce = ticket.ticket.sender_nonce,
                expiration_block = expiration.0,
                current_block = current.0,
                "Skipping expired winning ticket"
            );
            return Ok(None);
        }

        let tx_hash = self.broker.redeem_winning_ticket(ticket).await?;
        info!(
            sender = %ticket.ticket.sender,
            nonce = ticket.ticket.sender_nonce,
            face_value = %ticket.ticket.face_value,
            tx = %tx_hash,
            "Redeemed winning ticket"
        );
        Ok(Some(tx_hash))
    }

    /// Run until `redeemable` closes or `shutdown` flips to true.
    pub async fn run(
        self,
        mut redeemable: mpsc::UnboundedReceiver<SignedTicket>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Redeemer shutting down");
                        break;
                    }
                }
                ticket = redeemable.recv() => {
                    let Some(ticket) = ticket else {
                        break;
                    };
                    if let Err(e) = self.redeem(&ticket).await {
                        error!(
                            sender = %ticket.ticket.sender,
                            nonce = ticket.ticket.sender_nonce,
                            error = %e,
                            "Failed to redeem winning ticket"
                        );
                    }
                }
            }
        }
    }

    pub fn spawn(
        self,
        redeemable: mpsc::UnboundedReceiver<SignedTicket>,
        shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(self.run(redeemable, shutdown))
    }
}
