//! Payment header generation and parsing.

use crate::session::BroadcastSession;
use probpay_core::{PriceError, SettlementError};
use probpay_messages::Payment;
use probpay_pricing::validate_price;
use probpay_types::Address;
use tracing::debug;

/// Build the payment header for an exchange needing `num_tickets` tickets.
///
/// Sessions without a sender pay nothing and get an empty header. Otherwise
/// the orchestrator's price is checked against the configured maximum
/// before any ticket is signed. Zero tickets still produce a header that
/// carries the sender and expected price.
pub fn gen_payment(
    session: &BroadcastSession,
    num_tickets: usize,
) -> Result<String, SettlementError> {
    let Some(sender) = &session.sender else {
        return Ok(String::new());
    };

    let price = session.orchestrator_info.price_info.as_ref();
    validate_price(price, session.config.max_price().as_ref())?;
    let price = *price.ok_or(PriceError::Missing)?;

    let broadcaster = session.broadcaster.address();
    let payment = if num_tickets == 0 {
        Payment::without_tickets(broadcaster, price)
    } else {
        let batch = sender.create_ticket_batch(&session.pm_session_id, num_tickets)?;
        let mut payment = Payment::from_batch(&batch, price);
        payment.sender = broadcaster.as_bytes().to_vec();
        payment
    };

    debug!(
        manifest_id = %session.manifest_id,
        session = %session.pm_session_id,
        num_tickets,
        "Generated payment"
    );
    Ok(payment.to_header()?)
}

/// Parse a payment header. An empty header is an empty payment.
pub fn get_payment(header: &str) -> Result<Payment, SettlementError> {
    if header.is_empty() {
        return Ok(Payment::default());
    }
    Ok(Payment::from_header(header)?)
}

/// The sender a payment claims to come from. Empty or malformed senders
/// yield `None`.
pub fn get_payment_sender(payment: &Payment) -> Option<Address> {
    payment.sender_address().ok().flatten()
}
