//! Probabilistic micropayments.
//!
//! Senders pay with lottery tickets instead of per-unit transfers:
//!
//! - [`Sender`] signs ticket batches against params a recipient issued
//! - [`Recipient`] issues params, verifies batches and rejects replays
//! - [`TicketQueue`] holds winning tickets until the next block
//! - [`Redeemer`] submits released tickets to the on-chain broker

mod queue;
mod recipient;
mod redeemer;
mod sender;

pub use queue::{QueueError, TicketQueue};
pub use recipient::{Recipient, RecipientConfig};
pub use redeemer::Redeemer;
pub use sender::Sender;
