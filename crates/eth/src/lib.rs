//! Chain access for ticket redemption.
//!
//! [`Backend`] wraps a [`ChainBackend`](probpay_core::ChainBackend) with
//! per-address nonce serialization for submissions and bounded retries for
//! reads. [`TicketBrokerClient`] builds redemption calls on top of it.

pub mod abi;
mod backend;
mod broker;
mod nonce;
pub mod units;

pub use backend::{Backend, BackendConfig};
pub use broker::TicketBrokerClient;
pub use nonce::{NonceGuard, NonceManager};
