//! Orchestrator node for probabilistic settlement.
//!
//! [`OrchestratorNode`] implements the responder side of the segment
//! exchange on top of the `probpay-pm` recipient and the `probpay-balance`
//! ledger:
//!
//! - issues ticket params and its price to broadcasters
//! - verifies ticket batches and credits their expected value
//! - admits at most `max_sessions` streams at once
//! - debits transcoded pixels at the price the broadcaster expected
//! - releases winning tickets for redemption on every new block

mod config;
mod orchestrator;

pub use config::OrchestratorConfig;
pub use orchestrator::OrchestratorNode;
