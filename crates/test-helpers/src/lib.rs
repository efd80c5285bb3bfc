//! Test helpers for the settlement workspace.
//!
//! Provides properly-signed fixtures and test doubles for every capability
//! trait in `probpay-core`. Doubles record the calls made on them so tests
//! can assert on exactly which ledger and chain effects happened.

mod balance;
mod chain;
pub mod fixtures;
mod orchestrator;
mod sender;
mod storage;

pub use balance::MockBalance;
pub use chain::{MockBroker, MockChain};
pub use fixtures::{keypair, rat, ratio, test_segment, test_ticket_params};
pub use orchestrator::{Debit, StubBroadcaster, StubOrchestrator};
pub use sender::MockSender;
pub use storage::{MemoryObjectStore, StubTranscoder};
