//! Session credit ledger and balance reconciliation.
//!
//! [`Balances`] holds credit per (counterparty, stream) key with one lock
//! per key. [`BalanceUpdate`] tracks a single exchange from staging to
//! settlement; [`new_balance_update`] and [`complete_balance_update`] are
//! the only places credit is reserved or returned.

mod balances;
mod config;
mod update;

pub use balances::{tickets_needed, Balance, BalanceKey, Balances};
pub use config::BalancesConfig;
pub use update::{complete_balance_update, new_balance_update, BalanceStatus, BalanceUpdate};
