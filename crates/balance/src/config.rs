//! Configuration for the balance ledger.

use std::time::Duration;

/// Configuration for [`Balances`](crate::Balances).
#[derive(Debug, Clone)]
pub struct BalancesConfig {
    /// How long an entry may go untouched before `cleanup` removes it.
    pub entry_ttl: Duration,
}

impl Default for BalancesConfig {
    fn default() -> Self {
        Self {
            // Streams idle this long are considered finished.
            entry_ttl: Duration::from_secs(60 * 60),
        }
    }
}

impl BalancesConfig {
    /// Create a config with a custom entry TTL.
    pub fn with_entry_ttl(entry_ttl: Duration) -> Self {
        Self { entry_ttl }
    }
}
