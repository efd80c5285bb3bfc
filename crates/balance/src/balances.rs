//! Per-key credit ledger.
//!
//! Each (counterparty, stream) key owns its own lock, so operations on
//! different keys never contend. The map itself is only touched to find or
//! insert an entry.

use crate::BalancesConfig;
use dashmap::DashMap;
use num_traits::{ToPrimitive, Zero};
use parking_lot::Mutex;
use probpay_core::SessionBalance;
use probpay_types::{Address, BigRational, ManifestId};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Identifies one ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BalanceKey {
    pub counterparty: Address,
    pub manifest_id: ManifestId,
}

impl BalanceKey {
    pub fn new(counterparty: Address, manifest_id: ManifestId) -> Self {
        Self {
            counterparty,
            manifest_id,
        }
    }
}

impl fmt::Display for BalanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.counterparty, self.manifest_id)
    }
}

#[derive(Debug)]
struct Entry {
    amount: BigRational,
    last_update: Instant,
    /// Set by `cleanup` under the entry lock; holders of a stale `Arc`
    /// must look the key up again.
    removed: bool,
}

impl Entry {
    fn new() -> Self {
        Self {
            amount: BigRational::zero(),
            last_update: Instant::now(),
            removed: false,
        }
    }

    fn is_stale(&self, ttl: Duration) -> bool {
        self.last_update.elapsed() > ttl
    }
}

/// Number of tickets of value `ev` needed to lift `existing` to
/// `min_credit`, and the credit they add.
///
/// No tickets are needed when `existing` already covers `min_credit` or
/// `ev` is not positive.
pub fn tickets_needed(
    min_credit: &BigRational,
    existing: &BigRational,
    ev: &BigRational,
) -> (usize, BigRational) {
    if existing >= min_credit || *ev <= BigRational::zero() {
        return (0, BigRational::zero());
    }
    let gap = min_credit - existing;
    let size = (gap / ev).ceil().to_integer();
    let size = size.to_usize().unwrap_or(usize::MAX);
    let new_credit = ev * BigRational::from_integer(size.into());
    (size, new_credit)
}

/// The credit ledger.
pub struct Balances {
    config: BalancesConfig,
    entries: DashMap<BalanceKey, Arc<Mutex<Entry>>>,
}

impl Default for Balances {
    fn default() -> Self {
        Self::new(BalancesConfig::default())
    }
}

impl Balances {
    pub fn new(config: BalancesConfig) -> Self {
        Self {
            config,
            entries: DashMap::new(),
        }
    }

    pub fn config(&self) -> &BalancesConfig {
        &self.config
    }

    /// Run `f` on the entry for `key`, creating it if needed.
    fn with_entry<R>(&self, key: &BalanceKey, mut f: impl FnMut(&mut Entry) -> R) -> R {
        loop {
            let entry = self
                .entries
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(Entry::new())))
                .clone();
            let mut guard = entry.lock();
            if guard.removed {
                continue;
            }
            let result = f(&mut guard);
            guard.last_update = Instant::now();
            return result;
        }
    }

    /// Add `amount` to the balance of `key`.
    pub fn credit(&self, key: &BalanceKey, amount: &BigRational) {
        self.with_entry(key, |entry| {
            entry.amount += amount;
            trace!(key = %key, amount = %amount, balance = %entry.amount, "Credited balance");
        });
    }

    /// Subtract `amount` from the balance of `key`. The balance may go
    /// negative.
    pub fn debit(&self, key: &BalanceKey, amount: &BigRational) {
        self.with_entry(key, |entry| {
            entry.amount -= amount;
            trace!(key = %key, amount = %amount, balance = %entry.amount, "Debited balance");
        });
    }

    /// Take the whole balance of `key`, leaving zero.
    pub fn reserve(&self, key: &BalanceKey) -> BigRational {
        self.with_entry(key, |entry| std::mem::replace(&mut entry.amount, BigRational::zero()))
    }

    /// Current balance, or `None` for an unknown key.
    pub fn balance(&self, key: &BalanceKey) -> Option<BigRational> {
        let entry = self.entries.get(key)?.clone();
        let guard = entry.lock();
        if guard.removed {
            return None;
        }
        Some(guard.amount.clone())
    }

    /// Reserve the existing balance and size a ticket batch covering the
    /// rest of `min_credit`. Credits arriving after the reservation land on
    /// the emptied entry.
    ///
    /// Returns `(num_tickets, new_credit, existing_credit)`.
    pub fn stage_update(
        &self,
        key: &BalanceKey,
        min_credit: &BigRational,
        ev: &BigRational,
    ) -> (usize, BigRational, BigRational) {
        let existing = self.reserve(key);
        let (num_tickets, new_credit) = tickets_needed(min_credit, &existing, ev);
        debug!(
            key = %key,
            min_credit = %min_credit,
            existing = %existing,
            num_tickets,
            new_credit = %new_credit,
            "Staged balance update"
        );
        (num_tickets, new_credit, existing)
    }

    /// Remove entries untouched for longer than `ttl`. Returns how many
    /// were removed.
    pub fn cleanup(&self, ttl: Duration) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| {
            // An entry in use is not stale.
            let Some(mut guard) = entry.try_lock() else {
                return true;
            };
            if guard.is_stale(ttl) {
                guard.removed = true;
                false
            } else {
                true
            }
        });
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!(removed, remaining = self.entries.len(), "Cleaned up stale balances");
        }
        removed
    }

    /// Remove entries older than the configured TTL.
    pub fn cleanup_stale(&self) -> usize {
        self.cleanup(self.config.entry_ttl)
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A [`SessionBalance`] view of one ledger entry.
#[derive(Clone)]
pub struct Balance {
    key: BalanceKey,
    balances: Arc<Balances>,
}

impl Balance {
    pub fn new(balances: Arc<Balances>, key: BalanceKey) -> Self {
        Self { key, balances }
    }

    pub fn key(&self) -> &BalanceKey {
        &self.key
    }

    pub fn balance(&self) -> Option<BigRational> {
        self.balances.balance(&self.key)
    }
}

impl SessionBalance for Balance {
    fn stage_update(
        &self,
        min_credit: &BigRational,
        ev: &BigRational,
    ) -> (usize, BigRational, BigRational) {
        self.balances.stage_update(&self.key, min_credit, ev)
    }

    fn credit(&self, amount: &BigRational) {
        self.balances.credit(&self.key, amount);
    }
}
