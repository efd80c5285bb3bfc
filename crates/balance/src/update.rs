//! Balance reconciliation around one request/response exchange.
//!
//! A [`BalanceUpdate`] is staged before the request is sent, advanced as
//! the exchange makes progress, and completed exactly once afterwards:
//!
//! ```text
//! Staged ──► CreditSpent ──► ReceivedChange
//!   │
//!   └──► (refund on completion)
//! ```
//!
//! | Status at completion | Ledger effect |
//! |----------------------|---------------|
//! | `Staged` | credit `existing + new` (full refund) |
//! | `CreditSpent` | none |
//! | `ReceivedChange` | credit `existing + new - debit`, possibly negative |

use num_traits::Zero;
use probpay_core::{SenderError, SessionBalance, TicketSender};
use probpay_types::{BigRational, SessionId};
use std::fmt;
use tracing::{debug, warn};

/// Progress of an exchange, as far as payment is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BalanceStatus {
    /// Credit reserved; the request has not left this node.
    Staged,
    /// Payment bytes left this node; the counterparty may have used them.
    CreditSpent,
    /// A full response arrived and the exact debit is known.
    ReceivedChange,
}

impl fmt::Display for BalanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BalanceStatus::Staged => "Staged",
            BalanceStatus::CreditSpent => "CreditSpent",
            BalanceStatus::ReceivedChange => "ReceivedChange",
        };
        f.write_str(s)
    }
}

/// One reconciliation cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceUpdate {
    pub existing_credit: BigRational,
    pub new_credit: BigRational,
    pub num_tickets: usize,
    pub debit: BigRational,
    status: BalanceStatus,
}

impl Default for BalanceUpdate {
    fn default() -> Self {
        Self {
            existing_credit: BigRational::zero(),
            new_credit: BigRational::zero(),
            num_tickets: 0,
            debit: BigRational::zero(),
            status: BalanceStatus::Staged,
        }
    }
}

impl BalanceUpdate {
    pub fn status(&self) -> BalanceStatus {
        self.status
    }

    /// Record that the payment has been transmitted.
    pub fn mark_credit_spent(&mut self) {
        self.advance(BalanceStatus::CreditSpent);
    }

    /// Record the exact amount the counterparty billed.
    pub fn mark_received_change(&mut self, debit: BigRational) {
        if self.status == BalanceStatus::ReceivedChange {
            warn!(debit = %self.debit, "Balance update already received change");
            return;
        }
        if self.advance(BalanceStatus::ReceivedChange) {
            self.debit = debit;
        }
    }

    /// Move forward to `next`. Regressions are ignored.
    fn advance(&mut self, next: BalanceStatus) -> bool {
        if next < self.status {
            warn!(from = %self.status, to = %next, "Ignoring balance status regression");
            return false;
        }
        self.status = next;
        true
    }

    /// Amount `complete_balance_update` credits back, if any.
    pub fn settlement(&self) -> Option<BigRational> {
        match self.status {
            BalanceStatus::Staged => Some(&self.existing_credit + &self.new_credit),
            BalanceStatus::CreditSpent => None,
            BalanceStatus::ReceivedChange => {
                Some(&self.existing_credit + &self.new_credit - &self.debit)
            }
        }
    }
}

/// Stage an update for an exchange requiring at least `min_credit`.
///
/// Without a sender, a balance or a minimum credit the exchange is free:
/// the update is zero-valued and requests no tickets. A minimum below one
/// ticket's expected value is raised to it.
pub fn new_balance_update(
    sender: Option<&dyn TicketSender>,
    session: &SessionId,
    balance: Option<&dyn SessionBalance>,
    min_credit: Option<&BigRational>,
) -> Result<BalanceUpdate, SenderError> {
    let mut update = BalanceUpdate::default();
    let (Some(sender), Some(balance), Some(min_credit)) = (sender, balance, min_credit) else {
        return Ok(update);
    };

    let ev = sender.ev(session)?;
    let min_credit = if *min_credit < ev { &ev } else { min_credit };

    let (num_tickets, new_credit, existing_credit) = balance.stage_update(min_credit, &ev);
    update.num_tickets = num_tickets;
    update.new_credit = new_credit;
    update.existing_credit = existing_credit;
    Ok(update)
}

/// Apply the outcome of an exchange to the ledger.
pub fn complete_balance_update(balance: Option<&dyn SessionBalance>, update: &BalanceUpdate) {
    let Some(balance) = balance else {
        return;
    };
    match update.settlement() {
        Some(amount) => {
            debug!(status = %update.status, amount = %amount, "Completing balance update");
            balance.credit(&amount);
        }
        None => debug!(status = %update.status, "Balance update consumed credit"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use probpay_test_helpers::{keypair, rat, MockBalance, MockSender};
    use tracing_test::traced_test;

    fn session() -> SessionId {
        SessionId("session".into())
    }

    fn stage(
        sender: &MockSender,
        balance: &MockBalance,
        min_credit: i64,
    ) -> Result<BalanceUpdate, SenderError> {
        new_balance_update(Some(sender), &session(), Some(balance), Some(&rat(min_credit)))
    }

    fn update(existing: i64, new: i64) -> BalanceUpdate {
        BalanceUpdate {
            existing_credit: rat(existing),
            new_credit: rat(new),
            num_tickets: 1,
            ..Default::default()
        }
    }

    #[traced_test]
    #[test]
    fn test_new_balance_update_without_collaborators() {
        let sender = MockSender::new(keypair(1), rat(5));
        let balance = MockBalance::new();

        for (s, b, m) in [
            (None, Some(&balance as &dyn SessionBalance), Some(rat(1))),
            (Some(&sender as &dyn TicketSender), None, Some(rat(1))),
            (Some(&sender as &dyn TicketSender), Some(&balance as &dyn SessionBalance), None),
        ] {
            let update = new_balance_update(s, &session(), b, m.as_ref()).unwrap();
            assert_eq!(update, BalanceUpdate::default());
            assert_eq!(update.status(), BalanceStatus::Staged);
        }
        assert!(balance.stage_calls().is_empty());
    }

    #[traced_test]
    #[test]
    fn test_new_balance_update_ev_error() {
        let sender = MockSender::new(keypair(1), rat(5))
            .with_ev_error(SenderError::UnknownSession(session()));
        let balance = MockBalance::new();

        let err = stage(&sender, &balance, 1).unwrap_err();

        assert_eq!(err, SenderError::UnknownSession(session()));
        assert!(balance.stage_calls().is_empty());
    }

    #[traced_test]
    #[test]
    fn test_new_balance_update_raises_min_credit_to_ev() {
        let sender = MockSender::new(keypair(1), rat(5));
        let balance = MockBalance::new().with_stage_result(1, rat(5), rat(2));

        let update = stage(&sender, &balance, 1).unwrap();

        assert_eq!(balance.stage_calls(), vec![(rat(5), rat(5))]);
        assert_eq!(update.num_tickets, 1);
        assert_eq!(update.new_credit, rat(5));
        assert_eq!(update.existing_credit, rat(2));
        assert_eq!(update.status(), BalanceStatus::Staged);
    }

    #[traced_test]
    #[test]
    fn test_new_balance_update_keeps_larger_min_credit() {
        let sender = MockSender::new(keypair(1), rat(5));
        let balance = MockBalance::new().with_stage_result(3, rat(15), rat(0));

        stage(&sender, &balance, 11).unwrap();

        assert_eq!(balance.stage_calls(), vec![(rat(11), rat(5))]);
    }

    #[traced_test]
    #[test]
    fn test_complete_staged_refunds_everything() {
        let balance = MockBalance::new();
        let mut u = update(5, 7);
        // Debit is irrelevant while staged.
        u.debit = rat(100);

        complete_balance_update(Some(&balance), &u);

        assert_eq!(balance.credits(), vec![rat(12)]);
    }

    #[traced_test]
    #[test]
    fn test_complete_credit_spent_never_credits() {
        let balance = MockBalance::new();
        let mut u = update(5, 7);
        u.mark_credit_spent();

        complete_balance_update(Some(&balance), &u);

        assert!(balance.credits().is_empty());
    }

    #[traced_test]
    #[test]
    fn test_complete_received_change() {
        for (billed, expected) in [(0, 12), (9, 3), (108, -96)] {
            let balance = MockBalance::new();
            let mut u = update(5, 7);
            u.mark_credit_spent();
            u.mark_received_change(rat(billed));

            complete_balance_update(Some(&balance), &u);

            assert_eq!(balance.credits(), vec![rat(expected)]);
        }
    }

    #[traced_test]
    #[test]
    fn test_complete_without_balance_is_noop() {
        complete_balance_update(None, &update(5, 7));
    }

    #[traced_test]
    #[test]
    fn test_status_never_regresses() {
        let mut u = update(1, 1);
        u.mark_received_change(rat(1));
        u.mark_credit_spent();

        assert_eq!(u.status(), BalanceStatus::ReceivedChange);
        assert!(logs_contain("Ignoring balance status regression"));
    }

    #[test]
    fn test_received_change_keeps_first_debit() {
        let mut u = update(1, 1);
        u.mark_received_change(rat(1));
        u.mark_received_change(rat(2));
        assert_eq!(u.debit, rat(1));
    }
}
