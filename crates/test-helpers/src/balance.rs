//! Recording session balance.

use num_traits::Zero;
use parking_lot::Mutex;
use probpay_core::SessionBalance;
use probpay_types::BigRational;

#[derive(Default)]
struct State {
    stage_result: Option<(usize, BigRational, BigRational)>,
    stage_calls: Vec<(BigRational, BigRational)>,
    credits: Vec<BigRational>,
}

/// A [`SessionBalance`] that returns a scripted staging result and records
/// every call.
#[derive(Default)]
pub struct MockBalance {
    state: Mutex<State>,
}

impl MockBalance {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the result of `stage_update`.
    pub fn with_stage_result(
        self,
        num_tickets: usize,
        new_credit: BigRational,
        existing_credit: BigRational,
    ) -> Self {
        self.state.lock().stage_result = Some((num_tickets, new_credit, existing_credit));
        self
    }

    /// `(min_credit, ev)` of every `stage_update` call.
    pub fn stage_calls(&self) -> Vec<(BigRational, BigRational)> {
        self.state.lock().stage_calls.clone()
    }

    /// Amounts of every `credit` call, in order.
    pub fn credits(&self) -> Vec<BigRational> {
        self.state.lock().credits.clone()
    }
}

impl SessionBalance for MockBalance {
    fn stage_update(
        &self,
        min_credit: &BigRational,
        ev: &BigRational,
    ) -> (usize, BigRational, BigRational) {
        let mut state = self.state.lock();
        state.stage_calls.push((min_credit.clone(), ev.clone()));
        state
            .stage_result
            .clone()
            .unwrap_or_else(|| (0, BigRational::zero(), BigRational::zero()))
    }

    fn credit(&self, amount: &BigRational) {
        self.state.lock().credits.push(amount.clone());
    }
}
