//! Broadcaster-side configuration.

use parking_lot::RwLock;
use probpay_types::BigRational;

/// Settings shared by every [`BroadcastSession`](crate::BroadcastSession)
/// of a broadcaster.
///
/// The maximum price may change while sessions are running, so it sits
/// behind a lock and is read at every payment.
#[derive(Debug, Default)]
pub struct BroadcastConfig {
    /// Highest acceptable price per pixel. `None` accepts any price.
    max_price: RwLock<Option<BigRational>>,
}

impl BroadcastConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_price(self, max_price: BigRational) -> Self {
        *self.max_price.write() = Some(max_price);
        self
    }

    pub fn set_max_price(&self, max_price: Option<BigRational>) {
        *self.max_price.write() = max_price;
    }

    pub fn max_price(&self) -> Option<BigRational> {
        self.max_price.read().clone()
    }
}
