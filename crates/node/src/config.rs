//! Orchestrator node configuration.

use probpay_types::PriceInfo;

/// Configuration for an [`OrchestratorNode`](crate::OrchestratorNode).
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// URI broadcasters submit segments to.
    pub service_uri: String,

    /// Wei charged per `pixels_per_unit` pixels.
    pub price_per_unit: i64,

    /// Pixels covered by one `price_per_unit`.
    pub pixels_per_unit: i64,

    /// Maximum number of streams served at once.
    pub max_sessions: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            service_uri: "https://127.0.0.1:8935".to_string(),
            price_per_unit: 0,
            pixels_per_unit: 1,
            max_sessions: 10,
        }
    }
}

impl OrchestratorConfig {
    pub fn with_service_uri(mut self, uri: impl Into<String>) -> Self {
        self.service_uri = uri.into();
        self
    }

    pub fn with_price(mut self, price_per_unit: i64, pixels_per_unit: i64) -> Self {
        self.price_per_unit = price_per_unit;
        self.pixels_per_unit = pixels_per_unit;
        self
    }

    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.max_sessions = max_sessions;
        self
    }

    pub fn price(&self) -> PriceInfo {
        PriceInfo::new(self.price_per_unit, self.pixels_per_unit)
    }
}
