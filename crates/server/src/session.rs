//! Broadcaster-side state for one orchestrator.

use crate::config::BroadcastConfig;
use probpay_core::{Broadcaster, SessionBalance, TicketSender};
use probpay_messages::OrchestratorInfo;
use probpay_types::{ManifestId, SessionId, TicketParams, VideoProfile};
use std::sync::Arc;
use tracing::{debug, warn};

/// Everything a broadcaster needs to submit segments of one stream to one
/// orchestrator.
///
/// A session without a sender pays nothing and sends empty payments.
pub struct BroadcastSession {
    pub broadcaster: Arc<dyn Broadcaster>,
    pub manifest_id: ManifestId,
    pub profiles: Vec<VideoProfile>,
    pub orchestrator_info: OrchestratorInfo,
    pub sender: Option<Arc<dyn TicketSender>>,
    pub pm_session_id: SessionId,
    pub balance: Option<Arc<dyn SessionBalance>>,
    pub config: Arc<BroadcastConfig>,
}

impl BroadcastSession {
    pub fn new(
        broadcaster: Arc<dyn Broadcaster>,
        manifest_id: ManifestId,
        profiles: Vec<VideoProfile>,
        config: Arc<BroadcastConfig>,
    ) -> Self {
        Self {
            broadcaster,
            manifest_id,
            profiles,
            orchestrator_info: OrchestratorInfo::default(),
            sender: None,
            pm_session_id: SessionId::default(),
            balance: None,
            config,
        }
    }

    /// Pay for segments with tickets from `sender`, tracking credit in
    /// `balance`.
    pub fn with_payments(
        mut self,
        sender: Arc<dyn TicketSender>,
        balance: Arc<dyn SessionBalance>,
    ) -> Self {
        self.sender = Some(sender);
        self.balance = Some(balance);
        self.restart_pm_session();
        self
    }

    pub fn with_orchestrator_info(mut self, info: OrchestratorInfo) -> Self {
        self.adopt_orchestrator_info(info);
        self
    }

    /// Switch to the orchestrator's latest terms.
    ///
    /// A new ticket session is started only when the recipient rand hash
    /// changes, so nonces keep counting up for unchanged params.
    pub fn adopt_orchestrator_info(&mut self, info: OrchestratorInfo) {
        let params_changed = match (&self.orchestrator_info.ticket_params, &info.ticket_params) {
            (_, None) => false,
            (None, Some(_)) => true,
            (Some(old), Some(new)) => old.recipient_rand_hash != new.recipient_rand_hash,
        };
        self.orchestrator_info = info;
        if params_changed {
            self.restart_pm_session();
        }
    }

    fn restart_pm_session(&mut self) {
        let (Some(sender), Some(wire)) = (&self.sender, &self.orchestrator_info.ticket_params)
        else {
            return;
        };
        match TicketParams::try_from(wire) {
            Ok(params) => {
                self.pm_session_id = sender.start_session(params);
                debug!(
                    manifest_id = %self.manifest_id,
                    session = %self.pm_session_id,
                    "Started ticket session with orchestrator"
                );
            }
            Err(e) => warn!(
                manifest_id = %self.manifest_id,
                error = %e,
                "Ignoring malformed ticket params from orchestrator"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use probpay_messages::TicketParamsWire;
    use probpay_test_helpers::{
        keypair, rat, test_ticket_params, MockBalance, MockSender, StubBroadcaster,
    };
    use probpay_types::PriceInfo;

    fn info(seed: u64) -> OrchestratorInfo {
        let params = test_ticket_params(keypair(2).address(), &[4u8; 32], seed);
        OrchestratorInfo {
            transcoder: "https://orch:8935".into(),
            ticket_params: Some(TicketParamsWire::from(&params)),
            price_info: Some(PriceInfo::new(1, 1)),
            address: keypair(2).address().as_bytes().to_vec(),
        }
    }

    fn session(sender: Arc<MockSender>) -> BroadcastSession {
        BroadcastSession::new(
            Arc::new(StubBroadcaster::new(keypair(1))),
            ManifestId::new("manifest"),
            vec![],
            Arc::new(BroadcastConfig::new()),
        )
        .with_payments(sender, Arc::new(MockBalance::new()))
    }

    #[test]
    fn test_orchestrator_info_starts_pm_session() {
        let sender = Arc::new(MockSender::new(keypair(1), rat(1)));
        let s = session(sender.clone()).with_orchestrator_info(info(1));

        assert_eq!(sender.session_count(), 1);
        assert!(!s.pm_session_id.0.is_empty());
    }

    #[test]
    fn test_new_params_restart_pm_session() {
        let sender = Arc::new(MockSender::new(keypair(1), rat(1)));
        let mut s = session(sender.clone()).with_orchestrator_info(info(1));
        let first = s.pm_session_id.clone();

        s.adopt_orchestrator_info(info(1));
        assert_eq!(s.pm_session_id, first);

        s.adopt_orchestrator_info(info(2));
        assert_ne!(s.pm_session_id, first);
        assert_eq!(sender.session_count(), 2);
    }

    #[test]
    fn test_info_without_params_keeps_session() {
        let sender = Arc::new(MockSender::new(keypair(1), rat(1)));
        let mut s = session(sender).with_orchestrator_info(info(1));
        let first = s.pm_session_id.clone();

        let mut update = info(1);
        update.ticket_params = None;
        update.price_info = Some(PriceInfo::new(5, 1));
        s.adopt_orchestrator_info(update);

        assert_eq!(s.pm_session_id, first);
        assert_eq!(s.orchestrator_info.price_info, Some(PriceInfo::new(5, 1)));
    }
}
