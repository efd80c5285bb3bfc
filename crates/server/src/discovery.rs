//! Orchestrator info exchange.
//!
//! Before submitting segments a broadcaster asks the orchestrator for its
//! current terms: service URI, ticket params and price.

use probpay_core::{Broadcaster, Orchestrator, SettlementError};
use probpay_messages::{OrchestratorInfo, OrchestratorRequest, TicketParamsWire};
use probpay_types::signing::orchestrator_request_message;
use probpay_types::{Address, Signature};
use tracing::debug;

/// A request for terms, signed by the broadcaster over its own address.
pub fn gen_orchestrator_req(broadcaster: &dyn Broadcaster) -> OrchestratorRequest {
    let address = broadcaster.address();
    OrchestratorRequest {
        address: address.as_bytes().to_vec(),
        sig: broadcaster
            .sign(&orchestrator_request_message(&address))
            .to_bytes(),
    }
}

/// Check the request signature, returning the requesting address.
pub fn verify_orchestrator_req(
    orch: &dyn Orchestrator,
    req: &OrchestratorRequest,
) -> Result<Address, SettlementError> {
    let address = Address::from_slice(&req.address).map_err(|e| {
        SettlementError::Signature(format!("Invalid orchestrator request ({})", e))
    })?;
    let message = orchestrator_request_message(&address);
    if !orch.verify_sig(&address, &message, &Signature(req.sig.clone())) {
        return Err(SettlementError::Signature(
            "Invalid orchestrator request (Orchestrator request sig check failed)".into(),
        ));
    }
    Ok(address)
}

/// This orchestrator's current terms for `sender`.
pub fn orchestrator_info(
    orch: &dyn Orchestrator,
    sender: &Address,
    service_uri: &str,
) -> Result<OrchestratorInfo, SettlementError> {
    let ticket_params = orch.ticket_params(sender)?;
    let price_info = orch.price_info(sender)?;
    Ok(OrchestratorInfo {
        transcoder: service_uri.to_string(),
        ticket_params: ticket_params.as_ref().map(TicketParamsWire::from),
        price_info,
        address: orch.address().as_bytes().to_vec(),
    })
}

/// Answer a broadcaster's request for terms.
pub fn get_orchestrator(
    orch: &dyn Orchestrator,
    req: &OrchestratorRequest,
) -> Result<OrchestratorInfo, SettlementError> {
    let sender = verify_orchestrator_req(orch, req)?;
    debug!(sender = %sender, "Answering orchestrator info request");
    orchestrator_info(orch, &sender, &orch.service_uri())
}

#[cfg(test)]
mod tests {
    use super::*;
    use probpay_test_helpers::{keypair, test_ticket_params, StubBroadcaster, StubOrchestrator};
    use probpay_types::{PriceInfo, TicketParams};

    #[test]
    fn test_get_orchestrator() {
        let params = test_ticket_params(keypair(2).address(), &[1u8; 32], 3);
        let orch = StubOrchestrator::new(keypair(2))
            .with_service_uri("https://orch.example:8935")
            .with_ticket_params(params.clone())
            .with_price(PriceInfo::new(4, 2));
        let req = gen_orchestrator_req(&StubBroadcaster::new(keypair(1)));

        let info = get_orchestrator(&orch, &req).unwrap();

        assert_eq!(info.transcoder, "https://orch.example:8935");
        assert_eq!(info.price_info, Some(PriceInfo::new(4, 2)));
        assert_eq!(info.address, keypair(2).address().as_bytes().to_vec());
        let wire = info.ticket_params.unwrap();
        assert_eq!(TicketParams::try_from(&wire).unwrap(), params);
    }

    #[test]
    fn test_get_orchestrator_bad_sig() {
        let orch = StubOrchestrator::new(keypair(2));
        let mut req = gen_orchestrator_req(&StubBroadcaster::new(keypair(1)));
        req.address = keypair(3).address().as_bytes().to_vec();

        let err = get_orchestrator(&orch, &req).unwrap_err();
        assert!(matches!(err, SettlementError::Signature(_)));
        assert!(err.to_string().contains("Invalid orchestrator request"));
    }

    #[test]
    fn test_get_orchestrator_bad_address() {
        let orch = StubOrchestrator::new(keypair(2));
        let req = OrchestratorRequest {
            address: vec![1, 2],
            sig: vec![],
        };
        assert!(matches!(
            get_orchestrator(&orch, &req),
            Err(SettlementError::Signature(_))
        ));
    }

    #[test]
    fn test_ticket_params_error_propagates() {
        let orch = StubOrchestrator::new(keypair(2)).with_ticket_params_error("no secret");
        let req = gen_orchestrator_req(&StubBroadcaster::new(keypair(1)));

        assert!(matches!(
            get_orchestrator(&orch, &req),
            Err(SettlementError::Internal(m)) if m == "no secret"
        ));
    }

    #[test]
    fn test_price_info_error_propagates() {
        let orch = StubOrchestrator::new(keypair(2)).with_price_error("no price feed");
        assert!(orchestrator_info(&orch, &keypair(1).address(), "uri").is_err());
    }

    #[test]
    fn test_offchain_orchestrator_info() {
        let orch = StubOrchestrator::new(keypair(2));
        let info = orchestrator_info(&orch, &keypair(1).address(), "https://o:1").unwrap();
        assert!(info.ticket_params.is_none());
        assert!(info.price_info.is_none());
    }
}
