//! Broadcaster and orchestrator exchanging segments in process.

use async_trait::async_trait;
use probpay_balance::{Balance, BalanceKey, Balances};
use probpay_core::{SegmentRequest, SegmentResponse, SegmentTransport, TransportError};
use probpay_pm::Sender;
use probpay_pricing::estimate_fee;
use probpay_server::{
    gen_orchestrator_req, get_orchestrator, submit_segment, BroadcastConfig, BroadcastSession,
    LocalTransport,
};
use probpay_test_helpers::{
    keypair, rat, ratio, test_segment, test_ticket_params, StubBroadcaster, StubOrchestrator,
    StubTranscoder,
};
use probpay_types::profile::p144p30fps16x9;
use probpay_types::{ManifestId, PriceInfo};
use std::sync::Arc;
use tracing_test::traced_test;

struct Unreachable;

#[async_trait]
impl SegmentTransport for Unreachable {
    async fn send(&self, _request: SegmentRequest) -> Result<SegmentResponse, TransportError> {
        Err(TransportError::Connect("connection refused".into()))
    }
}

struct Garbled;

#[async_trait]
impl SegmentTransport for Garbled {
    async fn send(&self, _request: SegmentRequest) -> Result<SegmentResponse, TransportError> {
        Ok(SegmentResponse::new(200, vec![0xff; 16]))
    }
}

fn orchestrator() -> Arc<StubOrchestrator> {
    let params = test_ticket_params(keypair(2).address(), &[9u8; 32], 5);
    Arc::new(
        StubOrchestrator::new(keypair(2))
            .with_transcoder(StubTranscoder::new(500))
            .with_ticket_params(params)
            .with_price(PriceInfo::new(1, 1000)),
    )
}

/// A paying session set up through the orchestrator info exchange.
fn session(orch: &StubOrchestrator, balances: &Arc<Balances>) -> BroadcastSession {
    let broadcaster = Arc::new(StubBroadcaster::new(keypair(1)));
    let info = get_orchestrator(orch, &gen_orchestrator_req(broadcaster.as_ref())).unwrap();
    let manifest_id = ManifestId::new("stream");
    let balance = Balance::new(
        balances.clone(),
        BalanceKey::new(keypair(2).address(), manifest_id.clone()),
    );

    BroadcastSession::new(
        broadcaster,
        manifest_id,
        vec![p144p30fps16x9()],
        Arc::new(BroadcastConfig::new()),
    )
    .with_payments(Arc::new(Sender::new(keypair(1))), Arc::new(balance))
    .with_orchestrator_info(info)
}

fn key() -> BalanceKey {
    BalanceKey::new(keypair(2).address(), ManifestId::new("stream"))
}

#[traced_test]
#[tokio::test]
async fn test_paid_exchange_settles_change() {
    let orch = orchestrator();
    let balances = Arc::new(Balances::default());
    let mut s = session(&orch, &balances);
    let transport = LocalTransport::new(orch.clone());
    let seg = test_segment(0, 1.0);

    // Tickets are worth 1000 wei each; the fee estimate needs two.
    let fee = estimate_fee(&seg, &s.profiles, Some(&ratio(1, 1000)))
        .unwrap()
        .unwrap();
    assert!(fee > rat(1000) && fee < rat(2000));

    let outcome = submit_segment(&mut s, &seg, &transport).await.unwrap();

    assert_eq!(outcome.data.total_pixels().unwrap(), 500);
    assert_eq!(balances.balance(&key()), Some(rat(2000) - ratio(1, 2)));
    let payments = orch.payments();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].0.ticket_sender_params.len(), 2);
    assert_eq!(orch.debits()[0].pixels, 500);

    // The remaining credit covers the next segment without new tickets.
    submit_segment(&mut s, &test_segment(1, 1.0), &transport)
        .await
        .unwrap();

    assert_eq!(balances.balance(&key()), Some(rat(1999)));
    let payments = orch.payments();
    assert!(payments[1].0.ticket_params.is_none());
    assert_eq!(
        payments[1].0.sender_address().unwrap(),
        Some(keypair(1).address())
    );
}

#[traced_test]
#[tokio::test]
async fn test_unreachable_orchestrator_refunds() {
    let orch = orchestrator();
    let balances = Arc::new(Balances::default());
    balances.credit(&key(), &rat(5000));
    let mut s = session(&orch, &balances);

    assert!(submit_segment(&mut s, &test_segment(0, 1.0), &Unreachable)
        .await
        .is_err());

    assert_eq!(balances.balance(&key()), Some(rat(5000)));
}

#[tokio::test]
async fn test_garbled_response_consumes_credit() {
    let orch = orchestrator();
    let balances = Arc::new(Balances::default());
    balances.credit(&key(), &rat(5000));
    let mut s = session(&orch, &balances);

    assert!(submit_segment(&mut s, &test_segment(0, 1.0), &Garbled)
        .await
        .is_err());

    assert_eq!(balances.balance(&key()), Some(rat(0)));
}

#[tokio::test]
async fn test_rejected_payment_consumes_credit() {
    let orch = orchestrator();
    let balances = Arc::new(Balances::default());
    let mut s = session(&orch, &balances);
    let transport = LocalTransport::new(Arc::new(
        StubOrchestrator::new(keypair(2)).with_insufficient_balance(),
    ));

    let err = submit_segment(&mut s, &test_segment(0, 1.0), &transport)
        .await
        .unwrap_err();

    assert_eq!(err.status_code(), 400);
    assert_eq!(err.to_string(), "Insufficient balance");
    assert_eq!(balances.balance(&key()), Some(rat(0)));
}
