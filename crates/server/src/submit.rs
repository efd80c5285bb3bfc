//! Broadcaster side of a segment exchange.

use crate::creds::gen_seg_creds;
use crate::payment::gen_payment;
use crate::session::BroadcastSession;
use num_traits::Zero;
use probpay_balance::{complete_balance_update, new_balance_update, BalanceUpdate};
use probpay_core::{SegmentRequest, SegmentTransport, SettlementError, TransportError};
use probpay_messages::{OrchestratorInfo, TranscodeData, TranscodeOutcome, TranscodeResult};
use probpay_pricing::{estimate_fee, rat_price_info};
use probpay_types::{BigInt, BigRational, Segment};
use std::time::Instant;
use tracing::{debug, warn};

/// A successfully transcoded segment.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitOutcome {
    pub data: TranscodeData,
    /// Terms the orchestrator answered with, already adopted by the session.
    pub info: Option<OrchestratorInfo>,
    /// Round-trip time over segment duration. Below 1 keeps up with real
    /// time.
    pub latency_score: f64,
}

/// Pay for and submit one segment.
///
/// Credit is staged before sending and settled after, whatever the result:
/// a request that got no response is refunded in full, one that got a
/// response keeps its credit spent, and a successful one is refunded the
/// difference between the staged credit and the actual fee.
pub async fn submit_segment(
    session: &mut BroadcastSession,
    segment: &Segment,
    transport: &dyn SegmentTransport,
) -> Result<SubmitOutcome, SettlementError> {
    let seg_creds = gen_seg_creds(session, segment)?;
    let price = rat_price_info(session.orchestrator_info.price_info.as_ref())?;
    let fee = estimate_fee(segment, &session.profiles, price.as_ref())?;

    let mut update = new_balance_update(
        session.sender.as_deref(),
        &session.pm_session_id,
        session.balance.as_deref(),
        fee.as_ref(),
    )?;
    let balance = session.balance.clone();

    let result = exchange(session, segment, seg_creds, price, &mut update, transport).await;

    complete_balance_update(balance.as_deref(), &update);
    result
}

async fn exchange(
    session: &mut BroadcastSession,
    segment: &Segment,
    seg_creds: String,
    price: Option<BigRational>,
    update: &mut BalanceUpdate,
    transport: &dyn SegmentTransport,
) -> Result<SubmitOutcome, SettlementError> {
    let payment = gen_payment(session, update.num_tickets)?;
    let request = SegmentRequest {
        uri: session.orchestrator_info.transcoder.clone(),
        seg_creds,
        payment,
        data: segment.data.clone(),
        duration: segment.duration,
    };

    let start = Instant::now();
    let response = match transport.send(request).await {
        Ok(response) => {
            update.mark_credit_spent();
            response
        }
        Err(e @ TransportError::Response(_)) => {
            update.mark_credit_spent();
            warn!(
                manifest_id = %session.manifest_id,
                seq_no = segment.seq_no,
                error = %e,
                "Could not read segment response"
            );
            return Err(e.into());
        }
        Err(e @ TransportError::Connect(_)) => {
            warn!(
                manifest_id = %session.manifest_id,
                seq_no = segment.seq_no,
                error = %e,
                "Could not submit segment"
            );
            return Err(e.into());
        }
    };
    let elapsed = start.elapsed();

    if !response.is_success() {
        let message = response.text();
        warn!(
            manifest_id = %session.manifest_id,
            seq_no = segment.seq_no,
            status = response.status,
            message = %message,
            "Orchestrator rejected segment"
        );
        return Err(SettlementError::Remote {
            status: response.status,
            message,
        });
    }

    let result = TranscodeResult::decode(&response.body)?;
    if let Some(info) = &result.info {
        session.adopt_orchestrator_info(info.clone());
    }

    let data = match result.result {
        TranscodeOutcome::Data(data) => data,
        TranscodeOutcome::Error(message) => return Err(SettlementError::Transcode(message)),
    };

    let pixels = data.total_pixels()?;
    let debit = match &price {
        Some(price) => BigRational::from_integer(BigInt::from(pixels)) * price,
        None => BigRational::zero(),
    };
    update.mark_received_change(debit);

    let latency_score = if segment.duration > 0.0 {
        elapsed.as_secs_f64() / segment.duration
    } else {
        0.0
    };
    debug!(
        manifest_id = %session.manifest_id,
        seq_no = segment.seq_no,
        pixels,
        latency_score,
        "Segment transcoded"
    );

    Ok(SubmitOutcome {
        data,
        info: result.info,
        latency_score,
    })
}
