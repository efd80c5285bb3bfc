//! Orchestrator side of a segment exchange.

use crate::creds::{verify_seg_creds, SegmentMetadata};
use crate::discovery::orchestrator_info;
use crate::payment::{get_payment, get_payment_sender};
use probpay_core::{Orchestrator, SegmentRequest, SegmentResponse, SettlementError};
use probpay_messages::{TranscodeData, TranscodeOutcome, TranscodeResult, TranscodedSegmentData};
use probpay_types::signing::transcode_result_message;
use probpay_types::{Address, Hash, Segment};
use tracing::{error, info, warn};

fn error_response(err: &SettlementError) -> SegmentResponse {
    SegmentResponse::new(err.status_code(), err.to_string())
}

/// Transcode the segment and store its renditions.
///
/// Returns the outcome to report and the pixels to bill. Only stored
/// renditions are billed, and the first failed save stops storing the rest.
/// Pixel counts that are negative or overflow when summed are an internal
/// error and nothing is stored.
async fn transcode_and_save(
    orch: &dyn Orchestrator,
    md: &SegmentMetadata,
    segment: &Segment,
) -> Result<(TranscodeOutcome, i64), SettlementError> {
    let renditions = match orch.transcode_seg(&md.manifest_id, segment, &md.profiles).await {
        Ok(renditions) => renditions,
        Err(e) => {
            warn!(
                manifest_id = %md.manifest_id,
                seq_no = md.seq_no,
                error = %e,
                "Could not transcode"
            );
            let message = match e {
                SettlementError::Transcode(message) => message,
                other => other.to_string(),
            };
            return Ok((TranscodeOutcome::Error(message), 0));
        }
    };

    renditions
        .iter()
        .try_fold(0i64, |total, r| {
            (r.pixels >= 0).then(|| total.checked_add(r.pixels)).flatten()
        })
        .ok_or_else(|| SettlementError::Internal("Invalid rendition pixel count".into()))?;

    let mut segments = Vec::with_capacity(renditions.len());
    let mut pixels = 0i64;
    for rendition in &renditions {
        match orch.save_rendition(&md.manifest_id, md.seq_no, rendition).await {
            Ok(url) => {
                // Bounded by the checked total above.
                pixels += rendition.pixels;
                segments.push(TranscodedSegmentData {
                    url,
                    pixels: rendition.pixels,
                });
            }
            Err(e) => {
                error!(
                    manifest_id = %md.manifest_id,
                    seq_no = md.seq_no,
                    profile = %rendition.profile.name,
                    error = %e,
                    "Error saving rendition"
                );
                break;
            }
        }
    }

    let hashes: Vec<_> = renditions.iter().map(|r| r.hash()).collect();
    let sig = orch.sign(&transcode_result_message(&hashes)).to_bytes();
    Ok((TranscodeOutcome::Data(TranscodeData { segments, sig }), pixels))
}

/// Handle one segment submission.
///
/// Rejections before any work is done answer with the error text and its
/// status. Once transcoding has been attempted the answer is 200 whatever
/// the outcome, and the sender is debited for the pixels that were
/// actually stored.
pub async fn serve_segment(orch: &dyn Orchestrator, request: &SegmentRequest) -> SegmentResponse {
    let payment = match get_payment(&request.payment) {
        Ok(payment) => payment,
        Err(e) => {
            warn!(error = %e, "Could not parse payment");
            return error_response(&e);
        }
    };
    let sender = get_payment_sender(&payment);
    let sender_or_zero = sender.unwrap_or(Address::ZERO);

    let md = match verify_seg_creds(orch, &request.seg_creds, &sender_or_zero) {
        Ok(md) => md,
        Err(e) => {
            warn!(error = %e, "Could not verify segment creds");
            return error_response(&e);
        }
    };

    if let Err(e) = orch.process_payment(&payment, &md.manifest_id) {
        warn!(
            manifest_id = %md.manifest_id,
            seq_no = md.seq_no,
            error = %e,
            "Error processing payment"
        );
        return error_response(&e);
    }

    if !orch.sufficient_balance(sender.as_ref(), &md.manifest_id) {
        return error_response(&SettlementError::InsufficientBalance);
    }

    if Hash::from_bytes(&request.data) != md.hash {
        warn!(
            manifest_id = %md.manifest_id,
            seq_no = md.seq_no,
            "Segment data does not match creds"
        );
        return SegmentResponse::new(403, "Forbidden");
    }

    let segment = Segment::new(md.seq_no, "", request.data.clone(), request.duration);
    let (outcome, pixels) = match transcode_and_save(orch, &md, &segment).await {
        Ok(transcoded) => transcoded,
        Err(e) => {
            error!(
                manifest_id = %md.manifest_id,
                seq_no = md.seq_no,
                error = %e,
                "Could not bill transcoded segment"
            );
            return error_response(&e);
        }
    };

    orch.debit_fees(
        sender.as_ref(),
        &md.manifest_id,
        payment.expected_price.as_ref(),
        pixels,
    );

    let info = match orchestrator_info(orch, &sender_or_zero, &orch.service_uri()) {
        Ok(info) => info,
        Err(e) => {
            error!(
                manifest_id = %md.manifest_id,
                error = ?e,
                "Could not assemble orchestrator info"
            );
            return error_response(&SettlementError::Internal(e.to_string()));
        }
    };

    let result = TranscodeResult {
        info: Some(info),
        result: outcome,
    };
    match result.encode() {
        Ok(body) => {
            info!(manifest_id = %md.manifest_id, seq_no = md.seq_no, pixels, "Served segment");
            SegmentResponse::new(200, body)
        }
        Err(e) => {
            error!(manifest_id = %md.manifest_id, error = %e, "Could not encode transcode result");
            error_response(&SettlementError::Internal(e.to_string()))
        }
    }
}
