//! Request handlers and the pipeline-outcome → HTTP mapping.
//!
//! Status codes steer the processor's redelivery loop, so the mapping is
//! policy, not convenience:
//!
//! - 200 acknowledges the delivery and stops redelivery. Duplicates, ignored
//!   event types, and *non-retryable* failures all acknowledge: redelivering
//!   them cannot change anything.
//! - 400 means this delivery can never be processed (bad signature, stale,
//!   malformed). The processor may alert; retrying the same bytes is useless.
//! - 500 invites redelivery, and is returned only when redelivery is safe
//!   and useful: retryable faults and claim-ledger failures, where admission
//!   will re-run cleanly.
//!
//! In particular a `Rejected` ledger fault answers 200 with an explicit
//! `"outcome":"failed"` body: answering 5xx would turn the processor's
//! redelivery into exactly the automatic retry a rejection forbids.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::{error, info, info_span, warn, Instrument};

use openvend_issuance::IssuanceOutcome;
use openvend_types::{constants, DeliveryId, VendError};
use openvend_verifier::Disposition;

use crate::state::AppState;

/// `POST /webhook` — the processor's notification endpoint.
pub async fn handle_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let delivery = DeliveryId::new();
    let span = info_span!("delivery", id = %delivery);
    async move {
        let signature = headers
            .get(constants::SIGNATURE_HEADER)
            .and_then(|value| value.to_str().ok());

        // Verification consumes the raw bytes exactly as received.
        let disposition = match state.verifier.process(&body, signature) {
            Ok(disposition) => disposition,
            Err(err) => return reject(&err),
        };

        let claim = match disposition {
            Disposition::Ignored { event_type } => {
                info!(event_type, "event type not handled, acknowledging");
                return acknowledge(json!({ "received": true, "outcome": "ignored" }));
            }
            Disposition::Actionable(claim) => claim,
        };

        match state.coordinator.process(&claim).await {
            Ok(outcome) => conclude(&outcome),
            Err(err) => {
                // The claim ledger itself failed. Either admission never
                // recorded anything (redelivery re-runs cleanly) or a won
                // claim could not record its outcome and parks in ISSUING
                // as an operator-visible stall.
                error!(error = %err, "claim ledger failure");
                internal()
            }
        }
    }
    .instrument(span)
    .await
}

/// `GET /healthz` — unauthenticated deployment probe.
pub async fn handle_healthz() -> impl IntoResponse {
    Json(json!({ "status": "ok", "version": constants::VERSION }))
}

fn conclude(outcome: &IssuanceOutcome) -> Response {
    match outcome {
        IssuanceOutcome::Issued(receipt) => acknowledge(json!({
            "received": true,
            "outcome": "issued",
            "txHash": receipt.tx_hash,
            "rewardTxHash": receipt.reward_tx_hash,
        })),
        IssuanceOutcome::PartiallyIssued { receipt, .. } => acknowledge(json!({
            "received": true,
            "outcome": "issued",
            "txHash": receipt.tx_hash,
            "rewardPending": true,
        })),
        IssuanceOutcome::AlreadyIssued { .. } | IssuanceOutcome::InProgress => {
            acknowledge(json!({ "received": true, "outcome": "duplicate" }))
        }
        IssuanceOutcome::Failed { fault, detail } => {
            if fault.is_retryable() {
                warn!(%fault, detail, "issuance failed, inviting redelivery");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "issuance_failed" })),
                )
                    .into_response()
            } else {
                warn!(%fault, detail, "issuance failed terminally, acknowledging");
                acknowledge(json!({ "received": true, "outcome": "failed" }))
            }
        }
    }
}

/// 400 with a reason class. Never echoes payload or MAC material.
fn reject(err: &VendError) -> Response {
    let class = match err {
        VendError::SignatureMissing => "signature_missing".to_string(),
        VendError::SignatureInvalid { .. } => "signature_invalid".to_string(),
        VendError::StaleEvent { .. } => "stale_event".to_string(),
        VendError::MalformedEnvelope { .. } => "malformed_envelope".to_string(),
        VendError::MalformedClaim { field, .. } => format!("malformed_claim:{field}"),
        other => {
            error!(error = %other, "unexpected verification error");
            return internal();
        }
    };
    warn!(error = %err, "delivery rejected");
    (StatusCode::BAD_REQUEST, Json(json!({ "error": class }))).into_response()
}

fn acknowledge(body: serde_json::Value) -> Response {
    (StatusCode::OK, Json(body)).into_response()
}

fn internal() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "internal" })),
    )
        .into_response()
}
