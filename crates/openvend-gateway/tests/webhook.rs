//! HTTP-level tests for the webhook endpoint.
//!
//! These drive signed requests through the real router, verifier, and
//! coordinator against a scripted ledger, and assert the status-code
//! contract: 200 acknowledges (including terminal failures), 400 rejects
//! bad deliveries, 500 invites the processor to redeliver.

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::Utc;
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use sha2::Sha256;
use tower::ServiceExt;

use openvend_gateway::{build_router, AppState};
use openvend_issuance::{ClaimLedger, IssuanceCoordinator, MemoryClaimLedger};
use openvend_ledger::{
    Instruction, InstructionKind, LedgerClient, MockLedger, RetryPolicy, SerialLedger,
};
use openvend_types::{
    constants, Address, AssetId, ClaimKey, ClaimRecord, ClaimStatus, EndpointSecret, FaultKind,
    IssuanceConfig, Leg, TxHash, TxRef, VerifierConfig,
};
use openvend_verifier::EventVerifier;

const SECRET: &[u8] = b"whsec_test123secret456";
const RECIPIENT: &str = "0x00a0b1c2d3e4f5a6b7c8d9e0f1a2b3c4d5e6f708";

fn issuer() -> Address {
    "0x1111111111111111111111111111111111111111".parse().unwrap()
}

fn third_party() -> Address {
    "0x2222222222222222222222222222222222222222".parse().unwrap()
}

fn transfer_ref(asset: u64) -> TxRef {
    TxRef::deterministic(AssetId(asset), Leg::Transfer)
}

fn reward_ref(asset: u64) -> TxRef {
    TxRef::deterministic(AssetId(asset), Leg::Reward)
}

fn transfer_count(submitted: &[Instruction]) -> usize {
    submitted
        .iter()
        .filter(|i| matches!(i.kind, InstructionKind::TransferAsset { .. }))
        .count()
}

fn signed_header_at(body: &[u8], timestamp: i64) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(SECRET).unwrap();
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
}

fn signed_header(body: &[u8]) -> String {
    signed_header_at(body, Utc::now().timestamp())
}

fn completed_body(asset: u64) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "id": "evt_1",
        "type": "checkout.session.completed",
        "data": {
            "orderId": format!("cs_test_{asset}"),
            "recipient": RECIPIENT,
            "assetId": asset,
        },
    }))
    .unwrap()
}

/// Helper: the full gateway stack over a scripted ledger.
struct TestApp {
    router: Router,
    ledger: Arc<SerialLedger<MockLedger>>,
    claims: Arc<MemoryClaimLedger>,
}

impl TestApp {
    fn new(default_reward: Decimal) -> Self {
        let ledger = Arc::new(SerialLedger::new(MockLedger::new(issuer())));
        let claims = Arc::new(MemoryClaimLedger::new());
        let mut issuance = IssuanceConfig::new(issuer());
        issuance.default_reward = default_reward;
        let coordinator = IssuanceCoordinator::new(
            Arc::clone(&claims) as Arc<dyn ClaimLedger>,
            Arc::clone(&ledger) as Arc<dyn LedgerClient>,
            issuance,
            // Production backoff bases would stall the suite.
            RetryPolicy::new(3, Duration::from_millis(1)),
        );
        let state = Arc::new(AppState {
            verifier: EventVerifier::new(VerifierConfig::new(EndpointSecret::new(SECRET.to_vec()))),
            coordinator,
        });
        Self {
            router: build_router(state),
            ledger,
            claims,
        }
    }

    fn mock(&self) -> &MockLedger {
        self.ledger.inner()
    }

    async fn post_webhook(&self, body: Vec<u8>, signature: Option<&str>) -> (StatusCode, Value) {
        let mut request = Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("content-type", "application/json");
        if let Some(signature) = signature {
            request = request.header(constants::SIGNATURE_HEADER, signature);
        }
        let response = self
            .router
            .clone()
            .oneshot(request.body(Body::from(body)).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        // Rejections below the handler (body limit) are not JSON.
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn record(&self, asset: u64) -> ClaimRecord {
        self.claims
            .get(ClaimKey::new(AssetId(asset)))
            .await
            .unwrap()
            .expect("record should exist after processing")
    }
}

// =============================================================================
// Test: signed delivery issues the asset and reports the transfer hash
// =============================================================================
#[tokio::test]
async fn valid_event_is_issued() {
    let app = TestApp::new(Decimal::ZERO);
    app.mock()
        .script_confirm_hash(transfer_ref(3), TxHash::new("0x111"));

    let body = completed_body(3);
    let header = signed_header(&body);
    let (status, reply) = app.post_webhook(body, Some(&header)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["received"], json!(true));
    assert_eq!(reply["outcome"], json!("issued"));
    assert_eq!(reply["txHash"], json!("0x111"));

    let record = app.record(3).await;
    assert_eq!(record.status, ClaimStatus::Issued);
    assert_eq!(record.order_id.as_str(), "cs_test_3");
    assert_eq!(transfer_count(&app.mock().submitted()), 1);
}

// =============================================================================
// Test: redelivery of an issued claim acknowledges without ledger calls
// =============================================================================
#[tokio::test]
async fn duplicate_delivery_acknowledges_without_ledger_calls() {
    let app = TestApp::new(Decimal::ZERO);
    let body = completed_body(3);
    let header = signed_header(&body);

    let (status, reply) = app.post_webhook(body.clone(), Some(&header)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["outcome"], json!("issued"));
    let calls_after_first = app.mock().total_calls();

    let (status, reply) = app.post_webhook(body, Some(&header)).await;
    assert_eq!(status, StatusCode::OK, "duplicates are acknowledged");
    assert_eq!(reply["outcome"], json!("duplicate"));
    assert_eq!(
        app.mock().total_calls(),
        calls_after_first,
        "a duplicate must not touch the asset ledger"
    );
}

// =============================================================================
// Test: a tampered body dies at the signature gate, zero downstream effects
// =============================================================================
#[tokio::test]
async fn tampered_body_is_rejected_before_any_effect() {
    let app = TestApp::new(Decimal::ZERO);
    let body = completed_body(3);
    let header = signed_header(&body);
    let mut tampered = body;
    let last = tampered.len() - 2;
    tampered[last] ^= 1;

    let (status, reply) = app.post_webhook(tampered, Some(&header)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(reply["error"], json!("signature_invalid"));
    assert_eq!(app.mock().total_calls(), 0, "nothing may reach the ledger");
    assert!(app.claims.is_empty(), "no claim record for a forged delivery");
}

#[tokio::test]
async fn missing_signature_is_rejected() {
    let app = TestApp::new(Decimal::ZERO);
    let (status, reply) = app.post_webhook(completed_body(3), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(reply["error"], json!("signature_missing"));
}

#[tokio::test]
async fn stale_event_is_rejected() {
    let app = TestApp::new(Decimal::ZERO);
    let body = completed_body(3);
    // Correctly signed, ten minutes ago - outside the five-minute window.
    let header = signed_header_at(&body, Utc::now().timestamp() - 600);

    let (status, reply) = app.post_webhook(body, Some(&header)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(reply["error"], json!("stale_event"));
    assert_eq!(app.mock().total_calls(), 0);
}

// =============================================================================
// Test: allow-listing — authenticated but irrelevant events are acknowledged
// =============================================================================
#[tokio::test]
async fn unlisted_event_type_is_acknowledged_as_ignored() {
    let app = TestApp::new(Decimal::ZERO);
    let body = serde_json::to_vec(&json!({
        "id": "evt_2",
        "type": "invoice.paid",
        "data": {},
    }))
    .unwrap();
    let header = signed_header(&body);

    let (status, reply) = app.post_webhook(body, Some(&header)).await;

    assert_eq!(status, StatusCode::OK, "200 stops the processor redelivering");
    assert_eq!(reply["outcome"], json!("ignored"));
    assert_eq!(app.mock().total_calls(), 0);
    assert!(app.claims.is_empty());
}

#[tokio::test]
async fn malformed_envelope_is_rejected() {
    let app = TestApp::new(Decimal::ZERO);
    let body = b"definitely not json".to_vec();
    let header = signed_header(&body);

    let (status, reply) = app.post_webhook(body, Some(&header)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(reply["error"], json!("malformed_envelope"));
}

#[tokio::test]
async fn malformed_claim_names_the_field() {
    let app = TestApp::new(Decimal::ZERO);
    let body = serde_json::to_vec(&json!({
        "id": "evt_3",
        "type": "checkout.session.completed",
        "data": {
            "orderId": "cs_test_noasset",
            "recipient": RECIPIENT,
        },
    }))
    .unwrap();
    let header = signed_header(&body);

    let (status, reply) = app.post_webhook(body, Some(&header)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(reply["error"], json!("malformed_claim:assetId"));
    assert!(app.claims.is_empty());
}

// =============================================================================
// Test: retryable failures return 500 so the processor redelivers; the
// redelivery then succeeds
// =============================================================================
#[tokio::test]
async fn retryable_failure_invites_redelivery_which_succeeds() {
    let app = TestApp::new(Decimal::ZERO);
    // Three transport failures exhaust the in-delivery attempts.
    for _ in 0..3 {
        app.mock()
            .script_submit_failure(transfer_ref(3), FaultKind::Unreachable);
    }

    let body = completed_body(3);
    let header = signed_header(&body);
    let (status, reply) = app.post_webhook(body.clone(), Some(&header)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(reply["error"], json!("issuance_failed"));
    assert_eq!(app.record(3).await.status, ClaimStatus::Failed);

    // The processor redelivers; the ledger is back.
    let (status, reply) = app.post_webhook(body, Some(&header)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["outcome"], json!("issued"));
    assert_eq!(
        transfer_count(&app.mock().submitted()),
        1,
        "exactly one transfer was ever accepted"
    );
}

// =============================================================================
// Test: a refusal (asset not with the issuer) is terminal - acknowledged
// with 200 so the processor does NOT hammer a claim that cannot succeed
// =============================================================================
#[tokio::test]
async fn refused_claim_is_acknowledged_not_redelivered() {
    let app = TestApp::new(Decimal::ZERO);
    app.mock().set_holder(AssetId(3), third_party());

    let body = completed_body(3);
    let header = signed_header(&body);
    let (status, reply) = app.post_webhook(body, Some(&header)).await;

    assert_eq!(status, StatusCode::OK, "a 5xx here would cause pointless redelivery");
    assert_eq!(reply["outcome"], json!("failed"));

    let record = app.record(3).await;
    assert_eq!(record.status, ClaimStatus::Failed);
    assert_eq!(record.fault, Some(FaultKind::Rejected));
    assert_eq!(app.mock().submit_calls(), 0, "refusal happens before any submission");
}

// =============================================================================
// Test: transfer confirmed + reward refused still acknowledges as issued,
// with the unpaid reward flagged for out-of-band retry
// =============================================================================
#[tokio::test]
async fn partial_failure_reports_reward_pending() {
    let app = TestApp::new(Decimal::ZERO);
    app.mock()
        .script_confirm_hash(transfer_ref(7), TxHash::new("0x777"));
    app.mock()
        .script_submit_failure(reward_ref(7), FaultKind::Rejected);

    let body = serde_json::to_vec(&json!({
        "id": "evt_4",
        "type": "checkout.session.completed",
        "data": {
            "orderId": "cs_test_7",
            "recipient": RECIPIENT,
            "assetId": 7,
            "rewardAmount": "25",
        },
    }))
    .unwrap();
    let header = signed_header(&body);

    let (status, reply) = app.post_webhook(body, Some(&header)).await;

    assert_eq!(status, StatusCode::OK, "the buyer has the asset; never redeliver");
    assert_eq!(reply["outcome"], json!("issued"));
    assert_eq!(reply["txHash"], json!("0x777"));
    assert_eq!(reply["rewardPending"], json!(true));

    let record = app.record(7).await;
    assert_eq!(record.status, ClaimStatus::Issued);
    assert_eq!(record.reward_fault, Some(FaultKind::Rejected));
    assert!(record.reward_tx_hash.is_none());
}

// =============================================================================
// Test: probes and limits
// =============================================================================
#[tokio::test]
async fn healthz_is_open_and_versioned() {
    let app = TestApp::new(Decimal::ZERO);
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/healthz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let reply: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(reply["status"], json!("ok"));
    assert_eq!(reply["version"], json!(constants::VERSION));
}

#[tokio::test]
async fn oversized_body_is_refused() {
    let app = TestApp::new(Decimal::ZERO);
    let body = vec![b'a'; constants::MAX_WEBHOOK_BODY_BYTES + 1];
    let header = signed_header(&body);

    let (status, _) = app.post_webhook(body, Some(&header)).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(app.mock().total_calls(), 0);
    assert!(app.claims.is_empty());
}
