use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use starknet::macros::felt;
use tokio::time::Instant;

use super::circuit_breaker::BreakerState;
use super::client::{GaslessConfig, GaslessSponsorClient};
use super::transport::{HttpMethod, HttpRequest, HttpResponse, HttpTransport};
use super::types::TypedData;
use crate::auth::HmacSigner;
use crate::calls::{SponsoredCall, TradeCall, TradeSide, TransferCall};
use crate::constants::auth::{HEADER_SIGNATURE, HEADER_TIMESTAMP};
use crate::errors::{Error, ErrorKind, Result};
use crate::signer::{KeyDerivationEngine, KeyPair, OrderSigner};
use crate::utils::SecureString;

const ADDRESS: &str = "0x4a3b2c1d";
const BASE_URL: &str = "https://paymaster.test";

enum Step {
    Respond(u16, Value),
    Fail(Error),
    Hang,
}

/// Transport that replays a script; an exhausted script behaves like a dead network
struct ScriptedTransport {
    steps: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<(HttpRequest, Instant)>>,
}

impl ScriptedTransport {
    fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn push(&self, step: Step) {
        self.steps.lock().unwrap().push_back(step);
    }

    fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn requests(&self) -> Vec<(HttpRequest, Instant)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.requests
            .lock()
            .unwrap()
            .push((request, Instant::now()));
        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(Step::Respond(status, body)) => Ok(HttpResponse::new(status, body)),
            Some(Step::Fail(error)) => Err(error),
            Some(Step::Hang) => std::future::pending().await,
            None => Err(Error::Network("connection refused".to_string())),
        }
    }
}

fn config() -> GaslessConfig {
    GaslessConfig {
        base_url: BASE_URL.to_string(),
        ..Default::default()
    }
}

fn client(transport: &Arc<ScriptedTransport>) -> GaslessSponsorClient {
    GaslessSponsorClient::new(config(), transport.clone(), OrderSigner::default()).unwrap()
}

fn key_pair() -> KeyPair {
    KeyDerivationEngine::derive_from_hex_key(
        "0x50c8e358cc974aaaa6e460641e53f78bdc550fd372984aa78ef8fd27c751e6f4",
        0,
        "x10.exchange",
    )
    .unwrap()
}

fn transfer() -> SponsoredCall {
    TransferCall::new(felt!("0x49d36570"), felt!("0x123"), 1_000)
        .unwrap()
        .into()
}

fn eligible(remaining: u32) -> Step {
    Step::Respond(
        200,
        json!({"eligible": true, "remainingSponsored": remaining, "dailyLimit": 10}),
    )
}

fn typed_data_response(gas_estimate: u64) -> Step {
    let call = transfer().to_call().unwrap();
    let typed_data = TypedData::outside_execution(&[call], "SN_MAIN", felt!("0x99"), 0, 3600);
    Step::Respond(
        200,
        json!({"typedData": typed_data, "gasEstimate": gas_estimate}),
    )
}

async fn trip_breaker(client: &GaslessSponsorClient) {
    for _ in 0..3 {
        let err = client.check_eligibility(ADDRESS).await.unwrap_err();
        assert!(matches!(err, Error::RetriesExhausted { .. }));
    }
}

#[tokio::test(start_paused = true)]
async fn test_breaker_trips_after_three_failed_operations() {
    let transport = ScriptedTransport::new(vec![]);
    let client = client(&transport);

    trip_breaker(&client).await;
    assert_eq!(transport.request_count(), 9);

    let snapshot = client.breaker_snapshot().await;
    assert_eq!(snapshot.state, BreakerState::Open);
    assert_eq!(snapshot.failure_count, 3);

    let err = client.check_eligibility(ADDRESS).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CircuitBreakerOpen);
    assert!(err.should_use_fallback());
    assert_eq!(transport.request_count(), 9);
}

#[tokio::test(start_paused = true)]
async fn test_breaker_recovers_after_cooldown() {
    let transport = ScriptedTransport::new(vec![]);
    let client = client(&transport);
    trip_breaker(&client).await;

    tokio::time::advance(Duration::from_secs(119)).await;
    match client.check_eligibility(ADDRESS).await {
        Err(Error::CircuitBreakerOpen { retry_after }) => {
            assert_eq!(retry_after, Duration::from_secs(1));
        }
        other => panic!("expected open breaker, got {other:?}"),
    }

    tokio::time::advance(Duration::from_secs(1)).await;
    transport.push(eligible(5));
    let eligibility = client.check_eligibility(ADDRESS).await.unwrap();
    assert_eq!(eligibility.remaining_sponsored, 5);

    let snapshot = client.breaker_snapshot().await;
    assert_eq!(snapshot.state, BreakerState::Closed);
    assert_eq!(snapshot.failure_count, 0);
}

#[tokio::test(start_paused = true)]
async fn test_failed_trial_reopens_breaker() {
    let transport = ScriptedTransport::new(vec![]);
    let client = client(&transport);
    trip_breaker(&client).await;

    tokio::time::advance(Duration::from_secs(120)).await;
    assert!(client.check_eligibility(ADDRESS).await.is_err());
    assert_eq!(transport.request_count(), 12);

    let snapshot = client.breaker_snapshot().await;
    assert_eq!(snapshot.state, BreakerState::Open);
    assert_eq!(snapshot.failure_count, 4);
}

#[tokio::test(start_paused = true)]
async fn test_backoff_schedule_between_attempts() {
    let transport = ScriptedTransport::new(vec![]);
    let client = client(&transport);

    let err = client.check_eligibility(ADDRESS).await.unwrap_err();
    match err {
        Error::RetriesExhausted { attempts, .. } => assert_eq!(attempts, 3),
        other => panic!("expected exhaustion, got {other:?}"),
    }

    let times: Vec<Instant> = transport.requests().into_iter().map(|(_, at)| at).collect();
    assert_eq!(times.len(), 3);

    let first_gap = times[1] - times[0];
    let second_gap = times[2] - times[1];
    // Paused-clock timers fire on millisecond ticks
    assert!(first_gap >= Duration::from_millis(500) && first_gap <= Duration::from_millis(600));
    assert!(second_gap >= Duration::from_millis(1000) && second_gap <= Duration::from_millis(1100));
}

#[tokio::test(start_paused = true)]
async fn test_client_errors_do_not_trip_breaker() {
    let transport = ScriptedTransport::new(
        (0..4)
            .map(|_| Step::Respond(400, json!({"message": "unknown account"})))
            .collect(),
    );
    let client = client(&transport);

    for _ in 0..4 {
        let err = client.check_eligibility(ADDRESS).await.unwrap_err();
        assert!(matches!(err, Error::Api { status: 400, .. }));
        assert!(err.to_string().contains("unknown account"));
    }

    assert_eq!(transport.request_count(), 4);
    let snapshot = client.breaker_snapshot().await;
    assert_eq!(snapshot.state, BreakerState::Closed);
    assert_eq!(snapshot.failure_count, 0);
}

#[tokio::test(start_paused = true)]
async fn test_auth_failure_is_not_retried() {
    let transport = ScriptedTransport::new(vec![Step::Respond(
        401,
        json!({"error": "invalid signature"}),
    )]);
    let client = client(&transport);

    let err = client.check_eligibility(ADDRESS).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Auth);
    assert_eq!(transport.request_count(), 1);
    assert_eq!(client.breaker_snapshot().await.failure_count, 0);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_call_leaves_breaker_untouched() {
    let transport = ScriptedTransport::new(vec![Step::Hang]);
    let client = client(&transport);
    let before = client.breaker_snapshot().await;

    let timed_out =
        tokio::time::timeout(Duration::from_secs(5), client.check_eligibility(ADDRESS)).await;
    assert!(timed_out.is_err());

    assert_eq!(client.breaker_snapshot().await, before);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_trial_releases_half_open_slot() {
    let transport = ScriptedTransport::new(vec![]);
    let client = client(&transport);
    trip_breaker(&client).await;
    tokio::time::advance(Duration::from_secs(120)).await;

    transport.push(Step::Hang);
    let timed_out =
        tokio::time::timeout(Duration::from_secs(5), client.check_eligibility(ADDRESS)).await;
    assert!(timed_out.is_err());

    let snapshot = client.breaker_snapshot().await;
    assert_eq!(snapshot.state, BreakerState::HalfOpen);
    assert_eq!(snapshot.failure_count, 3);
    assert!(!snapshot.trial_in_flight);

    transport.push(eligible(2));
    client.check_eligibility(ADDRESS).await.unwrap();
    assert_eq!(client.breaker_snapshot().await.state, BreakerState::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_transport_cancellation_is_not_recorded() {
    let transport =
        ScriptedTransport::new(vec![Step::Fail(Error::Cancelled("caller aborted".to_string()))]);
    let client = client(&transport);

    let err = client.check_eligibility(ADDRESS).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert_eq!(transport.request_count(), 1);

    let snapshot = client.breaker_snapshot().await;
    assert_eq!(snapshot.state, BreakerState::Closed);
    assert_eq!(snapshot.failure_count, 0);
}

#[tokio::test(start_paused = true)]
async fn test_clones_share_breaker() {
    let transport = ScriptedTransport::new(vec![]);
    let client = client(&transport);
    let clone = client.clone();
    let separate = GaslessSponsorClient::new(
        config(),
        transport.clone(),
        OrderSigner::default(),
    )
    .unwrap();

    trip_breaker(&client).await;
    assert_eq!(clone.breaker_snapshot().await.state, BreakerState::Open);
    assert_eq!(separate.breaker_snapshot().await.state, BreakerState::Closed);

    clone.reset_breaker().await;
    assert_eq!(client.breaker_snapshot().await.state, BreakerState::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_typed_data_falls_back_to_local_outside_execution() {
    let transport = ScriptedTransport::new(
        (0..3)
            .map(|_| Step::Respond(503, json!("Service Unavailable")))
            .collect(),
    );
    let client = client(&transport);

    let typed_data = client.build_typed_data(ADDRESS, &[transfer()]).await.unwrap();
    typed_data.validate().unwrap();
    assert_eq!(typed_data.primary_type, "OutsideExecution");
    assert_eq!(typed_data.domain.chain_id, "SN_MAIN");
    assert_eq!(typed_data.message["Calls"][0]["To"], "0x49d36570");

    // The remote outage still counts against the breaker
    assert_eq!(client.breaker_snapshot().await.failure_count, 1);
}

#[tokio::test(start_paused = true)]
async fn test_typed_data_client_error_is_not_masked() {
    let transport = ScriptedTransport::new(vec![Step::Respond(
        400,
        json!({"message": "unsupported call"}),
    )]);
    let client = client(&transport);

    let err = client
        .build_typed_data(ADDRESS, &[transfer()])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Api { status: 400, .. }));
}

#[tokio::test(start_paused = true)]
async fn test_gas_estimate_limit() {
    let transport = ScriptedTransport::new(vec![typed_data_response(50_000)]);
    let config = GaslessConfig {
        max_gas_estimate: Some(10_000),
        ..config()
    };
    let client =
        GaslessSponsorClient::new(config, transport.clone(), OrderSigner::default()).unwrap();

    let err = client
        .build_typed_data(ADDRESS, &[transfer()])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test(start_paused = true)]
async fn test_request_sponsorship_success() {
    let transport = ScriptedTransport::new(vec![
        eligible(5),
        typed_data_response(21_000),
        Step::Respond(200, json!({"transactionHash": "0xabc123", "xpEarned": 10})),
    ]);
    let secret = "test_secret_key_123";
    let client = client(&transport).with_credentials(HmacSigner::new(
        "test-api-key",
        SecureString::from(secret),
        "starknet-trade-signer/test",
    ));

    let trade: SponsoredCall = TradeCall::new(
        felt!("0x3f32e152b9637c31bfcf73e434f78591067a01ba070505ff6ee195642c9acfb"),
        "BTC-USD",
        TradeSide::Buy,
        Decimal::from_str("0.1").unwrap(),
        Decimal::from_str("43250.5").unwrap(),
        1,
    )
    .unwrap()
    .into();
    let result = client
        .request_sponsorship(ADDRESS, &[transfer(), trade], &key_pair())
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.transaction_hash.as_deref(), Some("0xabc123"));
    assert_eq!(result.gas_sponsored, 21_000);
    assert_eq!(result.xp_earned, 10);

    let requests = transport.requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[0].0.method, HttpMethod::Get);
    assert_eq!(
        requests[0].0.url,
        format!("{BASE_URL}/paymaster/v1/eligibility/{ADDRESS}")
    );

    let build: Value = serde_json::from_str(requests[1].0.body.as_deref().unwrap()).unwrap();
    assert_eq!(build["userAddress"], ADDRESS);
    assert_eq!(build["calls"].as_array().unwrap().len(), 2);

    let execute = &requests[2].0;
    assert_eq!(execute.url, format!("{BASE_URL}/paymaster/v1/execute"));
    let body = execute.body.as_deref().unwrap();
    let parsed: Value = serde_json::from_str(body).unwrap();
    assert_eq!(parsed["account_address"], ADDRESS);
    assert_eq!(parsed["signature"].as_array().unwrap().len(), 3);
    assert_eq!(parsed["typed_data"]["primaryType"], "OutsideExecution");

    let header = |name: &str| {
        execute
            .headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
            .unwrap()
    };
    let timestamp: u64 = header(HEADER_TIMESTAMP).parse().unwrap();
    let expected = HmacSigner::sign(
        secret.as_bytes(),
        "POST",
        "/paymaster/v1/execute",
        body,
        Some(timestamp),
    )
    .unwrap();
    assert_eq!(header(HEADER_SIGNATURE), expected);
}

#[tokio::test(start_paused = true)]
async fn test_request_sponsorship_with_exhausted_allowance() {
    let transport = ScriptedTransport::new(vec![eligible(0)]);
    let client = client(&transport);

    let result = client
        .request_sponsorship(ADDRESS, &[transfer()], &key_pair())
        .await
        .unwrap();

    assert!(!result.success);
    assert!(result.error_message.unwrap().contains("allowance"));
    assert_eq!(transport.request_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_request_sponsorship_reports_ineligible_reason() {
    let transport = ScriptedTransport::new(vec![Step::Respond(
        200,
        json!({"eligible": false, "remainingSponsored": 3, "dailyLimit": 10, "reason": "account not deployed"}),
    )]);
    let client = client(&transport);

    let result = client
        .request_sponsorship(ADDRESS, &[transfer()], &key_pair())
        .await
        .unwrap();
    assert!(!result.success);
    assert_eq!(result.error_message.as_deref(), Some("account not deployed"));
}

#[tokio::test(start_paused = true)]
async fn test_request_sponsorship_degrades_when_breaker_open() {
    let transport = ScriptedTransport::new(vec![]);
    let client = client(&transport);
    trip_breaker(&client).await;

    let result = client
        .request_sponsorship(ADDRESS, &[transfer()], &key_pair())
        .await
        .unwrap();
    assert!(!result.success);
    assert!(result.error_message.unwrap().contains("Circuit breaker"));
    assert_eq!(transport.request_count(), 9);
}

#[tokio::test(start_paused = true)]
async fn test_request_sponsorship_propagates_validation() {
    let transport = ScriptedTransport::new(vec![]);
    let client = client(&transport);

    let err = client
        .request_sponsorship("not-an-address", &[transfer()], &key_pair())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = client
        .request_sponsorship(ADDRESS, &[], &key_pair())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_execute_requires_transaction_hash() {
    let transport = ScriptedTransport::new(vec![Step::Respond(200, json!({"status": "queued"}))]);
    let client = client(&transport);
    let call = transfer().to_call().unwrap();
    let typed_data = TypedData::outside_execution(&[call], "SN_MAIN", felt!("0x1"), 0, 3600);
    let signature = OrderSigner::default()
        .sign_order(&key_pair(), &typed_data.canonical_fields())
        .unwrap();

    let err = client
        .execute_sponsored_transaction(ADDRESS, &typed_data, &signature)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Serialization);
}
