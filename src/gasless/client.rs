use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::RngCore;
use serde_json::Value;
use starknet_crypto::Felt;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::circuit_breaker::{BreakerSnapshot, CircuitBreaker, CircuitBreakerConfig};
use super::retry::{self, RetryPolicy};
use super::transport::{HttpMethod, HttpRequest, HttpTransport, ReqwestTransport};
use super::types::{
    BuildTypedDataRequest, BuildTypedDataResponse, Eligibility, ExecuteRequest, ExecuteResponse,
    SponsorshipResult, TypedData,
};
use crate::auth::HmacSigner;
use crate::calls::{to_wire_calls, SponsoredCall};
use crate::constants::auth::{CONTENT_TYPE_JSON, HEADER_CONTENT_TYPE, HEADER_USER_AGENT};
use crate::constants::gasless::{
    BUILD_TYPED_DATA_PATH, CONNECT_TIMEOUT_SECS, ELIGIBILITY_PATH, EXECUTE_PATH,
    OUTSIDE_EXECUTION_WINDOW_SECS, RECEIVE_TIMEOUT_SECS,
};
use crate::errors::{Error, ErrorKind, Result};
use crate::signer::field::parse_felt;
use crate::signer::{KeyPair, OrderSigner, SignaturePayload};

/// Settings of one sponsor client
#[derive(Debug, Clone)]
pub struct GaslessConfig {
    pub base_url: String,
    pub chain_id: String,
    pub user_agent: String,
    pub eligibility_path: String,
    pub build_typed_data_path: String,
    pub execute_path: String,
    pub connect_timeout: Duration,
    pub receive_timeout: Duration,
    pub retry: RetryPolicy,
    pub circuit_breaker: CircuitBreakerConfig,
    /// Reject paymaster quotes above this gas estimate
    pub max_gas_estimate: Option<u64>,
    /// Build SNIP-9 typed data locally when the paymaster is unreachable
    pub local_typed_data_fallback: bool,
}

impl Default for GaslessConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            chain_id: "SN_MAIN".to_string(),
            user_agent: format!("starknet-trade-signer/{}", env!("CARGO_PKG_VERSION")),
            eligibility_path: ELIGIBILITY_PATH.to_string(),
            build_typed_data_path: BUILD_TYPED_DATA_PATH.to_string(),
            execute_path: EXECUTE_PATH.to_string(),
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            receive_timeout: Duration::from_secs(RECEIVE_TIMEOUT_SECS),
            retry: RetryPolicy::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            max_gas_estimate: None,
            local_typed_data_fallback: true,
        }
    }
}

/// Paymaster client that sponsors transactions for trading accounts.
///
/// Every remote call passes the circuit breaker and the retry executor. Clones share one
/// breaker; separately constructed clients do not.
#[derive(Clone)]
pub struct GaslessSponsorClient {
    config: Arc<GaslessConfig>,
    transport: Arc<dyn HttpTransport>,
    signer: OrderSigner,
    auth: Option<HmacSigner>,
    breaker: Arc<Mutex<CircuitBreaker>>,
}

impl GaslessSponsorClient {
    pub fn new(
        config: GaslessConfig,
        transport: Arc<dyn HttpTransport>,
        signer: OrderSigner,
    ) -> Result<Self> {
        if config.base_url.trim().is_empty() {
            return Err(Error::Config("Paymaster base URL is required".to_string()));
        }
        info!(
            "Gasless sponsor client configured for {} (chain {})",
            config.base_url, config.chain_id
        );
        let breaker = CircuitBreaker::new(config.circuit_breaker);
        Ok(Self {
            config: Arc::new(config),
            transport,
            signer,
            auth: None,
            breaker: Arc::new(Mutex::new(breaker)),
        })
    }

    /// Client backed by `reqwest` with the configured timeouts
    pub fn with_reqwest(config: GaslessConfig, signer: OrderSigner) -> Result<Self> {
        let transport = ReqwestTransport::new(config.connect_timeout, config.receive_timeout)?;
        Self::new(config, Arc::new(transport), signer)
    }

    /// Attach API credentials; every request then carries HMAC headers
    pub fn with_credentials(mut self, auth: HmacSigner) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn config(&self) -> &GaslessConfig {
        &self.config
    }

    pub async fn check_eligibility(&self, address: &str) -> Result<Eligibility> {
        parse_felt(address)?;
        let path = format!(
            "{}/{}",
            self.config.eligibility_path.trim_end_matches('/'),
            address
        );
        let body = self
            .call("check_eligibility", HttpMethod::Get, &path, None)
            .await?;
        let eligibility: Eligibility = serde_json::from_value(body)?;

        debug!(
            "Eligibility for {}: eligible={} remaining={}/{}",
            address, eligibility.eligible, eligibility.remaining_sponsored, eligibility.daily_limit
        );
        Ok(eligibility)
    }

    pub async fn build_typed_data(
        &self,
        address: &str,
        calls: &[SponsoredCall],
    ) -> Result<TypedData> {
        let (typed_data, _) = self.build_typed_data_with_estimate(address, calls).await?;
        Ok(typed_data)
    }

    pub async fn execute_sponsored_transaction(
        &self,
        address: &str,
        typed_data: &TypedData,
        signature: &SignaturePayload,
    ) -> Result<String> {
        let (transaction_hash, _) = self.execute(address, typed_data, signature).await?;
        Ok(transaction_hash)
    }

    /// Eligibility, typed data, signature and execution in one flow.
    ///
    /// Failures that the caller should handle by paying gas itself come back as
    /// `success = false`; validation and signing errors are returned as errors.
    pub async fn request_sponsorship(
        &self,
        address: &str,
        calls: &[SponsoredCall],
        key_pair: &KeyPair,
    ) -> Result<SponsorshipResult> {
        parse_felt(address)?;
        if calls.is_empty() {
            return Err(Error::Validation(
                "At least one call is required for sponsorship".to_string(),
            ));
        }

        let eligibility = match self.check_eligibility(address).await {
            Ok(eligibility) => eligibility,
            Err(e) => return degrade(e),
        };
        if eligibility.remaining_sponsored == 0 {
            return degrade(Error::InsufficientAllowance {
                remaining: eligibility.remaining_sponsored,
                limit: eligibility.daily_limit,
            });
        }
        if !eligibility.eligible {
            let reason = eligibility
                .reason
                .unwrap_or_else(|| "Account is not eligible for sponsorship".to_string());
            info!("Sponsorship declined for {}: {}", address, reason);
            return Ok(SponsorshipResult::failed(reason));
        }

        let (typed_data, gas_estimate) =
            match self.build_typed_data_with_estimate(address, calls).await {
                Ok(built) => built,
                Err(e) => return degrade(e),
            };

        let signature = self
            .signer
            .sign_order(key_pair, &typed_data.canonical_fields())?;

        match self.execute(address, &typed_data, &signature).await {
            Ok((transaction_hash, response)) => {
                let gas_sponsored = response
                    .gas_sponsored
                    .or(gas_estimate)
                    .unwrap_or_default();
                info!(
                    "Sponsored transaction {} for {} ({} gas)",
                    transaction_hash, address, gas_sponsored
                );
                Ok(SponsorshipResult::succeeded(
                    transaction_hash,
                    gas_sponsored,
                    response.xp_earned.unwrap_or_default(),
                ))
            }
            Err(e) => degrade(e),
        }
    }

    pub async fn breaker_snapshot(&self) -> BreakerSnapshot {
        self.breaker.lock().await.snapshot()
    }

    pub async fn reset_breaker(&self) {
        info!("Circuit breaker reset by operator");
        self.breaker.lock().await.reset();
    }

    async fn build_typed_data_with_estimate(
        &self,
        address: &str,
        calls: &[SponsoredCall],
    ) -> Result<(TypedData, Option<u64>)> {
        parse_felt(address)?;
        let wire_calls = to_wire_calls(calls)?;
        let request = BuildTypedDataRequest {
            user_address: address.to_string(),
            calls: wire_calls.iter().map(|call| call.to_json()).collect(),
        };
        let body = serde_json::to_value(&request)?;

        let remote = self
            .call(
                "build_typed_data",
                HttpMethod::Post,
                &self.config.build_typed_data_path,
                Some(body),
            )
            .await;

        let (typed_data, gas_estimate) = match remote {
            Ok(body) => {
                let response: BuildTypedDataResponse = serde_json::from_value(body)?;
                (response.typed_data, response.gas_estimate)
            }
            Err(e) if self.config.local_typed_data_fallback && e.should_use_fallback() => {
                warn!(
                    "Paymaster could not build typed data ({}), building outside execution locally",
                    e
                );
                let now = u64::try_from(Utc::now().timestamp()).unwrap_or_default();
                let typed_data = TypedData::outside_execution(
                    &wire_calls,
                    &self.config.chain_id,
                    random_nonce(),
                    now.saturating_sub(OUTSIDE_EXECUTION_WINDOW_SECS),
                    now + OUTSIDE_EXECUTION_WINDOW_SECS,
                );
                (typed_data, None)
            }
            Err(e) => return Err(e),
        };

        typed_data.validate()?;
        if let (Some(limit), Some(estimate)) = (self.config.max_gas_estimate, gas_estimate) {
            if estimate > limit {
                return Err(Error::Validation(format!(
                    "Gas estimate {estimate} exceeds the configured limit {limit}"
                )));
            }
        }
        Ok((typed_data, gas_estimate))
    }

    async fn execute(
        &self,
        address: &str,
        typed_data: &TypedData,
        signature: &SignaturePayload,
    ) -> Result<(String, ExecuteResponse)> {
        parse_felt(address)?;
        typed_data.validate()?;

        let request = ExecuteRequest {
            account_address: address,
            typed_data,
            signature: signature.to_wire(),
        };
        let body = serde_json::to_value(&request)?;
        let response = self
            .call(
                "execute_sponsored_transaction",
                HttpMethod::Post,
                &self.config.execute_path,
                Some(body),
            )
            .await?;
        let response: ExecuteResponse = serde_json::from_value(response)?;
        if response.transaction_hash.trim().is_empty() {
            return Err(Error::Serialization(
                "Paymaster returned an empty transaction hash".to_string(),
            ));
        }
        Ok((response.transaction_hash.clone(), response))
    }

    /// Breaker admission, retries and breaker bookkeeping around one logical operation
    async fn call(
        &self,
        operation: &str,
        method: HttpMethod,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value> {
        let permit = self.breaker.lock().await.try_acquire(Instant::now())?;
        if permit.is_trial() {
            info!("{} is the half-open trial request", operation);
        }

        let body = body.map(|b| serde_json::to_string(&b)).transpose()?;
        let body_ref = body.as_deref();
        let client = self;
        let outcome = retry::run(&self.config.retry, operation, move |_| {
            client.send_once(method, path, body_ref)
        })
        .await;

        // Dropping the future before this point leaves the breaker untouched
        let mut breaker = self.breaker.lock().await;
        match &outcome {
            Ok(_) => breaker.record_success(permit),
            Err(e) if e.kind() == ErrorKind::Cancelled => drop(permit),
            Err(e) if e.is_remote_failure() => breaker.record_failure(permit, Instant::now()),
            Err(_) => breaker.record_success(permit),
        }
        outcome
    }

    async fn send_once(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&str>,
    ) -> Result<Value> {
        let mut headers = Vec::new();
        match &self.auth {
            Some(auth) => {
                let auth_headers =
                    auth.generate_auth_headers(method.as_str(), path, body.unwrap_or(""), None)?;
                headers.extend(auth_headers.to_pairs());
            }
            None => {
                headers.push((HEADER_CONTENT_TYPE.to_string(), CONTENT_TYPE_JSON.to_string()));
                headers.push((HEADER_USER_AGENT.to_string(), self.config.user_agent.clone()));
            }
        }

        let request = HttpRequest {
            method,
            url: format!("{}{}", self.config.base_url.trim_end_matches('/'), path),
            headers,
            body: body.map(str::to_string),
        };
        let response = self.transport.send(request).await?;
        if response.is_success() {
            return Ok(response.body);
        }
        Err(Error::from_status(
            response.status,
            error_message(&response.body),
        ))
    }
}

/// Convert fallback-eligible failures into an unsuccessful result
fn degrade(error: Error) -> Result<SponsorshipResult> {
    if error.should_use_fallback() {
        warn!("Sponsorship unavailable, caller should pay gas: {}", error);
        Ok(SponsorshipResult::failed(error.to_string()))
    } else {
        Err(error)
    }
}

fn error_message(body: &Value) -> String {
    ["message", "error", "detail"]
        .iter()
        .find_map(|key| body.get(key).and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| match body {
            Value::String(text) => text.clone(),
            Value::Null => "empty response".to_string(),
            other => other.to_string(),
        })
}

fn random_nonce() -> Felt {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    Felt::from(u128::from_be_bytes(bytes))
}
