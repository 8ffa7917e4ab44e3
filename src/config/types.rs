use serde::{Deserialize, Serialize};

use crate::constants::derivation::DEFAULT_SIGNING_DOMAIN;
use crate::constants::gasless::{
    BASE_DELAY_MS, BUILD_TYPED_DATA_PATH, CONNECT_TIMEOUT_SECS, COOLDOWN_SECS, ELIGIBILITY_PATH,
    EXECUTE_PATH, FAILURE_THRESHOLD, MAX_ATTEMPTS, MAX_JITTER_MS, RECEIVE_TIMEOUT_SECS,
};
use crate::signer::SigningStrategy;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub gasless: GaslessSection,
    pub retry: RetrySection,
    pub circuit_breaker: CircuitBreakerSection,
    pub signing: SigningConfig,
    pub keystore: KeystoreConfig,
    pub logging: LoggingConfig,
    /// Keystore passphrase; prefer the prompt over storing it here
    pub passphrase: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: None,
            api_secret: None,
            user_agent: format!("starknet-trade-signer/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GaslessSection {
    /// "SN_MAIN" or "SN_SEPOLIA"
    pub chain_id: String,
    pub eligibility_path: String,
    pub build_typed_data_path: String,
    pub execute_path: String,
    pub connect_timeout_secs: u64,
    pub receive_timeout_secs: u64,
    pub max_gas_estimate: Option<u64>,
    pub local_typed_data_fallback: bool,
}

impl Default for GaslessSection {
    fn default() -> Self {
        Self {
            chain_id: "SN_MAIN".to_string(),
            eligibility_path: ELIGIBILITY_PATH.to_string(),
            build_typed_data_path: BUILD_TYPED_DATA_PATH.to_string(),
            execute_path: EXECUTE_PATH.to_string(),
            connect_timeout_secs: CONNECT_TIMEOUT_SECS,
            receive_timeout_secs: RECEIVE_TIMEOUT_SECS,
            max_gas_estimate: None,
            local_typed_data_fallback: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_jitter_ms: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            base_delay_ms: BASE_DELAY_MS,
            max_jitter_ms: MAX_JITTER_MS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerSection {
    pub failure_threshold: u32,
    pub cooldown_secs: u64,
}

impl Default for CircuitBreakerSection {
    fn default() -> Self {
        Self {
            failure_threshold: FAILURE_THRESHOLD,
            cooldown_secs: COOLDOWN_SECS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SigningConfig {
    /// Tried in order until one produces a signature
    pub strategies: Vec<SigningStrategy>,
    pub domain: String,
    pub account_index: u32,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            strategies: vec![SigningStrategy::Primary, SigningStrategy::Fallback],
            domain: DEFAULT_SIGNING_DOMAIN.to_string(),
            account_index: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeystoreConfig {
    pub backend: String, // "memory", "file", "os_keyring"
    pub dir: Option<String>, // For file backend
    pub service: Option<String>, // For OS keyring backend
}

impl Default for KeystoreConfig {
    fn default() -> Self {
        Self {
            backend: "memory".to_string(),
            dir: None,
            service: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
