use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;

use super::types::*;
use crate::cli::GlobalArgs;
use crate::errors::Error;
use crate::gasless::{CircuitBreakerConfig, GaslessConfig, RetryPolicy};
use crate::keystore::StoreBackend;
use crate::signer::OrderSigner;

const DEFAULT_KEYRING_SERVICE: &str = "starknet-trade-signer";

impl Config {
    /// Load configuration from CLI arguments and optional config file
    pub fn load(cli: &GlobalArgs) -> Result<Self> {
        let file_config = match &cli.config {
            Some(config_path) => Self::load_from_file(config_path)?,
            None => Self::default(),
        };

        Ok(Self::merge_configurations(file_config, cli))
    }

    /// Load configuration from a TOML file
    fn load_from_file(config_path: &str) -> Result<Self, Error> {
        let config_content = fs::read_to_string(config_path).map_err(|e| {
            Error::Config(format!("Failed to read config file {config_path}: {e}"))
        })?;

        Self::from_toml_str(&config_content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, Error> {
        toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse config file: {e}")))
    }

    /// Explicit CLI args (or their environment variables) override config file values
    fn merge_configurations(mut config: Self, cli: &GlobalArgs) -> Self {
        if let Some(base_url) = &cli.base_url {
            config.api.base_url = base_url.clone();
        }
        if let Some(api_key) = &cli.api_key {
            config.api.api_key = Some(api_key.clone());
        }
        if let Some(api_secret) = &cli.api_secret {
            config.api.api_secret = Some(api_secret.clone());
        }
        if let Some(chain_id) = &cli.chain_id {
            config.gasless.chain_id = chain_id.clone();
        }

        if let Some(backend) = &cli.keystore_backend {
            config.keystore.backend = backend.clone();
        }
        if cli.keystore_dir.is_some() {
            config.keystore.dir = cli.keystore_dir.clone();
        }
        if cli.keyring_service.is_some() {
            config.keystore.service = cli.keyring_service.clone();
        }
        if cli.passphrase.is_some() {
            config.passphrase = cli.passphrase.clone();
        }

        if let Some(level) = &cli.log_level {
            config.logging.level = level.clone();
        }

        config
    }

    /// Sponsor client settings derived from the `[api]`, `[gasless]`, `[retry]` and
    /// `[circuit_breaker]` sections
    pub fn to_gasless_config(&self) -> GaslessConfig {
        GaslessConfig {
            base_url: self.api.base_url.trim_end_matches('/').to_string(),
            chain_id: self.gasless.chain_id.clone(),
            user_agent: self.api.user_agent.clone(),
            eligibility_path: self.gasless.eligibility_path.clone(),
            build_typed_data_path: self.gasless.build_typed_data_path.clone(),
            execute_path: self.gasless.execute_path.clone(),
            connect_timeout: Duration::from_secs(self.gasless.connect_timeout_secs),
            receive_timeout: Duration::from_secs(self.gasless.receive_timeout_secs),
            retry: RetryPolicy {
                max_attempts: self.retry.max_attempts,
                base_delay: Duration::from_millis(self.retry.base_delay_ms),
                max_jitter: Duration::from_millis(self.retry.max_jitter_ms),
            },
            circuit_breaker: CircuitBreakerConfig {
                failure_threshold: self.circuit_breaker.failure_threshold,
                cooldown: Duration::from_secs(self.circuit_breaker.cooldown_secs),
            },
            max_gas_estimate: self.gasless.max_gas_estimate,
            local_typed_data_fallback: self.gasless.local_typed_data_fallback,
        }
    }

    pub fn order_signer(&self) -> Result<OrderSigner, Error> {
        OrderSigner::new(self.signing.strategies.clone())
    }

    /// Store backend selected by the `[keystore]` section
    pub fn store_backend(&self) -> Result<StoreBackend, Error> {
        match self.keystore.backend.as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "file" => {
                let dir = self
                    .keystore
                    .dir
                    .as_ref()
                    .ok_or_else(|| Error::Config("Keystore directory not set".to_string()))?;
                Ok(StoreBackend::EncryptedFile {
                    dir: PathBuf::from(dir),
                })
            }
            "os_keyring" => Ok(StoreBackend::OsKeyring {
                service: self
                    .keystore
                    .service
                    .clone()
                    .unwrap_or_else(|| DEFAULT_KEYRING_SERVICE.to_string()),
            }),
            other => Err(Error::Config(format!(
                "Unknown keystore backend: {other}. Supported backends: memory, file, os_keyring"
            ))),
        }
    }
}
