use tracing::warn;

use super::types::Config;
use crate::constants::chain_id_from_name;
use crate::errors::Error;
use crate::signer::SigningStrategy;

impl Config {
    /// Validate the configuration settings
    pub fn validate(&self) -> Result<(), Error> {
        self.validate_api()?;
        self.validate_local()
    }

    /// Everything except the API section, for commands that never reach the network
    pub fn validate_local(&self) -> Result<(), Error> {
        self.validate_gasless()?;
        self.validate_resilience()?;
        self.validate_signing()?;
        self.validate_keystore()?;

        Ok(())
    }

    fn validate_api(&self) -> Result<(), Error> {
        let base_url = self.api.base_url.trim();
        if base_url.is_empty() {
            return Err(Error::Config(
                "API base URL is required (set [api].base_url or --base-url)".to_string(),
            ));
        }
        if !base_url.starts_with("https://") && !base_url.starts_with("http://") {
            return Err(Error::Config(format!(
                "API base URL must start with http:// or https://: '{base_url}'"
            )));
        }
        if base_url.starts_with("http://") {
            warn!("⚠️  SECURITY WARNING: API base URL is not using TLS");
        }

        if self.api.api_key.is_some() != self.api.api_secret.is_some() {
            return Err(Error::Config(
                "API key and API secret must be configured together".to_string(),
            ));
        }

        Ok(())
    }

    fn validate_gasless(&self) -> Result<(), Error> {
        if chain_id_from_name(&self.gasless.chain_id).is_none() {
            return Err(Error::Config(format!(
                "Unknown chain ID: '{}'. Supported chains: SN_MAIN, SN_SEPOLIA",
                self.gasless.chain_id
            )));
        }

        for (name, path) in [
            ("eligibility_path", &self.gasless.eligibility_path),
            ("build_typed_data_path", &self.gasless.build_typed_data_path),
            ("execute_path", &self.gasless.execute_path),
        ] {
            if !path.starts_with('/') {
                return Err(Error::Config(format!(
                    "[gasless].{name} must start with '/': '{path}'"
                )));
            }
        }

        if self.gasless.connect_timeout_secs == 0 || self.gasless.receive_timeout_secs == 0 {
            return Err(Error::Config(
                "Gasless timeouts must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Retry and circuit breaker settings
    fn validate_resilience(&self) -> Result<(), Error> {
        if self.retry.max_attempts == 0 {
            return Err(Error::Config(
                "[retry].max_attempts must be at least 1".to_string(),
            ));
        }
        if self.circuit_breaker.failure_threshold == 0 {
            return Err(Error::Config(
                "[circuit_breaker].failure_threshold must be at least 1".to_string(),
            ));
        }
        if self.circuit_breaker.cooldown_secs == 0 {
            return Err(Error::Config(
                "[circuit_breaker].cooldown_secs must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    fn validate_signing(&self) -> Result<(), Error> {
        if self.signing.strategies.is_empty() {
            return Err(Error::Config(
                "At least one signing strategy is required".to_string(),
            ));
        }
        if self.signing.domain.trim().is_empty() {
            return Err(Error::Config("Signing domain cannot be empty".to_string()));
        }

        if self.signing.strategies.contains(&SigningStrategy::Mock) {
            warn!("⚠️  Mock signing strategy enabled; its signatures are not verifiable");
        }

        Ok(())
    }

    fn validate_keystore(&self) -> Result<(), Error> {
        match self.keystore.backend.as_str() {
            "memory" => {
                tracing::debug!("🧠 Memory keystore configured; keys are lost on exit");
            }
            "file" => {
                if self.keystore.dir.is_none() {
                    return Err(Error::Config(
                        "Keystore directory is required for file backend".to_string(),
                    ));
                }
                if let Some(dir) = &self.keystore.dir {
                    tracing::debug!("🔐 Keys will be stored as encrypted files in '{}'", dir);
                }
            }
            "os_keyring" => {
                self.validate_os_keyring()?;
            }
            _ => {
                return Err(Error::Config(format!(
                    "Unknown keystore backend: '{}'",
                    self.keystore.backend
                )));
            }
        }

        if self.passphrase.is_some() {
            warn!("⚠️  Keystore passphrase set in configuration; prefer the interactive prompt");
        }

        Ok(())
    }

    fn validate_os_keyring(&self) -> Result<(), Error> {
        #[cfg(target_env = "musl")]
        {
            warn!("⚠️  MUSL target detected: OS keyring functionality is limited");
            return Err(Error::Config(
                "OS keyring backend is not available on MUSL targets. Use the file backend instead."
                    .to_string(),
            ));
        }

        #[cfg(not(any(target_os = "linux", target_os = "macos")))]
        {
            return Err(Error::Config(
                "OS keyring backend is only supported on Linux and macOS".to_string(),
            ));
        }

        #[cfg(all(any(target_os = "linux", target_os = "macos"), not(target_env = "musl")))]
        {
            tracing::debug!("📱 OS keyring backend configured");
            Ok(())
        }
    }
}
