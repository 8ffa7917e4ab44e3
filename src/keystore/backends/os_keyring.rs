use async_trait::async_trait;
use tracing::debug;

use crate::errors::{Error, Result};
use crate::keystore::{validate_store_key, SecureStore};

/// Platform keyring (macOS Keychain, Linux keyutils). Values are stored hex-encoded
/// because keyring entries hold strings.
pub struct OsKeyringStore {
    service: String,
}

impl OsKeyringStore {
    pub fn new(service: String) -> Result<Self> {
        if service.trim().is_empty() {
            return Err(Error::Config(
                "Keyring service name cannot be empty".to_string(),
            ));
        }
        Ok(Self { service })
    }

    pub fn service(&self) -> &str {
        &self.service
    }
}

#[cfg(any(target_os = "linux", target_os = "macos"))]
fn entry(service: &str, key: &str) -> Result<keyring::Entry> {
    keyring::Entry::new(service, key)
        .map_err(|e| Error::Storage(format!("Failed to open keyring entry {key}: {e}")))
}

#[async_trait]
impl SecureStore for OsKeyringStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        validate_store_key(key)?;
        #[cfg(any(target_os = "linux", target_os = "macos"))]
        {
            match entry(&self.service, key)?.get_password() {
                Ok(encoded) => Ok(Some(hex::decode(encoded.trim()).map_err(|e| {
                    Error::Storage(format!("Keyring entry {key} is not valid hex: {e}"))
                })?)),
                Err(keyring::Error::NoEntry) => Ok(None),
                Err(e) => Err(Error::Storage(format!(
                    "Failed to read {key} from keyring: {e}"
                ))),
            }
        }
        #[cfg(not(any(target_os = "linux", target_os = "macos")))]
        {
            Err(unsupported())
        }
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        validate_store_key(key)?;
        #[cfg(any(target_os = "linux", target_os = "macos"))]
        {
            entry(&self.service, key)?
                .set_password(&hex::encode(value))
                .map_err(|e| Error::Storage(format!("Failed to store {key} in keyring: {e}")))?;
            debug!("Stored {} in keyring service {}", key, self.service);
            Ok(())
        }
        #[cfg(not(any(target_os = "linux", target_os = "macos")))]
        {
            let _ = value;
            Err(unsupported())
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        validate_store_key(key)?;
        #[cfg(any(target_os = "linux", target_os = "macos"))]
        {
            match entry(&self.service, key)?.delete_credential() {
                Ok(()) => {
                    debug!("Deleted {} from keyring service {}", key, self.service);
                    Ok(())
                }
                Err(keyring::Error::NoEntry) => Ok(()),
                Err(e) => Err(Error::Storage(format!(
                    "Failed to delete {key} from keyring: {e}"
                ))),
            }
        }
        #[cfg(not(any(target_os = "linux", target_os = "macos")))]
        {
            Err(unsupported())
        }
    }

    fn backend_type(&self) -> &'static str {
        "os_keyring"
    }
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn unsupported() -> Error {
    Error::Config("OS keyring backend is only supported on Linux and macOS".to_string())
}
