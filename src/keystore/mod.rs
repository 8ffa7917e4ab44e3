use async_trait::async_trait;

use crate::errors::Result;

pub mod backends;
pub mod encryption;
pub mod vault;

#[cfg(test)]
mod tests;

pub use backends::{
    open_store, EncryptedFileStore, MemoryStore, OsKeyringStore, StoreBackend,
};
pub use vault::KeyVault;

/// Key-value secret storage provided by the host platform
#[async_trait]
pub trait SecureStore: Send + Sync {
    /// Read a value; `None` when the key was never written or has been deleted
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    async fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Remove a value; deleting a missing key succeeds
    async fn delete(&self, key: &str) -> Result<()>;

    /// Short backend name for logs
    fn backend_type(&self) -> &'static str;
}

/// Keys are used as file names and keyring accounts, so keep them to a safe alphabet
pub(crate) fn validate_store_key(key: &str) -> Result<()> {
    let valid = !key.is_empty()
        && key.len() <= 128
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        && !key.starts_with('.');
    if valid {
        Ok(())
    } else {
        Err(crate::errors::Error::Validation(format!(
            "Invalid secure store key: {key:?}"
        )))
    }
}
