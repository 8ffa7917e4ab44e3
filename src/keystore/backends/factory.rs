use std::sync::Arc;

use tracing::info;

use super::{EncryptedFileStore, MemoryStore, OsKeyringStore, StoreBackend};
use crate::errors::{Error, Result};
use crate::keystore::SecureStore;
use crate::utils::SecureString;

/// Build the configured store; the encrypted file backend requires a passphrase
pub fn open_store(
    backend: &StoreBackend,
    passphrase: Option<SecureString>,
) -> Result<Arc<dyn SecureStore>> {
    let store: Arc<dyn SecureStore> = match backend {
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
        StoreBackend::EncryptedFile { dir } => {
            let passphrase = passphrase.ok_or_else(|| {
                Error::Config("The file keystore backend requires a passphrase".to_string())
            })?;
            Arc::new(EncryptedFileStore::new(dir.clone(), passphrase)?)
        }
        StoreBackend::OsKeyring { service } => Arc::new(OsKeyringStore::new(service.clone())?),
    };
    info!("Opened {} secure store", store.backend_type());
    Ok(store)
}
