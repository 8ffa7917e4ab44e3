use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use zeroize::Zeroizing;

use crate::errors::Result;
use crate::keystore::{validate_store_key, SecureStore};

/// In-process store for tests and ephemeral sessions
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Zeroizing<Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SecureStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        validate_store_key(key)?;
        let entries = self.entries.lock().await;
        Ok(entries.get(key).map(|value| value.to_vec()))
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        validate_store_key(key)?;
        self.entries
            .lock()
            .await
            .insert(key.to_string(), Zeroizing::new(value.to_vec()));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        validate_store_key(key)?;
        self.entries.lock().await.remove(key);
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}
