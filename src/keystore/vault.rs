use std::sync::Arc;

use tracing::info;
use zeroize::Zeroize;

use super::SecureStore;
use crate::auth::HmacSigner;
use crate::constants::store_keys;
use crate::errors::{Error, Result};
use crate::signer::KeyPair;
use crate::utils::SecureString;

/// Persists derived keys and API credentials under fixed names in a [`SecureStore`]
#[derive(Clone)]
pub struct KeyVault {
    store: Arc<dyn SecureStore>,
}

impl KeyVault {
    pub fn new(store: Arc<dyn SecureStore>) -> Self {
        Self { store }
    }

    pub fn backend_type(&self) -> &'static str {
        self.store.backend_type()
    }

    pub async fn store_l2_key(&self, account_index: u32, key_pair: &KeyPair) -> Result<()> {
        let mut private_hex = key_pair.private_hex();
        let result = self
            .store
            .set(&store_keys::l2_private_key(account_index), private_hex.as_bytes())
            .await;
        private_hex.zeroize();
        result?;

        info!(
            "Stored L2 key for account index {} in {} store",
            account_index,
            self.store.backend_type()
        );
        Ok(())
    }

    pub async fn load_l2_key(&self, account_index: u32) -> Result<Option<KeyPair>> {
        let Some(bytes) = self
            .store
            .get(&store_keys::l2_private_key(account_index))
            .await?
        else {
            return Ok(None);
        };
        let secret = SecureString::from_bytes(bytes);
        let private_hex = secret
            .as_str()
            .map_err(|_| Error::Storage("Stored L2 key is not valid UTF-8".to_string()))?;
        KeyPair::from_private_hex(private_hex).map(Some)
    }

    pub async fn delete_l2_key(&self, account_index: u32) -> Result<()> {
        self.store
            .delete(&store_keys::l2_private_key(account_index))
            .await
    }

    pub async fn store_mnemonic(&self, phrase: &SecureString) -> Result<()> {
        self.store
            .set(store_keys::MNEMONIC, phrase.as_bytes())
            .await
    }

    pub async fn load_mnemonic(&self) -> Result<Option<SecureString>> {
        Ok(self
            .store
            .get(store_keys::MNEMONIC)
            .await?
            .map(SecureString::from_bytes))
    }

    pub async fn store_api_credentials(
        &self,
        api_key: &str,
        api_secret: &SecureString,
    ) -> Result<()> {
        self.store
            .set(store_keys::API_KEY, api_key.as_bytes())
            .await?;
        self.store
            .set(store_keys::API_SECRET, api_secret.as_bytes())
            .await
    }

    /// HMAC signer from stored credentials, if both halves are present
    pub async fn load_hmac_signer(&self, user_agent: &str) -> Result<Option<HmacSigner>> {
        let api_key = self.store.get(store_keys::API_KEY).await?;
        let api_secret = self.store.get(store_keys::API_SECRET).await?;
        match (api_key, api_secret) {
            (Some(api_key), Some(api_secret)) => {
                let api_key = String::from_utf8(api_key)
                    .map_err(|_| Error::Storage("Stored API key is not valid UTF-8".to_string()))?;
                Ok(Some(HmacSigner::new(
                    api_key,
                    SecureString::from_bytes(api_secret),
                    user_agent,
                )))
            }
            _ => Ok(None),
        }
    }
}
