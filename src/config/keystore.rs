use super::types::Config;
use crate::auth::HmacSigner;
use crate::errors::Error;
use crate::keystore::{open_store, KeyVault};
use crate::utils::{resolve_secret, SecureString};

impl Config {
    /// Get passphrase securely for keystore operations
    pub fn get_keystore_passphrase(&self) -> Result<Option<SecureString>, Error> {
        if !self.store_backend()?.needs_passphrase() {
            return Ok(None); // Other backends don't need passphrase
        }
        let passphrase = resolve_secret(self.passphrase.clone(), "Enter keystore passphrase: ")
            .map_err(|e| Error::Config(format!("Failed to get passphrase: {e}")))?;
        Ok(Some(passphrase))
    }

    /// Open the configured secure store and wrap it in a vault
    pub fn open_vault(&self) -> Result<KeyVault, Error> {
        let backend = self.store_backend()?;
        let passphrase = self.get_keystore_passphrase()?;
        Ok(KeyVault::new(open_store(&backend, passphrase)?))
    }

    /// HMAC signer from `[api]` credentials, falling back to credentials kept in the vault
    pub async fn hmac_signer(&self, vault: Option<&KeyVault>) -> Result<Option<HmacSigner>, Error> {
        if let (Some(api_key), Some(api_secret)) = (&self.api.api_key, &self.api.api_secret) {
            return Ok(Some(HmacSigner::new(
                api_key.clone(),
                SecureString::from_string_slice(api_secret),
                &self.api.user_agent,
            )));
        }
        match vault {
            Some(vault) => vault.load_hmac_signer(&self.api.user_agent).await,
            None => Ok(None),
        }
    }
}
