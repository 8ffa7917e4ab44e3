use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, info};

use crate::errors::{Error, Result};
use crate::keystore::encryption::{decrypt_value, encrypt_value};
use crate::keystore::{validate_store_key, SecureStore};
use crate::utils::SecureString;

const ENTRY_EXTENSION: &str = "jwe";

/// Directory of JWE-encrypted entries, one file per key, all under one passphrase
pub struct EncryptedFileStore {
    dir: PathBuf,
    passphrase: SecureString,
}

impl EncryptedFileStore {
    pub fn new(dir: PathBuf, passphrase: SecureString) -> Result<Self> {
        if passphrase.is_empty() {
            return Err(Error::Config(
                "Keystore passphrase cannot be empty".to_string(),
            ));
        }
        Ok(Self { dir, passphrase })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.{ENTRY_EXTENSION}"))
    }

    async fn ensure_dir(&self) -> Result<()> {
        if fs::try_exists(&self.dir).await.unwrap_or(false) {
            return Ok(());
        }
        fs::create_dir_all(&self.dir).await.map_err(|e| {
            Error::Storage(format!(
                "Failed to create keystore directory {}: {e}",
                self.dir.display()
            ))
        })?;
        restrict_permissions(&self.dir, 0o700).await?;
        info!("Created keystore directory: {}", self.dir.display());
        Ok(())
    }
}

#[async_trait]
impl SecureStore for EncryptedFileStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        validate_store_key(key)?;
        let path = self.entry_path(key);
        let token = match fs::read_to_string(&path).await {
            Ok(token) => token,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Error::Storage(format!(
                    "Failed to read {}: {e}",
                    path.display()
                )))
            }
        };
        decrypt_value(&token, self.passphrase.as_bytes()).map(Some)
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        validate_store_key(key)?;
        self.ensure_dir().await?;

        let token = encrypt_value(value, self.passphrase.as_bytes())?;
        let path = self.entry_path(key);
        let tmp_path = self.dir.join(format!(".{key}.{ENTRY_EXTENSION}.tmp"));

        fs::write(&tmp_path, token.as_bytes()).await.map_err(|e| {
            Error::Storage(format!("Failed to write {}: {e}", tmp_path.display()))
        })?;
        restrict_permissions(&tmp_path, 0o600).await?;
        fs::rename(&tmp_path, &path).await.map_err(|e| {
            Error::Storage(format!("Failed to replace {}: {e}", path.display()))
        })?;

        debug!("Stored encrypted entry {}", path.display());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        validate_store_key(key)?;
        let path = self.entry_path(key);
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Deleted encrypted entry {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Storage(format!(
                "Failed to delete {}: {e}",
                path.display()
            ))),
        }
    }

    fn backend_type(&self) -> &'static str {
        "file"
    }
}

#[cfg(unix)]
async fn restrict_permissions(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .await
        .map_err(|e| {
            Error::Storage(format!(
                "Failed to set permissions on {}: {e}",
                path.display()
            ))
        })
}

#[cfg(not(unix))]
async fn restrict_permissions(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}
