use std::sync::Arc;

use tempfile::TempDir;

use super::backends::{open_store, EncryptedFileStore, MemoryStore, StoreBackend};
use super::{KeyVault, SecureStore};
use crate::errors::ErrorKind;
use crate::signer::KeyDerivationEngine;
use crate::utils::SecureString;

const PASSPHRASE: &str = "test_password_123";

fn file_store(dir: &TempDir, passphrase: &str) -> EncryptedFileStore {
    EncryptedFileStore::new(
        dir.path().join("keys"),
        SecureString::from_string_slice(passphrase),
    )
    .unwrap()
}

#[tokio::test]
async fn test_memory_store_round_trip() {
    let store = MemoryStore::new();
    assert_eq!(store.get("api_key").await.unwrap(), None);

    store.set("api_key", b"key-123").await.unwrap();
    assert_eq!(store.get("api_key").await.unwrap(), Some(b"key-123".to_vec()));

    store.delete("api_key").await.unwrap();
    store.delete("api_key").await.unwrap();
    assert_eq!(store.get("api_key").await.unwrap(), None);
}

#[tokio::test]
async fn test_invalid_keys_are_rejected() {
    let store = MemoryStore::new();
    for key in ["", "../escape", ".hidden", "with space"] {
        let err = store.set(key, b"x").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}

#[tokio::test]
async fn test_encrypted_file_store_round_trip() {
    let dir = TempDir::new().unwrap();
    let store = file_store(&dir, PASSPHRASE);

    store.set("mnemonic", b"abandon ability able").await.unwrap();
    assert_eq!(
        store.get("mnemonic").await.unwrap(),
        Some(b"abandon ability able".to_vec())
    );

    let raw = std::fs::read_to_string(store.dir().join("mnemonic.jwe")).unwrap();
    assert!(!raw.contains("abandon"));

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(store.dir().join("mnemonic.jwe"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    store.delete("mnemonic").await.unwrap();
    assert_eq!(store.get("mnemonic").await.unwrap(), None);
}

#[tokio::test]
async fn test_encrypted_file_store_wrong_passphrase() {
    let dir = TempDir::new().unwrap();
    file_store(&dir, PASSPHRASE)
        .set("api_secret", b"s3cret")
        .await
        .unwrap();

    let err = file_store(&dir, "not_the_password")
        .get("api_secret")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Crypto);
}

#[tokio::test]
async fn test_open_store_requires_passphrase_for_files() {
    let dir = TempDir::new().unwrap();
    let backend = StoreBackend::EncryptedFile {
        dir: dir.path().to_path_buf(),
    };
    assert!(backend.needs_passphrase());
    assert!(open_store(&backend, None).is_err());

    let store = open_store(&backend, Some(SecureString::from(PASSPHRASE))).unwrap();
    assert_eq!(store.backend_type(), "file");

    let memory = open_store(&StoreBackend::Memory, None).unwrap();
    assert_eq!(memory.backend_type(), "memory");
}

#[tokio::test]
async fn test_vault_persists_l2_keys() {
    let dir = TempDir::new().unwrap();
    let vault = KeyVault::new(Arc::new(file_store(&dir, PASSPHRASE)));
    let key_pair = KeyDerivationEngine::derive_from_hex_key(
        "0x50c8e358cc974aaaa6e460641e53f78bdc550fd372984aa78ef8fd27c751e6f4",
        4,
        "x10.exchange",
    )
    .unwrap();

    assert!(vault.load_l2_key(4).await.unwrap().is_none());
    vault.store_l2_key(4, &key_pair).await.unwrap();

    let restored = vault.load_l2_key(4).await.unwrap().unwrap();
    assert_eq!(restored, key_pair);
    assert!(vault.load_l2_key(5).await.unwrap().is_none());

    vault.delete_l2_key(4).await.unwrap();
    assert!(vault.load_l2_key(4).await.unwrap().is_none());
}

#[tokio::test]
async fn test_vault_credentials_and_mnemonic() {
    let vault = KeyVault::new(Arc::new(MemoryStore::new()));
    assert!(vault.load_hmac_signer("ua").await.unwrap().is_none());
    assert!(vault.load_mnemonic().await.unwrap().is_none());

    vault
        .store_api_credentials("test-api-key", &SecureString::from("test_secret_key_123"))
        .await
        .unwrap();
    let signer = vault.load_hmac_signer("ua").await.unwrap().unwrap();
    assert_eq!(signer.api_key(), "test-api-key");

    let headers = signer
        .generate_auth_headers("GET", "/api/v1/account", "", Some(1_640_995_200))
        .unwrap();
    assert_eq!(
        headers.signature,
        "e5e48655b54a114bf28b5bbc69cc124bbf7e940ece5c707540296d690046d3fd"
    );

    let phrase = SecureString::from("abandon ability able about above absent absorb abstract absurd abuse access accident");
    vault.store_mnemonic(&phrase).await.unwrap();
    assert!(vault.load_mnemonic().await.unwrap().unwrap().secure_eq(&phrase));
}
