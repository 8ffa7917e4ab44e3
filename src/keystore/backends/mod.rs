use std::path::PathBuf;

pub mod factory;
pub mod file;
pub mod memory;
pub mod os_keyring;

pub use factory::open_store;
pub use file::EncryptedFileStore;
pub use memory::MemoryStore;
pub use os_keyring::OsKeyringStore;

/// Which secure store backs the key vault
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    /// Process memory only; values are lost on exit
    Memory,
    /// One JWE-encrypted file per key inside `dir`
    EncryptedFile { dir: PathBuf },
    /// Platform keyring under `service`
    OsKeyring { service: String },
}

impl StoreBackend {
    pub fn backend_type(&self) -> &'static str {
        match self {
            StoreBackend::Memory => "memory",
            StoreBackend::EncryptedFile { .. } => "file",
            StoreBackend::OsKeyring { .. } => "os_keyring",
        }
    }

    pub fn needs_passphrase(&self) -> bool {
        matches!(self, StoreBackend::EncryptedFile { .. })
    }
}
