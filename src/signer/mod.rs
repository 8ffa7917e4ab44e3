pub mod field;
pub mod key_derivation;
pub mod order_signer;


// Re-export main types for easier access
pub use key_derivation::{KeyDerivationEngine, KeyPair, L1Signer};
pub use order_signer::{
    verify_stark, OrderSigner, SignatureAlgorithm, SignaturePayload, SigningStrategy,
};
