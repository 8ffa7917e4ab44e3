pub mod auth;
pub mod calls;
pub mod canonical;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;
pub mod gasless;
pub mod keystore;
pub mod signer;
pub mod utils;

pub use auth::HmacSigner;
pub use calls::{PaymasterCall, SponsoredCall, TradeCall, TradeSide, TransferCall};
pub use canonical::{CanonicalEncoder, CanonicalFields, CanonicalValue};
pub use config::Config;
pub use errors::{Error, ErrorKind, Result};
pub use gasless::GaslessSponsorClient;
pub use keystore::{KeyVault, SecureStore};
pub use signer::{KeyDerivationEngine, KeyPair, OrderSigner, SigningStrategy};

// Re-export CLI types for main.rs
pub use cli::*;
