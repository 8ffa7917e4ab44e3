use async_trait::async_trait;
use num_bigint::BigUint;
use starknet_crypto::Felt;
use tracing::{debug, info};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::field;
use crate::constants::derivation::MIN_MNEMONIC_WORDS;
use crate::errors::{Error, Result};

/// Derived L2 keypair. The private scalar is held as 32 big-endian bytes that are
/// zeroized on drop.
#[derive(Clone, PartialEq, Eq, ZeroizeOnDrop)]
pub struct KeyPair {
    private_key: [u8; 32],
    #[zeroize(skip)]
    public_key: BigUint,
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("private_key", &"[REDACTED]")
            .field("public_key", &field::to_hex(&self.public_key))
            .finish()
    }
}

impl KeyPair {
    /// Build a keypair from a private scalar, reducing it into `[1, P-1]`
    pub fn from_private_scalar(private: &BigUint) -> Self {
        let private = field::to_nonzero_scalar(private);
        let public_key = field::mul_mod(&private, field::generator());
        Self {
            private_key: field::to_be_bytes32(&private),
            public_key,
        }
    }

    /// Restore a keypair from a persisted private key hex string
    pub fn from_private_hex(hex_key: &str) -> Result<Self> {
        let private = field::from_hex(hex_key)?;
        if &private >= field::field_prime() || private == BigUint::default() {
            return Err(Error::Validation(
                "Private key must lie in [1, P-1]".to_string(),
            ));
        }
        Ok(Self::from_private_scalar(&private))
    }

    pub fn private_scalar(&self) -> BigUint {
        field::from_be_bytes(&self.private_key)
    }

    pub fn public_scalar(&self) -> &BigUint {
        &self.public_key
    }

    /// Private key as 64 hex characters (for secure storage only)
    pub fn private_hex(&self) -> String {
        hex::encode(self.private_key)
    }

    pub fn public_hex(&self) -> String {
        field::to_hex(&self.public_key)
    }

    /// Private scalar as a field element
    pub fn private_felt(&self) -> Felt {
        Felt::from_bytes_be(&self.private_key)
    }

    /// Public key on the real STARK curve for the same private scalar
    pub fn stark_public_key(&self) -> Felt {
        starknet_crypto::get_public_key(&self.private_felt())
    }
}

/// External Ethereum-style signer used to obtain the L1 signature that seeds derivation
#[async_trait]
pub trait L1Signer: Send + Sync {
    /// L1 account address, embedded in the domain-separated message
    fn address(&self) -> String;

    /// Sign an arbitrary message, returning the raw signature bytes
    async fn sign_message(&self, message: &[u8]) -> Result<Vec<u8>>;
}

/// Stateless derivation of L2 keys from L1 material
pub struct KeyDerivationEngine;

impl KeyDerivationEngine {
    /// Domain-separated message binding account index, address and signing domain
    pub fn domain_message(account_index: u32, address: &str, signing_domain: &str) -> String {
        format!(
            "{signing_domain} L2 key derivation\naccount index: {account_index}\naddress: {address}"
        )
    }

    /// Hash an L1 signature into a keypair: SHA-256, big-endian fold, reduce mod `P`
    pub fn derive_from_signature(signature: &[u8]) -> KeyPair {
        let mut entropy = field::sha256(signature);
        let scalar = field::from_be_bytes(&entropy);
        entropy.zeroize();
        KeyPair::from_private_scalar(&scalar)
    }

    /// Derive a keypair from raw L1 key bytes without an external signer.
    ///
    /// The hashed material is `len(l1_material) as u32 BE || l1_material || domain message`.
    pub fn derive_l2_keys(l1_material: &[u8], account_index: u32, signing_domain: &str) -> KeyPair {
        let message = Self::domain_message(account_index, "", signing_domain);
        let material_len = u32::try_from(l1_material.len()).unwrap_or(u32::MAX);
        let mut material = Vec::with_capacity(4 + l1_material.len() + message.len());
        material.extend_from_slice(&material_len.to_be_bytes());
        material.extend_from_slice(l1_material);
        material.extend_from_slice(message.as_bytes());

        let key_pair = Self::derive_from_signature(&material);
        material.zeroize();

        debug!(
            "Derived L2 key for account index {} in domain {}: {}",
            account_index,
            signing_domain,
            key_pair.public_hex()
        );
        key_pair
    }

    /// Derive from a hex-encoded L1 private key (with or without `0x`)
    pub fn derive_from_hex_key(
        l1_private_key_hex: &str,
        account_index: u32,
        signing_domain: &str,
    ) -> Result<KeyPair> {
        let digits = l1_private_key_hex
            .strip_prefix("0x")
            .unwrap_or(l1_private_key_hex);
        let mut bytes = hex::decode(digits)?;
        if bytes.is_empty() {
            return Err(Error::Validation("L1 private key is empty".to_string()));
        }
        let key_pair = Self::derive_l2_keys(&bytes, account_index, signing_domain);
        bytes.zeroize();
        Ok(key_pair)
    }

    /// Derive from a mnemonic phrase; whitespace and case are normalised first
    pub fn derive_from_mnemonic(
        phrase: &str,
        account_index: u32,
        signing_domain: &str,
    ) -> Result<KeyPair> {
        let mut normalized = normalize_mnemonic(phrase)?;
        let key_pair = Self::derive_l2_keys(normalized.as_bytes(), account_index, signing_domain);
        normalized.zeroize();
        Ok(key_pair)
    }

    /// Ask the L1 signer for a signature over the domain message and derive from it
    pub async fn derive_with_signer(
        signer: &dyn L1Signer,
        account_index: u32,
        signing_domain: &str,
    ) -> Result<KeyPair> {
        let address = signer.address();
        let message = Self::domain_message(account_index, &address, signing_domain);

        let mut signature = signer.sign_message(message.as_bytes()).await.map_err(|e| match e {
            Error::ExternalSigning(msg) => Error::ExternalSigning(msg),
            other => Error::ExternalSigning(other.to_string()),
        })?;
        if signature.is_empty() {
            return Err(Error::ExternalSigning(
                "L1 signer returned an empty signature".to_string(),
            ));
        }

        let key_pair = Self::derive_from_signature(&signature);
        signature.zeroize();

        info!(
            "Derived L2 key for {} (account index {}): {}",
            address,
            account_index,
            key_pair.public_hex()
        );
        Ok(key_pair)
    }
}

fn normalize_mnemonic(phrase: &str) -> Result<String> {
    let words: Vec<String> = phrase
        .split_whitespace()
        .map(|w| w.to_lowercase())
        .collect();
    if words.len() < MIN_MNEMONIC_WORDS {
        return Err(Error::Validation(format!(
            "Mnemonic must have at least {MIN_MNEMONIC_WORDS} words, got {}",
            words.len()
        )));
    }
    Ok(words.join(" "))
}
