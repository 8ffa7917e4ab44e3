use num_bigint::BigUint;
use num_traits::{One, ToPrimitive, Zero};
use serde::{Deserialize, Serialize};
use starknet_crypto::Felt;
use tracing::{debug, warn};
use zeroize::Zeroize;

use super::field;
use super::key_derivation::KeyPair;
use crate::canonical::{CanonicalEncoder, CanonicalFields};
use crate::constants::signing::{MAX_NONCE_REROLLS, NONCE_SALT};
use crate::errors::{Error, Result};

/// Which scheme produced a signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignatureAlgorithm {
    /// Simplified scalar scheme (primary)
    EcdsaStarknet,
    /// Degraded deterministic formula used when the primary scheme fails
    EcdsaFallback,
    /// Last-resort placeholder, not verifiable by anyone
    EcdsaMock,
    /// Real ECDSA over the STARK curve
    StarkCurve,
}

impl SignatureAlgorithm {
    /// True for signatures produced by a degraded strategy
    pub fn is_degraded(&self) -> bool {
        matches!(
            self,
            SignatureAlgorithm::EcdsaFallback | SignatureAlgorithm::EcdsaMock
        )
    }
}

/// Signature over a canonical payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignaturePayload {
    pub r: String,
    pub s: String,
    pub recovery_id: u8,
    pub algorithm: SignatureAlgorithm,
    pub message_hash: String,
}

impl SignaturePayload {
    /// Wire form `[r, s, recovery_id]`
    pub fn to_wire(&self) -> [String; 3] {
        [
            self.r.clone(),
            self.s.clone(),
            format!("{:#x}", self.recovery_id),
        ]
    }
}

/// One way of producing a signature; strategies are tried in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SigningStrategy {
    Primary,
    Fallback,
    Mock,
    StarkCurve,
}

impl SigningStrategy {
    pub fn algorithm(&self) -> SignatureAlgorithm {
        match self {
            SigningStrategy::Primary => SignatureAlgorithm::EcdsaStarknet,
            SigningStrategy::Fallback => SignatureAlgorithm::EcdsaFallback,
            SigningStrategy::Mock => SignatureAlgorithm::EcdsaMock,
            SigningStrategy::StarkCurve => SignatureAlgorithm::StarkCurve,
        }
    }
}

/// Signs canonical order payloads with an ordered list of strategies
#[derive(Debug, Clone)]
pub struct OrderSigner {
    strategies: Vec<SigningStrategy>,
}

impl Default for OrderSigner {
    fn default() -> Self {
        Self {
            strategies: vec![SigningStrategy::Primary, SigningStrategy::Fallback],
        }
    }
}

impl OrderSigner {
    pub fn new(strategies: Vec<SigningStrategy>) -> Result<Self> {
        if strategies.is_empty() {
            return Err(Error::Config(
                "At least one signing strategy is required".to_string(),
            ));
        }
        Ok(Self { strategies })
    }

    pub fn strategies(&self) -> &[SigningStrategy] {
        &self.strategies
    }

    /// Canonicalise and sign order fields
    pub fn sign_order(
        &self,
        key_pair: &KeyPair,
        order_fields: &CanonicalFields,
    ) -> Result<SignaturePayload> {
        let payload = CanonicalEncoder::encode(order_fields);
        debug!("Signing canonical payload of {} bytes", payload.len());
        self.sign_payload(key_pair, payload.as_bytes())
    }

    /// Sign an already canonical byte string
    pub fn sign_payload(&self, key_pair: &KeyPair, payload: &[u8]) -> Result<SignaturePayload> {
        let message_hash = field::from_be_bytes(&field::sha256(payload));
        let private = key_pair.private_scalar();

        let mut last_error = None;
        let mut result = None;
        for (position, strategy) in self.strategies.iter().enumerate() {
            match sign_with_strategy(*strategy, &private, &message_hash) {
                Ok(signature) => {
                    if position > 0 {
                        warn!(
                            "Order signed with degraded strategy {:?} after {} failure(s)",
                            strategy, position
                        );
                    }
                    result = Some(signature);
                    break;
                }
                Err(e) => {
                    warn!("Signing strategy {:?} failed: {}", strategy, e);
                    last_error = Some(e);
                }
            }
        }
        match result {
            Some(signature) => Ok(signature),
            None => Err(last_error
                .unwrap_or_else(|| Error::Signing("No signing strategy configured".to_string()))),
        }
    }
}

/// Verify a `StarkCurve` signature against a STARK-curve public key
pub fn verify_stark(public_key: &Felt, payload: &SignaturePayload) -> Result<bool> {
    if payload.algorithm != SignatureAlgorithm::StarkCurve {
        return Err(Error::Crypto(format!(
            "{:?} signatures have no public verification equation",
            payload.algorithm
        )));
    }
    let parse = |hex_str: &str| {
        Felt::from_hex(hex_str)
            .map_err(|e| Error::Validation(format!("Invalid felt {hex_str}: {e}")))
    };
    let hash = parse(&payload.message_hash)?;
    let r = parse(&payload.r)?;
    let s = parse(&payload.s)?;

    starknet_crypto::verify(public_key, &hash, &r, &s)
        .map_err(|e| Error::Crypto(format!("Verification failed: {e}")))
}

fn sign_with_strategy(
    strategy: SigningStrategy,
    private: &BigUint,
    message_hash: &BigUint,
) -> Result<SignaturePayload> {
    match strategy {
        SigningStrategy::Primary => sign_simplified(private, message_hash, strategy, |k| {
            let base = field::generator();
            let commitment = field::add_mod(&field::mul_mod(k, base), &field::mul_mod(k, k));
            let aux = field::sha256(&field::to_be_bytes32(k));
            field::add_mod(&commitment, &BigUint::from(aux[0]))
        }),
        SigningStrategy::Fallback => sign_simplified(private, message_hash, strategy, |k| {
            field::add_mod(&(k * 2u32), message_hash)
        }),
        SigningStrategy::Mock => Ok(sign_mock(private, message_hash)),
        SigningStrategy::StarkCurve => sign_stark_curve(private, message_hash),
    }
}

/// Deterministic nonce in `[1, P-1]` from the private key, message hash and a counter
fn deterministic_nonce(private: &BigUint, message_hash: &BigUint, counter: u32) -> BigUint {
    let mut seed = Vec::with_capacity(64 + NONCE_SALT.len() + 4);
    seed.extend_from_slice(&field::to_be_bytes32(private));
    seed.extend_from_slice(&field::to_be_bytes32(message_hash));
    seed.extend_from_slice(NONCE_SALT);
    seed.extend_from_slice(&counter.to_be_bytes());

    let digest = field::sha256(&field::sha256(&seed));
    seed.zeroize();

    let order = field::field_prime() - BigUint::one();
    (field::from_be_bytes(&digest) % order) + BigUint::one()
}

fn sign_simplified<F>(
    private: &BigUint,
    message_hash: &BigUint,
    strategy: SigningStrategy,
    commit: F,
) -> Result<SignaturePayload>
where
    F: Fn(&BigUint) -> BigUint,
{
    for counter in 0..=MAX_NONCE_REROLLS {
        let k = deterministic_nonce(private, message_hash, counter);
        let r = commit(&k);
        if r.is_zero() {
            debug!("Nonce produced r = 0, re-rolling (counter {})", counter);
            continue;
        }

        let Some(k_inv) = field::inverse(&k) else {
            debug!("Nonce has no inverse, re-rolling (counter {})", counter);
            continue;
        };

        let e = field::reduce(message_hash);
        let s = field::mul_mod(&k_inv, &field::add_mod(&e, &field::mul_mod(&r, private)));
        if s.is_zero() {
            debug!("Nonce produced s = 0, re-rolling (counter {})", counter);
            continue;
        }

        return Ok(SignaturePayload {
            r: field::to_hex(&r),
            s: field::to_hex(&field::to_low_s(s)),
            recovery_id: 0,
            algorithm: strategy.algorithm(),
            message_hash: field::to_hex(message_hash),
        });
    }

    Err(Error::Signing(format!(
        "Degenerate nonce after {} re-roll(s)",
        MAX_NONCE_REROLLS
    )))
}

fn sign_mock(private: &BigUint, message_hash: &BigUint) -> SignaturePayload {
    let mut seed = Vec::with_capacity(64);
    seed.extend_from_slice(&field::to_be_bytes32(private));
    seed.extend_from_slice(&field::to_be_bytes32(message_hash));
    let s = field::to_nonzero_scalar(&field::from_be_bytes(&field::sha256(&seed)));
    seed.zeroize();

    SignaturePayload {
        r: field::to_hex(&field::reduce(message_hash)),
        s: field::to_hex(&field::to_low_s(s)),
        recovery_id: 0,
        algorithm: SignatureAlgorithm::EcdsaMock,
        message_hash: field::to_hex(message_hash),
    }
}

fn sign_stark_curve(private: &BigUint, message_hash: &BigUint) -> Result<SignaturePayload> {
    // ECDSA on the STARK curve only accepts hashes below 2^251
    let mask = (BigUint::one() << 251u32) - BigUint::one();
    let truncated = message_hash & &mask;

    let private_felt = field::to_felt(private)?;
    let hash_felt = field::to_felt(&truncated)?;
    let k = starknet_crypto::rfc6979_generate_k(&hash_felt, &private_felt, None);
    let signature = starknet_crypto::sign(&private_felt, &hash_felt, &k)
        .map_err(|e| Error::Signing(format!("STARK curve signing failed: {e}")))?;

    Ok(SignaturePayload {
        r: field::to_hex(&field::from_felt(&signature.r)),
        s: field::to_hex(&field::from_felt(&signature.s)),
        recovery_id: field::from_felt(&signature.v).to_u8().unwrap_or_default(),
        algorithm: SignatureAlgorithm::StarkCurve,
        message_hash: field::to_hex(&truncated),
    })
}
