//! Modular arithmetic over the StarkNet field prime.
//!
//! Everything here works on `BigUint` so reductions by `P - 1` and by `P` stay exact for
//! full 256-bit hash outputs.

use std::sync::OnceLock;

use num_bigint::BigUint;
use num_traits::{One, Zero};
use sha2::{Digest, Sha256};
use starknet_crypto::Felt;

use crate::constants::field::{FIELD_PRIME_DEC, GENERATOR_DEC};
use crate::errors::{Error, Result};

fn parse_constant(decimal: &str) -> BigUint {
    BigUint::parse_bytes(decimal.as_bytes(), 10).unwrap_or_default()
}

/// The field prime `P`
pub fn field_prime() -> &'static BigUint {
    static PRIME: OnceLock<BigUint> = OnceLock::new();
    PRIME.get_or_init(|| parse_constant(FIELD_PRIME_DEC))
}

/// The fixed multiplier standing in for the curve generator
pub fn generator() -> &'static BigUint {
    static GENERATOR: OnceLock<BigUint> = OnceLock::new();
    GENERATOR.get_or_init(|| parse_constant(GENERATOR_DEC))
}

/// `floor(P / 2)`, the upper bound for canonical low-s values
pub fn half_prime() -> &'static BigUint {
    static HALF: OnceLock<BigUint> = OnceLock::new();
    HALF.get_or_init(|| field_prime() >> 1u32)
}

/// Big-endian fold of `bytes` into an integer (`acc = acc * 256 + byte`)
pub fn from_be_bytes(bytes: &[u8]) -> BigUint {
    BigUint::from_bytes_be(bytes)
}

/// Left-padded 32-byte big-endian form of a value below 2^256
pub fn to_be_bytes32(value: &BigUint) -> [u8; 32] {
    let bytes = value.to_bytes_be();
    let mut out = [0u8; 32];
    let len = bytes.len().min(32);
    out[32 - len..].copy_from_slice(&bytes[bytes.len() - len..]);
    out
}

pub fn reduce(value: &BigUint) -> BigUint {
    value % field_prime()
}

pub fn add_mod(a: &BigUint, b: &BigUint) -> BigUint {
    (a + b) % field_prime()
}

pub fn mul_mod(a: &BigUint, b: &BigUint) -> BigUint {
    (a * b) % field_prime()
}

/// Multiplicative inverse by Fermat's little theorem; `None` for multiples of `P`
pub fn inverse(value: &BigUint) -> Option<BigUint> {
    let prime = field_prime();
    let value = value % prime;
    if value.is_zero() {
        return None;
    }
    let exponent = prime - BigUint::from(2u32);
    Some(value.modpow(&exponent, prime))
}

/// Map a value into `[1, P-1]`: reduce mod `P`, replacing zero by one
pub fn to_nonzero_scalar(value: &BigUint) -> BigUint {
    let reduced = reduce(value);
    if reduced.is_zero() {
        BigUint::one()
    } else {
        reduced
    }
}

/// Replace `s` by `P - s` when it lies in the upper half of the field
pub fn to_low_s(s: BigUint) -> BigUint {
    if &s > half_prime() {
        field_prime() - s
    } else {
        s
    }
}

pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Lower-case `0x`-prefixed hex without leading zeros
pub fn to_hex(value: &BigUint) -> String {
    format!("{value:#x}")
}

pub fn from_hex(hex_str: &str) -> Result<BigUint> {
    let digits = hex_str.strip_prefix("0x").unwrap_or(hex_str);
    if digits.is_empty() {
        return Err(Error::Validation("Empty hex string".to_string()));
    }
    BigUint::parse_bytes(digits.as_bytes(), 16)
        .ok_or_else(|| Error::Validation(format!("Invalid hex scalar: {hex_str}")))
}

/// Convert a field element (value below `P`) into a `Felt`
pub fn to_felt(value: &BigUint) -> Result<Felt> {
    if value >= field_prime() {
        return Err(Error::Crypto(
            "Value does not fit in the field".to_string(),
        ));
    }
    Ok(Felt::from_bytes_be(&to_be_bytes32(value)))
}

pub fn from_felt(felt: &Felt) -> BigUint {
    BigUint::from_bytes_be(&felt.to_bytes_be())
}

pub fn felt_to_hex(felt: &Felt) -> String {
    to_hex(&from_felt(felt))
}

/// Parse a `0x`-prefixed address or felt, rejecting values outside the field
pub fn parse_felt(hex_str: &str) -> Result<Felt> {
    to_felt(&from_hex(hex_str)?).map_err(|_| {
        Error::Validation(format!("{hex_str} is not a valid field element"))
    })
}
