use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use starknet_crypto::Felt;

use crate::calls::Call;
use crate::canonical::CanonicalFields;
use crate::constants::gasless::ANY_CALLER;
use crate::errors::{Error, Result};
use crate::signer::field::felt_to_hex;

/// Sponsorship allowance of an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Eligibility {
    pub eligible: bool,
    #[serde(default)]
    pub remaining_sponsored: u32,
    #[serde(default)]
    pub daily_limit: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedDataField {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl TypedDataField {
    pub fn new(name: &str, kind: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: kind.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedDataDomain {
    pub name: String,
    pub version: String,
    pub chain_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<Value>,
}

/// SNIP-12 typed data as returned by the paymaster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedData {
    pub types: BTreeMap<String, Vec<TypedDataField>>,
    pub primary_type: String,
    pub domain: TypedDataDomain,
    pub message: Value,
}

impl TypedData {
    /// Structural check: the primary type is declared, every declared field of it is
    /// present in the message, and the domain is named and versioned.
    pub fn validate(&self) -> Result<()> {
        if self.domain.name.trim().is_empty() || self.domain.version.trim().is_empty() {
            return Err(Error::Validation(
                "Typed data domain requires a name and version".to_string(),
            ));
        }
        let fields = self.types.get(&self.primary_type).ok_or_else(|| {
            Error::Validation(format!(
                "Primary type {} is not declared in typed data types",
                self.primary_type
            ))
        })?;
        let message = self
            .message
            .as_object()
            .ok_or_else(|| Error::Validation("Typed data message must be an object".to_string()))?;
        if let Some(missing) = fields.iter().find(|f| !message.contains_key(&f.name)) {
            return Err(Error::Validation(format!(
                "Typed data message is missing field {:?} of {}",
                missing.name, self.primary_type
            )));
        }
        Ok(())
    }

    /// Flattened view used when signing the typed data with the order signer
    pub fn canonical_fields(&self) -> CanonicalFields {
        CanonicalFields::new()
            .with("domain_name", self.domain.name.as_str())
            .with("domain_version", self.domain.version.as_str())
            .with("domain_chain_id", self.domain.chain_id.as_str())
            .with("domain_revision", self.domain.revision.clone())
            .with("primary_type", self.primary_type.as_str())
            .with("message", self.message.clone())
    }

    /// SNIP-9 (v2) `OutsideExecution` built locally when the paymaster cannot build one
    pub fn outside_execution(
        calls: &[Call],
        chain_id: &str,
        nonce: Felt,
        execute_after: u64,
        execute_before: u64,
    ) -> Self {
        let mut types = BTreeMap::new();
        types.insert(
            "StarknetDomain".to_string(),
            vec![
                TypedDataField::new("name", "shortstring"),
                TypedDataField::new("version", "shortstring"),
                TypedDataField::new("chainId", "shortstring"),
                TypedDataField::new("revision", "shortstring"),
            ],
        );
        types.insert(
            "OutsideExecution".to_string(),
            vec![
                TypedDataField::new("Caller", "ContractAddress"),
                TypedDataField::new("Nonce", "felt"),
                TypedDataField::new("Execute After", "u128"),
                TypedDataField::new("Execute Before", "u128"),
                TypedDataField::new("Calls", "Call*"),
            ],
        );
        types.insert(
            "Call".to_string(),
            vec![
                TypedDataField::new("To", "ContractAddress"),
                TypedDataField::new("Selector", "selector"),
                TypedDataField::new("Calldata", "felt*"),
            ],
        );

        let calls: Vec<Value> = calls
            .iter()
            .map(|call| {
                json!({
                    "To": felt_to_hex(&call.to),
                    "Selector": felt_to_hex(&call.selector),
                    "Calldata": call.calldata.iter().map(felt_to_hex).collect::<Vec<_>>(),
                })
            })
            .collect();

        Self {
            types,
            primary_type: "OutsideExecution".to_string(),
            domain: TypedDataDomain {
                name: "Account.execute_from_outside".to_string(),
                version: "2".to_string(),
                chain_id: chain_id.to_string(),
                revision: Some(Value::String("1".to_string())),
            },
            message: json!({
                "Caller": ANY_CALLER,
                "Nonce": felt_to_hex(&nonce),
                "Execute After": format!("{execute_after:#x}"),
                "Execute Before": format!("{execute_before:#x}"),
                "Calls": calls,
            }),
        }
    }
}

/// Outcome of one sponsorship attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SponsorshipResult {
    pub success: bool,
    pub transaction_hash: Option<String>,
    pub error_message: Option<String>,
    pub gas_sponsored: u64,
    pub xp_earned: u64,
}

impl SponsorshipResult {
    pub fn succeeded(transaction_hash: String, gas_sponsored: u64, xp_earned: u64) -> Self {
        Self {
            success: true,
            transaction_hash: Some(transaction_hash),
            error_message: None,
            gas_sponsored,
            xp_earned,
        }
    }

    pub fn failed(error_message: impl Into<String>) -> Self {
        Self {
            success: false,
            transaction_hash: None,
            error_message: Some(error_message.into()),
            gas_sponsored: 0,
            xp_earned: 0,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BuildTypedDataRequest {
    pub user_address: String,
    pub calls: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BuildTypedDataResponse {
    pub typed_data: TypedData,
    #[serde(default)]
    pub gas_estimate: Option<u64>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ExecuteRequest<'a> {
    pub account_address: &'a str,
    pub typed_data: &'a TypedData,
    pub signature: [String; 3],
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ExecuteResponse {
    pub transaction_hash: String,
    #[serde(default)]
    pub gas_sponsored: Option<u64>,
    #[serde(default)]
    pub xp_earned: Option<u64>,
}
