use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use crate::constants::auth::{
    CONTENT_TYPE_JSON, HEADER_API_KEY, HEADER_CONTENT_TYPE, HEADER_SIGNATURE, HEADER_TIMESTAMP,
    HEADER_USER_AGENT, REPLAY_WINDOW_SECS,
};
use crate::errors::{Error, Result};
use crate::utils::SecureString;

type HmacSha256 = Hmac<Sha256>;

/// The parts of an HTTP request covered by the HMAC signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalRequest {
    pub method: String,
    pub path: String,
    pub body: String,
    pub timestamp: u64,
}

impl CanonicalRequest {
    pub fn new(method: &str, path: &str, body: &str, timestamp: u64) -> Self {
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };
        Self {
            method: method.to_uppercase(),
            path,
            body: body.to_string(),
            timestamp,
        }
    }

    /// `{timestamp}{METHOD}{path}{body}`
    pub fn signing_string(&self) -> String {
        format!("{}{}{}{}", self.timestamp, self.method, self.path, self.body)
    }
}

/// Authentication headers attached to every exchange API request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthHeaders {
    pub api_key: String,
    pub timestamp: u64,
    pub signature: String,
    pub content_type: String,
    pub user_agent: String,
}

impl AuthHeaders {
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        vec![
            (HEADER_API_KEY.to_string(), self.api_key.clone()),
            (HEADER_TIMESTAMP.to_string(), self.timestamp.to_string()),
            (HEADER_SIGNATURE.to_string(), self.signature.clone()),
            (HEADER_CONTENT_TYPE.to_string(), self.content_type.clone()),
            (HEADER_USER_AGENT.to_string(), self.user_agent.clone()),
        ]
    }
}

/// HMAC-SHA256 request signer holding one set of API credentials
#[derive(Debug, Clone)]
pub struct HmacSigner {
    api_key: String,
    api_secret: SecureString,
    user_agent: String,
}

impl HmacSigner {
    pub fn new(api_key: impl Into<String>, api_secret: SecureString, user_agent: &str) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret,
            user_agent: user_agent.to_string(),
        }
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Hex HMAC-SHA256 of the canonical request string; `timestamp` defaults to now
    pub fn sign(
        api_secret: &[u8],
        method: &str,
        path: &str,
        body: &str,
        timestamp: Option<u64>,
    ) -> Result<String> {
        let timestamp = timestamp.unwrap_or_else(current_timestamp);
        let request = CanonicalRequest::new(method, path, body, timestamp);
        Self::sign_canonical(api_secret, &request)
    }

    pub fn sign_canonical(api_secret: &[u8], request: &CanonicalRequest) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(api_secret)
            .map_err(|e| Error::Crypto(format!("Invalid HMAC key: {e}")))?;
        mac.update(request.signing_string().as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    pub fn generate_auth_headers(
        &self,
        method: &str,
        path: &str,
        body: &str,
        timestamp: Option<u64>,
    ) -> Result<AuthHeaders> {
        let timestamp = timestamp.unwrap_or_else(current_timestamp);
        let request = CanonicalRequest::new(method, path, body, timestamp);
        let signature = Self::sign_canonical(self.api_secret.as_bytes(), &request)?;

        debug!("Signed {} {} at {}", request.method, request.path, timestamp);

        Ok(AuthHeaders {
            api_key: self.api_key.clone(),
            timestamp,
            signature,
            content_type: CONTENT_TYPE_JSON.to_string(),
            user_agent: self.user_agent.clone(),
        })
    }

    pub fn validate_signature(
        &self,
        method: &str,
        path: &str,
        body: &str,
        timestamp: u64,
        signature: &str,
    ) -> bool {
        self.validate_signature_at(method, path, body, timestamp, signature, current_timestamp())
    }

    /// Validate against an explicit clock reading
    pub fn validate_signature_at(
        &self,
        method: &str,
        path: &str,
        body: &str,
        timestamp: u64,
        signature: &str,
        now: u64,
    ) -> bool {
        if now.abs_diff(timestamp) > REPLAY_WINDOW_SECS {
            warn!(
                "Rejecting signature outside the {}s window (timestamp {}, now {})",
                REPLAY_WINDOW_SECS, timestamp, now
            );
            return false;
        }

        let request = CanonicalRequest::new(method, path, body, timestamp);
        let expected = match Self::sign_canonical(self.api_secret.as_bytes(), &request) {
            Ok(expected) => expected,
            Err(_) => return false,
        };

        // Signatures are lowercase hex; any other byte is a mismatch
        if expected.len() != signature.len() {
            return false;
        }
        expected.as_bytes().ct_eq(signature.as_bytes()).into()
    }
}

fn current_timestamp() -> u64 {
    u64::try_from(Utc::now().timestamp()).unwrap_or_default()
}
