use starknet::macros::felt;
use starknet_crypto::Felt;

/// Chain ID constants
pub const MAINNET_CHAIN_ID: Felt = felt!("0x534e5f4d41494e"); // SN_MAIN
pub const SEPOLIA_CHAIN_ID: Felt = felt!("0x534e5f5345504f4c4941"); // SN_SEPOLIA

/// Chain ID felt for a network name ("SN_MAIN" / "SN_SEPOLIA")
pub fn chain_id_from_name(name: &str) -> Option<Felt> {
    match name {
        "SN_MAIN" => Some(MAINNET_CHAIN_ID),
        "SN_SEPOLIA" => Some(SEPOLIA_CHAIN_ID),
        _ => None,
    }
}

/// Field arithmetic constants (decimal, parsed once by `signer::field`)
pub mod field {
    /// P = 2^251 + 17 * 2^192 + 1
    pub const FIELD_PRIME_DEC: &str =
        "3618502788666131213697322783095070105623107215331596699973092056135872020481";

    /// Multiplier used for the simplified public key and the primary `r` commitment
    pub const GENERATOR_DEC: &str =
        "874739451078007766457464989774322083649278607533249481151382481072868806602";
}

/// Key derivation constants
pub mod derivation {
    /// Default signing domain for the exchange
    pub const DEFAULT_SIGNING_DOMAIN: &str = "x10.exchange";

    /// Minimum accepted mnemonic length in words
    pub const MIN_MNEMONIC_WORDS: usize = 12;
}

/// Order signing constants
pub mod signing {
    /// Salt mixed into the deterministic nonce
    pub const NONCE_SALT: &[u8] = b"starknet-trade-signer/order-nonce/v1";

    /// Number of nonce re-rolls tolerated before giving up
    pub const MAX_NONCE_REROLLS: u32 = 1;

    /// Decimal places used when scaling order quantities and prices into calldata
    pub const ORDER_AMOUNT_DECIMALS: u32 = 8;
}

/// HMAC request authentication constants
pub mod auth {
    pub const HEADER_API_KEY: &str = "X-Api-Key";
    pub const HEADER_TIMESTAMP: &str = "X-Timestamp";
    pub const HEADER_SIGNATURE: &str = "X-Signature";
    pub const HEADER_CONTENT_TYPE: &str = "Content-Type";
    pub const HEADER_USER_AGENT: &str = "User-Agent";

    pub const CONTENT_TYPE_JSON: &str = "application/json";

    /// Maximum accepted clock skew for a signed request, in seconds
    pub const REPLAY_WINDOW_SECS: u64 = 300;
}

/// Gasless sponsorship defaults
pub mod gasless {
    pub const ELIGIBILITY_PATH: &str = "/paymaster/v1/eligibility";
    pub const BUILD_TYPED_DATA_PATH: &str = "/paymaster/v1/build-typed-data";
    pub const EXECUTE_PATH: &str = "/paymaster/v1/execute";

    pub const CONNECT_TIMEOUT_SECS: u64 = 10;
    pub const RECEIVE_TIMEOUT_SECS: u64 = 30;

    pub const FAILURE_THRESHOLD: u32 = 3;
    pub const COOLDOWN_SECS: u64 = 120;

    pub const MAX_ATTEMPTS: u32 = 3;
    pub const BASE_DELAY_MS: u64 = 500;
    pub const MAX_JITTER_MS: u64 = 100;

    /// Validity window of locally built outside-execution typed data
    pub const OUTSIDE_EXECUTION_WINDOW_SECS: u64 = 3600;

    /// Caller value that lets any relayer submit an outside execution
    pub const ANY_CALLER: &str = "0x414e595f43414c4c4552"; // ANY_CALLER
}

/// Secure store key names
pub mod store_keys {
    pub const MNEMONIC: &str = "mnemonic";
    pub const API_KEY: &str = "api_key";
    pub const API_SECRET: &str = "api_secret";

    /// Storage key for the L2 private key of an account index
    pub fn l2_private_key(account_index: u32) -> String {
        format!("l2_private_key_{account_index}")
    }
}
