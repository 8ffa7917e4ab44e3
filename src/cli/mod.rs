use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "starknet-trade-signer")]
#[command(about = "Key derivation, order signing and gasless sponsorship for StarkNet trading accounts")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Derive the L2 trading key from an L1 private key or mnemonic
    Derive(DeriveArgs),
    /// Sign order fields given as key=value pairs
    SignOrder(SignOrderArgs),
    /// Print HMAC authentication headers for a request
    AuthHeaders(AuthHeadersArgs),
    /// Query paymaster eligibility for an account
    Eligibility(EligibilityArgs),
}

/// Options shared by every command; explicit values override the config file
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Configuration file path
    #[arg(short, long, env = "TRADE_SIGNER_CONFIG", global = true)]
    pub config: Option<String>,

    /// Paymaster / exchange API base URL
    #[arg(long, env = "TRADE_SIGNER_BASE_URL", global = true)]
    pub base_url: Option<String>,

    /// Chain ID: "SN_MAIN" or "SN_SEPOLIA"
    #[arg(long, env = "TRADE_SIGNER_CHAIN_ID", global = true)]
    pub chain_id: Option<String>,

    /// API key for HMAC request signing
    #[arg(long, env = "TRADE_SIGNER_API_KEY", global = true)]
    pub api_key: Option<String>,

    /// API secret for HMAC request signing
    /// Setting this via environment variable is NOT recommended for security
    #[arg(long, env = "TRADE_SIGNER_API_SECRET", global = true, hide_env_values = true)]
    pub api_secret: Option<String>,

    /// Keystore backend: "memory", "file", "os_keyring"
    #[arg(long, env = "TRADE_SIGNER_KEYSTORE_BACKEND", global = true)]
    pub keystore_backend: Option<String>,

    /// Directory for the encrypted file keystore
    #[arg(long, env = "TRADE_SIGNER_KEYSTORE_DIR", global = true)]
    pub keystore_dir: Option<String>,

    /// Service name for the OS keyring backend
    #[arg(long, env = "TRADE_SIGNER_KEYRING_SERVICE", global = true)]
    pub keyring_service: Option<String>,

    /// Passphrase for the file keystore (will be prompted securely if needed)
    #[arg(long, env = "TRADE_SIGNER_PASSPHRASE", global = true, hide_env_values = true)]
    pub passphrase: Option<String>,

    /// Log level
    #[arg(long, env = "RUST_LOG", global = true)]
    pub log_level: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct DeriveArgs {
    /// L1 private key hex (prompted securely when neither key nor mnemonic is given)
    #[arg(long, env = "TRADE_SIGNER_L1_KEY", hide_env_values = true, conflicts_with = "mnemonic")]
    pub l1_key: Option<String>,

    /// Mnemonic phrase to derive from instead of an L1 key
    #[arg(long, env = "TRADE_SIGNER_MNEMONIC", hide_env_values = true)]
    pub mnemonic: Option<String>,

    /// Account index; defaults to `signing.account_index`
    #[arg(long)]
    pub account_index: Option<u32>,

    /// Signing domain; defaults to `signing.domain`
    #[arg(long)]
    pub domain: Option<String>,

    /// Persist the derived key (and mnemonic) in the configured keystore
    #[arg(long)]
    pub store: bool,
}

#[derive(Args, Debug, Clone)]
pub struct SignOrderArgs {
    /// Order fields as key=value pairs
    #[arg(required = true)]
    pub fields: Vec<String>,

    /// L2 private key hex; loaded from the keystore when absent
    #[arg(long, env = "TRADE_SIGNER_L2_KEY", hide_env_values = true)]
    pub private_key: Option<String>,

    /// Account index of the stored key; defaults to `signing.account_index`
    #[arg(long)]
    pub account_index: Option<u32>,
}

#[derive(Args, Debug, Clone)]
pub struct AuthHeadersArgs {
    /// HTTP method
    #[arg(long, default_value = "GET")]
    pub method: String,

    /// Request path, e.g. /api/v1/orders
    #[arg(long)]
    pub path: String,

    /// Raw request body
    #[arg(long, default_value = "")]
    pub body: String,

    /// Unix timestamp in seconds; defaults to now
    #[arg(long)]
    pub timestamp: Option<u64>,
}

#[derive(Args, Debug, Clone)]
pub struct EligibilityArgs {
    /// Account address to check
    pub address: String,
}
