use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use starknet_trade_signer::{
    AuthHeadersArgs, CanonicalFields, Cli, Commands, Config, DeriveArgs, EligibilityArgs,
    GaslessSponsorClient, KeyDerivationEngine, KeyPair, SignOrderArgs,
};
use starknet_trade_signer::signer::field::felt_to_hex;
use starknet_trade_signer::utils::{resolve_secret, SecureString};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(&cli.global)?;

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(config.logging.level.as_str())
        .with_writer(std::io::stderr)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Derive(args) => derive(&config, args).await,
        Commands::SignOrder(args) => sign_order(&config, args).await,
        Commands::AuthHeaders(args) => auth_headers(&config, args).await,
        Commands::Eligibility(args) => eligibility(&config, args).await,
    }
}

async fn derive(config: &Config, args: DeriveArgs) -> Result<()> {
    config.validate_local()?;

    let account_index = args.account_index.unwrap_or(config.signing.account_index);
    let domain = args.domain.unwrap_or_else(|| config.signing.domain.clone());

    let (key_pair, mnemonic) = match args.mnemonic {
        Some(phrase) => {
            let phrase = SecureString::new(phrase);
            let key_pair = KeyDerivationEngine::derive_from_mnemonic(
                phrase.as_str().context("Mnemonic is not valid UTF-8")?,
                account_index,
                &domain,
            )?;
            (key_pair, Some(phrase))
        }
        None => {
            let l1_key = resolve_secret(args.l1_key, "Enter L1 private key (hex): ")?;
            let key_pair = KeyDerivationEngine::derive_from_hex_key(
                l1_key.as_str().context("L1 private key is not valid UTF-8")?,
                account_index,
                &domain,
            )?;
            (key_pair, None)
        }
    };

    info!(
        "🔑 Derived L2 key for account index {} in domain {}",
        account_index, domain
    );

    if args.store {
        if config.keystore.backend == "memory" {
            warn!("⚠️  Memory keystore selected; the stored key is discarded on exit");
        }
        let vault = config.open_vault()?;
        vault.store_l2_key(account_index, &key_pair).await?;
        if let Some(phrase) = &mnemonic {
            vault.store_mnemonic(phrase).await?;
        }
        info!("✅ Key stored in {} keystore", vault.backend_type());
    }

    let output = serde_json::json!({
        "accountIndex": account_index,
        "domain": domain,
        "publicKey": key_pair.public_hex(),
        "starkPublicKey": felt_to_hex(&key_pair.stark_public_key()),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn sign_order(config: &Config, args: SignOrderArgs) -> Result<()> {
    config.validate_local()?;

    let mut fields = CanonicalFields::new();
    for pair in &args.fields {
        let (key, value) = pair
            .split_once('=')
            .with_context(|| format!("Order field '{pair}' must be key=value"))?;
        fields.insert(key, value);
    }

    let account_index = args.account_index.unwrap_or(config.signing.account_index);
    let key_pair = match args.private_key {
        Some(private_key) => {
            let private_key = SecureString::new(private_key);
            KeyPair::from_private_hex(private_key.as_str().context("Key is not valid UTF-8")?)?
        }
        None => config
            .open_vault()?
            .load_l2_key(account_index)
            .await?
            .with_context(|| {
                format!("No L2 key stored for account index {account_index}; run `derive --store` first")
            })?,
    };

    let signature = config.order_signer()?.sign_order(&key_pair, &fields)?;
    if signature.algorithm.is_degraded() {
        warn!("⚠️  Signature produced by degraded strategy {:?}", signature.algorithm);
    }

    let output = serde_json::json!({
        "payload": fields.encode(),
        "signature": signature,
        "wire": signature.to_wire(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn auth_headers(config: &Config, args: AuthHeadersArgs) -> Result<()> {
    config.validate_local()?;

    let vault = if config.api.api_key.is_some() {
        None
    } else {
        Some(config.open_vault()?)
    };
    let signer = config
        .hmac_signer(vault.as_ref())
        .await?
        .context("No API credentials configured (use --api-key/--api-secret or store them)")?;

    let headers =
        signer.generate_auth_headers(&args.method, &args.path, &args.body, args.timestamp)?;
    for (name, value) in headers.to_pairs() {
        println!("{name}: {value}");
    }
    Ok(())
}

async fn eligibility(config: &Config, args: EligibilityArgs) -> Result<()> {
    config.validate()?;

    let mut client =
        GaslessSponsorClient::with_reqwest(config.to_gasless_config(), config.order_signer()?)?;
    if let Some(auth) = config.hmac_signer(None).await? {
        client = client.with_credentials(auth);
    }

    let eligibility = client.check_eligibility(&args.address).await?;
    info!(
        "📊 {} eligible: {} ({}/{} sponsored transactions left)",
        args.address, eligibility.eligible, eligibility.remaining_sponsored, eligibility.daily_limit
    );
    println!("{}", serde_json::to_string_pretty(&eligibility)?);
    Ok(())
}
