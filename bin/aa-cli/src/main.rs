//! Demo binary: wires `aa-client`'s collaborator traits to plain JSON-RPC
//! HTTP endpoints and drives one `prepare -> sign -> send` round trip for a
//! single call. No metrics export or queue integration — just enough
//! wiring to exercise the pipeline against a real bundler/paymaster.

mod rpc;

use aa_accounts::{Account, AnyAccount, EntryPointVersion, LightAccount, LightAccountVersion, NexusAccount, SimpleAccount};
use aa_accounts::{EtherspotAccount, KernelV2Account, ThirdwebAccount, TrustBarzAccount};
use aa_client::orchestrator::{Fees, GasMultipliers, Orchestrator, PrepareRequest};
use aa_core::hexutil::{hex_decode, hex_to_uint};
use aa_core::owner::LocalOwner;
use aa_core::user_operation::Call;
use alloy_primitives::{Address, Bytes, U256};
use clap::{Parser, ValueEnum};
use rpc::{HttpBundlerClient, HttpPaymasterClient, HttpPublicClient};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Family {
    Simple,
    Light,
    Nexus,
    Etherspot,
    TrustBarz,
    Thirdweb,
    KernelV2,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Config {
    /// Account family to drive this call through.
    #[arg(long, value_enum, env = "AA_CLI_FAMILY")]
    family: Family,

    /// Bundler JSON-RPC endpoint.
    #[arg(long, env = "AA_CLI_BUNDLER_URL")]
    bundler_url: String,

    /// Optional paymaster JSON-RPC endpoint; omit to send unsponsored.
    #[arg(long, env = "AA_CLI_PAYMASTER_URL")]
    paymaster_url: Option<String>,

    /// Optional public chain RPC endpoint, used for deployment/address
    /// resolution when the account has no precomputed or local address.
    #[arg(long, env = "AA_CLI_PUBLIC_URL")]
    public_url: String,

    #[arg(long, env = "AA_CLI_RPC_TIMEOUT_MS", default_value = "10000")]
    rpc_timeout_ms: u64,

    #[arg(long, env = "AA_CLI_CHAIN_ID")]
    chain_id: u64,

    /// Hex-encoded 32-byte private key for the account's owner EOA.
    #[arg(long, env = "AA_CLI_PRIVATE_KEY")]
    private_key: String,

    /// Counterfactual factory address (Simple/Light/Etherspot/TrustBarz/Thirdweb).
    #[arg(long, env = "AA_CLI_FACTORY")]
    factory: Option<Address>,

    /// ERC-7579 validator address (Nexus only).
    #[arg(long, env = "AA_CLI_VALIDATOR")]
    validator: Option<Address>,

    /// CREATE2 salt. Decimal or `0x`-prefixed hex.
    #[arg(long, env = "AA_CLI_SALT", default_value = "0")]
    salt: String,

    /// Light Account version.
    #[arg(long, value_enum, env = "AA_CLI_LIGHT_VERSION", default_value = "v2")]
    light_version: LightVersionArg,

    /// EntryPoint version, for the families that support either (Simple/Light/Thirdweb).
    #[arg(long, value_enum, env = "AA_CLI_ENTRY_POINT_VERSION", default_value = "v07")]
    entry_point_version: EntryPointVersionArg,

    /// Skip on-chain address resolution and use this address as sender.
    #[arg(long, env = "AA_CLI_PRECOMPUTED_ADDRESS")]
    precomputed_address: Option<Address>,

    /// Target of the single call this invocation sends.
    #[arg(long, env = "AA_CLI_CALL_TO")]
    call_to: Address,

    /// Wei value attached to the call.
    #[arg(long, env = "AA_CLI_CALL_VALUE", default_value = "0")]
    call_value: U256,

    /// Hex-encoded calldata for the call, `0x` for none.
    #[arg(long, env = "AA_CLI_CALL_DATA", default_value = "0x")]
    call_data: String,

    #[arg(long, env = "AA_CLI_NONCE_SEQUENCE", default_value = "0")]
    nonce_sequence: U256,

    #[arg(long, env = "AA_CLI_MAX_FEE_PER_GAS")]
    max_fee_per_gas: U256,

    #[arg(long, env = "AA_CLI_MAX_PRIORITY_FEE_PER_GAS")]
    max_priority_fee_per_gas: U256,

    /// Optional JSON paymaster context forwarded verbatim to `pm_getPaymasterStubData`/`pm_getPaymasterData`.
    #[arg(long, env = "AA_CLI_PAYMASTER_CONTEXT")]
    paymaster_context: Option<String>,

    #[arg(long, env = "AA_CLI_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LightVersionArg {
    V1,
    V2,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum EntryPointVersionArg {
    V06,
    V07,
}

impl From<EntryPointVersionArg> for EntryPointVersion {
    fn from(v: EntryPointVersionArg) -> Self {
        match v {
            EntryPointVersionArg::V06 => Self::V06,
            EntryPointVersionArg::V07 => Self::V07,
        }
    }
}

fn parse_uint(s: &str) -> anyhow::Result<U256> {
    if s.starts_with("0x") {
        Ok(hex_to_uint(s)?)
    } else {
        Ok(s.parse::<U256>().map_err(|e| anyhow::anyhow!("invalid integer '{s}': {e}"))?)
    }
}

fn entry_point_for(version: EntryPointVersion) -> Address {
    match version {
        EntryPointVersion::V06 => aa_core::constants::ENTRY_POINT_V06,
        EntryPointVersion::V07 => aa_core::constants::ENTRY_POINT_V07,
    }
}

fn build_account(config: &Config, owner: Arc<LocalOwner>) -> anyhow::Result<AnyAccount> {
    let salt = parse_uint(&config.salt)?;
    let owner: Arc<dyn aa_core::owner::Owner + Send + Sync> = owner;

    let account = match config.family {
        Family::Simple => {
            let factory = config.factory.ok_or_else(|| anyhow::anyhow!("--factory is required for the simple family"))?;
            let mut a = SimpleAccount::new(owner, factory, salt, config.entry_point_version.into());
            if let Some(addr) = config.precomputed_address {
                a = a.with_precomputed_address(addr);
            }
            AnyAccount::Simple(a)
        }
        Family::Light => {
            let factory = config.factory.ok_or_else(|| anyhow::anyhow!("--factory is required for the light family"))?;
            let version = match config.light_version {
                LightVersionArg::V1 => LightAccountVersion::V1,
                LightVersionArg::V2 => LightAccountVersion::V2,
            };
            let mut a = LightAccount::new(owner, factory, salt, version, config.entry_point_version.into());
            if let Some(addr) = config.precomputed_address {
                a = a.with_precomputed_address(addr);
            }
            AnyAccount::Light(a)
        }
        Family::Nexus => {
            let validator = config.validator.ok_or_else(|| anyhow::anyhow!("--validator is required for the nexus family"))?;
            let salt16: u16 = salt.to::<u16>();
            let mut a = NexusAccount::new(owner, validator, salt16);
            if let Some(addr) = config.precomputed_address {
                a = a.with_precomputed_address(addr);
            }
            AnyAccount::Nexus(a)
        }
        Family::Etherspot => {
            let factory = config.factory.ok_or_else(|| anyhow::anyhow!("--factory is required for the etherspot family"))?;
            let mut a = EtherspotAccount::new(owner, factory, salt);
            if let Some(addr) = config.precomputed_address {
                a = a.with_precomputed_address(addr);
            }
            AnyAccount::Etherspot(a)
        }
        Family::TrustBarz => {
            let factory = config.factory.ok_or_else(|| anyhow::anyhow!("--factory is required for the trust-barz family"))?;
            let mut a = TrustBarzAccount::new(owner, factory, salt);
            if let Some(addr) = config.precomputed_address {
                a = a.with_precomputed_address(addr);
            }
            AnyAccount::TrustBarz(a)
        }
        Family::Thirdweb => {
            let factory = config.factory.ok_or_else(|| anyhow::anyhow!("--factory is required for the thirdweb family"))?;
            let mut a = ThirdwebAccount::new(owner, factory, config.entry_point_version.into());
            if let Some(addr) = config.precomputed_address {
                a = a.with_precomputed_address(addr);
            }
            AnyAccount::Thirdweb(a)
        }
        Family::KernelV2 => {
            let mut a = KernelV2Account::new(owner);
            if let Some(addr) = config.precomputed_address {
                a = a.with_precomputed_address(addr);
            }
            AnyAccount::KernelV2(a)
        }
    };
    Ok(account)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::parse();

    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => {
            eprintln!("invalid log level '{}', defaulting to 'info'", config.log_level);
            tracing::Level::INFO
        }
    };
    tracing_subscriber::fmt().with_max_level(log_level).with_writer(std::io::stderr).init();

    let key_bytes = hex_decode(&config.private_key)?;
    let key: [u8; 32] = key_bytes
        .as_slice()
        .try_into()
        .map_err(|_| anyhow::anyhow!("--private-key must decode to exactly 32 bytes"))?;
    let owner = Arc::new(LocalOwner::from_bytes(&key)?);

    let account = build_account(&config, owner)?;
    let entry_point = entry_point_for(account.entry_point_version());

    let bundler = HttpBundlerClient::new(&config.bundler_url, config.rpc_timeout_ms)?;
    let paymaster = config
        .paymaster_url
        .as_deref()
        .map(|url| HttpPaymasterClient::new(url, config.rpc_timeout_ms))
        .transpose()?;
    let public_client = HttpPublicClient::new(&config.public_url, config.rpc_timeout_ms)?;

    let mut orchestrator = Orchestrator::new(&account, &bundler, entry_point, config.chain_id)
        .with_public_client(&public_client)
        .with_gas_multipliers(GasMultipliers::default());
    if let Some(paymaster) = paymaster.as_ref() {
        orchestrator = orchestrator.with_paymaster(paymaster);
    }

    let call_data = if config.call_data == "0x" {
        Bytes::new()
    } else {
        Bytes::from(hex_decode(&config.call_data)?)
    };
    let calls = [Call { to: config.call_to, value: config.call_value, data: call_data }];

    let paymaster_context: Option<serde_json::Value> =
        config.paymaster_context.as_deref().map(serde_json::from_str).transpose()?;

    let request = PrepareRequest {
        calls: &calls,
        sequence: config.nonce_sequence,
        fees: Fees { max_fee_per_gas: config.max_fee_per_gas, max_priority_fee_per_gas: config.max_priority_fee_per_gas },
        paymaster_context: paymaster_context.as_ref(),
    };

    info!(family = ?config.family, %entry_point, "preparing user operation");
    let mut op = orchestrator.prepare(request).await?;
    orchestrator.sign(&mut op)?;

    match orchestrator.send(&op).await {
        Ok(hash) => {
            println!("{}", serde_json::to_string_pretty(&op)?);
            info!(%hash, "bundler accepted user operation");
        }
        Err(e) => {
            warn!(error = %e, "bundler rejected user operation");
            return Err(e.into());
        }
    }

    Ok(())
}
