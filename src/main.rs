use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Table};

use starknet_ledger::transport::list_ledger_devices;
use starknet_ledger::types::parse_u256;
use starknet_ledger::version::check_app_version;
use starknet_ledger::{HidTransport, LedgerStarknetApp, SignerConfig};

#[derive(Parser)]
#[command(name = "stark-ledger", about = "Starknet signing with a Ledger device", version)]
struct Cli {
    /// Config file (defaults to ~/.starknet-ledger/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// HID path of the device to use
    #[arg(long, global = true)]
    device: Option<String>,

    /// Chain id: mainnet, sepolia, a short string or a felt
    #[arg(long, global = true)]
    chain_id: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List attached Ledger devices
    Devices,
    /// Show the Starknet app version
    Version,
    /// Show the public key for a derivation path
    PublicKey {
        #[arg(long)]
        path: Option<String>,
        /// Display the key on the device and wait for approval
        #[arg(long)]
        confirm: bool,
    },
    /// Blind-sign a hash (0x-hex or decimal)
    SignHash {
        hash: String,
        #[arg(long)]
        path: Option<String>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = SignerConfig::load(cli.config.as_deref()).context("Failed to load config")?;
    if let Some(device) = cli.device {
        config.device_path = Some(device);
    }
    if let Some(chain_id) = cli.chain_id {
        config.chain_id = chain_id;
    }

    match cli.command {
        Command::Devices => list_devices(),
        Command::Version => show_version(&config),
        Command::PublicKey { path, confirm } => {
            if let Some(path) = path {
                config.derivation_path = path;
            }
            show_public_key(&config, confirm)
        }
        Command::SignHash { hash, path } => {
            if let Some(path) = path {
                config.derivation_path = path;
            }
            sign_hash(&config, &hash)
        }
    }
}

fn open_app(config: &SignerConfig) -> Result<LedgerStarknetApp<HidTransport>> {
    let transport = HidTransport::open(config.device_path.as_deref(), config.read_timeout_ms)
        .context("Failed to open Ledger device")?;
    Ok(LedgerStarknetApp::new(transport))
}

fn list_devices() -> Result<()> {
    let devices = list_ledger_devices().context("Failed to enumerate HID devices")?;
    if devices.is_empty() {
        println!("No Ledger devices found");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Path", "Product", "Serial", "VID:PID"]);
    for device in devices {
        table.add_row(vec![
            device.path,
            device.product.unwrap_or_default(),
            device.serial_number.unwrap_or_default(),
            format!("{:04x}:{:04x}", device.vendor_id, device.product_id),
        ]);
    }
    println!("{table}");
    Ok(())
}

fn show_version(config: &SignerConfig) -> Result<()> {
    let app = open_app(config)?;
    let version = app.get_version().context("Failed to get app version")?;
    let check = check_app_version(version, &config.min_app_version)?;

    println!("Starknet app version: {}", version);
    if check.needs_update {
        println!(
            "Warning: minimum supported version is {}, please update the app",
            check.minimum_version
        );
    }
    Ok(())
}

fn show_public_key(config: &SignerConfig, confirm: bool) -> Result<()> {
    let (path, _) = config.validate().context("Invalid configuration")?;
    let app = open_app(config)?;
    if confirm {
        println!("Confirm the public key on the device...");
    }
    let public_key = app.get_public_key(&path, confirm).context("Failed to get public key")?;
    println!("{:#x}", public_key);
    Ok(())
}

fn sign_hash(config: &SignerConfig, hash: &str) -> Result<()> {
    let hash = parse_u256(hash).context("Invalid hash")?;
    let (path, _) = config.validate().context("Invalid configuration")?;
    let app = open_app(config)?;

    println!("Approve the signature on the device...");
    let signature = app.sign_hash(&path, hash).context("Failed to sign hash")?;
    println!("{}", serde_json::to_string_pretty(&signature)?);
    Ok(())
}
