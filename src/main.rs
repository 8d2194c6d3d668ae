//! Ethereum wallet bridge CLI
//!
//! Serves the wallet bridge over stdio, or runs single operations.

use clap::{Parser, Subcommand};
use ether_bridge::bridge::{AuditLogInterceptor, Bridge};
use ether_bridge::config::{NetworkPreference, Networks};
use ether_bridge::{Config, Result, WalletEngine};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "ether-bridge")]
#[command(about = "Ethereum wallet engine behind a JSON request/response bridge")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the bridge as JSON lines on stdin/stdout
    Serve,

    /// Run one bridge operation and print its envelope
    Call {
        /// Operation name, e.g. getETHBalance
        method: String,

        /// Parameters as a JSON object
        #[arg(short = 'P', long)]
        params: Option<String>,

        /// Network preset filling rpcUrl/chainId when the params lack them
        /// (defaults to the selected network)
        #[arg(short, long)]
        network: Option<String>,
    },

    /// Inspect or change the selected network
    Network {
        #[command(subcommand)]
        action: NetworkAction,
    },

    /// Show current configuration
    Config,
}

#[derive(Subcommand)]
enum NetworkAction {
    /// List the network presets
    List,
    /// Show the selected network
    Current,
    /// Select a network by key
    Use { key: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (ignore if not found)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // stdout carries the protocol, so logs go to stderr. RUST_LOG wins.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    match cli.command {
        Commands::Serve => run_serve(config).await?,
        Commands::Call {
            method,
            params,
            network,
        } => run_call(config, method, params, network).await?,
        Commands::Network { action } => run_network(&config, action)?,
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

fn build_bridge(config: &Config) -> Bridge {
    let bridge = Bridge::new(WalletEngine::new(config));
    match &config.audit_log_path {
        Some(audit_path) => {
            tracing::info!(audit_path = %audit_path, "Added audit log interceptor");
            bridge.with_interceptor(AuditLogInterceptor::new(audit_path))
        }
        None => bridge,
    }
}

async fn run_serve(config: Config) -> Result<()> {
    tracing::info!(
        rpc_timeout_ms = config.rpc_timeout_ms,
        derivation_path = %config.derivation_path,
        "Starting bridge server"
    );
    let bridge = Arc::new(build_bridge(&config));
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    ether_bridge::server::serve(bridge, stdin, tokio::io::stdout()).await
}

async fn run_call(
    config: Config,
    method: String,
    params: Option<String>,
    network: Option<String>,
) -> Result<()> {
    let mut params: Value = match params {
        Some(raw) => serde_json::from_str(&raw)
            .map_err(|e| ether_bridge::Error::InvalidInput(format!("--params: {}", e)))?,
        None => json!({}),
    };

    let networks = Networks::from_rpc_config(&config.rpc_config());
    let preset = match network {
        Some(key) => networks.find(&key).cloned().ok_or_else(|| {
            ether_bridge::Error::InvalidInput(format!("Unknown network: {}", key))
        })?,
        None => {
            let preference = NetworkPreference::load(&config.preference_path, &networks);
            preference.current(&networks).cloned().ok_or_else(|| {
                ether_bridge::Error::Config("selected network is not a preset".to_string())
            })?
        }
    };

    if let Value::Object(map) = &mut params {
        map.entry("rpcUrl").or_insert_with(|| json!(preset.rpc_url));
        map.entry("chainId").or_insert_with(|| json!(preset.chain_id));
    }

    let bridge = build_bridge(&config);
    bridge.finish_load();
    let envelope = bridge.call(&method, params).await;

    println!("{}", serde_json::to_string_pretty(&envelope)?);
    if !envelope.state {
        std::process::exit(1);
    }
    Ok(())
}

fn run_network(config: &Config, action: NetworkAction) -> Result<()> {
    let networks = Networks::from_rpc_config(&config.rpc_config());
    let mut preference = NetworkPreference::load(&config.preference_path, &networks);

    match action {
        NetworkAction::List => {
            let listing: Vec<Value> = networks
                .all()
                .iter()
                .map(|n| {
                    json!({
                        "key": n.key,
                        "label": n.label,
                        "chainId": n.chain_id,
                        "rpcUrl": n.rpc_url,
                        "selected": n.key == preference.current_key(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&listing)?);
        }
        NetworkAction::Current => {
            println!(
                "{}",
                serde_json::to_string_pretty(&preference.current(&networks))?
            );
        }
        NetworkAction::Use { key } => {
            if preference.set(&key, &networks)? {
                tracing::info!(network = %key, path = %preference.path().display(), "Selected network");
                println!("{}", key);
            } else {
                tracing::warn!(network = %key, "Unknown network key, selection unchanged");
                println!("{}", preference.current_key());
            }
        }
    }

    Ok(())
}
