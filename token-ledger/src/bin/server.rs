//! Token ledger server binary
//!
//! Reads one invocation per stdin line, `function arg1 arg2 ...`, and
//! prints `OK <payload>` or `ERR <message>`.

use anyhow::Context;
use std::sync::Arc;
use token_ledger::{
    spawn_ledger_actor, Config, ContractAddress, InMemoryMarketplace, TokenLedger,
};
use tokio::io::{AsyncBufReadExt, BufReader};

const MAILBOX_CAPACITY: usize = 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if std::env::var("TOKEN_LEDGER_LOG_JSON").is_ok() {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!("Starting token ledger");

    // Load configuration
    let config = match std::env::var("TOKEN_LEDGER_CONFIG") {
        Ok(path) => Config::from_file(&path).with_context(|| format!("loading {}", path))?,
        Err(_) => Config::from_env().context("loading configuration from environment")?,
    };

    let marketplace = Arc::new(InMemoryMarketplace::new());
    if let (Ok(channel), Ok(contract)) = (
        std::env::var("TOKEN_LEDGER_MARKETPLACE_CHANNEL"),
        std::env::var("TOKEN_LEDGER_MARKETPLACE_CONTRACT"),
    ) {
        marketplace.deploy(ContractAddress::new(channel, contract));
    }

    // Open ledger
    let seed = config.seed.clone();
    let ledger = TokenLedger::open(config, marketplace)?;
    if seed.accounts > 0 && ledger.is_empty()? {
        ledger.init_accounts(seed.accounts, seed.tokens)?;
        tracing::info!(accounts = seed.accounts, tokens = seed.tokens, "Seeded empty ledger");
    }

    let handle = spawn_ledger_actor(Arc::new(ledger), MAILBOX_CAPACITY);
    tracing::info!("Ledger ready");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let mut parts = line.split_whitespace().map(str::to_string);
                let Some(function) = parts.next() else { continue };
                match handle.call(&function, parts.collect()).await {
                    Ok(payload) => println!("OK {}", payload),
                    Err(e) => println!("ERR {}", e),
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    tracing::info!("Shutting down token ledger");
    handle.shutdown().await?;
    Ok(())
}
