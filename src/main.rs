//! bridge_transfers - inspect transfers and build lock proofs
//!
//! ```text
//! bridge_transfers [--env dev] proof <lock_tx_hash>   build and print a lock proof
//! bridge_transfers [--env dev] list                   print stored transfers
//! bridge_transfers [--env dev] show <transfer_id>     print one transfer
//! bridge_transfers [--env dev] clear <transfer_id>    remove a stored transfer
//! ```
//!
//! Configuration is read from `config/{env}.yaml`.

use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};

use bridge_transfers::config::AppConfig;
use bridge_transfers::storage::FileStorage;
use bridge_transfers::transfer::{PendingMintLedger, TransferList, TransferStore};
use bridge_transfers::{EthRpcClient, H256, ProofBuilder, TransferId};

const USAGE: &str = "usage: bridge_transfers [--env <env>] <proof <tx_hash> | list | show <id> | clear <id>>";

fn get_env(args: &[String]) -> String {
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

/// Positional arguments with `--env <value>` removed.
fn positional(args: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        if arg == "--env" || arg == "-e" {
            iter.next();
            continue;
        }
        out.push(arg.clone());
    }
    out
}

fn open_storage(config: &AppConfig) -> Result<Arc<FileStorage>> {
    let storage = FileStorage::new(&config.storage.path)
        .with_context(|| format!("opening storage at {}", config.storage.path))?;
    Ok(Arc::new(storage))
}

fn parse_id(arg: Option<&String>) -> Result<TransferId> {
    let raw = arg.ok_or_else(|| anyhow!("missing transfer id\n{}", USAGE))?;
    raw.parse::<TransferId>()
        .map_err(|e| anyhow!("invalid transfer id {}: {}", raw, e))
}

async fn build_proof(config: &AppConfig, tx_hash: &str) -> Result<()> {
    let tx_hash = tx_hash
        .parse::<H256>()
        .map_err(|e| anyhow!("invalid transaction hash {}: {}", tx_hash, e))?;

    let client = EthRpcClient::new(config.source.clone())?;
    let builder = ProofBuilder::new(Arc::new(client), config.source.locker_address);
    let proof = builder.build(&tx_hash).await?;

    println!("{}", serde_json::to_string_pretty(&proof)?);
    Ok(())
}

fn list_transfers(config: &AppConfig) -> Result<()> {
    let store = TransferStore::new(open_storage(config)?);
    let (complete, in_progress) = store
        .list()?
        .into_iter()
        .partition(|r| r.status.is_terminal());
    let list = TransferList {
        in_progress,
        complete,
    };

    println!("{}", serde_json::to_string_pretty(&list)?);
    Ok(())
}

fn show_transfer(config: &AppConfig, id: &TransferId) -> Result<()> {
    let storage = open_storage(config)?;
    let store = TransferStore::new(storage.clone());
    let record = store
        .get(id)?
        .ok_or_else(|| anyhow!("transfer {} not found", id))?;
    let pending_mint = PendingMintLedger::new(storage).get(id)?;

    println!("{}", serde_json::to_string_pretty(&record)?);
    println!("status: {}", record.human_status());
    if let Some(entry) = pending_mint {
        println!("mint submitted, balance before: {}", entry.balance_before);
    }
    Ok(())
}

fn clear_transfer(config: &AppConfig, id: &TransferId) -> Result<()> {
    let storage = open_storage(config)?;
    PendingMintLedger::new(storage.clone()).take(id)?;
    match TransferStore::new(storage).remove(id)? {
        Some(_) => {
            tracing::info!(transfer_id = %id, "Transfer cleared");
            println!("cleared {}", id);
        }
        None => println!("transfer {} not found", id),
    }
    Ok(())
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let env = get_env(&args);
    let app_config = AppConfig::load(&env)?;
    let _log_guard = bridge_transfers::logging::init_logging(&app_config);

    tracing::info!(
        git_hash = env!("GIT_HASH"),
        env = %env,
        "Starting bridge_transfers"
    );

    let positional = positional(&args);
    let Some(command) = positional.first() else {
        bail!(USAGE);
    };

    match command.as_str() {
        "proof" => {
            let tx_hash = positional
                .get(1)
                .ok_or_else(|| anyhow!("missing transaction hash\n{}", USAGE))?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(build_proof(&app_config, tx_hash))
        }
        "list" => list_transfers(&app_config),
        "show" => show_transfer(&app_config, &parse_id(positional.get(1))?),
        "clear" => clear_transfer(&app_config, &parse_id(positional.get(1))?),
        other => bail!("unknown command {}\n{}", other, USAGE),
    }
}
