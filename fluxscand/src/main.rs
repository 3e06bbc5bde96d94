//! The fluxscan daemon: drives the ingestion pipeline against a Flux
//! daemon and a columnar analytics store.

mod config;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Context, Result};
use fluxscan_indexer::{IndexError, SyncLoop};
use fluxscan_rpc::RpcClient;
use fluxscan_store::{HttpStore, IndexStore, StoreClient};
use tokio::sync::watch;
use tracing::{error, info};

use config::Config;

// Exit codes for unrecoverable faults, distinguishable by supervisors.
const EXIT_RPC_FAILURE: u8 = 2;
const EXIT_STORE_FAILURE: u8 = 3;
const EXIT_REORG_DEPTH: u8 = 4;

#[derive(Parser)]
#[command(name = "fluxscand", about = "Flux blockchain analytics indexer")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the sync loop (the default).
    Start,
    /// Create the analytics database and tables, then exit.
    InitSchema,
    /// Print the stored sync progress, then exit.
    Status,
}

fn init_tracing(filter: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;

    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;
    init_tracing(&config.log.filter);

    let store = HttpStore::new(StoreClient::new(config.store_config())?);

    match args.command.unwrap_or(Command::Start) {
        Command::InitSchema => {
            store
                .init_schema()
                .await
                .wrap_err("creating the analytics schema")?;
            info!("analytics schema ready");
            Ok(ExitCode::SUCCESS)
        }
        Command::Status => {
            match store.read_sync_state().await? {
                Some(state) => {
                    let synced = state.current_height + 1 >= state.chain_height;
                    println!(
                        "height {} / {} ({:.2}%), synced: {}, {:.2} blocks/s",
                        state.current_height,
                        state.chain_height,
                        state.sync_percentage,
                        synced,
                        state.blocks_per_second,
                    );
                }
                None => println!("no sync state recorded yet"),
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Start => run(config, store).await,
    }
}

async fn run(config: Config, store: HttpStore) -> Result<ExitCode> {
    let rpc = RpcClient::new(config.rpc_config())?;

    // Fail fast on an unreachable daemon before touching the store.
    let info = rpc
        .get_blockchain_info()
        .await
        .wrap_err("connecting to the flux daemon")?;
    info!(chain = %info.chain, blocks = info.blocks, "connected to daemon");

    let mut sync = SyncLoop::new(
        rpc,
        store,
        config.chain.clone(),
        config.sync_config(),
    )
    .await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, shutting down after the current batch");
            let _ = shutdown_tx.send(true);
        }
    });

    match sync.run(shutdown_rx).await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(error) => {
            error!(%error, "ingestion halted");
            Ok(ExitCode::from(exit_code_for(&error)))
        }
    }
}

/// Map fatal ingestion errors to the documented exit codes.
fn exit_code_for(error: &IndexError) -> u8 {
    match error {
        IndexError::ReorgTooDeep { .. } => EXIT_REORG_DEPTH,
        IndexError::Rpc(_) => EXIT_RPC_FAILURE,
        IndexError::Store(_) => EXIT_STORE_FAILURE,
        _ => 1,
    }
}
