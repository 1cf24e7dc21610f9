use anyhow::Context;
use clap::Parser;
use tracing::info;

use shortvault::cli::Cli;
use shortvault::config::{StaticConfig, get_config, init_config_with};
use shortvault::storage::{LinkStore, StorageFactory};
use shortvault::system::{init_logging, shutdown};
use shortvault::worker::DeleteWorker;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    if cli.print_config {
        println!("{}", StaticConfig::generate_sample_config());
        return Ok(());
    }

    init_config_with(StaticConfig::load_from(&cli.config));
    let config = get_config();

    let _guard = init_logging(&config.logging)?;
    info!("Starting shortvault with {} storage", config.storage.mode);

    let storage = StorageFactory::create(&config.storage)
        .await
        .context("Failed to create storage backend")?;

    storage
        .ping()
        .await
        .with_context(|| format!("{} storage is not reachable", storage.backend_name()))?;

    let worker = DeleteWorker::from_storage(storage.clone(), &config.worker).spawn();

    shutdown::wait_for_signal().await;
    shutdown::shutdown(worker, storage).await;

    Ok(())
}
