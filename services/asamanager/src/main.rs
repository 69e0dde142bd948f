//! ASA manager command line

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use asa_model::EntityKind;
use asa_store::{ExportWriter, FileExportWriter, MemoryStorage, RedisStorage};
use asamanager::{AsaConfig, ConversionOrchestrator, ExportTarget, HttpDeviceRegistry};
use clap::{Parser, Subcommand};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", env = "ASA_CONFIG_FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Convert one entity collection of a tenant and write the export
    Convert {
        /// Entity kind: rules or devicegroups
        #[arg(short, long)]
        kind: EntityKind,

        /// Tenant id
        #[arg(short, long)]
        tenant: String,
    },

    /// Validate configuration and check Redis connectivity
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = AsaConfig::resolve_path(args.config);
    let config =
        AsaConfig::load(config_path.as_deref()).context("Failed to load configuration")?;

    common::logging::init_with_config(config.to_log_config())
        .context("Failed to initialize logging")?;

    match args.command {
        Commands::Convert { kind, tenant } => run_convert(&config, kind, &tenant).await,
        Commands::Check => run_check(&config).await,
    }
}

async fn run_convert(config: &AsaConfig, kind: EntityKind, tenant: &str) -> Result<()> {
    info!("Starting {} conversion for tenant {}", kind, tenant);

    let storage = Arc::new(
        RedisStorage::new(&config.storage.redis_url, config.storage.max_connections)
            .await
            .context("Failed to connect to Redis")?,
    );
    let registry = Arc::new(HttpDeviceRegistry::new(&config.device_registry)?);
    let writer: Arc<dyn ExportWriter> = match config.export.target {
        ExportTarget::Redis => storage.clone(),
        ExportTarget::File => Arc::new(FileExportWriter::new(&config.export.dir)),
        ExportTarget::Memory => Arc::new(MemoryStorage::new()),
    };

    let orchestrator =
        ConversionOrchestrator::new(storage, registry, writer, config.conversion.clone())
            .with_collections(config.storage.collections());

    let cancel = common::shutdown::shutdown_token();
    let result = orchestrator.convert_with_cancel(kind, tenant, &cancel).await;
    cancel.cancel();

    match result {
        Ok(report) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        },
        Err(e) => {
            error!("Conversion aborted at stage {}: {}", e.stage(), e);
            Err(e.into())
        },
    }
}

async fn run_check(config: &AsaConfig) -> Result<()> {
    HttpDeviceRegistry::new(&config.device_registry)?;

    let storage = RedisStorage::new(&config.storage.redis_url, config.storage.max_connections)
        .await
        .context("Failed to connect to Redis")?;
    storage.ping().await.context("Redis ping failed")?;

    info!("Configuration valid, Redis reachable at {}", config.storage.redis_url);
    println!("OK");
    Ok(())
}
