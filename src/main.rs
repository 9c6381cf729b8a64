use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use contract_harvester::application::HarvestService;
use contract_harvester::domain::ContractRecord;
use contract_harvester::infrastructure::sink::{sort_for_sink, JsonSnapshot, RecordSink, TsvFileSink};
use contract_harvester::infrastructure::{logging, HarvesterConfig, ReqwestTransportFactory};

/// Harvest procurement contracts with their details, documents and announcements.
#[derive(Debug, Parser)]
#[command(name = "contract-harvester", version, about)]
struct Cli {
    /// Configuration file (TOML, JSON or YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose console output
    #[arg(short, long)]
    debug: bool,

    /// Where to write the JSON snapshot of all records
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Where to write the tab separated table
    #[arg(long)]
    table: Option<PathBuf>,

    /// Re-emit a previous snapshot instead of fetching
    #[arg(long, value_name = "PATH")]
    from_snapshot: Option<PathBuf>,

    /// Only harvest the first N listing pages
    #[arg(long, value_name = "N")]
    max_pages: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = HarvesterConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if cli.debug {
        config.logging.console_level = "debug".to_string();
    }
    if let Some(path) = cli.snapshot {
        config.output.snapshot_path = path;
    }
    if let Some(path) = cli.table {
        config.output.table_path = path;
    }

    let _logging = logging::init(&config.logging)?;
    logging::log_system_info();

    if let Err(e) = run(&config, cli.from_snapshot, cli.max_pages).await {
        error!("Harvest failed: {:#}", e);
        return Err(e);
    }
    Ok(())
}

async fn run(config: &HarvesterConfig, from_snapshot: Option<PathBuf>, max_pages: Option<u32>) -> Result<()> {
    let mut records: Vec<ContractRecord> = match from_snapshot {
        Some(path) => {
            info!("Loading records from {}", path.display());
            JsonSnapshot::new(path).load().await?
        }
        None => {
            let transports = Arc::new(ReqwestTransportFactory::new(config.http.clone()));
            let harvest = HarvestService::new(config.clone(), transports)
                .run(max_pages)
                .await
                .context("Harvest aborted")?;
            harvest.report.log();
            harvest.records
        }
    };

    sort_for_sink(&mut records);

    let sinks: [Box<dyn RecordSink>; 2] = [
        Box::new(JsonSnapshot::new(&config.output.snapshot_path)),
        Box::new(TsvFileSink::new(&config.output.table_path)),
    ];
    for sink in &sinks {
        sink.write(&records).await?;
    }

    info!("🎉 Done: {} contracts", records.len());
    Ok(())
}
