//! Triage CLI - command-line front end for static analysis of
//! editor-extension packages (VSIX-style ZIP archives).

use std::path::PathBuf;

use clap::Parser;
use triage_core::{Extension, LatestState, ScanState, TriageConfig};
use triage_pipeline::{Pipeline, ReportBuilder, ReportInputs};
use triage_store::Store;

#[derive(Parser)]
#[command(name = "triage")]
#[command(about = "Static triage for editor-extension packages")]
struct Cli {
    /// Path to a TOML config file. Falls back to built-in defaults.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path to the sled database directory.
    #[arg(long, global = true, default_value = "./triage.db")]
    db: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Scan a VSIX archive and print its threat report as JSON.
    Scan {
        /// Path to the .vsix (ZIP) file.
        archive: PathBuf,
        /// `publisher.name` identifier to record the scan under.
        #[arg(long)]
        extension_id: String,
        /// Version string to record the scan under.
        #[arg(long, default_value = "0.0.0")]
        version: String,
    },
    /// Print the persisted scan history for one extension version.
    Report {
        extension_db_id: String,
    },
    /// Print the scan-state machine without touching the database.
    ServeStub,
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<TriageConfig> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&text)?)
        }
        None => Ok(TriageConfig::default()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;
    let store = Store::open(&cli.db)?;

    match cli.command {
        Commands::Scan { archive, extension_id, version } => {
            run_scan(&config, &store, &archive, &extension_id, &version).await?;
        }
        Commands::Report { extension_db_id } => {
            print_history(&store, &extension_db_id)?;
        }
        Commands::ServeStub => print_state_machine(),
    }

    Ok(())
}

async fn run_scan(
    config: &TriageConfig,
    store: &Store,
    archive: &PathBuf,
    extension_id: &str,
    version: &str,
) -> anyhow::Result<()> {
    store.upsert_extension(Extension {
        extension_id: extension_id.to_string(),
        version: version.to_string(),
        display_name: None,
        vsix_hash_sha256: None,
        install_count: 0,
        average_rating: 0.0,
        publisher_id: None,
        scan_state: ScanState::Queued,
        latest_state: LatestState::Pending,
        risk_score: None,
    })?;
    store.update_scan_state(extension_id, version, ScanState::Downloading)?;
    store.update_scan_state(extension_id, version, ScanState::StaticScanning)?;

    let pipeline = Pipeline::new(config);
    let pre_ai = |result: &triage_pipeline::PipelineResult| {
        tracing::info!(
            composite = result.composite_risk,
            critical = result.critical_count(),
            "static stages complete, starting AI Vibe Check"
        );
        true
    };
    let pre_ai: &dyn Fn(&triage_pipeline::PipelineResult) -> bool = &pre_ai;
    let pipeline_result = pipeline.run(archive, Some(pre_ai), None).await?;

    store.update_scan_state(extension_id, version, ScanState::StaticScanned)?;

    let builder = ReportBuilder::new(store, config.scoring.clone());
    let report = builder.build(extension_id, version, &pipeline_result, &ReportInputs::default())?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn print_history(store: &Store, extension_db_id: &str) -> anyhow::Result<()> {
    let rows = store.list_scan_history(extension_db_id)?;
    if rows.is_empty() {
        println!("no scan history for {extension_db_id}");
        return Ok(());
    }
    for row in rows {
        println!("{}", serde_json::to_string_pretty(&row)?);
    }
    Ok(())
}

fn print_state_machine() {
    println!("QUEUED -> DOWNLOADING -> STATIC_SCANNING -> STATIC_SCANNED -> CLEAN | FLAGGED");
    println!("STATIC_SCANNING -> HEAVYWEIGHT -> STATIC_SCANNED");
    println!("any state -> QUEUED (rescan)");
}
