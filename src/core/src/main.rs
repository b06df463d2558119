use clap::{Parser, Subcommand};
use kosmos_contracts::configuration::{Config, Overrides};
use kosmos_contracts::error_handling::types::IngestError;
use kosmos_contracts::ingestion::ContractService;
use kosmos_contracts::storage::types::Access;
use kosmos_contracts::storage::DatabaseStorage;
use log::{error, info};
use serde::Serialize;
use serde_json::json;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "kosmos-contracts")]
#[command(version)]
#[command(about = "Ingests KOSMoS data contracts and answers routing lookups")]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "KOSMOS_CONFIG")]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest a contract document
    Insert { file: PathBuf },
    /// Print a stored contract document as submitted
    Get { id: String },
    /// Deactivate a contract
    Delete { id: String },
    /// List stored contracts
    List,
    /// Active contracts covering a sensor of a machine
    Route { machine: String, sensor: String },
    /// Analysis stages built for a contract
    Stages { id: String },
    /// Organisations linked to a contract (read, write or partner)
    Access { id: String, access: Access },
}

// The storage drives its own runtime, so main stays synchronous.
fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .format_target(false)
        .init();

    let args = Args::parse();

    let config = Config::load(args.config.as_deref(), &args.overrides).unwrap_or_else(|e| {
        error!("Unable to load configuration: {}", e);
        std::process::exit(1);
    });
    info!("Configuration loaded for system '{}'", config.system.name);

    let storage = DatabaseStorage::open(&config.database.path, config.database.max_connections)
        .unwrap_or_else(|e| {
            error!("Unable to open contract database: {}", e);
            std::process::exit(1);
        });
    let service = ContractService::new(Arc::new(storage), config.system.name);

    if let Err(e) = run(&service, args.command) {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run(service: &ContractService, command: Command) -> Result<(), IngestError> {
    match command {
        Command::Insert { file } => {
            let document = std::fs::read(&file).map_err(|e| {
                IngestError::Malformed(format!("unable to read {}: {}", file.display(), e))
            })?;
            match service.insert_contract(&document) {
                Ok(status) => print_json(&json!({ "status": status.as_u16() })),
                Err(e) => {
                    print_json(&json!({
                        "status": e.status_hint().as_u16(),
                        "error": e.to_string(),
                    }));
                    return Err(e);
                }
            }
        }
        Command::Get { id } => match service.get_contract(&id)? {
            Some(document) => {
                let mut stdout = std::io::stdout();
                if let Err(e) = stdout.write_all(&document).and_then(|_| stdout.flush()) {
                    error!("Unable to write contract {}: {}", id, e);
                }
            }
            None => {
                error!("No contract with id '{}'", id);
                std::process::exit(2);
            }
        },
        Command::Delete { id } => service.delete_contract(&id)?,
        Command::List => print_json(&service.list_contracts()?),
        Command::Route { machine, sensor } => {
            print_json(&service.contracts_for_machine_sensor(&machine, &sensor)?)
        }
        Command::Stages { id } => print_json(&service.pipeline_stages(&id)?),
        Command::Access { id, access } => {
            print_json(&service.organisations_with_access(&id, access)?)
        }
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => error!("Unable to serialise output: {}", e),
    }
}
