use env_logger::Env;
use kosmos_contracts::ingestion::ContractService;
use kosmos_contracts::storage::types::Access;
use kosmos_contracts::storage::DatabaseStorage;
use log::{info, warn};
use serde_json::json;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

fn main() {
    // RUST_LOG can override; default to info
    let _ = env_logger::Builder::from_env(Env::default().default_filter_or("info")).try_init();

    let out_dir: PathBuf = env::var("INGEST_DEMO_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            env::current_dir()
                .expect("cwd")
                .join("target")
                .join("ingest_demo")
        });
    fs::create_dir_all(&out_dir).expect("create output dir");
    let db_path = out_dir.join("ingest_demo.sqlite3");
    let _ = fs::remove_file(&db_path);

    let storage = DatabaseStorage::new_file(&db_path).expect("create db (file)");
    info!("Using DatabaseStorage at {}", db_path.display());
    let service = ContractService::new(Arc::new(storage), "edge");

    let stage = |url: &str, from: Option<&str>, to: Option<&str>| {
        json!({
            "container": { "url": url, "tag": "1.0", "arguments": [], "environment": [] },
            "persistOutput": to.is_none(),
            "from": from.map(|u| json!({ "url": u, "tag": "1.0" })),
            "to": to.map(|u| json!({ "url": u, "tag": "1.0" })),
        })
    };
    let document = json!({
        "body": {
            "contract": {
                "valid": { "start": "2024-01-01T00:00:00Z", "end": "2026-01-01T00:00:00Z" },
                "creationTime": "2023-12-15T09:30:00Z",
                "partners": ["acme"],
                "Permissions": { "read": ["acme", "auditor"], "write": ["acme"] },
                "id": "demo-contract",
                "version": "1.0.0"
            },
            "machine": "press-7",
            "kosmosLocalSystems": ["cloud"],
            "sensors": [
                { "name": "temperature", "storageDuration": [{ "systemName": "cloud", "duration": "30d" }] },
                { "name": "vibration", "meta": { "rate": "1kHz" } }
            ],
            "checkSignatures": false,
            "analysis": {
                "enable": true,
                "systems": [{
                    "enable": true,
                    "system": "edge",
                    "pipelines": [{
                        "ml-trigger": { "type": "time", "definition": { "after": "10m" } },
                        "pipeline": [
                            stage("registry/clean", None, Some("registry/score")),
                            stage("registry/score", Some("registry/clean"), None),
                        ],
                        "sensors": ["temperature", "vibration"]
                    }]
                }]
            }
        },
        "signature": {}
    });
    let bytes = serde_json::to_vec_pretty(&document).expect("serialise contract");

    match service.insert_contract(&bytes) {
        Ok(status) => info!("Ingested demo-contract: HTTP {}", status.as_u16()),
        Err(e) => warn!("Ingestion failed ({}): {}", e.status_hint().as_u16(), e),
    }
    // Second submission of the same id is a conflict
    if let Err(e) = service.insert_contract(&bytes) {
        info!("Resubmission rejected ({}): {}", e.status_hint().as_u16(), e);
    }

    let routed = service
        .contracts_for_machine_sensor("press-7", "vibration")
        .expect("routing lookup");
    info!("Contracts for press-7/vibration: {:?}", routed);

    let readers = service
        .organisations_with_access("demo-contract", Access::Read)
        .expect("read grants");
    info!("Readers: {:?}", readers);

    for stage in service.pipeline_stages("demo-contract").expect("stages") {
        info!(
            "pipeline {} [{}] sensor={} execute={} prev={:?} next={:?} persist={}",
            stage.pipeline,
            stage.time_trigger.as_deref().unwrap_or("-"),
            stage.sensor,
            stage.execute,
            stage.prev_model,
            stage.next_model,
            stage.persist
        );
    }

    service.delete_contract("demo-contract").expect("delete");
    let after = service
        .contracts_for_machine_sensor("press-7", "vibration")
        .expect("routing lookup");
    info!("After delete: {:?}", after);
}
