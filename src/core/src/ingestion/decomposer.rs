//! Writes one validated contract as relational rows.
//!
//! The caller owns the transaction; any error returned here must roll it
//! back so that no partial contract stays visible.

use std::collections::{HashMap, HashSet};

use log::{debug, info};
use sea_orm::{ConnectionTrait, EntityTrait, Set, SqlErr, TransactionTrait};

use crate::contract::types::Contract;
use crate::error_handling::types::IngestError;
use crate::ingestion::{entities, pipeline_graph};
use crate::storage::db_entities::{
    contracts, partners, read_permissions, technical_containers, write_permissions,
};
use crate::storage::types::Access;

pub async fn decompose<C>(
    conn: &C,
    contract: &Contract,
    document: &[u8],
    local_system: &str,
) -> Result<(), IngestError>
where
    C: ConnectionTrait + TransactionTrait,
{
    let body = &contract.body;
    let header = &body.contract;
    let id = header.id.as_str();

    // The contract row goes first so the transaction holds the write lock
    // before it reads anything.
    let inserted = contracts::Entity::insert(contracts::ActiveModel {
        id: Set(id.to_string()),
        start_time: Set(header.valid.start.clone()),
        end_time: Set(header.valid.end.clone()),
        creation: Set(header.creation_time.clone()),
        validate_signature: Set(body.check_signature),
        active: Set(true),
        contract: Set(document.to_vec()),
    })
    .exec_without_returning(conn)
    .await;
    match inserted {
        Ok(_) => {}
        Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            return Err(IngestError::Conflict(id.to_string()));
        }
        Err(err) => return Err(err.into()),
    }
    debug!("stored document of contract {} ({} bytes)", id, document.len());

    link_organisations(conn, id, Access::Partner, &header.partners).await?;
    link_organisations(conn, id, Access::Read, &header.permissions.read).await?;
    link_organisations(conn, id, Access::Write, &header.permissions.write).await?;

    let machine = entities::machine(conn, &body.machine).await?.id;

    let mut systems: HashMap<String, i32> = HashMap::new();
    for name in body
        .local_systems
        .iter()
        .map(String::as_str)
        .chain(std::iter::once(local_system))
    {
        if !systems.contains_key(name) {
            let system = entities::system(conn, name).await?.id;
            systems.insert(name.to_string(), system);
        }
    }

    let mut linked = HashSet::new();
    for requirement in &body.technical_containers {
        let system = system_id(conn, &mut systems, &requirement.system).await?;
        for spec in &requirement.containers {
            let container = entities::container(conn, spec).await?.id;
            if !linked.insert((container, system)) {
                continue;
            }
            technical_containers::Entity::insert(technical_containers::ActiveModel {
                contract: Set(id.to_string()),
                container: Set(container),
                system: Set(system),
            })
            .exec_without_returning(conn)
            .await?;
        }
    }

    let mut sensors: HashMap<String, i32> = HashMap::new();
    for declaration in &body.sensors {
        let sensor = entities::sensor(conn, &declaration.name, declaration.meta_key())
            .await?
            .id;
        let machine_sensor = entities::machine_sensor(conn, &machine, sensor).await?.id;
        let contract_machine_sensor =
            entities::contract_machine_sensor(conn, id, machine_sensor).await?.id;
        for policy in &declaration.storage_duration {
            let system = system_id(conn, &mut systems, &policy.system_name).await?;
            entities::storage_duration(conn, contract_machine_sensor, system, &policy.duration)
                .await?;
        }
        sensors.insert(declaration.name.clone(), contract_machine_sensor);
    }

    let current = system_id(conn, &mut systems, local_system).await?;
    let rows = pipeline_graph::build(conn, &body.analysis, local_system, current, &sensors).await?;

    info!(
        "decomposed contract {}: {} sensor(s), {} system(s), {} analysis row(s)",
        id,
        sensors.len(),
        systems.len(),
        rows
    );
    Ok(())
}

/// Looks a system up in the map, resolving it by name when absent.
async fn system_id<C>(
    conn: &C,
    systems: &mut HashMap<String, i32>,
    name: &str,
) -> Result<i32, IngestError>
where
    C: ConnectionTrait + TransactionTrait,
{
    if let Some(id) = systems.get(name) {
        return Ok(*id);
    }
    let id = entities::system(conn, name).await?.id;
    systems.insert(name.to_string(), id);
    Ok(id)
}

async fn link_organisations<C>(
    conn: &C,
    contract: &str,
    access: Access,
    names: &[String],
) -> Result<(), IngestError>
where
    C: ConnectionTrait + TransactionTrait,
{
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name.as_str()) {
            continue;
        }
        let organisation = entities::organisation(conn, name).await?.id;
        match access {
            Access::Partner => {
                partners::Entity::insert(partners::ActiveModel {
                    contract: Set(contract.to_string()),
                    organisation: Set(organisation),
                })
                .exec_without_returning(conn)
                .await?;
            }
            Access::Read => {
                read_permissions::Entity::insert(read_permissions::ActiveModel {
                    contract: Set(contract.to_string()),
                    organisation: Set(organisation),
                })
                .exec_without_returning(conn)
                .await?;
            }
            Access::Write => {
                write_permissions::Entity::insert(write_permissions::ActiveModel {
                    contract: Set(contract.to_string()),
                    organisation: Set(organisation),
                })
                .exec_without_returning(conn)
                .await?;
            }
        }
    }
    if !seen.is_empty() {
        debug!("linked {} organisation(s) to {} as {:?}", seen.len(), contract, access);
    }
    Ok(())
}
