//! Natural keys of the resolvable entities.
//!
//! Each function builds the natural-key lookup and the candidate row for one
//! entity and hands both to [`resolve`].

use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set, TransactionTrait};

use crate::contract::types::ContainerSpec;
use crate::error_handling::types::StorageError;
use crate::storage::db_entities::{
    containers, contract_machine_sensors, machine_sensors, machines, models, organisations,
    pipelines, sensors, storage_duration, systems,
};
use crate::storage::resolver::{resolve, Resolved};
use crate::storage::types::encode_list;

pub async fn organisation<C>(conn: &C, name: &str) -> Result<Resolved<i32>, StorageError>
where
    C: ConnectionTrait + TransactionTrait,
{
    resolve(
        conn,
        organisations::Entity::find().filter(organisations::Column::Name.eq(name)),
        organisations::ActiveModel {
            name: Set(name.to_string()),
            ..Default::default()
        },
    )
    .await
}

pub async fn system<C>(conn: &C, name: &str) -> Result<Resolved<i32>, StorageError>
where
    C: ConnectionTrait + TransactionTrait,
{
    resolve(
        conn,
        systems::Entity::find().filter(systems::Column::Name.eq(name)),
        systems::ActiveModel {
            name: Set(name.to_string()),
            ..Default::default()
        },
    )
    .await
}

pub async fn machine<C>(conn: &C, id: &str) -> Result<Resolved<String>, StorageError>
where
    C: ConnectionTrait + TransactionTrait,
{
    resolve(
        conn,
        machines::Entity::find_by_id(id.to_string()),
        machines::ActiveModel {
            id: Set(id.to_string()),
        },
    )
    .await
}

/// `meta` is the canonical JSON text of the sensor meta, `None` when absent.
pub async fn sensor<C>(
    conn: &C,
    transmitted_id: &str,
    meta: Option<String>,
) -> Result<Resolved<i32>, StorageError>
where
    C: ConnectionTrait + TransactionTrait,
{
    let lookup = sensors::Entity::find().filter(sensors::Column::TransmittedId.eq(transmitted_id));
    let lookup = match &meta {
        Some(text) => lookup.filter(sensors::Column::Meta.eq(text.as_str())),
        None => lookup.filter(sensors::Column::Meta.is_null()),
    };
    resolve(
        conn,
        lookup,
        sensors::ActiveModel {
            transmitted_id: Set(transmitted_id.to_string()),
            meta: Set(meta),
            ..Default::default()
        },
    )
    .await
}

pub async fn container<C>(conn: &C, spec: &ContainerSpec) -> Result<Resolved<i32>, StorageError>
where
    C: ConnectionTrait + TransactionTrait,
{
    let arguments = encode_list(&spec.arguments)?;
    let environment = encode_list(&spec.environment)?;
    resolve(
        conn,
        containers::Entity::find()
            .filter(containers::Column::Url.eq(spec.url.as_str()))
            .filter(containers::Column::Tag.eq(spec.tag.as_str()))
            .filter(containers::Column::Arguments.eq(arguments.as_str()))
            .filter(containers::Column::Environment.eq(environment.as_str())),
        containers::ActiveModel {
            url: Set(spec.url.clone()),
            tag: Set(spec.tag.clone()),
            arguments: Set(arguments),
            environment: Set(environment),
            ..Default::default()
        },
    )
    .await
}

/// Resolves the container first, then the model executing it.
pub async fn model<C>(conn: &C, spec: &ContainerSpec) -> Result<Resolved<i32>, StorageError>
where
    C: ConnectionTrait + TransactionTrait,
{
    let container = container(conn, spec).await?.id;
    resolve(
        conn,
        models::Entity::find().filter(models::Column::Container.eq(container)),
        models::ActiveModel {
            container: Set(container),
            ..Default::default()
        },
    )
    .await
}

pub async fn machine_sensor<C>(
    conn: &C,
    machine: &str,
    sensor: i32,
) -> Result<Resolved<i32>, StorageError>
where
    C: ConnectionTrait + TransactionTrait,
{
    resolve(
        conn,
        machine_sensors::Entity::find()
            .filter(machine_sensors::Column::Machine.eq(machine))
            .filter(machine_sensors::Column::Sensor.eq(sensor)),
        machine_sensors::ActiveModel {
            machine: Set(machine.to_string()),
            sensor: Set(sensor),
            ..Default::default()
        },
    )
    .await
}

pub async fn contract_machine_sensor<C>(
    conn: &C,
    contract: &str,
    machine_sensor: i32,
) -> Result<Resolved<i32>, StorageError>
where
    C: ConnectionTrait + TransactionTrait,
{
    resolve(
        conn,
        contract_machine_sensors::Entity::find()
            .filter(contract_machine_sensors::Column::Contract.eq(contract))
            .filter(contract_machine_sensors::Column::MachineSensor.eq(machine_sensor)),
        contract_machine_sensors::ActiveModel {
            contract: Set(contract.to_string()),
            machine_sensor: Set(machine_sensor),
            ..Default::default()
        },
    )
    .await
}

pub async fn storage_duration<C>(
    conn: &C,
    contract_machine_sensor: i32,
    system: i32,
    duration: &str,
) -> Result<Resolved<i32>, StorageError>
where
    C: ConnectionTrait + TransactionTrait,
{
    resolve(
        conn,
        storage_duration::Entity::find()
            .filter(storage_duration::Column::ContractMachineSensor.eq(contract_machine_sensor))
            .filter(storage_duration::Column::System.eq(system))
            .filter(storage_duration::Column::Duration.eq(duration)),
        storage_duration::ActiveModel {
            contract_machine_sensor: Set(contract_machine_sensor),
            system: Set(system),
            duration: Set(duration.to_string()),
            ..Default::default()
        },
    )
    .await
}

/// `delay` is the trigger's delay-after specification; `None` and every
/// distinct delay are separate pipelines.
pub async fn pipeline<C>(
    conn: &C,
    contract_machine_sensor: i32,
    system: i32,
    delay: Option<String>,
) -> Result<Resolved<i32>, StorageError>
where
    C: ConnectionTrait + TransactionTrait,
{
    let lookup = pipelines::Entity::find()
        .filter(pipelines::Column::ContractMachineSensor.eq(contract_machine_sensor))
        .filter(pipelines::Column::System.eq(system));
    let lookup = match &delay {
        Some(after) => lookup.filter(pipelines::Column::TimeTrigger.eq(after.as_str())),
        None => lookup.filter(pipelines::Column::TimeTrigger.is_null()),
    };
    resolve(
        conn,
        lookup,
        pipelines::ActiveModel {
            contract_machine_sensor: Set(contract_machine_sensor),
            system: Set(system),
            time_trigger: Set(delay),
            ..Default::default()
        },
    )
    .await
}
