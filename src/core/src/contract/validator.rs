//! In-memory checks run on a parsed contract before anything is written.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use log::debug;

use crate::contract::types::Contract;
use crate::error_handling::types::ValidationError;

/// Checks `contract` as seen by the system named `local_system` and returns
/// the first rule it breaks.
pub fn validate(contract: &Contract, local_system: &str) -> Result<(), ValidationError> {
    let body = &contract.body;

    if body.contract.id.trim().is_empty() {
        return Err(ValidationError::MissingContractId);
    }
    if body.machine.trim().is_empty() {
        return Err(ValidationError::MissingMachine);
    }

    let allowed = allowed_systems(contract, local_system);
    for system in &body.analysis.systems {
        if !allowed.contains(system.name.as_str()) {
            return Err(ValidationError::UnknownSystem {
                section: "analysis",
                system: system.name.clone(),
            });
        }
    }
    for requirement in &body.technical_containers {
        if !allowed.contains(requirement.system.as_str()) {
            return Err(ValidationError::UnknownSystem {
                section: "requiredTechnicalContainers",
                system: requirement.system.clone(),
            });
        }
    }

    let start = parse_timestamp("valid.start", &body.contract.valid.start)?;
    let end = parse_timestamp("valid.end", &body.contract.valid.end)?;
    if start > end {
        return Err(ValidationError::InvertedValidity {
            start: body.contract.valid.start.clone(),
            end: body.contract.valid.end.clone(),
        });
    }
    parse_timestamp("creationTime", &body.contract.creation_time)?;

    let sensors: HashSet<&str> = body.sensors.iter().map(|s| s.name.as_str()).collect();
    for system in &body.analysis.systems {
        for pipeline in &system.pipelines {
            if let Some(missing) = pipeline
                .sensors
                .iter()
                .find(|name| !sensors.contains(name.as_str()))
            {
                return Err(ValidationError::UnknownSensor {
                    system: system.name.clone(),
                    sensor: missing.clone(),
                });
            }
        }
    }

    debug!("contract {} passed validation", body.contract.id);
    Ok(())
}

/// `{declared local systems} ∪ {local_system}`
pub fn allowed_systems<'a>(contract: &'a Contract, local_system: &'a str) -> HashSet<&'a str> {
    let mut systems: HashSet<&str> = contract
        .body
        .local_systems
        .iter()
        .map(String::as_str)
        .collect();
    systems.insert(local_system);
    systems
}

fn parse_timestamp(field: &'static str, value: &str) -> Result<DateTime<Utc>, ValidationError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| ValidationError::InvalidTimestamp {
            field,
            value: value.to_string(),
        })
}
