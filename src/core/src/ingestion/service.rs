use std::sync::Arc;

use log::{error, info, warn};
use sea_orm::TransactionTrait;

use crate::contract::{validate, Contract};
use crate::error_handling::types::{IngestError, StatusHint};
use crate::ingestion::decomposer::decompose;
use crate::storage::types::{Access, ContractSummary, PipelineStage};
use crate::storage::{ContractStore, DatabaseStorage};

/// Entry point for contract ingestion and the read paths over stored
/// contracts, as seen by one named system.
pub struct ContractService {
    storage: Arc<DatabaseStorage>,
    system: String,
}

impl ContractService {
    pub fn new(storage: Arc<DatabaseStorage>, system: impl Into<String>) -> Self {
        Self {
            storage,
            system: system.into(),
        }
    }

    /// Name of the system this service ingests for.
    pub fn system(&self) -> &str {
        &self.system
    }

    /// Parses, validates and stores a contract document.
    ///
    /// The whole decomposition runs in one transaction: on any error nothing
    /// of the document is left in the store.
    pub fn insert_contract(&self, document: &[u8]) -> Result<StatusHint, IngestError> {
        let contract = Contract::from_slice(document).map_err(|e| {
            warn!("rejecting malformed contract document: {}", e);
            IngestError::Malformed(e.to_string())
        })?;
        if let Err(err) = validate(&contract, &self.system) {
            warn!("rejecting contract '{}': {}", contract.id(), err);
            return Err(err.into());
        }

        let result = self.storage.block_on(async {
            let txn = self.storage.connection().begin().await?;
            match decompose(&txn, &contract, document, &self.system).await {
                Ok(()) => {
                    txn.commit().await?;
                    Ok::<(), IngestError>(())
                }
                Err(err) => {
                    if let Err(rollback) = txn.rollback().await {
                        error!("rollback of contract '{}' failed: {}", contract.id(), rollback);
                    }
                    Err(err)
                }
            }
        });

        match result {
            Ok(()) => {
                info!("contract '{}' ingested for system '{}'", contract.id(), self.system);
                Ok(StatusHint::Created)
            }
            Err(err) => {
                match err.status_hint() {
                    StatusHint::InternalError => {
                        error!("ingestion of contract '{}' failed: {}", contract.id(), err)
                    }
                    _ => warn!("rejecting contract '{}': {}", contract.id(), err),
                }
                Err(err)
            }
        }
    }

    /// Soft deletes a contract. Unknown ids are not an error.
    pub fn delete_contract(&self, id: &str) -> Result<(), IngestError> {
        if self.storage.delete_contract(id)? {
            info!("contract '{}' deactivated", id);
        } else {
            warn!("delete of unknown contract '{}' ignored", id);
        }
        Ok(())
    }

    pub fn get_contract(&self, id: &str) -> Result<Option<Vec<u8>>, IngestError> {
        Ok(self.storage.get_contract(id)?)
    }

    pub fn list_contracts(&self) -> Result<Vec<ContractSummary>, IngestError> {
        Ok(self.storage.list_contracts()?)
    }

    pub fn contracts_for_machine_sensor(
        &self,
        machine: &str,
        sensor: &str,
    ) -> Result<Vec<String>, IngestError> {
        Ok(self.storage.contracts_for_machine_sensor(machine, sensor)?)
    }

    pub fn organisations_with_access(
        &self,
        contract: &str,
        access: Access,
    ) -> Result<Vec<String>, IngestError> {
        Ok(self.storage.organisations_with_access(contract, access)?)
    }

    pub fn pipeline_stages(&self, contract: &str) -> Result<Vec<PipelineStage>, IngestError> {
        Ok(self.storage.pipeline_stages(contract)?)
    }
}
