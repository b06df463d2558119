//! Contract Store Trait
//!
//! This module defines the `ContractStore` trait, the read and lifecycle side
//! of contract persistence. Ingestion itself runs inside a transaction owned
//! by `ingestion::ContractService`.
//!
//! Implementors of this trait are responsible for:
//! - Returning stored contract documents verbatim
//! - Soft deleting contracts
//! - Answering routing lookups by machine and sensor
//! - Exposing the permission and pipeline rows derived from a contract

use crate::error_handling::types::StorageError;
use crate::storage::types::{Access, ContractSummary, PipelineStage};

pub trait ContractStore: Send + Sync {
    /// Returns the document bytes exactly as submitted, `None` for an unknown id.
    fn get_contract(&self, id: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Marks a contract inactive. Returns `false` when no contract has this id.
    fn delete_contract(&self, id: &str) -> Result<bool, StorageError>;

    /// Lists every stored contract, active or not, ordered by id.
    fn list_contracts(&self) -> Result<Vec<ContractSummary>, StorageError>;

    /// Active contracts covering the sensor (by transmitted id) on the machine.
    fn contracts_for_machine_sensor(
        &self,
        machine: &str,
        sensor: &str,
    ) -> Result<Vec<String>, StorageError>;

    /// Names of the organisations linked to a contract with the given access.
    fn organisations_with_access(
        &self,
        contract: &str,
        access: Access,
    ) -> Result<Vec<String>, StorageError>;

    /// Flattened analysis stages built for a contract.
    fn pipeline_stages(&self, contract: &str) -> Result<Vec<PipelineStage>, StorageError>;
}
