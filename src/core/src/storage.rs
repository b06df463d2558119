//! Storage subsystem
//!
//! This module provides the relational persistence of contracts and of the
//! rows derived from them.
//!
//! Components:
//! - `storage_trait`: the ContractStore trait for lookups, routing and soft delete.
//! - `types`: shared data types returned by the store.
//! - `database_storage`: SQLite implementation on top of SeaORM.
//! - `db_entities`: SeaORM entity models for the database backend.
//! - `schema`: DDL applied when a database is opened.
//! - `resolver`: get-or-create over natural keys, used during ingestion.

pub mod database_storage;
pub mod db_entities;
pub mod resolver;
pub mod schema;
pub mod storage_trait;
pub mod types;

pub use database_storage::DatabaseStorage;
pub use storage_trait::ContractStore;
