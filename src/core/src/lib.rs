pub mod configuration;
pub mod contract;
pub mod error_handling;
pub mod ingestion;
pub mod storage;
