//! Contract ingestion.
//!
//! A contract document goes through three stages:
//! - parsing into [`crate::contract::Contract`]
//! - validation against the local system
//! - decomposition into relational rows, analysis pipelines included
//!
//! [`ContractService`] drives them and runs the decomposition inside a single
//! transaction.

pub mod decomposer;
pub mod entities;
pub mod pipeline_graph;
pub mod service;


pub use service::ContractService;
