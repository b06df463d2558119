use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// `[database]` section: where the contract store lives.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("kosmos-contracts.sqlite3"),
            max_connections: 5,
        }
    }
}

/// `[system]` section: the system this instance ingests contracts for.
#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub name: String,
}
