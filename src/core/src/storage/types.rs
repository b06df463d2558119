use serde::{Deserialize, Serialize};

use crate::error_handling::types::StorageError;

/// Header of a stored contract, as listed by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractSummary {
    pub id: String,
    pub start_time: String,
    pub end_time: String,
    pub active: bool,
}

/// How an organisation is linked to a contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Access {
    Read,
    Write,
    Partner,
}

impl Access {
    pub(crate) fn table(self) -> &'static str {
        match self {
            Access::Read => "read_permissions",
            Access::Write => "write_permissions",
            Access::Partner => "partners",
        }
    }
}

impl std::str::FromStr for Access {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "read" => Ok(Access::Read),
            "write" => Ok(Access::Write),
            "partner" | "partners" => Ok(Access::Partner),
            other => Err(format!("unknown access kind '{}'", other)),
        }
    }
}

/// One flattened pipeline stage, joined with the names needed to execute it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStage {
    pub pipeline: i32,
    pub system: String,
    pub sensor: String,
    pub time_trigger: Option<String>,
    pub execute: i32,
    pub prev_model: Option<i32>,
    pub next_model: Option<i32>,
    pub persist: bool,
}

/// Storage encoding of an ordered string list (JSON array text).
pub(crate) fn encode_list(items: &[String]) -> Result<String, StorageError> {
    serde_json::to_string(items).map_err(|e| StorageError::WriteFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_encoding_keeps_order_and_quotes() {
        let encoded = encode_list(&["--rate".into(), "5".into(), "it's".into()]).unwrap();
        assert_eq!(encoded, r#"["--rate","5","it's"]"#);
        assert_eq!(encode_list(&[]).unwrap(), "[]");
    }

    #[test]
    fn access_parses_from_cli_words() {
        assert_eq!("READ".parse::<Access>(), Ok(Access::Read));
        assert_eq!("partners".parse::<Access>(), Ok(Access::Partner));
        assert!("admin".parse::<Access>().is_err());
    }
}
