use std::fmt;

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    TomlError(String),
    MissingValue(String),
    NotInRange(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::TomlError(e) => write!(f, "TOML parsing error: {}", e),
            ConfigError::MissingValue(e) => write!(f, "Missing configuration value: {}", e),
            ConfigError::NotInRange(e) => write!(f, "Value out of range: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

/// Failure of the storage backend. The payload is the driver's message and is
/// only meant for logs.
#[derive(Debug)]
pub enum StorageError {
    ConnectionFailed(String),
    WriteFailed(String),
    ReadFailed(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::ConnectionFailed(e) => write!(f, "Storage connection failed: {}", e),
            StorageError::WriteFailed(e) => write!(f, "Storage write failed: {}", e),
            StorageError::ReadFailed(e) => write!(f, "Storage read failed: {}", e),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<sea_orm::DbErr> for StorageError {
    fn from(err: sea_orm::DbErr) -> Self {
        match err {
            sea_orm::DbErr::Conn(e) => StorageError::ConnectionFailed(e.to_string()),
            sea_orm::DbErr::ConnectionAcquire(e) => StorageError::ConnectionFailed(e.to_string()),
            sea_orm::DbErr::Query(e) => StorageError::ReadFailed(e.to_string()),
            sea_orm::DbErr::RecordNotFound(e) => StorageError::ReadFailed(e),
            other => StorageError::WriteFailed(other.to_string()),
        }
    }
}

/// First rule a contract document breaks. Checked in memory before any
/// store access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    MissingContractId,
    MissingMachine,
    UnknownSystem { section: &'static str, system: String },
    InvalidTimestamp { field: &'static str, value: String },
    InvertedValidity { start: String, end: String },
    UnknownSensor { system: String, sensor: String },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::MissingContractId => write!(f, "contract id is empty"),
            ValidationError::MissingMachine => write!(f, "machine id is empty"),
            ValidationError::UnknownSystem { section, system } => {
                write!(f, "system '{}' in {} is neither local nor this system", system, section)
            }
            ValidationError::InvalidTimestamp { field, value } => {
                write!(f, "{} '{}' is not an RFC 3339 timestamp", field, value)
            }
            ValidationError::InvertedValidity { start, end } => {
                write!(f, "validity starts at {} after it ends at {}", start, end)
            }
            ValidationError::UnknownSensor { system, sensor } => {
                write!(f, "pipeline on '{}' references undeclared sensor '{}'", system, sensor)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Coarse outcome category handed to the HTTP layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusHint {
    Created,
    BadRequest,
    InternalError,
}

impl StatusHint {
    pub fn as_u16(self) -> u16 {
        match self {
            StatusHint::Created => 201,
            StatusHint::BadRequest => 400,
            StatusHint::InternalError => 500,
        }
    }
}

#[derive(Debug)]
pub enum IngestError {
    Malformed(String),
    Validation(ValidationError),
    Conflict(String),
    DanglingModelReference { url: String, tag: String },
    Store(StorageError),
}

impl IngestError {
    /// Everything except a store failure is the caller's fault.
    pub fn status_hint(&self) -> StatusHint {
        match self {
            IngestError::Store(_) => StatusHint::InternalError,
            _ => StatusHint::BadRequest,
        }
    }
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestError::Malformed(e) => write!(f, "Malformed contract document: {}", e),
            IngestError::Validation(e) => write!(f, "Invalid contract: {}", e),
            IngestError::Conflict(id) => write!(f, "Contract '{}' already exists", id),
            IngestError::DanglingModelReference { url, tag } => {
                write!(f, "Pipeline stage references unknown model {}:{}", url, tag)
            }
            IngestError::Store(e) => write!(f, "Storage error: {}", e),
        }
    }
}

impl std::error::Error for IngestError {}

impl From<StorageError> for IngestError {
    fn from(err: StorageError) -> Self {
        IngestError::Store(err)
    }
}

impl From<sea_orm::DbErr> for IngestError {
    fn from(err: sea_orm::DbErr) -> Self {
        IngestError::Store(err.into())
    }
}

impl From<ValidationError> for IngestError {
    fn from(err: ValidationError) -> Self {
        IngestError::Validation(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_failures_are_server_side() {
        let err = IngestError::Store(StorageError::WriteFailed("disk full".into()));
        assert_eq!(err.status_hint(), StatusHint::InternalError);
        assert_eq!(err.status_hint().as_u16(), 500);
    }

    #[test]
    fn caller_faults_are_bad_requests() {
        let errs = vec![
            IngestError::Malformed("eof".into()),
            IngestError::Validation(ValidationError::MissingMachine),
            IngestError::Conflict("c1".into()),
            IngestError::DanglingModelReference {
                url: "x".into(),
                tag: "y".into(),
            },
        ];
        for err in errs {
            assert_eq!(err.status_hint().as_u16(), 400, "{}", err);
        }
    }

    #[test]
    fn validation_message_names_the_system() {
        let err = ValidationError::UnknownSystem {
            section: "analysis",
            system: "cloud".into(),
        };
        assert!(err.to_string().contains("'cloud'"));
    }
}
