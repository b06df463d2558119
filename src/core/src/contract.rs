//! Contract documents
//!
//! - `types`: serde model of the incoming JSON document.
//! - `validator`: structural and temporal checks run before ingestion.

pub mod types;
pub mod validator;

pub use types::Contract;
pub use validator::validate;
