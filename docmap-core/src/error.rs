//! Error types and result types for mapped collection operations.
//!
//! Every fallible operation in the crate returns [`OdmResult<T>`]. Failures reported by a
//! storage backend are surfaced as [`OdmError::Store`] and are never retried; the mapper
//! only adds failures of its own, such as identifiers that cannot be translated or
//! documents that cannot be decoded into the target entity.

use bson::error::Error as BsonError;
use thiserror::Error;

/// Represents all possible errors that can occur when mapping entities onto a document store.
#[derive(Error, Debug)]
pub enum OdmError {
    /// The application-level identifier cannot be parsed into the store's native form.
    #[error("Malformed identifier: {0}")]
    MalformedIdentifier(String),
    /// An entity without an identifier was written, and its identity codec cannot generate one.
    #[error("Missing identifier for entity in collection {0}")]
    MissingIdentifier(String),
    /// A document returned by the store cannot be mapped onto the target entity type.
    #[error("Decode error: {0}")]
    Decode(String),
    /// Serialization error when converting an entity or value into BSON.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// The entity or document has an invalid structure for the requested operation.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// Error during store initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// A failure reported by the underlying storage backend.
    #[error("Store error: {0}")]
    Store(String),
}

/// A specialized `Result` type for mapper operations.
pub type OdmResult<T> = Result<T, OdmError>;

impl From<BsonError> for OdmError {
    fn from(err: BsonError) -> Self {
        OdmError::Serialization(err.to_string())
    }
}
