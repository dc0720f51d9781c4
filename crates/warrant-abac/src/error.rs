//! Error types for policy management and access decisions.

use thiserror::Error;

/// Errors raised by a [`PolicyStore`](crate::store::PolicyStore) implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A policy with the same canonical key is already stored.
    #[error("policy with key '{key}' already exists")]
    Conflict { key: String },

    /// The policy's identifiers cannot be encoded into a key.
    #[error("policy cannot be keyed: {0}")]
    Unkeyable(String),

    /// The backing storage failed.
    #[error("policy store failure: {0}")]
    Backend(String),
}

/// Errors raised by the access control engine.
#[derive(Debug, Error)]
pub enum AccessError {
    /// The policy failed structural validation and was not stored.
    #[error("{reason}")]
    InvalidPolicy { reason: String },

    /// Another policy already occupies this canonical key.
    #[error("duplicate policy: '{key}' is already registered")]
    DuplicatePolicy { key: String },

    /// `can` was called without any subject.
    #[error("no subjects given")]
    NoSubjects,

    /// An empty query was given where a pattern is required.
    #[error("pattern required: query must name at least one axis")]
    PatternRequired,

    /// A subject, action or object cannot be split into main and scope.
    #[error("value is not parsable: '{value}'")]
    NotParsable { value: String },

    /// Projection was asked to apply an empty notation list.
    #[error("notation should not be empty")]
    NotationEmpty,

    /// A notation glob is malformed.
    #[error("invalid notation: '{notation}'")]
    InvalidNotation { notation: String },

    /// The key separator is empty.
    #[error("separator must not be empty")]
    InvalidSeparator,

    /// A timezone name is not in the IANA database.
    #[error("unknown timezone '{name}'")]
    InvalidTimezone { name: String },

    /// Propagated from the policy store.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type for access control operations.
pub type Result<T> = std::result::Result<T, AccessError>;
