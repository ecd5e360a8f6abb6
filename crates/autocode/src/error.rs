//! Error types for autocode generation.
//!
//! Errors fall into three groups:
//!
//! - Load-time errors: [`Error::InvalidPattern`] and
//!   [`Error::InvalidFieldDefinition`] are raised while turning wire-format
//!   definitions into typed [`Segment`]s.
//! - Render-time errors: [`Error::MissingField`],
//!   [`Error::UnsupportedFieldKind`], [`Error::InvalidIdentifier`] and
//!   [`Error::Store`] abort a single render.
//! - [`Error::Repository`] reports a repository that could not be updated.
//! - [`Error::Generation`] wraps a render-time error with the table and field
//!   that failed, and is what the orchestrator hands back to the write path.
//!
//! [`Segment`]: crate::Segment

use crate::{repository::RepositoryError, store::StoreError};

/// A result type defaulting to the crate [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// All error variants that `autocode` can emit.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A pattern segment failed validation when it was loaded.
    #[error("invalid pattern segment #{index}: {reason}")]
    InvalidPattern { index: usize, reason: String },

    /// A table-field definition could not be turned into an autocode field.
    #[error("invalid autocode field `{field}`: {source}")]
    InvalidFieldDefinition {
        field: String,
        #[source]
        source: Box<Error>,
    },

    /// A table or field code cannot be used to build a counter identifier.
    #[error("invalid identifier component `{component}`: {reason}")]
    InvalidIdentifier { component: String, reason: String },

    /// A `field` segment referenced a value the write request did not carry.
    #[error("field {field} is required for autocode but not provided")]
    MissingField { field: String },

    /// A `field` segment referenced a value that has no code representation.
    #[error("field {field} has unsupported type for autocode: {kind}")]
    UnsupportedFieldKind { field: String, kind: &'static str },

    /// The counter store failed to create or advance a counter.
    #[error("counter store error: {0}")]
    Store(#[from] StoreError),

    /// A metadata or row repository could not be read or updated.
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Rendering an autocode field failed; the write must not be persisted.
    #[error("failed to generate autocode for {table}.{field}: {source}")]
    Generation {
        table: String,
        field: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub(crate) fn invalid_pattern(index: usize, reason: impl Into<String>) -> Self {
        Self::InvalidPattern {
            index,
            reason: reason.into(),
        }
    }

    pub(crate) fn generation(table: &str, field: &str, source: Self) -> Self {
        Self::Generation {
            table: table.to_owned(),
            field: field.to_owned(),
            source: Box::new(source),
        }
    }
}
