//! Error taxonomy for document operations.

use thiserror::Error;

/// Every failure a document operation can report.
///
/// Operations check their preconditions before the first write, so an
/// `Err` always means the document is unchanged.
#[derive(Debug, Error)]
pub enum FormError {
    /// A key or path did not resolve.
    #[error("component `{0}` not found")]
    NotFound(String),

    /// Imported or generated data is malformed.
    #[error("invalid form data: {0}")]
    Invalid(String),

    /// A `type` string outside the known component set.
    #[error("unrecognized component type `{0}`")]
    UnknownType(String),

    #[error("component key `{0}` is already in use")]
    DuplicateKey(String),

    #[error("`{0}` cannot hold child components")]
    NotContainer(String),

    #[error("cannot move `{0}` into itself or one of its descendants")]
    Cycle(String),

    #[error("a row holds at most {max} columns")]
    ColumnLimit { max: usize },

    #[error("cannot wrap in {0} columns (expected 2 or 3)")]
    ColumnCount(usize),

    #[error("column {index} is out of range for `{wrapper}`")]
    ColumnIndex { wrapper: String, index: usize },

    #[error("index {index} is out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("cannot change `{key}` from {from} to {to}")]
    TypeChange {
        key: String,
        from: &'static str,
        to: &'static str,
    },

    #[error("formula error at offset {offset}: {message}")]
    Formula { offset: usize, message: String },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("snapshot encode error: {0}")]
    SnapshotEncode(#[from] rmp_serde::encode::Error),

    #[error("snapshot decode error: {0}")]
    SnapshotDecode(#[from] rmp_serde::decode::Error),

    /// Failure reported by an external collaborator (store, generator, …).
    #[error("service error: {0}")]
    Service(String),
}

impl FormError {
    /// Lookup failures are no-ops for the caller, not hard errors.
    pub fn is_lookup(&self) -> bool {
        matches!(self, FormError::NotFound(_))
    }

    pub(crate) fn not_found(key: impl ToString) -> Self {
        FormError::NotFound(key.to_string())
    }
}
