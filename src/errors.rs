use std::fmt;

use thiserror::Error;

/// why the durable store could not be used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreFailure {
    /// row-level access policy rejected the request
    PermissionDenied,
    /// the store has no tables for the ledger
    SchemaMissing,
    /// network or configuration problem
    Unreachable,
}

impl fmt::Display for StoreFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StoreFailure::PermissionDenied => "permission denied",
            StoreFailure::SchemaMissing => "schema missing",
            StoreFailure::Unreachable => "unreachable",
        };
        f.write_str(text)
    }
}

/// failures reported by a [`crate::store::LedgerStore`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("access denied by the store's row-level security policy")]
    PermissionDenied,

    #[error("store tables not found")]
    SchemaMissing,

    #[error("store unavailable: {message}")]
    Unavailable {
        message: String,
    },

    #[error("duplicate record: {message}")]
    Conflict {
        message: String,
    },

    #[error("foreign key violation: {message}")]
    ForeignKey {
        message: String,
    },

    /// a delete blocked because other rows still point at the record
    #[error("record still referenced: {message}")]
    StillReferenced {
        message: String,
    },

    #[error("record not found: {id}")]
    NotFound {
        id: String,
    },

    #[error("field rejected by store: {field}")]
    FieldRejected {
        field: String,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("invalid input: {message}")]
    InvalidInput {
        message: String,
    },

    #[error("{entity} not found: {id}")]
    NotFound {
        entity: &'static str,
        id: String,
    },

    #[error("conflict: {message}")]
    ConflictOrDuplicate {
        message: String,
    },

    #[error("store unavailable ({kind}): {message}")]
    StoreUnavailable {
        kind: StoreFailure,
        message: String,
    },

    #[error("invalid configuration: {message}")]
    InvalidConfiguration {
        message: String,
    },

    #[error("ledger command timed out after {seconds}s")]
    Timeout {
        seconds: u64,
    },

    #[error("ledger engine has stopped")]
    EngineStopped,
}

impl LedgerError {
    pub fn invalid(message: impl Into<String>) -> Self {
        LedgerError::InvalidInput {
            message: message.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        LedgerError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// connectivity/configuration problems, as opposed to bad data
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, LedgerError::StoreUnavailable { .. })
    }
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        let message = err.to_string();
        match err {
            StoreError::PermissionDenied => LedgerError::StoreUnavailable {
                kind: StoreFailure::PermissionDenied,
                message,
            },
            StoreError::SchemaMissing => LedgerError::StoreUnavailable {
                kind: StoreFailure::SchemaMissing,
                message,
            },
            StoreError::Unavailable { .. } => LedgerError::StoreUnavailable {
                kind: StoreFailure::Unreachable,
                message,
            },
            StoreError::Conflict { .. } | StoreError::StillReferenced { .. } => {
                LedgerError::ConflictOrDuplicate { message }
            }
            StoreError::ForeignKey { .. } | StoreError::FieldRejected { .. } => {
                LedgerError::InvalidInput { message }
            }
            StoreError::NotFound { id } => LedgerError::NotFound { entity: "record", id },
        }
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;

/// non-fatal problems reported alongside a successful operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerWarning {
    /// an optional field could not be persisted; the in-memory copy keeps it
    PartialDegradation {
        field: &'static str,
        reason: String,
    },
}

impl fmt::Display for LedgerWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerWarning::PartialDegradation { field, reason } => {
                write!(f, "{} kept locally only: {}", field, reason)
            }
        }
    }
}

/// successful result plus any soft warnings
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome<T> {
    pub value: T,
    pub warnings: Vec<LedgerWarning>,
}

impl<T> Outcome<T> {
    pub fn ok(value: T) -> Self {
        Self {
            value,
            warnings: Vec::new(),
        }
    }

    pub fn with_warning(mut self, warning: LedgerWarning) -> Self {
        self.warnings.push(warning);
        self
    }

    pub fn is_degraded(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn into_value(self) -> T {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_map_to_taxonomy() {
        let err: LedgerError = StoreError::PermissionDenied.into();
        assert!(matches!(
            err,
            LedgerError::StoreUnavailable { kind: StoreFailure::PermissionDenied, .. }
        ));
        assert!(err.is_store_unavailable());

        let err: LedgerError = StoreError::SchemaMissing.into();
        assert!(matches!(
            err,
            LedgerError::StoreUnavailable { kind: StoreFailure::SchemaMissing, .. }
        ));

        let err: LedgerError = StoreError::Conflict { message: "loan".into() }.into();
        assert!(matches!(err, LedgerError::ConflictOrDuplicate { .. }));

        let err: LedgerError = StoreError::ForeignKey { message: "borrower_id".into() }.into();
        assert!(matches!(err, LedgerError::InvalidInput { .. }));
        assert!(!err.is_store_unavailable());

        let err: LedgerError = StoreError::StillReferenced { message: "loans".into() }.into();
        assert!(matches!(err, LedgerError::ConflictOrDuplicate { .. }));
    }

    #[test]
    fn test_outcome_warnings() {
        let outcome = Outcome::ok(5).with_warning(LedgerWarning::PartialDegradation {
            field: "signature",
            reason: "column missing".into(),
        });
        assert!(outcome.is_degraded());
        assert_eq!(
            outcome.warnings[0].to_string(),
            "signature kept locally only: column missing"
        );
        assert_eq!(outcome.into_value(), 5);
    }
}
