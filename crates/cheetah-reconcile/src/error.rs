//! Reconciliation error types.
//!
//! Only [`ReconcileError`] escapes the reconciler: it means the session is
//! unusable and the run must stop. Everything that goes wrong with a single
//! object is a [`ClearFailure`] inside [`crate::ClearOutcome::Failed`].

use cheetah_bfrt::BfrtError;
use thiserror::Error;

/// Fatal reconciliation errors.
#[derive(Debug, Clone, Error)]
pub enum ReconcileError {
    /// The session failed while working on `object`.
    #[error("transport failure while clearing {object}: {source}")]
    Transport {
        object: String,
        #[source]
        source: BfrtError,
    },

    /// The object catalog could not be read.
    #[error("failed to enumerate pipeline objects: {source}")]
    Catalog {
        #[source]
        source: BfrtError,
    },
}

impl ReconcileError {
    /// Creates a transport error for `object`.
    pub fn transport(object: impl Into<String>, source: BfrtError) -> Self {
        ReconcileError::Transport {
            object: object.into(),
            source,
        }
    }

    /// Returns the underlying device error.
    pub fn cause(&self) -> &BfrtError {
        match self {
            ReconcileError::Transport { source, .. } | ReconcileError::Catalog { source } => source,
        }
    }
}

/// Result type for reconciliation.
pub type Result<T> = std::result::Result<T, ReconcileError>;

/// Why one object could not be cleared.
#[derive(Debug, Clone, Error)]
pub enum ClearFailure {
    /// Listing the object's entries failed with something other than
    /// "not found". The object was skipped.
    #[error("listing entries failed: {0}")]
    ListFailed(BfrtError),

    /// The batch around the removals could not be opened.
    #[error("batch begin failed: {0}")]
    BatchBegin(BfrtError),

    /// One or more entries could not be removed. Removal continued past
    /// each failure, so `removed` entries are gone and `failed` remain.
    #[error("{failed} of {} entries not removed (first cause: {first_cause})", .removed + .failed)]
    RemovalFailed {
        removed: usize,
        failed: usize,
        first_cause: BfrtError,
    },

    /// Every removal succeeded but the batch failed to commit.
    #[error("batch end failed after {removed} removals: {cause}")]
    BatchEnd { removed: usize, cause: BfrtError },
}

impl ClearFailure {
    /// Returns the device error that caused the failure.
    pub fn cause(&self) -> &BfrtError {
        match self {
            ClearFailure::ListFailed(cause)
            | ClearFailure::BatchBegin(cause)
            | ClearFailure::RemovalFailed {
                first_cause: cause, ..
            }
            | ClearFailure::BatchEnd { cause, .. } => cause,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cheetah_bfrt::BfrtStatus;

    #[test]
    fn test_removal_failed_display() {
        let failure = ClearFailure::RemovalFailed {
            removed: 2,
            failed: 1,
            first_cause: BfrtError::in_use("pipe.Ingress.lb_ap {$ACTION_MEMBER_ID=1}"),
        };
        assert_eq!(
            failure.to_string(),
            "1 of 3 entries not removed (first cause: pipe.Ingress.lb_ap {$ACTION_MEMBER_ID=1}: BF_IN_USE)"
        );
        assert!(failure.cause().is_in_use());
    }

    #[test]
    fn test_reconcile_error_display() {
        let err = ReconcileError::transport(
            "pipe.Ingress.get_client",
            BfrtError::transport("connection reset"),
        );
        assert_eq!(
            err.to_string(),
            "transport failure while clearing pipe.Ingress.get_client: transport failure: connection reset"
        );
        assert!(err.cause().is_transport());

        let err = ReconcileError::Catalog {
            source: BfrtError::status(BfrtStatus::InitError, "info"),
        };
        assert!(err.to_string().starts_with("failed to enumerate pipeline objects"));
    }
}
