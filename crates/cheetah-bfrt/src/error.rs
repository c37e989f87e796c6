//! BFRuntime error types and status handling.
//!
//! This module carries `bf_status_t` codes in [`BfrtError`] and classifies
//! them the way the control plane needs to act on them: benign
//! absence, reference conflicts, duplicates and transport loss.

use std::fmt;
use thiserror::Error;

/// Status codes matching `bf_status_t` in the Tofino SDE.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BfrtStatus {
    Success = 0,
    NotReady = 1,
    NoSysResources = 2,
    InvalidArg = 3,
    AlreadyExists = 4,
    HwCommFail = 5,
    ObjectNotFound = 6,
    MaxSessionsExceeded = 7,
    SessionNotFound = 8,
    NoSpace = 9,
    Eagain = 10,
    InitError = 11,
    TxnNotSupported = 12,
    TableLocked = 13,
    Io = 14,
    Unexpected = 15,
    EntryReferencesExist = 16,
    NotSupported = 17,
    HwUpdateFailed = 18,
    NoLearnClients = 19,
    IdleUpdateInProgress = 20,
    DeviceLocked = 21,
    InternalError = 22,
    TableNotFound = 23,
    InUse = 24,
    NotImplemented = 25,
}

impl BfrtStatus {
    /// Returns true if the session to the device is no longer usable.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            BfrtStatus::HwCommFail | BfrtStatus::SessionNotFound | BfrtStatus::Io | BfrtStatus::NotReady
        )
    }
}

impl fmt::Display for BfrtStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BfrtStatus::Success => "BF_SUCCESS",
            BfrtStatus::NotReady => "BF_NOT_READY",
            BfrtStatus::NoSysResources => "BF_NO_SYS_RESOURCES",
            BfrtStatus::InvalidArg => "BF_INVALID_ARG",
            BfrtStatus::AlreadyExists => "BF_ALREADY_EXISTS",
            BfrtStatus::HwCommFail => "BF_HW_COMM_FAIL",
            BfrtStatus::ObjectNotFound => "BF_OBJECT_NOT_FOUND",
            BfrtStatus::MaxSessionsExceeded => "BF_MAX_SESSIONS_EXCEEDED",
            BfrtStatus::SessionNotFound => "BF_SESSION_NOT_FOUND",
            BfrtStatus::NoSpace => "BF_NO_SPACE",
            BfrtStatus::Eagain => "BF_EAGAIN",
            BfrtStatus::InitError => "BF_INIT_ERROR",
            BfrtStatus::TxnNotSupported => "BF_TXN_NOT_SUPPORTED",
            BfrtStatus::TableLocked => "BF_TABLE_LOCKED",
            BfrtStatus::Io => "BF_IO",
            BfrtStatus::Unexpected => "BF_UNEXPECTED",
            BfrtStatus::EntryReferencesExist => "BF_ENTRY_REFERENCES_EXIST",
            BfrtStatus::NotSupported => "BF_NOT_SUPPORTED",
            BfrtStatus::HwUpdateFailed => "BF_HW_UPDATE_FAILED",
            BfrtStatus::NoLearnClients => "BF_NO_LEARN_CLIENTS",
            BfrtStatus::IdleUpdateInProgress => "BF_IDLE_UPDATE_IN_PROGRESS",
            BfrtStatus::DeviceLocked => "BF_DEVICE_LOCKED",
            BfrtStatus::InternalError => "BF_INTERNAL_ERROR",
            BfrtStatus::TableNotFound => "BF_TABLE_NOT_FOUND",
            BfrtStatus::InUse => "BF_IN_USE",
            BfrtStatus::NotImplemented => "BF_NOT_IMPLEMENTED",
        };
        write!(f, "{}", s)
    }
}

/// Error type for BFRuntime operations.
#[derive(Debug, Clone, Error)]
pub enum BfrtError {
    /// The device answered with a non-success status.
    #[error("{context}: {status}")]
    Status { status: BfrtStatus, context: String },

    /// The session itself failed (connection lost, RPC deadline, ...).
    #[error("transport failure: {message}")]
    Transport { message: String },
}

impl BfrtError {
    /// Creates a status error with the object or operation as context.
    pub fn status(status: BfrtStatus, context: impl Into<String>) -> Self {
        BfrtError::Status {
            status,
            context: context.into(),
        }
    }

    /// Creates a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        BfrtError::Transport {
            message: message.into(),
        }
    }

    /// Creates an object-not-found error.
    pub fn not_found(context: impl Into<String>) -> Self {
        Self::status(BfrtStatus::ObjectNotFound, context)
    }

    /// Creates an already-exists error.
    pub fn already_exists(context: impl Into<String>) -> Self {
        Self::status(BfrtStatus::AlreadyExists, context)
    }

    /// Creates an object-in-use error.
    pub fn in_use(context: impl Into<String>) -> Self {
        Self::status(BfrtStatus::InUse, context)
    }

    /// Returns the device status, if the device produced one.
    pub fn status_code(&self) -> Option<BfrtStatus> {
        match self {
            BfrtError::Status { status, .. } => Some(*status),
            BfrtError::Transport { .. } => None,
        }
    }

    /// Returns true for the "nothing there" family of statuses.
    ///
    /// A wildcard listing of an empty table reports `BF_OBJECT_NOT_FOUND`.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self.status_code(),
            Some(BfrtStatus::ObjectNotFound | BfrtStatus::TableNotFound)
        )
    }

    /// Returns true if the key being added is already present.
    pub fn is_already_exists(&self) -> bool {
        self.status_code() == Some(BfrtStatus::AlreadyExists)
    }

    /// Returns true if the object is still referenced by another object.
    pub fn is_in_use(&self) -> bool {
        matches!(
            self.status_code(),
            Some(BfrtStatus::InUse | BfrtStatus::EntryReferencesExist)
        )
    }

    /// Returns true if no further call on this session can succeed.
    pub fn is_transport(&self) -> bool {
        match self {
            BfrtError::Transport { .. } => true,
            BfrtError::Status { status, .. } => status.is_transport(),
        }
    }
}

/// Result type for BFRuntime operations.
pub type BfrtResult<T> = Result<T, BfrtError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(BfrtError::not_found("t").is_not_found());
        assert!(BfrtError::status(BfrtStatus::TableNotFound, "t").is_not_found());
        assert!(BfrtError::already_exists("t").is_already_exists());
        assert!(BfrtError::in_use("sel").is_in_use());
        assert!(BfrtError::status(BfrtStatus::EntryReferencesExist, "ap").is_in_use());
        assert!(!BfrtError::in_use("sel").is_transport());
    }

    #[test]
    fn test_transport_classification() {
        assert!(BfrtError::transport("connection reset").is_transport());
        assert!(BfrtError::status(BfrtStatus::HwCommFail, "t").is_transport());
        assert!(BfrtError::status(BfrtStatus::SessionNotFound, "t").is_transport());
        assert!(!BfrtError::not_found("t").is_transport());
        assert_eq!(BfrtError::transport("x").status_code(), None);
    }
}
