//! Centralized error handling for graphportal.
//!
//! Every failure in the serializer and the data portal is a [`PortalError`].
//! The library never panics: fallible paths return `Result`, and
//! `#![deny(clippy::unwrap_used)]` / `#![deny(clippy::panic)]` keep it that way.
//!
//! ## Error Categories
//!
//! - **Request gating** ([`PortalError::NotAuthorized`], [`PortalError::Argument`]):
//!   raised before any serialization work starts, never wrapped.
//! - **Graph errors** ([`PortalError::CorruptGraph`], [`PortalError::TypeMismatch`]):
//!   abort the whole serialize/deserialize pass.
//! - **Execution errors** ([`PortalError::RemoteExecution`]): anything raised by the
//!   data access code or by the transport, with the original cause preserved.
//! - **Ambient errors** (`Serialization`, `Compression`, `Format`, `Internal`).
//!
//! ## Cloneability
//!
//! `PortalError` is `Clone` so that a single outcome can be handed to callbacks,
//! stored by a load manager or sent across threads. Sources are held in `Arc`.
//!
//! ```rust
//! use graphportal::PortalError;
//!
//! fn describe(err: &PortalError) -> &'static str {
//!     match err {
//!         PortalError::NotAuthorized { .. } => "denied",
//!         PortalError::CorruptGraph(_) => "corrupt",
//!         _ => "other",
//!     }
//! }
//! # assert_eq!(describe(&PortalError::CorruptGraph("x".into())), "corrupt");
//! ```

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::portal::OperationKind;

/// A specialized `Result` type for graphportal operations.
pub type Result<T> = std::result::Result<T, PortalError>;

/// The master error enum covering every failure domain.
#[derive(Debug, Clone)]
pub enum PortalError {
    /// Malformed construction input, e.g. a field container without a name.
    InvalidArgument(String),

    /// The authorization gate denied the operation.
    NotAuthorized {
        /// Operation that was requested.
        operation: OperationKind,
        /// Type identity of the target.
        type_key: String,
    },

    /// A required target or criteria tuple is missing, or the target cannot be
    /// used for the requested operation (busy, child object).
    Argument(String),

    /// The payload references a record that does not exist, repeats a reference
    /// id, names an unknown type, or a round-tripped object failed post validation.
    CorruptGraph(String),

    /// The declared type of a field does not match the value being restored.
    TypeMismatch {
        /// Field (or slot) being restored.
        field: String,
        /// Type the field declares.
        expected: String,
        /// What the payload actually contains.
        found: String,
    },

    /// The data access operation or the transport failed.
    ///
    /// The shape is identical whether the operation ran in-process or on the
    /// other side of a transport.
    RemoteExecution {
        /// Operation that failed.
        operation: OperationKind,
        /// Top-level message.
        message: String,
        /// Inner-cause chain, when one exists.
        cause: Option<Arc<ErrorInfo>>,
    },

    /// Failure raised by data access code itself.
    Application(String),

    /// Bincode encoding or decoding failure.
    Serialization(String),

    /// Compression algorithm failure.
    Compression(String),

    /// Invalid wire framing (magic bytes, version, truncation).
    Format(String),

    /// Logic error, e.g. a poisoned lock.
    Internal(String),
}

impl PortalError {
    /// Builds a `TypeMismatch` error.
    pub fn type_mismatch(
        field: impl Into<String>,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        Self::TypeMismatch {
            field: field.into(),
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Wraps a failure raised while executing `operation`.
    ///
    /// Errors that already are `RemoteExecution` pass through untouched so the
    /// chain is not nested twice.
    pub fn remote_execution(operation: OperationKind, err: &PortalError) -> Self {
        if let Self::RemoteExecution { .. } = err {
            return err.clone();
        }
        Self::RemoteExecution {
            operation,
            message: format!("{operation} operation failed"),
            cause: Some(Arc::new(ErrorInfo::from_error(err))),
        }
    }

    /// Short, stable name of the variant. Used in `ErrorInfo::kind`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "InvalidArgument",
            Self::NotAuthorized { .. } => "NotAuthorized",
            Self::Argument(_) => "Argument",
            Self::CorruptGraph(_) => "CorruptGraph",
            Self::TypeMismatch { .. } => "TypeMismatch",
            Self::RemoteExecution { .. } => "RemoteExecution",
            Self::Application(_) => "Application",
            Self::Serialization(_) => "Serialization",
            Self::Compression(_) => "Compression",
            Self::Format(_) => "Format",
            Self::Internal(_) => "Internal",
        }
    }
}

impl fmt::Display for PortalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument(s) => write!(f, "Invalid argument: {s}"),
            Self::NotAuthorized {
                operation,
                type_key,
            } => write!(f, "Not authorized to {operation} {type_key}"),
            Self::Argument(s) => write!(f, "Argument error: {s}"),
            Self::CorruptGraph(s) => write!(f, "Corrupt graph: {s}"),
            Self::TypeMismatch {
                field,
                expected,
                found,
            } => write!(
                f,
                "Type mismatch on '{field}': expected {expected}, found {found}"
            ),
            Self::RemoteExecution { message, .. } => write!(f, "Execution error: {message}"),
            Self::Application(s) => write!(f, "Application error: {s}"),
            Self::Serialization(s) => write!(f, "Serialization Error: {s}"),
            Self::Compression(s) => write!(f, "Compression Error: {s}"),
            Self::Format(s) => write!(f, "Format Error: {s}"),
            Self::Internal(s) => write!(f, "Internal Logic Error: {s}"),
        }
    }
}

impl std::error::Error for PortalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::RemoteExecution {
                cause: Some(info), ..
            } => Some(info.as_ref()),
            _ => None,
        }
    }
}

/// Transport-safe description of an error and its inner causes.
///
/// This is what survives a remote round trip, so local execution builds the
/// same structure to keep both outcomes indistinguishable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Variant name of the original error (see [`PortalError::kind`]).
    pub kind: String,
    /// Rendered message.
    pub message: String,
    /// Next error in the chain.
    pub inner: Option<Box<ErrorInfo>>,
}

impl ErrorInfo {
    /// Captures `err` and its `source()` chain.
    pub fn from_error(err: &PortalError) -> Self {
        let inner = std::error::Error::source(err).map(|src| Box::new(Self::from_source(src)));
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
            inner,
        }
    }

    fn from_source(err: &(dyn std::error::Error + 'static)) -> Self {
        if let Some(info) = err.downcast_ref::<ErrorInfo>() {
            return info.clone();
        }
        Self {
            kind: "Error".to_string(),
            message: err.to_string(),
            inner: err.source().map(|src| Box::new(Self::from_source(src))),
        }
    }

    /// The innermost error of the chain.
    pub fn root_cause(&self) -> &ErrorInfo {
        let mut current = self;
        while let Some(next) = current.inner.as_deref() {
            current = next;
        }
        current
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ErrorInfo {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl From<bincode::error::EncodeError> for PortalError {
    fn from(err: bincode::error::EncodeError) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<bincode::error::DecodeError> for PortalError {
    fn from(err: bincode::error::DecodeError) -> Self {
        Self::Serialization(err.to_string())
    }
}
