//! Operation kinds, criteria and the request state machine.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{PortalError, Result};
use crate::format::WireValue;
use crate::visitor_impls::FieldType;

/// The five data portal operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OperationKind {
    /// Build a new object from criteria.
    Create,
    /// Load an existing object from criteria.
    Fetch,
    /// Persist an object.
    Update,
    /// Remove the object named by criteria.
    Delete,
    /// Run a command object.
    Execute,
}

impl OperationKind {
    /// Every operation kind.
    pub const ALL: [OperationKind; 5] = [
        Self::Create,
        Self::Fetch,
        Self::Update,
        Self::Delete,
        Self::Execute,
    ];

    /// True if the operation targets an object instead of criteria.
    pub fn targets_object(self) -> bool {
        matches!(self, Self::Update | Self::Execute)
    }

    /// True if a successful outcome carries an object.
    pub fn returns_object(self) -> bool {
        !matches!(self, Self::Delete)
    }

    /// Lower-case name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Fetch => "fetch",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Execute => "execute",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Positional parameters of a Create, Fetch or Delete. May be empty.
///
/// ```rust
/// use graphportal::Criteria;
///
/// let criteria = Criteria::new().with(42i32)?.with("Acme".to_string())?;
/// assert_eq!(criteria.get::<i32>(0)?, 42);
/// assert_eq!(criteria.get::<String>(1)?, "Acme");
/// # Ok::<(), graphportal::PortalError>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Criteria {
    values: Vec<WireValue>,
}

impl Criteria {
    /// Creates an empty tuple.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a parameter.
    pub fn with<V: FieldType>(mut self, value: V) -> Result<Self> {
        self.push(value)?;
        Ok(self)
    }

    /// Appends a parameter in place.
    pub fn push<V: FieldType>(&mut self, value: V) -> Result<()> {
        self.values.push(value.to_wire()?);
        Ok(())
    }

    /// Reads parameter `index` as a `V`.
    ///
    /// # Errors
    /// `Argument` if the tuple is too short, `TypeMismatch` if the type differs.
    pub fn get<V: FieldType>(&self, index: usize) -> Result<V> {
        let value = self.values.get(index).ok_or_else(|| {
            PortalError::Argument(format!(
                "criteria has {} values, parameter {index} requested",
                self.values.len()
            ))
        })?;
        V::from_wire(value, &format!("criteria[{index}]"))
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if there are no parameters.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw parameters.
    pub fn values(&self) -> &[WireValue] {
        &self.values
    }
}

/// Where a request is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    /// Received from the caller.
    Requested,
    /// The authorizer allowed the operation.
    AuthorizationChecked,
    /// Running in-process.
    LocalExecuting,
    /// Encoding the request envelope.
    SerializingOut,
    /// In-process execution returned.
    Executed,
    /// Waiting on the transport.
    RemoteRoundTrip,
    /// Decoding the response envelope.
    SerializingIn,
    /// Outcome validated and ready.
    OutcomeReady,
    /// Handed back as a success.
    Returned,
    /// Handed back as a failure.
    Faulted,
}

/// Traces the state transitions of one request.
#[derive(Debug)]
pub(crate) struct RequestTrace<'a> {
    operation: OperationKind,
    type_key: &'a str,
    state: RequestState,
}

impl<'a> RequestTrace<'a> {
    pub(crate) fn new(operation: OperationKind, type_key: &'a str) -> Self {
        log::trace!("{operation} {type_key}: {:?}", RequestState::Requested);
        Self {
            operation,
            type_key,
            state: RequestState::Requested,
        }
    }

    pub(crate) fn advance(&mut self, next: RequestState) {
        log::trace!(
            "{} {}: {:?} -> {next:?}",
            self.operation,
            self.type_key,
            self.state
        );
        self.state = next;
    }

    /// Moves to `Returned` or `Faulted` and logs the outcome.
    pub(crate) fn finish<T>(mut self, outcome: &Result<T>) {
        match outcome {
            Ok(_) => {
                self.advance(RequestState::OutcomeReady);
                self.advance(RequestState::Returned);
                log::debug!("{} {} returned", self.operation, self.type_key);
            }
            Err(err) => {
                let from = self.state;
                self.advance(RequestState::Faulted);
                log::warn!(
                    "{} {} faulted after {from:?}: {err}",
                    self.operation,
                    self.type_key
                );
            }
        }
    }
}
