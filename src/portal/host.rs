//! The executing side of the data portal.
//!
//! A [`PortalHost`] maps type identities to data access code. The dispatcher
//! calls it directly on the local path; a transport feeds it bytes on the
//! remote path. Both end up in [`PortalHost::execute`].

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

use super::context::ApplicationContext;
use super::operation::{Criteria, OperationKind};
use super::wire::{PortalRequest, PortalResponse};
use crate::api::GraphFormatter;
use crate::error::{ErrorInfo, PortalError, Result};
use crate::graph::{Mobile, NodeRef};
use crate::visitor::MobileType;

fn unsupported<T: MobileType>(operation: OperationKind) -> PortalError {
    PortalError::Application(format!("{} does not support {operation}", T::key()))
}

/// Data access code for one business type.
///
/// Every method defaults to an "unsupported" failure, so a type only
/// implements the operations it has.
pub trait DataAccess<T: MobileType>: Send + Sync {
    /// Builds a new object.
    fn create(&self, criteria: &Criteria, context: &ApplicationContext) -> Result<T> {
        let _ = (criteria, context);
        Err(unsupported::<T>(OperationKind::Create))
    }

    /// Loads an existing object.
    fn fetch(&self, criteria: &Criteria, context: &ApplicationContext) -> Result<T> {
        let _ = (criteria, context);
        Err(unsupported::<T>(OperationKind::Fetch))
    }

    /// Persists `object`. Changes made to it are returned to the caller.
    fn update(&self, object: &Mobile<T>, context: &ApplicationContext) -> Result<()> {
        let _ = (object, context);
        Err(unsupported::<T>(OperationKind::Update))
    }

    /// Removes the object named by `criteria`.
    fn delete(&self, criteria: &Criteria, context: &ApplicationContext) -> Result<()> {
        let _ = (criteria, context);
        Err(unsupported::<T>(OperationKind::Delete))
    }

    /// Runs a command object.
    fn execute(&self, command: &Mobile<T>, context: &ApplicationContext) -> Result<()> {
        let _ = (command, context);
        Err(unsupported::<T>(OperationKind::Execute))
    }
}

trait ErasedAccess: Send + Sync {
    fn run(
        &self,
        operation: OperationKind,
        criteria: Option<&Criteria>,
        object: Option<&NodeRef>,
        context: &ApplicationContext,
    ) -> Result<Option<NodeRef>>;
}

struct Typed<T, D> {
    access: D,
    _marker: PhantomData<fn() -> T>,
}

fn require<'a, V>(value: Option<&'a V>, operation: OperationKind, what: &str) -> Result<&'a V> {
    value.ok_or_else(|| PortalError::Argument(format!("{operation} requires {what}")))
}

impl<T: MobileType, D: DataAccess<T>> ErasedAccess for Typed<T, D> {
    fn run(
        &self,
        operation: OperationKind,
        criteria: Option<&Criteria>,
        object: Option<&NodeRef>,
        context: &ApplicationContext,
    ) -> Result<Option<NodeRef>> {
        match operation {
            OperationKind::Create => {
                let criteria = require(criteria, operation, "criteria")?;
                let created = self.access.create(criteria, context)?;
                Ok(Some(Mobile::new(created).to_node()))
            }
            OperationKind::Fetch => {
                let criteria = require(criteria, operation, "criteria")?;
                let fetched = self.access.fetch(criteria, context)?;
                Ok(Some(Mobile::new(fetched).to_node()))
            }
            OperationKind::Update => {
                let target = require(object, operation, "an object")?.expect_type::<T>("target")?;
                self.access.update(&target, context)?;
                Ok(Some(target.to_node()))
            }
            OperationKind::Delete => {
                let criteria = require(criteria, operation, "criteria")?;
                self.access.delete(criteria, context)?;
                Ok(None)
            }
            OperationKind::Execute => {
                let target = require(object, operation, "an object")?.expect_type::<T>("target")?;
                self.access.execute(&target, context)?;
                Ok(Some(target.to_node()))
            }
        }
    }
}

/// Registry of data access code plus the byte-level request handler.
pub struct PortalHost {
    formatter: GraphFormatter,
    handlers: HashMap<String, Box<dyn ErasedAccess>>,
}

impl PortalHost {
    /// Creates a host that reads and writes graphs with `formatter`.
    pub fn new(formatter: GraphFormatter) -> Self {
        Self {
            formatter,
            handlers: HashMap::new(),
        }
    }

    /// Registers the data access code for `T`, replacing any previous one.
    pub fn register<T, D>(&mut self, access: D) -> &mut Self
    where
        T: MobileType,
        D: DataAccess<T> + 'static,
    {
        self.handlers.insert(
            T::key(),
            Box::new(Typed::<T, D> {
                access,
                _marker: PhantomData,
            }),
        );
        self
    }

    /// Builder-style [`PortalHost::register`].
    pub fn with<T, D>(mut self, access: D) -> Self
    where
        T: MobileType,
        D: DataAccess<T> + 'static,
    {
        self.register::<T, D>(access);
        self
    }

    /// The formatter used for request and response graphs.
    pub fn formatter(&self) -> &GraphFormatter {
        &self.formatter
    }

    /// Runs one operation. The context is switched to the server side first.
    pub fn execute(
        &self,
        operation: OperationKind,
        type_key: &str,
        criteria: Option<&Criteria>,
        object: Option<&NodeRef>,
        context: &ApplicationContext,
    ) -> Result<Option<NodeRef>> {
        let handler = self.handlers.get(type_key).ok_or_else(|| {
            PortalError::Application(format!("no data access registered for {type_key}"))
        })?;
        let mut context = context.clone();
        context.enter_server();
        handler.run(operation, criteria, object, &context)
    }

    /// Handles one framed request and returns the framed response.
    ///
    /// Never fails: every error becomes a `Failed` response.
    pub fn handle(&self, request: &[u8]) -> Vec<u8> {
        let response = match PortalRequest::from_bytes(request, self.formatter.compressors()) {
            Ok(request) => self.respond(&request),
            Err(err) => {
                log::warn!("host rejected a request frame: {err}");
                failure(None, &err)
            }
        };
        match self
            .formatter
            .compressor()
            .and_then(|compressor| response.to_bytes(compressor))
        {
            Ok(bytes) => bytes,
            Err(err) => {
                log::warn!("host cannot encode its response: {err}");
                Vec::new()
            }
        }
    }

    fn respond(&self, request: &PortalRequest) -> PortalResponse {
        log::debug!("host received {} {}", request.operation, request.type_key);
        match self.run_request(request) {
            Ok(response) => response,
            Err(err) => failure(Some(request.operation), &err),
        }
    }

    fn run_request(&self, request: &PortalRequest) -> Result<PortalResponse> {
        let object = request
            .object
            .as_ref()
            .map(|payload| self.formatter.deserialize(payload))
            .transpose()?;
        let outcome = self.execute(
            request.operation,
            &request.type_key,
            request.criteria.as_ref(),
            object.as_ref(),
            &request.context,
        )?;
        match outcome {
            Some(node) => Ok(PortalResponse::Object(self.formatter.serialize(&node)?)),
            None => Ok(PortalResponse::Done),
        }
    }
}

fn failure(operation: Option<OperationKind>, err: &PortalError) -> PortalResponse {
    let wrapped = match operation {
        Some(operation) => PortalError::remote_execution(operation, err),
        None => err.clone(),
    };
    match wrapped {
        PortalError::RemoteExecution { message, cause, .. } => PortalResponse::Failed {
            message,
            cause: cause.map(|info| info.as_ref().clone()),
        },
        other => PortalResponse::Failed {
            message: other.to_string(),
            cause: Some(ErrorInfo::from_error(&other)),
        },
    }
}

impl fmt::Debug for PortalHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<_> = self.handlers.keys().collect();
        types.sort();
        f.debug_struct("PortalHost")
            .field("formatter", &self.formatter)
            .field("types", &types)
            .finish()
    }
}
