//! Routes operations to local or remote execution.
//!
//! Every request goes through the same steps whatever the location:
//! argument validation, one authorization check, execution, then post
//! validation of the returned graph. Failures raised while executing,
//! locally or behind a transport, surface as the same
//! [`PortalError::RemoteExecution`].

use std::fmt;
use std::sync::Arc;

use super::auth::{AllowAll, Authorizer};
use super::context::{ApplicationContext, ContextHandle};
use super::host::PortalHost;
use super::operation::{Criteria, OperationKind, RequestState, RequestTrace};
use super::transport::Transport;
use super::wire::{PortalRequest, PortalResponse};
use crate::api::GraphFormatter;
use crate::error::{PortalError, Result};
use crate::graph::NodeRef;

/// Where operations run. Chosen at configuration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionLocation {
    /// In-process, against a [`PortalHost`].
    #[default]
    Local,
    /// Behind a [`Transport`].
    Remote,
}

/// Dispatcher settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortalConfig {
    /// Where operations run.
    pub location: ExecutionLocation,
    /// Clone Update and Execute targets before running them locally, so the
    /// caller always receives a new instance.
    pub auto_clone_on_update: bool,
    /// Compression algorithm for request envelopes.
    pub compression_id: u8,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            location: ExecutionLocation::Local,
            auto_clone_on_update: true,
            compression_id: 0,
        }
    }
}

/// Builds a [`Dispatcher`].
pub struct DispatcherBuilder {
    config: PortalConfig,
    formatter: Option<GraphFormatter>,
    authorizer: Arc<dyn Authorizer>,
    context: ContextHandle,
    host: Option<Arc<PortalHost>>,
    transport: Option<Arc<dyn Transport>>,
}

impl DispatcherBuilder {
    fn new() -> Self {
        Self {
            config: PortalConfig::default(),
            formatter: None,
            authorizer: Arc::new(AllowAll),
            context: ContextHandle::default(),
            host: None,
            transport: None,
        }
    }

    /// Replaces every setting at once.
    pub fn config(mut self, config: PortalConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the execution location.
    pub fn location(mut self, location: ExecutionLocation) -> Self {
        self.config.location = location;
        self
    }

    /// Enables or disables cloning of local Update and Execute targets.
    pub fn auto_clone_on_update(mut self, enabled: bool) -> Self {
        self.config.auto_clone_on_update = enabled;
        self
    }

    /// Sets the compression algorithm for request envelopes.
    pub fn compression(mut self, compression_id: u8) -> Self {
        self.config.compression_id = compression_id;
        self
    }

    /// Graph formatter used on the client side.
    ///
    /// Defaults to the formatter of the host, when one is set.
    pub fn formatter(mut self, formatter: GraphFormatter) -> Self {
        self.formatter = Some(formatter);
        self
    }

    /// Authorization gate. Defaults to [`AllowAll`].
    pub fn authorizer(mut self, authorizer: impl Authorizer + 'static) -> Self {
        self.authorizer = Arc::new(authorizer);
        self
    }

    /// Shared authorization gate.
    pub fn shared_authorizer(mut self, authorizer: Arc<dyn Authorizer>) -> Self {
        self.authorizer = authorizer;
        self
    }

    /// Application context snapshotted by each request.
    pub fn context(mut self, context: ContextHandle) -> Self {
        self.context = context;
        self
    }

    /// Host for local execution.
    pub fn host(mut self, host: Arc<PortalHost>) -> Self {
        self.host = Some(host);
        self
    }

    /// Transport for remote execution.
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Validates the settings.
    ///
    /// # Errors
    /// `InvalidArgument` if the location has no host or transport, no
    /// formatter can be found, or the compression id is unknown.
    pub fn build(self) -> Result<Dispatcher> {
        match self.config.location {
            ExecutionLocation::Local if self.host.is_none() => {
                return Err(PortalError::InvalidArgument(
                    "local execution needs a host".into(),
                ));
            }
            ExecutionLocation::Remote if self.transport.is_none() => {
                return Err(PortalError::InvalidArgument(
                    "remote execution needs a transport".into(),
                ));
            }
            _ => {}
        }
        let formatter = self
            .formatter
            .or_else(|| self.host.as_ref().map(|h| h.formatter().clone()))
            .ok_or_else(|| PortalError::InvalidArgument("no graph formatter configured".into()))?
            .with_compression(self.config.compression_id);
        formatter
            .compressor()
            .map_err(|e| PortalError::InvalidArgument(e.to_string()))?;

        Ok(Dispatcher {
            config: self.config,
            formatter,
            authorizer: self.authorizer,
            context: self.context,
            host: self.host,
            transport: self.transport,
        })
    }
}

/// The data portal dispatcher.
///
/// Cloning is cheap; clones share the host, transport, authorizer and context.
#[derive(Clone)]
pub struct Dispatcher {
    config: PortalConfig,
    formatter: GraphFormatter,
    authorizer: Arc<dyn Authorizer>,
    context: ContextHandle,
    host: Option<Arc<PortalHost>>,
    transport: Option<Arc<dyn Transport>>,
}

impl Dispatcher {
    /// Starts a builder with default settings.
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    /// Active settings.
    pub fn config(&self) -> &PortalConfig {
        &self.config
    }

    /// Client-side graph formatter.
    pub fn formatter(&self) -> &GraphFormatter {
        &self.formatter
    }

    /// The shared context handle.
    pub fn context(&self) -> &ContextHandle {
        &self.context
    }

    /// Runs one operation, blocking until it completes.
    pub fn dispatch(
        &self,
        operation: OperationKind,
        type_key: &str,
        criteria: Option<Criteria>,
        object: Option<NodeRef>,
    ) -> Result<Option<NodeRef>> {
        self.dispatch_in(self.context.snapshot(), operation, type_key, criteria, object)
    }

    /// Like [`Dispatcher::dispatch`], with an explicit context snapshot.
    pub fn dispatch_in(
        &self,
        context: ApplicationContext,
        operation: OperationKind,
        type_key: &str,
        criteria: Option<Criteria>,
        object: Option<NodeRef>,
    ) -> Result<Option<NodeRef>> {
        let mut trace = RequestTrace::new(operation, type_key);
        let outcome = self
            .admit(operation, type_key, criteria.as_ref(), object.as_ref(), &context)
            .and_then(|()| {
                trace.advance(RequestState::AuthorizationChecked);
                match self.config.location {
                    ExecutionLocation::Local => {
                        trace.advance(RequestState::LocalExecuting);
                        let executed = self.run_local(operation, type_key, criteria, object, &context);
                        trace.advance(RequestState::Executed);
                        executed
                    }
                    ExecutionLocation::Remote => {
                        trace.advance(RequestState::SerializingOut);
                        let request = self.encode_request(operation, type_key, criteria, object, context)?;
                        trace.advance(RequestState::RemoteRoundTrip);
                        let response = self.transport()?.send(request);
                        trace.advance(RequestState::SerializingIn);
                        self.decode_response(operation, response)
                    }
                }
            })
            .and_then(|result| post_validate(operation, type_key, result));
        trace.finish(&outcome);
        outcome
    }

    /// Runs one operation without blocking on the transport.
    ///
    /// Only the transport round trip is awaited. With
    /// [`ExecutionLocation::Local`] the whole operation (auto-clone and data
    /// access code) runs inline on the polling thread, exactly like
    /// [`Dispatcher::dispatch`]. Use the `begin_*` callback shape of
    /// [`DataPortal`](super::DataPortal) to move local work onto the rayon pool.
    pub async fn dispatch_async(
        &self,
        operation: OperationKind,
        type_key: &str,
        criteria: Option<Criteria>,
        object: Option<NodeRef>,
    ) -> Result<Option<NodeRef>> {
        let context = self.context.snapshot();
        if self.config.location == ExecutionLocation::Local {
            return self.dispatch_in(context, operation, type_key, criteria, object);
        }

        let mut trace = RequestTrace::new(operation, type_key);
        let outcome = match self.admit(operation, type_key, criteria.as_ref(), object.as_ref(), &context) {
            Ok(()) => {
                trace.advance(RequestState::AuthorizationChecked);
                trace.advance(RequestState::SerializingOut);
                match (
                    self.encode_request(operation, type_key, criteria, object, context),
                    self.transport(),
                ) {
                    (Ok(request), Ok(transport)) => {
                        trace.advance(RequestState::RemoteRoundTrip);
                        let response = transport.send_async(request).await;
                        trace.advance(RequestState::SerializingIn);
                        self.decode_response(operation, response)
                    }
                    (Err(err), _) | (_, Err(err)) => Err(err),
                }
            }
            Err(err) => Err(err),
        }
        .and_then(|result| post_validate(operation, type_key, result));
        trace.finish(&outcome);
        outcome
    }

    /// Argument validation and the authorization gate. Nothing is serialized
    /// or executed before both pass.
    fn admit(
        &self,
        operation: OperationKind,
        type_key: &str,
        criteria: Option<&Criteria>,
        object: Option<&NodeRef>,
        context: &ApplicationContext,
    ) -> Result<()> {
        validate_arguments(operation, type_key, criteria, object)?;
        if !self
            .authorizer
            .is_authorized(operation, type_key, context.principal())
        {
            return Err(PortalError::NotAuthorized {
                operation,
                type_key: type_key.to_string(),
            });
        }
        Ok(())
    }

    fn run_local(
        &self,
        operation: OperationKind,
        type_key: &str,
        criteria: Option<Criteria>,
        object: Option<NodeRef>,
        context: &ApplicationContext,
    ) -> Result<Option<NodeRef>> {
        let host = self
            .host
            .as_ref()
            .ok_or_else(|| PortalError::InvalidArgument("local execution needs a host".into()))?;
        let run = || {
            let object = match object {
                Some(node) if self.config.auto_clone_on_update => {
                    let payload = self.formatter.serialize(&node)?;
                    Some(self.formatter.deserialize(&payload)?)
                }
                other => other,
            };
            host.execute(operation, type_key, criteria.as_ref(), object.as_ref(), context)
        };
        run().map_err(|err| PortalError::remote_execution(operation, &err))
    }

    fn transport(&self) -> Result<&Arc<dyn Transport>> {
        self.transport
            .as_ref()
            .ok_or_else(|| PortalError::InvalidArgument("remote execution needs a transport".into()))
    }

    fn encode_request(
        &self,
        operation: OperationKind,
        type_key: &str,
        criteria: Option<Criteria>,
        object: Option<NodeRef>,
        context: ApplicationContext,
    ) -> Result<Vec<u8>> {
        let encode = || {
            let object = object
                .map(|node| self.formatter.serialize(&node))
                .transpose()?;
            PortalRequest {
                operation,
                type_key: type_key.to_string(),
                criteria,
                object,
                context,
            }
            .to_bytes(self.formatter.compressor()?)
        };
        encode().map_err(|err| PortalError::remote_execution(operation, &err))
    }

    fn decode_response(
        &self,
        operation: OperationKind,
        response: Result<Vec<u8>>,
    ) -> Result<Option<NodeRef>> {
        let decode = || {
            let bytes = response?;
            PortalResponse::from_bytes(&bytes, self.formatter.compressors())
        };
        match decode().map_err(|err| PortalError::remote_execution(operation, &err))? {
            // Rebuilding happens on this side; its errors are not remote failures.
            PortalResponse::Object(payload) => self.formatter.deserialize(&payload).map(Some),
            PortalResponse::Done => Ok(None),
            PortalResponse::Failed { message, cause } => Err(PortalError::RemoteExecution {
                operation,
                message,
                cause: cause.map(Arc::new),
            }),
        }
    }
}

fn validate_arguments(
    operation: OperationKind,
    type_key: &str,
    criteria: Option<&Criteria>,
    object: Option<&NodeRef>,
) -> Result<()> {
    if !operation.targets_object() {
        return match criteria {
            Some(_) => Ok(()),
            None => Err(PortalError::Argument(format!(
                "{operation} of {type_key} requires criteria"
            ))),
        };
    }

    let Some(node) = object else {
        return Err(PortalError::Argument(format!(
            "{operation} of {type_key} requires an object"
        )));
    };
    if node.type_key() != type_key {
        return Err(PortalError::Argument(format!(
            "{operation} of {type_key} was given a {}",
            node.type_key()
        )));
    }
    if operation == OperationKind::Update
        && let Some(status) = node.status()
    {
        if status.is_busy {
            return Err(PortalError::Argument(format!(
                "cannot update {type_key} while it is busy"
            )));
        }
        if status.is_child {
            return Err(PortalError::Argument(format!(
                "cannot update child object {type_key} directly"
            )));
        }
    }
    Ok(())
}

fn post_validate(
    operation: OperationKind,
    type_key: &str,
    result: Option<NodeRef>,
) -> Result<Option<NodeRef>> {
    let Some(node) = result else {
        if operation.returns_object() {
            return Err(PortalError::CorruptGraph(format!(
                "{operation} of {type_key} returned no object"
            )));
        }
        return Ok(None);
    };
    if node.type_key() != type_key {
        return Err(PortalError::CorruptGraph(format!(
            "{operation} of {type_key} returned a {}",
            node.type_key()
        )));
    }
    if node.status().is_some_and(|s| s.is_busy) {
        return Err(PortalError::CorruptGraph(format!(
            "{operation} of {type_key} returned a busy object"
        )));
    }
    Ok(Some(node))
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.config)
            .field("formatter", &self.formatter)
            .field("has_host", &self.host.is_some())
            .field("has_transport", &self.transport.is_some())
            .finish()
    }
}
