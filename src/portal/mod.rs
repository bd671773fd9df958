//! The data portal: one entry point for Create, Fetch, Update, Delete and
//! Execute, whether the data access code runs in-process or remotely.
//!
//! ```text
//! DataPortal<T> ─► Dispatcher ─┬─► PortalHost                    (Local)
//!                              └─► Transport ─► PortalHost::handle (Remote)
//! ```

/// Role-based and custom authorization.
pub mod auth;
/// Typed client API.
pub mod client;
/// Principal and application context.
pub mod context;
/// Request routing, configuration and validation.
pub mod dispatcher;
/// Data access registration and execution.
pub mod host;
/// Operation kinds, criteria and request states.
pub mod operation;
/// Transport abstraction and the loopback transport.
pub mod transport;
/// Request and response envelopes.
pub mod wire;

pub use auth::{AllowAll, Authorizer, RoleAuthorizer, RoleRule};
pub use client::DataPortal;
pub use context::{ApplicationContext, ContextHandle, LogicalLocation, Principal};
pub use dispatcher::{Dispatcher, DispatcherBuilder, ExecutionLocation, PortalConfig};
pub use host::{DataAccess, PortalHost};
pub use operation::{Criteria, OperationKind, RequestState};
pub use transport::{LoopbackTransport, Transport};
pub use wire::{PortalRequest, PortalResponse};
