//! # graphportal
//!
//! A business-object framework core made of two cooperating subsystems: a
//! reference-preserving object graph serializer, and a data portal that runs
//! Create/Fetch/Update/Delete/Execute in-process or across a remote boundary
//! with the same authorization and error behaviour.
//!
//! ## Overview
//!
//! Business objects are plain structs shared through [`Mobile<T>`] handles. An
//! object graph may share instances and contain cycles. Serializing it yields a
//! flat [`SerializedPayload`]: one record per distinct instance, children named
//! by reference id. Reading it back rebuilds exactly the same shape: shared
//! instances stay shared and cycles stay closed.
//!
//! ### Key Features
//!
//! *   **Identity Preservation:** A per-pass [`graph::ReferenceTable`] maps each
//!     instance to one id, so a second encounter writes a back reference only.
//! *   **Two-Pass Reconstruction:** Every node is materialized before any link is
//!     restored, so cycles close without recursion.
//! *   **Field Containers:** [`FieldData<T>`] tracks a dirty flag and delegates
//!     status queries to child objects.
//! *   **Location Transparency:** [`DataPortal<T>`] offers blocking, async and
//!     callback shapes over a [`Dispatcher`] configured for local or remote
//!     execution. Outcomes and errors have the same shape either way.
//! *   **Framed Wire Format:** payloads and portal envelopes carry magic bytes, a
//!     version, the compression id and an XxHash64 checksum.
//!
//! ## Architecture
//!
//! ### The Record Model
//!
//! ```text
//! SerializedPayload { root: #1, records: [
//!     #1 Customer { values: [name, balance], children: [contacts -> #2] },
//!     #2 ChildList<Contact> { values: [count], children: [0 -> #3, 1 -> #4] },
//!     #3 Contact { ..., children: [owner -> #1] },   // cycle back to the root
//!     #4 Contact { ... },
//! ] }
//! ```
//!
//! ### Frame Layout
//!
//! ```text
//! [ Magic "GPW1" | Version u16 | Compression u8 | Checksum u64 | BodyLength u64 ] [ Body ]
//! ```
//!
//! ## Core Concepts
//!
//! ### Visitor
//!
//! The [`visitor::MobileObject`] trait lets a type write its scalar state and
//! child references into a record, and read them back. `#[derive(MobileObject)]`
//! implements it field by field.
//!
//! ### Policy
//!
//! The [`TypeRegistry`] records which types are graph-capable and which fields
//! are opaque. Opaque fields are embedded as bincode blobs and lose their
//! identity on purpose.
//!
//! ### Portal
//!
//! The [`portal`] module holds the dispatcher, the host that runs data access
//! code, the authorization gate and the transport seam.
//!
//! ## Usage Patterns
//!
//! ### Round-Tripping a Graph
//!
//! ```rust,ignore
//! use graphportal::{FieldData, GraphFormatter, Mobile, MobileObject, TypeRegistry};
//! use serde::{Deserialize, Serialize};
//! use std::sync::Arc;
//!
//! #[derive(Default, Serialize, Deserialize, MobileObject)]
//! struct Customer {
//!     name: FieldData<String>,
//!     #[mobile(opaque)]
//!     balance: f64,
//! }
//!
//! let registry = Arc::new(TypeRegistry::new().with::<Customer>());
//! let formatter = GraphFormatter::new(registry);
//! let copy = formatter.clone_graph(&Mobile::new(customer))?;
//! ```
//!
//! ### Fetching Through the Portal
//!
//! ```rust,ignore
//! let host = Arc::new(PortalHost::new(formatter.clone()).with::<Customer, _>(CustomerDal));
//! let dispatcher = Dispatcher::builder()
//!     .location(ExecutionLocation::Remote)
//!     .formatter(formatter)
//!     .transport(LoopbackTransport::new(host))
//!     .build()?;
//! let customer = DataPortal::<Customer>::new(dispatcher).fetch(Criteria::new().with(7i32)?)?;
//! ```
//!
//! ### Safety and Error Handling
//!
//! * **No Unsafe:** the crate is `#![deny(unsafe_code)]`.
//! * **No Panics:** No `unwrap()` or `panic!()` calls in the library (enforced by clippy lints).
//! * **Comprehensive Errors:** All failures correspond to a [`PortalError`] type.
//! * **Lock Poisoning:** fallible paths report it as `PortalError::Internal`;
//!   status queries recover the last written state.

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![warn(missing_docs)]

extern crate self as graphportal;

// --- PUBLIC API MODULES ---
pub mod api;
pub mod compression;
pub mod error;
pub mod field;
pub mod format;
pub mod inspector;
pub mod list;
pub mod loader;
pub mod policy;
pub mod portal;
pub mod reader;
pub mod visitor;
pub mod visitor_impls;
pub mod writer;

// --- INTERNAL IMPLEMENTATION MODULES ---
pub mod graph;

// --- MACRO SUPPORT MODULES ---

/// Runtime utilities used by the derived code.
#[doc(hidden)]
pub mod rt;

// --- RE-EXPORTS ---

pub use api::GraphFormatter;
#[cfg(feature = "lz4_flex")]
pub use compression::Lz4Compressor;
pub use compression::{Compressor, CompressorRegistry, NoCompression};
pub use error::{ErrorInfo, PortalError, Result};
pub use field::{FieldData, Held, StatusFlags, TrackStatus};
pub use format::{SerializedPayload, SerializedRecord, WireValue};
pub use graph::{Mobile, NodeRef, ReferenceId};
pub use inspector::PayloadInspector;
pub use list::ChildList;
pub use loader::{AsyncLoader, Completion, LoadManager};
pub use policy::{SerializationPolicy, TypeRegistry};
pub use portal::{
    AllowAll, ApplicationContext, Authorizer, ContextHandle, Criteria, DataAccess, DataPortal,
    Dispatcher, ExecutionLocation, LoopbackTransport, OperationKind, PortalConfig, PortalHost,
    Principal, RoleAuthorizer, Transport,
};
pub use visitor::{MobileObject, MobileType};
pub use visitor_impls::FieldType;

/// Derives `MobileObject` and `MobileType` for a business struct.
pub use graphportal_derive::MobileObject;
