//! Core graph definitions: reference ids, node handles and the reference table.

/// Defines the `ReferenceId` type.
pub mod id;
/// Defines `Mobile<T>` and `NodeRef`.
pub mod node;
/// Defines the per-pass `ReferenceTable`.
pub mod table;

pub use id::ReferenceId;
pub use node::{Mobile, NodeRef};
pub use table::ReferenceTable;
