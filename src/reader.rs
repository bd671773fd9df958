//! Rebuilds an object graph from a [`SerializedPayload`].
//!
//! Reconstruction runs in two passes over the record arena:
//!
//! 1. **Materialize**: every record becomes a blank instance of its type and
//!    receives its scalar state.
//! 2. **Link**: every instance receives its child references. All nodes exist
//!    by now, so a cycle is closed by a plain table lookup.
//!
//! The payload is validated before either pass, so a structurally broken
//! payload never produces a partial graph.

use std::collections::HashSet;

use crate::error::{PortalError, Result};
use crate::format::SerializedPayload;
use crate::graph::{Mobile, NodeRef, ReferenceId, ReferenceTable};
use crate::policy::TypeRegistry;
use crate::visitor::MobileType;

/// Read side of one deserialization pass.
#[derive(Debug)]
pub struct GraphReader<'r> {
    registry: &'r TypeRegistry,
    table: ReferenceTable,
}

impl<'r> GraphReader<'r> {
    /// Starts a pass with a fresh reference table.
    pub fn new(registry: &'r TypeRegistry) -> Self {
        Self {
            registry,
            table: ReferenceTable::new(),
        }
    }

    /// Resolves a reference id of the current payload.
    pub fn resolve(&self, id: ReferenceId) -> Result<&NodeRef> {
        self.table.resolve(id)
    }

    /// Resolves a reference id and checks the type of the node.
    pub fn resolve_typed<T: MobileType>(&self, id: ReferenceId, field: &str) -> Result<Mobile<T>> {
        self.resolve(id)?.expect_type::<T>(field)
    }

    /// Runs both passes and returns the root node.
    pub fn read(mut self, payload: &SerializedPayload) -> Result<NodeRef> {
        validate(payload)?;

        for record in &payload.records {
            let node = self.registry.create(record.type_key())?;
            node.write()?.set_state(record)?;
            self.table.register(record.reference_id(), node)?;
        }

        for record in &payload.records {
            let node = self.table.resolve(record.reference_id())?.clone();
            node.write()?.set_children(record, &self)?;
        }

        log::trace!(
            "rebuilt {} nodes, root {}",
            self.table.len(),
            payload.root
        );
        self.table.resolve(payload.root).cloned()
    }
}

/// Checks the payload's structure: root present, ids unique, no dangling children.
pub fn validate(payload: &SerializedPayload) -> Result<()> {
    let mut ids = HashSet::with_capacity(payload.records.len());
    for record in &payload.records {
        if !ids.insert(record.reference_id()) {
            return Err(PortalError::CorruptGraph(format!(
                "reference id {} appears more than once",
                record.reference_id()
            )));
        }
    }

    if !ids.contains(&payload.root) {
        return Err(PortalError::CorruptGraph(format!(
            "root {} has no record",
            payload.root
        )));
    }

    for record in &payload.records {
        for (name, child) in record.children() {
            if !ids.contains(&child.reference_id) {
                return Err(PortalError::CorruptGraph(format!(
                    "record {} slot '{name}' points to missing reference id {}",
                    record.reference_id(),
                    child.reference_id
                )));
            }
        }
    }
    Ok(())
}
