//! Flattens an object graph into a [`SerializedPayload`].
//!
//! The walk descends one stack frame per level of child references, so the
//! deepest chain a pass can write is bounded by the calling thread's stack.
//! Width and sharing cost nothing extra; only depth does. Reading is not
//! affected, since [`crate::reader`] rebuilds from the flat record arena.

use std::collections::BTreeMap;

use crate::error::{PortalError, Result};
use crate::format::{SerializedPayload, SerializedRecord};
use crate::graph::{NodeRef, ReferenceId, ReferenceTable};
use crate::policy::SerializationPolicy;

/// Write side of one serialization pass.
///
/// Each distinct instance is written once. A second encounter (shared
/// reference or cycle) only yields the id already assigned.
pub struct GraphWriter<'p> {
    policy: &'p dyn SerializationPolicy,
    table: ReferenceTable,
    records: BTreeMap<ReferenceId, SerializedRecord>,
}

impl<'p> GraphWriter<'p> {
    /// Starts a pass with a fresh reference table.
    pub fn new(policy: &'p dyn SerializationPolicy) -> Self {
        Self {
            policy,
            table: ReferenceTable::new(),
            records: BTreeMap::new(),
        }
    }

    /// Policy of this pass.
    pub fn policy(&self) -> &dyn SerializationPolicy {
        self.policy
    }

    /// True if the node in `field` of `owner_type` is written as a child.
    pub fn should_walk(&self, owner_type: &str, field: &str, node: &NodeRef) -> bool {
        self.policy.is_serializable_field(owner_type, field)
            && self.policy.is_graph_capable(node.type_key())
    }

    /// Serializes `node` unless it was already seen, and returns its id.
    pub fn serialize_object(&mut self, node: &NodeRef) -> Result<ReferenceId> {
        if let Some(id) = self.table.lookup(node) {
            log::trace!("back reference to {id} ({})", node.type_key());
            return Ok(id);
        }

        // The id must exist before descending, or a cycle would recurse forever.
        let id = self.table.assign(node)?;
        let guard = node.read()?;
        let mut record = SerializedRecord::new(id, guard.type_key());
        guard.get_state(&mut record)?;
        guard.get_children(&mut record, self)?;
        drop(guard);

        self.records.insert(id, record);
        Ok(id)
    }

    /// Number of distinct instances written so far.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns true if nothing was written yet.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Serializes a root and closes the pass.
    pub fn write_root(mut self, root: &NodeRef) -> Result<SerializedPayload> {
        if !self.policy.is_graph_capable(root.type_key()) {
            return Err(PortalError::Argument(format!(
                "{} is not a registered graph type",
                root.type_key()
            )));
        }
        let root = self.serialize_object(root)?;
        log::trace!("serialized {} records, root {root}", self.records.len());
        Ok(SerializedPayload {
            root,
            records: self.records.into_values().collect(),
        })
    }
}
