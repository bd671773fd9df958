//! The per-pass reference table.
//!
//! A table is created by a single serialize or deserialize call and dropped when
//! that call returns. Sharing one across passes would leak ids between payloads.

use std::collections::{BTreeMap, HashMap};

use super::id::ReferenceId;
use super::node::NodeRef;
use crate::error::{PortalError, Result};

/// Bidirectional map between object identity and reference id.
///
/// The table also owns a handle to every node it has seen, so an address
/// cannot be freed and reused while the pass is running.
#[derive(Debug, Default)]
pub struct ReferenceTable {
    by_identity: HashMap<usize, ReferenceId>,
    by_id: BTreeMap<ReferenceId, NodeRef>,
    next: u32,
}

impl ReferenceTable {
    /// Creates an empty table. The first assigned id is `#1`.
    pub fn new() -> Self {
        Self {
            by_identity: HashMap::new(),
            by_id: BTreeMap::new(),
            next: 1,
        }
    }

    /// Returns the id already assigned to `node`, if any.
    pub fn lookup(&self, node: &NodeRef) -> Option<ReferenceId> {
        self.by_identity.get(&node.identity()).copied()
    }

    /// Assigns the next id to a node seen for the first time.
    ///
    /// Callers must `lookup` first; assigning twice is an internal error.
    pub fn assign(&mut self, node: &NodeRef) -> Result<ReferenceId> {
        if let Some(existing) = self.lookup(node) {
            return Err(PortalError::Internal(format!(
                "{node:?} already registered as {existing}"
            )));
        }
        let id = ReferenceId::new(self.next);
        self.next = self
            .next
            .checked_add(1)
            .ok_or_else(|| PortalError::Internal("Reference id space exhausted".into()))?;
        self.by_identity.insert(node.identity(), id);
        self.by_id.insert(id, node.clone());
        Ok(id)
    }

    /// Registers a reconstructed node under the id it had on the wire.
    pub fn register(&mut self, id: ReferenceId, node: NodeRef) -> Result<()> {
        if self.by_id.contains_key(&id) {
            return Err(PortalError::CorruptGraph(format!(
                "reference id {id} appears more than once"
            )));
        }
        self.by_identity.insert(node.identity(), id);
        self.by_id.insert(id, node);
        Ok(())
    }

    /// Resolves an id to its node.
    pub fn resolve(&self, id: ReferenceId) -> Result<&NodeRef> {
        self.by_id
            .get(&id)
            .ok_or_else(|| PortalError::CorruptGraph(format!("no record for reference id {id}")))
    }

    /// Returns true if `id` has a node.
    pub fn contains(&self, id: ReferenceId) -> bool {
        self.by_id.contains_key(&id)
    }

    /// Number of distinct instances in the table.
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Returns true if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
