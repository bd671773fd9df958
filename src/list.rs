//! An ordered list of child objects.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{PortalError, Result};
use crate::field::{StatusFlags, TrackStatus};
use crate::format::SerializedRecord;
use crate::graph::Mobile;
use crate::reader::GraphReader;
use crate::visitor::{MobileObject, MobileType};
use crate::visitor_impls::FieldType;
use crate::writer::GraphWriter;

const COUNT_KEY: &str = "count";

/// A graph-capable list whose elements keep their identity.
///
/// Each element is a child slot keyed by its index, so the same instance
/// stored twice, or also referenced elsewhere in the graph, is rebuilt once.
#[derive(Serialize, Deserialize)]
pub struct ChildList<T> {
    items: Vec<Mobile<T>>,
}

impl<T> Default for ChildList<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T> Clone for ChildList<T> {
    /// Clones the handles; elements are shared, not copied.
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
        }
    }
}

impl<T: MobileType> ChildList<T> {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an element.
    pub fn push(&mut self, item: Mobile<T>) {
        self.items.push(item);
    }

    /// Removes and returns the element at `index`.
    pub fn remove(&mut self, index: usize) -> Option<Mobile<T>> {
        (index < self.items.len()).then(|| self.items.remove(index))
    }

    /// Element at `index`.
    pub fn get(&self, index: usize) -> Option<&Mobile<T>> {
        self.items.get(index)
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if the list has no elements.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterates over the elements.
    pub fn iter(&self) -> impl Iterator<Item = &Mobile<T>> {
        self.items.iter()
    }

    fn statuses(&self) -> impl Iterator<Item = StatusFlags> + '_ {
        self.items.iter().filter_map(Mobile::status)
    }
}

impl<T: MobileType> FromIterator<Mobile<T>> for ChildList<T> {
    fn from_iter<I: IntoIterator<Item = Mobile<T>>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl<T: MobileType> TrackStatus for ChildList<T> {
    fn is_dirty(&self) -> bool {
        self.statuses().any(|s| s.is_dirty)
    }
    fn is_self_dirty(&self) -> bool {
        false
    }
    fn is_new(&self) -> bool {
        false
    }
    fn is_deleted(&self) -> bool {
        false
    }
    fn is_child(&self) -> bool {
        false
    }
    fn is_valid(&self) -> bool {
        self.statuses().all(|s| s.is_valid)
    }
    fn is_self_valid(&self) -> bool {
        true
    }
    fn is_busy(&self) -> bool {
        self.statuses().any(|s| s.is_busy)
    }
}

impl<T: MobileType> MobileObject for ChildList<T> {
    fn type_key(&self) -> String {
        Self::key()
    }

    fn get_state(&self, record: &mut SerializedRecord) -> Result<()> {
        record.add_value(COUNT_KEY, self.items.len().to_wire()?);
        Ok(())
    }

    fn get_children(
        &self,
        record: &mut SerializedRecord,
        writer: &mut GraphWriter<'_>,
    ) -> Result<()> {
        if !writer.policy().is_graph_capable(&T::key()) {
            return Err(PortalError::Argument(format!(
                "{} elements are not a registered graph type",
                T::key()
            )));
        }
        for (index, item) in self.items.iter().enumerate() {
            let id = writer.serialize_object(&item.to_node())?;
            record.add_child(index.to_string(), id, false);
        }
        Ok(())
    }

    fn set_state(&mut self, record: &SerializedRecord) -> Result<()> {
        usize::from_wire(record.require_value(COUNT_KEY)?, COUNT_KEY)?;
        self.items.clear();
        Ok(())
    }

    fn set_children(&mut self, record: &SerializedRecord, reader: &GraphReader<'_>) -> Result<()> {
        let count = usize::from_wire(record.require_value(COUNT_KEY)?, COUNT_KEY)?;
        let mut items = Vec::new();
        for index in 0..count {
            let key = index.to_string();
            let child = record.child(&key).ok_or_else(|| {
                PortalError::CorruptGraph(format!(
                    "list record {} has no element {index}",
                    record.reference_id()
                ))
            })?;
            items.push(reader.resolve_typed::<T>(child.reference_id, &key)?);
        }
        self.items = items;
        Ok(())
    }

    fn status_flags(&self) -> Option<StatusFlags> {
        T::TRACKS_STATUS.then(|| StatusFlags::capture(self))
    }
}

impl<T: MobileType> MobileType for ChildList<T> {
    const TRACKS_STATUS: bool = T::TRACKS_STATUS;

    fn key() -> String {
        format!("ChildList<{}>", T::key())
    }
}

impl<T: fmt::Debug> fmt::Debug for ChildList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.items).finish()
    }
}
