//! Runtime utilities for generated code (Macros).
//! Do not use directly.
//!
//! `#[derive(MobileObject)]` calls one [`Member`] method per field and per
//! pass, with the field identifier as the record key.

use crate::error::Result;
use crate::field::FieldData;
use crate::format::{SerializedRecord, WireValue};
use crate::reader::GraphReader;
use crate::visitor_impls::FieldType;
use crate::writer::GraphWriter;

/// Per-field half of the `MobileObject` protocol.
pub trait Member {
    /// Writes the scalar part of the field.
    fn write_state(&self, key: &str, record: &mut SerializedRecord) -> Result<()>;

    /// Writes the child part of the field, walking graph nodes through `writer`.
    fn write_children(
        &self,
        key: &str,
        record: &mut SerializedRecord,
        writer: &mut GraphWriter<'_>,
    ) -> Result<()>;

    /// Restores the scalar part of the field.
    fn read_state(&mut self, key: &str, record: &SerializedRecord) -> Result<()>;

    /// Restores the child part of the field.
    fn read_children(
        &mut self,
        key: &str,
        record: &SerializedRecord,
        reader: &GraphReader<'_>,
    ) -> Result<()>;
}

// --- Bare fields ---

impl<T: FieldType> Member for T {
    fn write_state(&self, key: &str, record: &mut SerializedRecord) -> Result<()> {
        if self.as_node().is_none() {
            record.add_value(key, self.to_wire()?);
        }
        Ok(())
    }

    fn write_children(
        &self,
        key: &str,
        record: &mut SerializedRecord,
        writer: &mut GraphWriter<'_>,
    ) -> Result<()> {
        let Some(node) = self.as_node() else {
            return Ok(());
        };
        if writer.should_walk(record.type_key(), key, &node) {
            let id = writer.serialize_object(&node)?;
            record.add_child(key, id, false);
        } else {
            record.add_value(key, self.to_wire()?);
        }
        Ok(())
    }

    fn read_state(&mut self, key: &str, record: &SerializedRecord) -> Result<()> {
        if record.child(key).is_none() {
            *self = T::from_wire(record.require_value(key)?, key)?;
        }
        Ok(())
    }

    fn read_children(
        &mut self,
        key: &str,
        record: &SerializedRecord,
        reader: &GraphReader<'_>,
    ) -> Result<()> {
        if let Some(child) = record.child(key) {
            *self = T::from_node(reader.resolve(child.reference_id)?, key)?;
        }
        Ok(())
    }
}

// --- Field containers ---

fn flag(record: &SerializedRecord, key: &str) -> Result<bool> {
    bool::from_wire(record.require_value(key)?, key)
}

impl<T: FieldType> Member for FieldData<T> {
    fn write_state(&self, key: &str, record: &mut SerializedRecord) -> Result<()> {
        record.add_value(format!("{key}.name"), WireValue::Text(self.name().to_string()));
        record.add_value(format!("{key}.dirty"), WireValue::Bool(self.local_dirty()));
        record.add_value(
            format!("{key}.serializable"),
            WireValue::Bool(self.is_serializable()),
        );
        if let Some(value) = self.value()
            && value.as_node().is_none()
        {
            record.add_value(key, value.to_wire()?);
        }
        Ok(())
    }

    fn write_children(
        &self,
        key: &str,
        record: &mut SerializedRecord,
        writer: &mut GraphWriter<'_>,
    ) -> Result<()> {
        let Some(value) = self.value() else {
            return Ok(());
        };
        let Some(node) = value.as_node() else {
            return Ok(());
        };
        if self.is_serializable() && writer.should_walk(record.type_key(), key, &node) {
            let id = writer.serialize_object(&node)?;
            record.add_child(key, id, self.local_dirty());
        } else {
            record.add_value(key, value.to_wire()?);
        }
        Ok(())
    }

    fn read_state(&mut self, key: &str, record: &SerializedRecord) -> Result<()> {
        let name_key = format!("{key}.name");
        let name = String::from_wire(record.require_value(&name_key)?, &name_key)?;
        let is_dirty = flag(record, &format!("{key}.dirty"))?;
        let is_serializable = flag(record, &format!("{key}.serializable"))?;
        let value = record
            .value(key)
            .map(|wire| T::from_wire(wire, key))
            .transpose()?;
        *self = FieldData::restore(name, value, is_dirty, is_serializable);
        Ok(())
    }

    fn read_children(
        &mut self,
        key: &str,
        record: &SerializedRecord,
        reader: &GraphReader<'_>,
    ) -> Result<()> {
        if let Some(child) = record.child(key) {
            let value = T::from_node(reader.resolve(child.reference_id)?, key)?;
            *self = FieldData::restore(
                self.name().to_string(),
                Some(value),
                child.is_dirty,
                self.is_serializable(),
            );
        }
        Ok(())
    }
}
