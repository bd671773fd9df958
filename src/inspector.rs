//! Tools for inspecting the structure of graph payloads.
//! Useful for debugging object graphs and verifying what goes over the wire.
//!
//! The report is a nested tree, built and printed one stack frame per level,
//! so it suits graphs of the depth the writer itself can produce.

use std::collections::HashSet;

use serde::Serialize;

use crate::compression::CompressorRegistry;
use crate::error::{PortalError, Result};
use crate::format::{FrameHeader, SerializedPayload};
use crate::graph::ReferenceId;
use crate::reader::validate;

/// A structural report of a payload.
#[derive(Debug, Serialize)]
pub struct DebugReport {
    /// Frame size in bytes, when inspected from bytes.
    pub frame_size: Option<u64>,
    /// Compression algorithm of the frame, when inspected from bytes.
    pub compression_algo: Option<String>,
    /// Number of records in the payload.
    pub record_count: usize,
    /// The graph as a tree, rooted at the payload root.
    pub tree: RecordInfo,
    /// Records not reachable from the root.
    pub detached: Vec<ReferenceId>,
}

/// One node of the report tree.
#[derive(Debug, Serialize)]
pub struct RecordInfo {
    /// Record id.
    pub reference_id: ReferenceId,
    /// Type identity.
    pub type_key: String,
    /// Slot name in the parent, `None` for the root.
    pub slot: Option<String>,
    /// Number of scalar values.
    pub value_count: usize,
    /// True if the record was already shown higher up (shared or cyclic).
    pub back_reference: bool,
    /// Dirty flag stored in the parent's slot.
    pub is_dirty: bool,
    /// Child records.
    pub children: Vec<RecordInfo>,
}

/// The payload inspector tool.
#[derive(Debug)]
pub struct PayloadInspector;

impl PayloadInspector {
    /// Analyzes a payload and returns a structural report.
    pub fn inspect(payload: &SerializedPayload) -> Result<DebugReport> {
        validate(payload)?;
        let mut seen = HashSet::new();
        let tree = Self::inspect_record(payload, payload.root, None, false, &mut seen)?;
        let detached = payload
            .records
            .iter()
            .map(|r| r.reference_id())
            .filter(|id| !seen.contains(id))
            .collect();

        Ok(DebugReport {
            frame_size: None,
            compression_algo: None,
            record_count: payload.records.len(),
            tree,
            detached,
        })
    }

    /// Analyzes framed bytes.
    pub fn inspect_bytes(bytes: &[u8], registry: &CompressorRegistry) -> Result<DebugReport> {
        let header = FrameHeader::from_bytes(bytes)?;
        let payload = SerializedPayload::from_bytes(bytes, registry)?;
        let mut report = Self::inspect(&payload)?;
        report.frame_size = Some(bytes.len() as u64);
        report.compression_algo = Some(registry.describe(header.compression_id));
        Ok(report)
    }

    fn inspect_record(
        payload: &SerializedPayload,
        id: ReferenceId,
        slot: Option<&str>,
        is_dirty: bool,
        seen: &mut HashSet<ReferenceId>,
    ) -> Result<RecordInfo> {
        let record = payload
            .record(id)
            .ok_or_else(|| PortalError::CorruptGraph(format!("no record for reference id {id}")))?;
        let back_reference = !seen.insert(id);

        let mut children = Vec::new();
        if !back_reference {
            for (name, child) in record.children() {
                children.push(Self::inspect_record(
                    payload,
                    child.reference_id,
                    Some(name),
                    child.is_dirty,
                    seen,
                )?);
            }
        }

        Ok(RecordInfo {
            reference_id: id,
            type_key: record.type_key().to_string(),
            slot: slot.map(str::to_string),
            value_count: record.values().count(),
            back_reference,
            is_dirty,
            children,
        })
    }
}

impl std::fmt::Display for DebugReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== GRAPH PAYLOAD REPORT ===")?;
        writeln!(f, "Records:        {}", self.record_count)?;
        if let Some(size) = self.frame_size {
            writeln!(f, "Frame Size:     {size}b")?;
        }
        if let Some(algo) = &self.compression_algo {
            writeln!(f, "Compression:    {algo}")?;
        }
        writeln!(f, "\n[GRAPH LAYOUT]")?;
        self.tree.fmt_recursive(f, "", true)?;
        if !self.detached.is_empty() {
            let ids: Vec<_> = self.detached.iter().map(ToString::to_string).collect();
            writeln!(f, "\n[DETACHED] {}", ids.join(", "))?;
        }
        Ok(())
    }
}

impl RecordInfo {
    fn fmt_recursive(
        &self,
        f: &mut std::fmt::Formatter<'_>,
        prefix: &str,
        is_last: bool,
    ) -> std::fmt::Result {
        let connector = if is_last { "└── " } else { "├── " };
        let child_prefix = if is_last { "    " } else { "│   " };
        let slot = self
            .slot
            .as_deref()
            .map(|s| format!("{s}: "))
            .unwrap_or_default();

        if self.back_reference {
            return writeln!(
                f,
                "{prefix}{connector}{slot}{} -> {} (back reference)",
                self.reference_id, self.type_key
            );
        }

        let dirty = if self.is_dirty { " | dirty" } else { "" };
        writeln!(
            f,
            "{prefix}{connector}{slot}{} {} | Values: {} | Children: {}{dirty}",
            self.reference_id,
            self.type_key,
            self.value_count,
            self.children.len()
        )?;

        for (i, child) in self.children.iter().enumerate() {
            let is_last_child = i + 1 == self.children.len();
            child.fmt_recursive(f, &format!("{prefix}{child_prefix}"), is_last_child)?;
        }
        Ok(())
    }
}
