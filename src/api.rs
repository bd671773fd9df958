//! High-level entry point: [`GraphFormatter`] ties a type registry to the
//! writer, the reader and the frame codec.

use std::sync::Arc;

use crate::compression::{Compressor, CompressorRegistry};
use crate::error::Result;
use crate::format::SerializedPayload;
use crate::graph::{Mobile, NodeRef};
use crate::policy::TypeRegistry;
use crate::reader::GraphReader;
use crate::visitor::MobileType;
use crate::writer::GraphWriter;

/// The main entry point for graph serialization.
///
/// A formatter is cheap to clone and holds no per-pass state: every call
/// creates its own reference table.
#[derive(Debug, Clone)]
pub struct GraphFormatter {
    registry: Arc<TypeRegistry>,
    compressors: Arc<CompressorRegistry>,
    compression_id: u8,
}

impl GraphFormatter {
    /// Creates a formatter over `registry`, writing uncompressed frames.
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self {
            registry,
            compressors: Arc::new(CompressorRegistry::new()),
            compression_id: 0,
        }
    }

    /// Selects the compression algorithm used by [`GraphFormatter::to_bytes`].
    pub fn with_compression(mut self, compression_id: u8) -> Self {
        self.compression_id = compression_id;
        self
    }

    /// Replaces the set of available compressors.
    pub fn with_compressors(mut self, compressors: CompressorRegistry) -> Self {
        self.compressors = Arc::new(compressors);
        self
    }

    /// The type registry used for policy and reconstruction.
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Shared handle to the type registry.
    pub fn registry_handle(&self) -> Arc<TypeRegistry> {
        Arc::clone(&self.registry)
    }

    /// The compressors this formatter can read.
    pub fn compressors(&self) -> &CompressorRegistry {
        &self.compressors
    }

    /// Id of the compression algorithm used when writing.
    pub fn compression_id(&self) -> u8 {
        self.compression_id
    }

    /// The compressor used when writing.
    pub fn compressor(&self) -> Result<&dyn Compressor> {
        self.compressors.get(self.compression_id)
    }

    /// Flattens the graph reachable from `root`.
    pub fn serialize(&self, root: &NodeRef) -> Result<SerializedPayload> {
        GraphWriter::new(self.registry.as_ref()).write_root(root)
    }

    /// Rebuilds a graph and returns its root.
    pub fn deserialize(&self, payload: &SerializedPayload) -> Result<NodeRef> {
        GraphReader::new(&self.registry).read(payload)
    }

    /// Rebuilds a graph whose root must be a `T`.
    pub fn deserialize_as<T: MobileType>(&self, payload: &SerializedPayload) -> Result<Mobile<T>> {
        self.deserialize(payload)?.expect_type::<T>("root")
    }

    /// Deep-copies a graph through a full serialize/deserialize pass.
    ///
    /// The copy shares nothing with the source, but keeps its internal
    /// sharing and cycles.
    pub fn clone_graph<T: MobileType>(&self, root: &Mobile<T>) -> Result<Mobile<T>> {
        let payload = self.serialize(&root.to_node())?;
        self.deserialize_as(&payload)
    }

    /// Serializes `root` into framed bytes.
    pub fn to_bytes(&self, root: &NodeRef) -> Result<Vec<u8>> {
        self.serialize(root)?.to_bytes(self.compressor()?)
    }

    /// Rebuilds a graph from framed bytes.
    pub fn from_bytes(&self, bytes: &[u8]) -> Result<NodeRef> {
        let payload = SerializedPayload::from_bytes(bytes, &self.compressors)?;
        self.deserialize(&payload)
    }

    /// Typed variant of [`GraphFormatter::from_bytes`].
    pub fn from_bytes_as<T: MobileType>(&self, bytes: &[u8]) -> Result<Mobile<T>> {
        self.from_bytes(bytes)?.expect_type::<T>("root")
    }
}
