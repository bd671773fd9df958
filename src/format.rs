//! Defines the wire representation of a serialized object graph.
//!
//! # Layout
//! A payload is a flat arena of records plus the id of the root record:
//!
//! `SerializedPayload { root, records: [Record #1, Record #2, ...] }`
//!
//! Each record holds one object's scalar values and its child slots. A child slot
//! only names a reference id, so shared references and cycles need no nesting.
//!
//! ## Framing
//! On the byte level the bincode body is preceded by a fixed header:
//! `[ Magic(4) | Version(2) | Compression(1) | Checksum(8) | BodyLength(8) ] [ Body ]`

use std::hash::Hasher;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use twox_hash::XxHash64;

use crate::compression::{Compressor, CompressorRegistry};
use crate::error::{PortalError, Result};
use crate::graph::ReferenceId;

/// Magic bytes identifying a graph payload frame: "GPW1".
pub const MAGIC_BYTES: [u8; 4] = *b"GPW1";

/// Current frame version.
pub const FORMAT_VERSION: u16 = 1;

/// The fixed size of the frame header.
/// Magic(4) + Version(2) + Compression(1) + Checksum(8) + BodyLength(8) = 23
pub const FRAME_HEADER_SIZE: usize = 23;

/// A scalar value as it travels on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WireValue {
    /// Absent value.
    Null,
    /// Boolean.
    Bool(bool),
    /// Any signed integer.
    Int(i64),
    /// Any unsigned integer.
    UInt(u64),
    /// Any float.
    Float(f64),
    /// UTF-8 text.
    Text(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// Homogeneous or mixed list of scalars.
    List(Vec<WireValue>),
    /// A value embedded as a bincode blob. `type_name` is checked on restore.
    Opaque {
        /// Rust type name of the encoded value.
        type_name: String,
        /// Bincode body.
        bytes: Vec<u8>,
    },
}

impl WireValue {
    /// Short name of the variant, used in `TypeMismatch` errors.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::UInt(_) => "uint",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
            Self::List(_) => "list",
            Self::Opaque { .. } => "opaque",
        }
    }

    /// Encodes `value` as an opaque blob.
    pub fn opaque<T: Serialize>(value: &T) -> Result<Self> {
        let bytes = bincode::serde::encode_to_vec(value, bincode::config::standard())?;
        Ok(Self::Opaque {
            type_name: std::any::type_name::<T>().to_string(),
            bytes,
        })
    }

    /// Decodes an opaque blob back into `T`.
    pub fn decode_opaque<T: serde::de::DeserializeOwned>(&self, field: &str) -> Result<T> {
        let expected = std::any::type_name::<T>();
        match self {
            Self::Opaque { type_name, bytes } if type_name == expected => {
                let (value, _) =
                    bincode::serde::decode_from_slice(bytes, bincode::config::standard())?;
                Ok(value)
            }
            Self::Opaque { type_name, .. } => {
                Err(PortalError::type_mismatch(field, expected, type_name.clone()))
            }
            other => Err(PortalError::type_mismatch(field, expected, other.kind_name())),
        }
    }
}

/// A child slot: which record it points to and the container's dirty flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildData {
    /// Record holding the child.
    pub reference_id: ReferenceId,
    /// Dirty flag of the field that holds the child.
    pub is_dirty: bool,
}

/// One flattened node of the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedRecord {
    reference_id: ReferenceId,
    type_key: String,
    values: Vec<(String, WireValue)>,
    children: Vec<(String, ChildData)>,
}

impl SerializedRecord {
    /// Creates an empty record.
    pub fn new(reference_id: ReferenceId, type_key: impl Into<String>) -> Self {
        Self {
            reference_id,
            type_key: type_key.into(),
            values: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Id of this record.
    pub fn reference_id(&self) -> ReferenceId {
        self.reference_id
    }

    /// Type identity of the object this record describes.
    pub fn type_key(&self) -> &str {
        &self.type_key
    }

    /// Adds (or replaces) a scalar value. Insertion order is kept.
    pub fn add_value(&mut self, name: impl Into<String>, value: WireValue) {
        let name = name.into();
        match self.values.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.values.push((name, value)),
        }
    }

    /// Adds (or replaces) a child slot. Insertion order is kept.
    pub fn add_child(&mut self, name: impl Into<String>, reference_id: ReferenceId, is_dirty: bool) {
        let name = name.into();
        let data = ChildData {
            reference_id,
            is_dirty,
        };
        match self.children.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = data,
            None => self.children.push((name, data)),
        }
    }

    /// Looks up a scalar value.
    pub fn value(&self, name: &str) -> Option<&WireValue> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Looks up a scalar value that must be present.
    pub fn require_value(&self, name: &str) -> Result<&WireValue> {
        self.value(name).ok_or_else(|| {
            PortalError::CorruptGraph(format!(
                "record {} ({}) has no value '{name}'",
                self.reference_id, self.type_key
            ))
        })
    }

    /// Looks up a child slot.
    pub fn child(&self, name: &str) -> Option<&ChildData> {
        self.children.iter().find(|(n, _)| n == name).map(|(_, c)| c)
    }

    /// Scalar values in insertion order.
    pub fn values(&self) -> impl Iterator<Item = (&str, &WireValue)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Child slots in insertion order.
    pub fn children(&self) -> impl Iterator<Item = (&str, &ChildData)> {
        self.children.iter().map(|(n, c)| (n.as_str(), c))
    }
}

/// A complete serialized graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedPayload {
    /// Id of the root record.
    pub root: ReferenceId,
    /// All records, ordered by reference id.
    pub records: Vec<SerializedRecord>,
}

impl SerializedPayload {
    /// Finds a record by id.
    pub fn record(&self, id: ReferenceId) -> Option<&SerializedRecord> {
        self.records.iter().find(|r| r.reference_id == id)
    }

    /// Encodes the payload into a framed byte buffer.
    pub fn to_bytes(&self, compressor: &dyn Compressor) -> Result<Vec<u8>> {
        encode_frame(self, compressor)
    }

    /// Decodes a framed byte buffer.
    ///
    /// Checksum failures are reported as `CorruptGraph`; framing problems as `Format`.
    pub fn from_bytes(bytes: &[u8], registry: &CompressorRegistry) -> Result<Self> {
        decode_frame(bytes, registry)
    }
}

/// Encodes any serde value as a frame: header followed by the bincode body.
pub fn encode_frame<T: Serialize>(value: &T, compressor: &dyn Compressor) -> Result<Vec<u8>> {
    let body = bincode::serde::encode_to_vec(value, bincode::config::standard())?;
    let checksum = checksum(&body);
    let compressed = compressor.compress(&body)?;

    let header = FrameHeader::new(compressor.id(), checksum, compressed.len() as u64);
    let mut buffer = Vec::with_capacity(FRAME_HEADER_SIZE + compressed.len());
    buffer.extend_from_slice(&header.to_bytes());
    buffer.extend_from_slice(&compressed);
    Ok(buffer)
}

/// Decodes a frame produced by [`encode_frame`].
pub fn decode_frame<T: DeserializeOwned>(bytes: &[u8], registry: &CompressorRegistry) -> Result<T> {
    let header = FrameHeader::from_bytes(bytes)?;
    let body_start = FRAME_HEADER_SIZE;
    let body_end = usize::try_from(header.body_length)
        .ok()
        .and_then(|len| body_start.checked_add(len))
        .ok_or_else(|| PortalError::Format("Body length overflows".into()))?;
    let compressed = bytes
        .get(body_start..body_end)
        .ok_or_else(|| PortalError::Format("Truncated payload body".into()))?;

    let body = registry.get(header.compression_id)?.decompress(compressed)?;
    if checksum(&body) != header.checksum {
        return Err(PortalError::CorruptGraph("payload checksum mismatch".into()));
    }
    let (value, _) = bincode::serde::decode_from_slice(&body, bincode::config::standard())?;
    Ok(value)
}

fn checksum(body: &[u8]) -> u64 {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(body);
    hasher.finish()
}

/// The header that precedes every framed payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Always `MAGIC_BYTES`.
    pub magic: [u8; 4],
    /// Frame version.
    pub version: u16,
    /// Compression algorithm id of the body.
    pub compression_id: u8,
    /// XxHash64 of the uncompressed body.
    pub checksum: u64,
    /// Length of the (compressed) body in bytes.
    pub body_length: u64,
}

impl FrameHeader {
    /// Creates a new header for the current version.
    pub fn new(compression_id: u8, checksum: u64, body_length: u64) -> Self {
        Self {
            magic: MAGIC_BYTES,
            version: FORMAT_VERSION,
            compression_id,
            checksum,
            body_length,
        }
    }

    /// Serializes the header to bytes (Little Endian).
    pub fn to_bytes(&self) -> [u8; FRAME_HEADER_SIZE] {
        let mut buf = [0u8; FRAME_HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.magic);
        buf[4..6].copy_from_slice(&self.version.to_le_bytes());
        buf[6] = self.compression_id;
        buf[7..15].copy_from_slice(&self.checksum.to_le_bytes());
        buf[15..23].copy_from_slice(&self.body_length.to_le_bytes());
        buf
    }

    /// Parses and validates a header from the start of `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let header = bytes
            .get(..FRAME_HEADER_SIZE)
            .ok_or_else(|| PortalError::Format("Buffer smaller than frame header".into()))?;

        if header[0..4] != MAGIC_BYTES {
            return Err(PortalError::Format("Invalid Magic Bytes".into()));
        }
        let version = u16::from_le_bytes([header[4], header[5]]);
        if version != FORMAT_VERSION {
            return Err(PortalError::Format(format!("Unsupported version: {version}")));
        }
        let checksum = u64::from_le_bytes(header[7..15].try_into().unwrap_or([0; 8]));
        let body_length = u64::from_le_bytes(header[15..23].try_into().unwrap_or([0; 8]));

        Ok(Self {
            magic: MAGIC_BYTES,
            version,
            compression_id: header[6],
            checksum,
            body_length,
        })
    }
}
