//! Request and response envelopes exchanged over a transport.

use serde::{Deserialize, Serialize};

use super::context::ApplicationContext;
use super::operation::{Criteria, OperationKind};
use crate::compression::{Compressor, CompressorRegistry};
use crate::error::{ErrorInfo, Result};
use crate::format::{SerializedPayload, decode_frame, encode_frame};

/// Everything the remote side needs to run one operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortalRequest {
    /// Requested operation.
    pub operation: OperationKind,
    /// Type identity of the target.
    pub type_key: String,
    /// Criteria, for Create, Fetch and Delete.
    pub criteria: Option<Criteria>,
    /// Serialized target graph, for Update and Execute.
    pub object: Option<SerializedPayload>,
    /// Context snapshot taken when the request started.
    pub context: ApplicationContext,
}

impl PortalRequest {
    /// Encodes the request as a frame.
    pub fn to_bytes(&self, compressor: &dyn Compressor) -> Result<Vec<u8>> {
        encode_frame(self, compressor)
    }

    /// Decodes a request frame.
    pub fn from_bytes(bytes: &[u8], registry: &CompressorRegistry) -> Result<Self> {
        decode_frame(bytes, registry)
    }
}

/// Outcome of one operation as seen by the remote side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PortalResponse {
    /// Success carrying the resulting graph.
    Object(SerializedPayload),
    /// Success without a result (Delete).
    Done,
    /// Execution failed.
    Failed {
        /// Top-level message.
        message: String,
        /// Inner-cause chain.
        cause: Option<ErrorInfo>,
    },
}

impl PortalResponse {
    /// Encodes the response as a frame.
    pub fn to_bytes(&self, compressor: &dyn Compressor) -> Result<Vec<u8>> {
        encode_frame(self, compressor)
    }

    /// Decodes a response frame.
    pub fn from_bytes(bytes: &[u8], registry: &CompressorRegistry) -> Result<Self> {
        decode_frame(bytes, registry)
    }
}
