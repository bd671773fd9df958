//! The byte pipe between a dispatcher and a remote [`PortalHost`].
//!
//! No network protocol lives here. Implementors own the wire; the crate only
//! ships [`LoopbackTransport`], which feeds a host in-process.

use std::sync::Arc;

use async_trait::async_trait;

use super::host::PortalHost;
use crate::error::Result;

/// Sends a framed [`PortalRequest`](super::wire::PortalRequest) and returns the
/// framed response.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Blocking round trip.
    fn send(&self, request: Vec<u8>) -> Result<Vec<u8>>;

    /// Non-blocking round trip. Defaults to [`Transport::send`].
    async fn send_async(&self, request: Vec<u8>) -> Result<Vec<u8>> {
        self.send(request)
    }
}

/// In-process transport that runs the full byte round trip against a host.
#[derive(Debug, Clone)]
pub struct LoopbackTransport {
    host: Arc<PortalHost>,
}

impl LoopbackTransport {
    /// Connects to `host`.
    pub fn new(host: Arc<PortalHost>) -> Self {
        Self { host }
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    fn send(&self, request: Vec<u8>) -> Result<Vec<u8>> {
        Ok(self.host.handle(&request))
    }
}
