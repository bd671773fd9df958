//! Pluggable compression backend for framed payloads.
//!
//! The compressor id is stored in the frame header, so a receiver can pick the
//! right algorithm without out-of-band configuration.

use std::borrow::Cow;
use std::collections::BTreeMap;

use crate::error::{PortalError, Result};

/// Interface for compression algorithms.
pub trait Compressor: Send + Sync + std::fmt::Debug {
    /// Id written to the frame header. 0 is reserved for [`NoCompression`].
    fn id(&self) -> u8;

    /// Short name shown by the payload inspector.
    fn name(&self) -> &'static str;

    /// Compresses a frame body. May hand the input back unchanged.
    fn compress<'a>(&self, data: &'a [u8]) -> Result<Cow<'a, [u8]>>;

    /// Reverses [`Compressor::compress`].
    fn decompress<'a>(&self, data: &'a [u8]) -> Result<Cow<'a, [u8]>>;
}

// --- BUILT-IN ALGORITHMS ---

/// Pass-through, ID 0. The default for portal envelopes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCompression;

impl Compressor for NoCompression {
    fn id(&self) -> u8 {
        0
    }

    fn name(&self) -> &'static str {
        "None"
    }

    fn compress<'a>(&self, data: &'a [u8]) -> Result<Cow<'a, [u8]>> {
        Ok(Cow::Borrowed(data))
    }

    fn decompress<'a>(&self, data: &'a [u8]) -> Result<Cow<'a, [u8]>> {
        Ok(Cow::Borrowed(data))
    }
}

/// LZ4 block compression with a size prefix, ID 1.
#[cfg(feature = "lz4_flex")]
#[derive(Debug, Clone, Copy, Default)]
pub struct Lz4Compressor;

#[cfg(feature = "lz4_flex")]
impl Compressor for Lz4Compressor {
    fn id(&self) -> u8 {
        1
    }

    fn name(&self) -> &'static str {
        "LZ4"
    }

    fn compress<'a>(&self, data: &'a [u8]) -> Result<Cow<'a, [u8]>> {
        Ok(Cow::Owned(lz4_flex::compress_prepend_size(data)))
    }

    fn decompress<'a>(&self, data: &'a [u8]) -> Result<Cow<'a, [u8]>> {
        lz4_flex::decompress_size_prepended(data)
            .map(Cow::Owned)
            .map_err(|e| PortalError::Compression(format!("lz4: {e}")))
    }
}

// --- REGISTRY ---

/// Maps the ids found in frame headers to `Compressor` implementations.
///
/// Both ends of a portal must agree on the set; an id the receiver lacks
/// fails the frame with `PortalError::Compression`.
#[derive(Debug)]
pub struct CompressorRegistry {
    algorithms: BTreeMap<u8, Box<dyn Compressor>>,
}

impl CompressorRegistry {
    /// Creates a registry holding the built-in algorithms.
    ///
    /// *   ID 0: `NoCompression`
    /// *   ID 1: `Lz4Compressor` (if `lz4_flex` feature is enabled)
    pub fn new() -> Self {
        let mut reg = Self {
            algorithms: BTreeMap::new(),
        };
        reg.register(Box::new(NoCompression));
        #[cfg(feature = "lz4_flex")]
        reg.register(Box::new(Lz4Compressor));
        reg
    }

    /// Registers a compressor, replacing any previous one with the same ID.
    pub fn register(&mut self, algo: Box<dyn Compressor>) {
        self.algorithms.insert(algo.id(), algo);
    }

    /// Retrieves a compressor by its ID.
    ///
    /// # Errors
    /// Returns `PortalError::Compression` if the ID is not registered.
    pub fn get(&self, id: u8) -> Result<&dyn Compressor> {
        self.algorithms
            .get(&id)
            .map(|algo| &**algo)
            .ok_or_else(|| PortalError::Compression(format!("algorithm id {id} is not registered")))
    }

    /// Display name for `id`, also for ids this registry does not know.
    pub fn describe(&self, id: u8) -> String {
        self.get(id)
            .map_or_else(|_| format!("Unknown({id})"), |algo| algo.name().to_string())
    }
}

impl Default for CompressorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
