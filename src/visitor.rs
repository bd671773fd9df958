//! Defines the graph-capability protocol.
//!
//! A type takes part in graph serialization by implementing [`MobileObject`]
//! (object-safe, used through `NodeRef`) and [`MobileType`] (static facts used
//! by the type registry). `#[derive(MobileObject)]` implements both.

use crate::error::Result;
use crate::field::StatusFlags;
use crate::format::SerializedRecord;
use crate::reader::GraphReader;
use crate::writer::GraphWriter;

/// An object that can contribute and consume its own state and child references.
///
/// This is distinct from `serde::Serialize`. Instead of writing bytes, an object
/// writes scalars and child slots into its [`SerializedRecord`]; the
/// [`GraphWriter`] takes care of identity and cycles.
pub trait MobileObject: Send + Sync + 'static {
    /// Type identity written to the wire. Must equal [`MobileType::key`].
    fn type_key(&self) -> String;

    /// Writes scalar state.
    fn get_state(&self, record: &mut SerializedRecord) -> Result<()>;

    /// Writes child references. Children are serialized through `writer`.
    fn get_children(&self, record: &mut SerializedRecord, writer: &mut GraphWriter<'_>)
    -> Result<()>;

    /// Restores scalar state. Runs before any `set_children` of the pass.
    fn set_state(&mut self, record: &SerializedRecord) -> Result<()>;

    /// Restores child links. Every node of the payload already exists.
    fn set_children(&mut self, record: &SerializedRecord, reader: &GraphReader<'_>) -> Result<()>;

    /// Status flags, for types that track status. `None` otherwise.
    fn status_flags(&self) -> Option<StatusFlags> {
        None
    }
}

/// Static facts about a graph-capable type.
pub trait MobileType: MobileObject + Default + Sized {
    /// True if `status_flags` returns `Some` for every instance.
    ///
    /// Field containers read this instead of probing the value.
    const TRACKS_STATUS: bool = false;

    /// Type identity used on the wire and in the registry.
    fn key() -> String;

    /// Fields declared opaque: carried as scalars, never walked.
    fn opaque_fields() -> &'static [&'static str] {
        &[]
    }
}
