//! Per-type serialization policy and the type registry.
//!
//! Which fields are opaque and which types are graph-capable is decided at
//! build time by `#[derive(MobileObject)]`. The registry only records those
//! answers and serves them to the serializer; it discovers nothing itself.

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::error::{PortalError, Result};
use crate::graph::{Mobile, NodeRef};
use crate::visitor::MobileType;

/// Policy lookup consumed by the graph serializer.
pub trait SerializationPolicy: Send + Sync {
    /// False if `field` of `type_key` must be carried as an opaque scalar.
    fn is_serializable_field(&self, type_key: &str, field: &str) -> bool;

    /// True if instances of `type_key` take part in the child-graph protocol.
    fn is_graph_capable(&self, type_key: &str) -> bool;
}

struct TypeEntry {
    create: fn() -> NodeRef,
    opaque_fields: HashSet<&'static str>,
}

fn create_node<T: MobileType>() -> NodeRef {
    Mobile::new(T::default()).to_node()
}

/// Registry of graph-capable types.
///
/// It is both the factory used during reconstruction and the default
/// [`SerializationPolicy`].
///
/// ```rust,ignore
/// let registry = TypeRegistry::new()
///     .with::<Customer>()
///     .with::<ChildList<Contact>>()
///     .with::<Contact>();
/// ```
#[derive(Default)]
pub struct TypeRegistry {
    types: HashMap<String, TypeEntry>,
    extra_opaque: HashSet<(String, String)>,
}

impl TypeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `T`. Registering the same type twice is a no-op.
    pub fn register<T: MobileType>(&mut self) -> &mut Self {
        self.types.entry(T::key()).or_insert_with(|| TypeEntry {
            create: create_node::<T>,
            opaque_fields: T::opaque_fields().iter().copied().collect(),
        });
        self
    }

    /// Builder-style [`TypeRegistry::register`].
    pub fn with<T: MobileType>(mut self) -> Self {
        self.register::<T>();
        self
    }

    /// Marks an extra field as opaque, on top of what the type declares.
    pub fn mark_opaque(&mut self, type_key: impl Into<String>, field: impl Into<String>) {
        self.extra_opaque.insert((type_key.into(), field.into()));
    }

    /// Creates a blank instance of `type_key`.
    pub fn create(&self, type_key: &str) -> Result<NodeRef> {
        self.types
            .get(type_key)
            .map(|entry| (entry.create)())
            .ok_or_else(|| PortalError::CorruptGraph(format!("unknown type identity '{type_key}'")))
    }

    /// Returns true if `type_key` is registered.
    pub fn contains(&self, type_key: &str) -> bool {
        self.types.contains_key(type_key)
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns true if no type is registered.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl SerializationPolicy for TypeRegistry {
    fn is_serializable_field(&self, type_key: &str, field: &str) -> bool {
        let declared_opaque = self
            .types
            .get(type_key)
            .is_some_and(|entry| entry.opaque_fields.contains(field));
        let marked_opaque = self
            .extra_opaque
            .contains(&(type_key.to_string(), field.to_string()));
        !(declared_opaque || marked_opaque)
    }

    fn is_graph_capable(&self, type_key: &str) -> bool {
        self.contains(type_key)
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.types.keys().collect();
        keys.sort();
        f.debug_struct("TypeRegistry")
            .field("types", &keys)
            .field("extra_opaque", &self.extra_opaque.len())
            .finish()
    }
}
