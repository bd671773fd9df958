use std::any::Any;
use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{PortalError, Result};
use crate::field::StatusFlags;
use crate::visitor::{MobileObject, MobileType};

/// A shared, typed handle to a graph-capable object.
///
/// Cloning a `Mobile<T>` clones the handle, not the object: two clones are the
/// same instance as far as the serializer is concerned.
pub struct Mobile<T>(Arc<RwLock<T>>);

impl<T> Mobile<T> {
    /// Wraps `value` in a new shared instance.
    pub fn new(value: T) -> Self {
        Self(Arc::new(RwLock::new(value)))
    }

    /// Acquires a read guard.
    pub fn read(&self) -> Result<RwLockReadGuard<'_, T>> {
        self.0
            .read()
            .map_err(|_| PortalError::Internal("Object lock poisoned".into()))
    }

    /// Acquires a write guard.
    pub fn write(&self) -> Result<RwLockWriteGuard<'_, T>> {
        self.0
            .write()
            .map_err(|_| PortalError::Internal("Object lock poisoned".into()))
    }

    /// Returns true if both handles point to the same instance.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Address of the shared allocation. Stable for the lifetime of the instance.
    pub fn identity(&self) -> usize {
        Arc::as_ptr(&self.0).cast::<()>() as usize
    }
}

impl<T: MobileType> Mobile<T> {
    /// Type-erased view of this handle.
    pub fn to_node(&self) -> NodeRef {
        let object: Arc<RwLock<dyn MobileObject>> = self.0.clone();
        let any: Arc<dyn Any + Send + Sync> = self.0.clone();
        NodeRef {
            object,
            any,
            type_key: T::key().into(),
        }
    }

    /// Status of the held object, when its type tracks status.
    ///
    /// A poisoned lock still yields the last written state.
    pub fn status(&self) -> Option<StatusFlags> {
        let guard = self.0.read().unwrap_or_else(|p| p.into_inner());
        guard.status_flags()
    }
}

impl<T> Clone for Mobile<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T: Default> Default for Mobile<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for Mobile<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_read() {
            Ok(guard) => f.debug_tuple("Mobile").field(&*guard).finish(),
            Err(_) => f.write_str("Mobile(<locked>)"),
        }
    }
}

thread_local! {
    // Identities of the objects currently being embedded by value.
    static EMBEDDING: RefCell<HashSet<usize>> = RefCell::new(HashSet::new());
}

/// Marks one object as being embedded until dropped.
struct EmbedGuard(usize);

impl EmbedGuard {
    /// `None` if `identity` is already on the embedding path.
    fn enter(identity: usize) -> Option<Self> {
        EMBEDDING
            .with(|path| path.borrow_mut().insert(identity))
            .then_some(Self(identity))
    }
}

impl Drop for EmbedGuard {
    fn drop(&mut self) {
        EMBEDDING.with(|path| path.borrow_mut().remove(&self.0));
    }
}

// Opaque fields carry a snapshot of the object, not its identity. A cycle
// cannot be embedded by value and fails the encoding instead.
impl<T: Serialize> Serialize for Mobile<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let Some(_embedding) = EmbedGuard::enter(self.identity()) else {
            return Err(<S::Error as serde::ser::Error>::custom("cycle in opaque value"));
        };
        let guard = self
            .0
            .read()
            .map_err(|_| <S::Error as serde::ser::Error>::custom("object lock poisoned"))?;
        guard.serialize(serializer)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Mobile<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        T::deserialize(deserializer).map(Self::new)
    }
}

/// A type-erased handle to a graph node.
///
/// It keeps two views of the same allocation: the `MobileObject` view used by
/// the serializer and an `Any` view used to hand typed [`Mobile`] handles back.
#[derive(Clone)]
pub struct NodeRef {
    object: Arc<RwLock<dyn MobileObject>>,
    any: Arc<dyn Any + Send + Sync>,
    type_key: Arc<str>,
}

impl NodeRef {
    /// Type identity written to the wire.
    pub fn type_key(&self) -> &str {
        &self.type_key
    }

    /// Address of the shared allocation.
    pub fn identity(&self) -> usize {
        Arc::as_ptr(&self.any).cast::<()>() as usize
    }

    /// Returns true if both handles point to the same instance.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }

    /// Acquires a read guard on the erased object.
    pub fn read(&self) -> Result<RwLockReadGuard<'_, dyn MobileObject>> {
        self.object
            .read()
            .map_err(|_| PortalError::Internal(format!("Lock poisoned on {}", self.type_key)))
    }

    /// Acquires a write guard on the erased object.
    pub fn write(&self) -> Result<RwLockWriteGuard<'_, dyn MobileObject>> {
        self.object
            .write()
            .map_err(|_| PortalError::Internal(format!("Lock poisoned on {}", self.type_key)))
    }

    /// Recovers the typed handle. `None` if the node holds another type.
    pub fn downcast<T: MobileType>(&self) -> Option<Mobile<T>> {
        Arc::clone(&self.any).downcast::<RwLock<T>>().ok().map(Mobile)
    }

    /// Like [`NodeRef::downcast`], reporting a `TypeMismatch` for `field`.
    pub fn expect_type<T: MobileType>(&self, field: &str) -> Result<Mobile<T>> {
        self.downcast::<T>()
            .ok_or_else(|| PortalError::type_mismatch(field, T::key(), self.type_key()))
    }

    /// Status of the node, when its type tracks status.
    pub fn status(&self) -> Option<StatusFlags> {
        let guard = self.object.read().unwrap_or_else(|p| p.into_inner());
        guard.status_flags()
    }
}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeRef({} @ {:#x})", self.type_key, self.identity())
    }
}
