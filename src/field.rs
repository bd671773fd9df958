//! Field containers and status delegation.
//!
//! A [`FieldData<T>`] holds one property value of a business object together
//! with the property's dirty flag. When the held value tracks its own status
//! (a child business object), every status query is answered by the child and
//! the local flag is ignored.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{PortalError, Result};
use crate::visitor_impls::FieldType;

/// Status queries answered by business objects and field containers.
pub trait TrackStatus {
    /// The object or anything below it changed.
    fn is_dirty(&self) -> bool;
    /// The object itself changed.
    fn is_self_dirty(&self) -> bool;
    /// The object has not been persisted yet.
    fn is_new(&self) -> bool;
    /// The object is marked for deletion.
    fn is_deleted(&self) -> bool;
    /// The object is owned by a parent and saved through it.
    fn is_child(&self) -> bool;
    /// The object and everything below it is valid.
    fn is_valid(&self) -> bool;
    /// The object itself is valid.
    fn is_self_valid(&self) -> bool;
    /// An asynchronous operation on the object is pending.
    fn is_busy(&self) -> bool;

    /// The object can be saved right now.
    fn is_savable(&self) -> bool {
        self.is_dirty() && self.is_valid() && !self.is_busy() && !self.is_child()
    }
}

/// A copy of every status query, taken at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct StatusFlags {
    pub is_dirty: bool,
    pub is_self_dirty: bool,
    pub is_new: bool,
    pub is_deleted: bool,
    pub is_child: bool,
    pub is_valid: bool,
    pub is_self_valid: bool,
    pub is_busy: bool,
    pub is_savable: bool,
}

impl StatusFlags {
    /// Reads every flag of `source`.
    pub fn capture(source: &dyn TrackStatus) -> Self {
        Self {
            is_dirty: source.is_dirty(),
            is_self_dirty: source.is_self_dirty(),
            is_new: source.is_new(),
            is_deleted: source.is_deleted(),
            is_child: source.is_child(),
            is_valid: source.is_valid(),
            is_self_valid: source.is_self_valid(),
            is_busy: source.is_busy(),
            is_savable: source.is_savable(),
        }
    }
}

impl TrackStatus for StatusFlags {
    fn is_dirty(&self) -> bool {
        self.is_dirty
    }
    fn is_self_dirty(&self) -> bool {
        self.is_self_dirty
    }
    fn is_new(&self) -> bool {
        self.is_new
    }
    fn is_deleted(&self) -> bool {
        self.is_deleted
    }
    fn is_child(&self) -> bool {
        self.is_child
    }
    fn is_valid(&self) -> bool {
        self.is_valid
    }
    fn is_self_valid(&self) -> bool {
        self.is_self_valid
    }
    fn is_busy(&self) -> bool {
        self.is_busy
    }
    fn is_savable(&self) -> bool {
        self.is_savable
    }
}

/// The held value, tagged with its capability when it was assigned.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum Held<T> {
    /// No value assigned yet.
    #[default]
    Empty,
    /// A value without status of its own.
    Plain(T),
    /// A value that answers status queries itself.
    Tracked(T),
}

impl<T: FieldType> Held<T> {
    fn wrap(value: T) -> Self {
        if T::is_status_capable() {
            Self::Tracked(value)
        } else {
            Self::Plain(value)
        }
    }

    /// The value, whatever its tag.
    pub fn get(&self) -> Option<&T> {
        match self {
            Self::Empty => None,
            Self::Plain(v) | Self::Tracked(v) => Some(v),
        }
    }
}

/// Container for one property value.
///
/// ```rust
/// use graphportal::{FieldData, TrackStatus};
///
/// let mut name = FieldData::<String>::new("Name", true)?;
/// assert!(!name.is_dirty());
/// name.set_value("Acme".to_string());
/// assert!(name.is_dirty());
/// name.mark_clean();
/// assert!(!name.is_dirty());
/// # Ok::<(), graphportal::PortalError>(())
/// ```
#[derive(Clone, Serialize, Deserialize)]
pub struct FieldData<T> {
    name: String,
    held: Held<T>,
    is_dirty: bool,
    is_serializable: bool,
}

impl<T> Default for FieldData<T> {
    /// A nameless placeholder, filled in when a graph is read back.
    fn default() -> Self {
        Self {
            name: String::new(),
            held: Held::Empty,
            is_dirty: false,
            is_serializable: true,
        }
    }
}

impl<T: FieldType> FieldData<T> {
    /// Creates an empty, clean container.
    ///
    /// # Errors
    /// `InvalidArgument` if `name` is empty.
    pub fn new(name: impl Into<String>, is_serializable: bool) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(PortalError::InvalidArgument(
                "field name must not be empty".into(),
            ));
        }
        Ok(Self {
            name,
            held: Held::Empty,
            is_dirty: false,
            is_serializable,
        })
    }

    /// Creates a container already holding `value`. It starts dirty.
    pub fn with_value(name: impl Into<String>, value: T, is_serializable: bool) -> Result<Self> {
        let mut field = Self::new(name, is_serializable)?;
        field.set_value(value);
        Ok(field)
    }

    /// Property name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The held value.
    pub fn value(&self) -> Option<&T> {
        self.held.get()
    }

    /// Mutable access to the held value. Does not touch the dirty flag.
    pub fn value_mut(&mut self) -> Option<&mut T> {
        match &mut self.held {
            Held::Empty => None,
            Held::Plain(v) | Held::Tracked(v) => Some(v),
        }
    }

    /// Assigns a new value. The container becomes dirty even if the value is equal.
    pub fn set_value(&mut self, value: T) {
        self.held = Held::wrap(value);
        self.is_dirty = true;
    }

    /// Returns the capability tag of the held value.
    pub fn held(&self) -> &Held<T> {
        &self.held
    }

    /// Whether the value may be walked as a child graph.
    pub fn is_serializable(&self) -> bool {
        self.is_serializable
    }

    /// Clears the local dirty flag. The held value is left alone.
    pub fn mark_clean(&mut self) {
        self.is_dirty = false;
    }

    /// The local flag, whatever the held value reports.
    pub fn local_dirty(&self) -> bool {
        self.is_dirty
    }

    pub(crate) fn restore(name: String, value: Option<T>, is_dirty: bool, is_serializable: bool) -> Self {
        Self {
            name,
            held: value.map_or(Held::Empty, Held::wrap),
            is_dirty,
            is_serializable,
        }
    }

    fn delegate(&self) -> Option<StatusFlags> {
        match &self.held {
            Held::Tracked(value) => value.status(),
            _ => None,
        }
    }
}

impl<T: FieldType> TrackStatus for FieldData<T> {
    fn is_dirty(&self) -> bool {
        self.delegate().map_or(self.is_dirty, |s| s.is_dirty)
    }

    fn is_self_dirty(&self) -> bool {
        self.delegate().map_or(self.is_dirty, |s| s.is_self_dirty)
    }

    fn is_new(&self) -> bool {
        self.delegate().is_some_and(|s| s.is_new)
    }

    fn is_deleted(&self) -> bool {
        self.delegate().is_some_and(|s| s.is_deleted)
    }

    fn is_child(&self) -> bool {
        self.delegate().is_some_and(|s| s.is_child)
    }

    fn is_valid(&self) -> bool {
        self.delegate().is_none_or(|s| s.is_valid)
    }

    fn is_self_valid(&self) -> bool {
        self.delegate().is_none_or(|s| s.is_self_valid)
    }

    fn is_busy(&self) -> bool {
        self.delegate().is_some_and(|s| s.is_busy)
    }

    fn is_savable(&self) -> bool {
        true
    }
}

impl<T: fmt::Debug> fmt::Debug for FieldData<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldData")
            .field("name", &self.name)
            .field("value", &self.held)
            .field("is_dirty", &self.is_dirty)
            .field("is_serializable", &self.is_serializable)
            .finish()
    }
}
