//! How individual field types travel inside a record.
//!
//! Scalars map to a [`WireValue`] variant. `Mobile<T>` is a graph node: it is
//! walked as a child when policy allows it and embedded as an opaque blob
//! otherwise.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{PortalError, Result};
use crate::field::StatusFlags;
use crate::format::WireValue;
use crate::graph::{Mobile, NodeRef};
use crate::visitor::MobileType;

/// A type that can be stored in a business-object field.
pub trait FieldType: Sized + Send + Sync + 'static {
    /// Scalar form of the value.
    fn to_wire(&self) -> Result<WireValue>;

    /// Rebuilds the value from its scalar form.
    fn from_wire(value: &WireValue, field: &str) -> Result<Self>;

    /// Graph node behind the value, for values that are graph nodes.
    fn as_node(&self) -> Option<NodeRef> {
        None
    }

    /// Rebuilds the value from a reconstructed graph node.
    fn from_node(node: &NodeRef, field: &str) -> Result<Self> {
        Err(PortalError::type_mismatch(
            field,
            std::any::type_name::<Self>(),
            node.type_key(),
        ))
    }

    /// True if values of this type answer status queries themselves.
    fn is_status_capable() -> bool {
        false
    }

    /// Current status, for status-capable values.
    fn status(&self) -> Option<StatusFlags> {
        None
    }
}

fn mismatch<T>(field: &str, found: &WireValue) -> PortalError {
    PortalError::type_mismatch(field, std::any::type_name::<T>(), found.kind_name())
}

// --- Primitives ---

macro_rules! impl_field_int {
    ($variant:ident, $wide:ty; $($t:ty),*) => {
        $(
            impl FieldType for $t {
                fn to_wire(&self) -> Result<WireValue> {
                    <$wide>::try_from(*self)
                        .map(WireValue::$variant)
                        .map_err(|e| PortalError::Serialization(e.to_string()))
                }

                fn from_wire(value: &WireValue, field: &str) -> Result<Self> {
                    match value {
                        WireValue::$variant(v) => <$t>::try_from(*v)
                            .map_err(|_| PortalError::type_mismatch(field, stringify!($t), v.to_string())),
                        other => Err(mismatch::<$t>(field, other)),
                    }
                }
            }
        )*
    };
}

impl_field_int!(Int, i64; i8, i16, i32, i64, isize);
impl_field_int!(UInt, u64; u8, u16, u32, u64, usize);

impl FieldType for f64 {
    fn to_wire(&self) -> Result<WireValue> {
        Ok(WireValue::Float(*self))
    }

    fn from_wire(value: &WireValue, field: &str) -> Result<Self> {
        match value {
            WireValue::Float(v) => Ok(*v),
            other => Err(mismatch::<f64>(field, other)),
        }
    }
}

impl FieldType for f32 {
    fn to_wire(&self) -> Result<WireValue> {
        Ok(WireValue::Float(f64::from(*self)))
    }

    #[allow(clippy::cast_possible_truncation)]
    fn from_wire(value: &WireValue, field: &str) -> Result<Self> {
        match value {
            WireValue::Float(v) => Ok(*v as f32),
            other => Err(mismatch::<f32>(field, other)),
        }
    }
}

impl FieldType for bool {
    fn to_wire(&self) -> Result<WireValue> {
        Ok(WireValue::Bool(*self))
    }

    fn from_wire(value: &WireValue, field: &str) -> Result<Self> {
        match value {
            WireValue::Bool(v) => Ok(*v),
            other => Err(mismatch::<bool>(field, other)),
        }
    }
}

impl FieldType for String {
    fn to_wire(&self) -> Result<WireValue> {
        Ok(WireValue::Text(self.clone()))
    }

    fn from_wire(value: &WireValue, field: &str) -> Result<Self> {
        match value {
            WireValue::Text(v) => Ok(v.clone()),
            other => Err(mismatch::<String>(field, other)),
        }
    }
}

// --- Containers ---

impl<T: FieldType> FieldType for Option<T> {
    fn to_wire(&self) -> Result<WireValue> {
        match self {
            Some(v) => v.to_wire(),
            None => Ok(WireValue::Null),
        }
    }

    fn from_wire(value: &WireValue, field: &str) -> Result<Self> {
        match value {
            WireValue::Null => Ok(None),
            other => T::from_wire(other, field).map(Some),
        }
    }

    fn as_node(&self) -> Option<NodeRef> {
        self.as_ref().and_then(FieldType::as_node)
    }

    fn from_node(node: &NodeRef, field: &str) -> Result<Self> {
        T::from_node(node, field).map(Some)
    }

    fn is_status_capable() -> bool {
        T::is_status_capable()
    }

    fn status(&self) -> Option<StatusFlags> {
        self.as_ref().and_then(FieldType::status)
    }
}

// Lists of scalars. Elements are never walked; use `ChildList` for children.
impl<T: FieldType> FieldType for Vec<T> {
    fn to_wire(&self) -> Result<WireValue> {
        self.iter()
            .map(FieldType::to_wire)
            .collect::<Result<Vec<_>>>()
            .map(WireValue::List)
    }

    fn from_wire(value: &WireValue, field: &str) -> Result<Self> {
        match value {
            WireValue::List(items) => items.iter().map(|v| T::from_wire(v, field)).collect(),
            other => Err(mismatch::<Vec<T>>(field, other)),
        }
    }
}

// --- Graph nodes ---

impl<T> FieldType for Mobile<T>
where
    T: MobileType + Serialize + DeserializeOwned,
{
    fn to_wire(&self) -> Result<WireValue> {
        WireValue::opaque(self)
    }

    fn from_wire(value: &WireValue, field: &str) -> Result<Self> {
        value.decode_opaque(field)
    }

    fn as_node(&self) -> Option<NodeRef> {
        Some(self.to_node())
    }

    fn from_node(node: &NodeRef, field: &str) -> Result<Self> {
        node.expect_type::<T>(field)
    }

    fn is_status_capable() -> bool {
        T::TRACKS_STATUS
    }

    fn status(&self) -> Option<StatusFlags> {
        Mobile::status(self)
    }
}
