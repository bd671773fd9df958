#![allow(missing_docs)]

mod common;

use common::{Contact, contact};
use graphportal::{FieldData, Held, Mobile, PortalError, StatusFlags, TrackStatus};

// --- TESTS ---

/// A container needs a name.
#[test]
fn empty_name_is_invalid_argument() {
    let result = FieldData::<String>::new("", true);
    assert!(matches!(result, Err(PortalError::InvalidArgument(_))));
}

/// Assigning marks the container dirty, even when the value is unchanged.
#[test]
fn set_value_always_marks_dirty() -> graphportal::Result<()> {
    let mut name = FieldData::with_value("Name", "Acme".to_string(), true)?;
    assert!(name.is_dirty());
    name.mark_clean();
    assert!(!name.is_dirty());

    name.set_value("Acme".to_string());
    assert!(name.is_dirty());
    assert_eq!(name.name(), "Name");
    Ok(())
}

/// Scalars are held plainly and answer status with defaults.
#[test]
fn plain_value_uses_local_flags() -> graphportal::Result<()> {
    let field = FieldData::with_value("Count", 3i32, true)?;
    assert!(matches!(field.held(), Held::Plain(3)));
    assert!(!field.is_new());
    assert!(!field.is_child());
    assert!(!field.is_busy());
    assert!(field.is_valid());
    assert!(field.is_savable());
    Ok(())
}

/// A tracked child answers for the container, whatever the local flag says.
#[test]
fn tracked_value_delegates_status() -> graphportal::Result<()> {
    let ann = contact("Ann")?;
    ann.write()?.name.mark_clean();

    let mut field = FieldData::<Mobile<Contact>>::new("Primary", true)?;
    field.set_value(ann.clone());
    assert!(matches!(field.held(), Held::Tracked(_)));
    assert!(field.local_dirty());
    assert!(!field.is_dirty());
    assert!(field.is_child());

    ann.write()?.name.set_value("Anne".to_string());
    field.mark_clean();
    assert!(field.is_dirty());
    assert!(field.is_self_dirty());
    Ok(())
}

/// Savable is always true for a container, even when the child is not.
#[test]
fn container_is_always_savable() -> graphportal::Result<()> {
    let field = FieldData::with_value("Primary", contact("Ann")?, true)?;
    assert!(field.is_savable());
    Ok(())
}

/// A value-level edit does not touch the flag.
#[test]
fn value_mut_leaves_flag_alone() -> graphportal::Result<()> {
    let mut field = FieldData::with_value("Total", 1.5f64, false)?;
    field.mark_clean();
    if let Some(total) = field.value_mut() {
        *total += 1.0;
    }
    assert_eq!(field.value(), Some(&2.5));
    assert!(!field.is_dirty());
    assert!(!field.is_serializable());
    Ok(())
}

struct Draft {
    busy: bool,
}

impl TrackStatus for Draft {
    fn is_dirty(&self) -> bool {
        true
    }
    fn is_self_dirty(&self) -> bool {
        true
    }
    fn is_new(&self) -> bool {
        true
    }
    fn is_deleted(&self) -> bool {
        false
    }
    fn is_child(&self) -> bool {
        false
    }
    fn is_valid(&self) -> bool {
        true
    }
    fn is_self_valid(&self) -> bool {
        true
    }
    fn is_busy(&self) -> bool {
        self.busy
    }
}

/// The default savable rule: dirty, valid, idle and not a child.
#[test]
fn default_savable_rule() {
    assert!(Draft { busy: false }.is_savable());
    assert!(!Draft { busy: true }.is_savable());

    let captured = StatusFlags::capture(&Draft { busy: true });
    assert!(captured.is_busy);
    assert!(!captured.is_savable);
    assert!(captured.is_new);
}
