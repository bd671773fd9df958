#![allow(missing_docs)]

mod common;

use common::{Contact, Customer, acme, add_contact, contact, contacts_of, customer, formatter, name_of};
use graphportal::{
    ChildList, GraphFormatter, Mobile, PortalError, ReferenceId, SerializedPayload, TrackStatus,
    TypeRegistry,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Default, Serialize, Deserialize, graphportal::MobileObject)]
#[mobile(type_key = "tests::Link")]
struct Link {
    index: u32,
    next: Option<Mobile<Link>>,
}

fn root_record(payload: &SerializedPayload) -> graphportal::Result<&graphportal::SerializedRecord> {
    payload
        .record(payload.root)
        .ok_or_else(|| PortalError::Internal("payload has no root record".into()))
}

// --- TESTS ---

/// A root with a name, an opaque balance and two distinct children survives a round trip.
#[test]
fn roundtrip_preserves_values_and_children() -> graphportal::Result<()> {
    let original = acme()?;
    let copy = formatter().clone_graph(&original)?;

    assert!(!copy.ptr_eq(&original));
    let guard = copy.read()?;
    assert_eq!(guard.name.value().map(String::as_str), Some("Acme"));
    assert_eq!(guard.balance, 42.5);
    drop(guard);

    let list = contacts_of(&copy)?;
    let list = list.read()?;
    assert_eq!(list.len(), 2);
    let (first, second) = match (list.get(0), list.get(1)) {
        (Some(a), Some(b)) => (a.clone(), b.clone()),
        _ => return Err(PortalError::Internal("missing contacts".into())),
    };
    assert!(!first.ptr_eq(&second));
    assert_eq!(name_of(&first)?, "Ann");
    assert_eq!(name_of(&second)?, "Bob");
    Ok(())
}

/// One instance reachable through two paths comes back as one instance.
#[test]
fn shared_instance_stays_shared() -> graphportal::Result<()> {
    let root = customer("Acme", 1.0)?;
    let ann = contact("Ann")?;
    add_contact(&root, &ann)?;
    add_contact(&root, &contact("Bob")?)?;
    add_contact(&root, &ann)?;

    let payload = formatter().serialize(&root.to_node())?;
    // Customer, list, Ann, Bob.
    assert_eq!(payload.records.len(), 4);

    let copy = formatter().deserialize_as::<Customer>(&payload)?;
    let list = contacts_of(&copy)?;
    let list = list.read()?;
    let items: Vec<Mobile<Contact>> = list.iter().cloned().collect();
    assert_eq!(items.len(), 3);
    assert!(items[0].ptr_eq(&items[2]));
    assert!(!items[0].ptr_eq(&items[1]));
    assert!(!items[0].ptr_eq(&ann));
    Ok(())
}

/// A child pointing back at its owner serializes and closes the cycle on the way back.
#[test]
fn cycle_is_closed_after_roundtrip() -> graphportal::Result<()> {
    let root = customer("Acme", 1.0)?;
    let ann = contact("Ann")?;
    ann.write()?.owner = Some(root.clone());
    add_contact(&root, &ann)?;

    let payload = formatter().serialize(&root.to_node())?;
    assert_eq!(payload.records.len(), 3);

    let copy = formatter().deserialize_as::<Customer>(&payload)?;
    let list = contacts_of(&copy)?;
    let first = list.read()?.get(0).cloned();
    let Some(first) = first else {
        return Err(PortalError::Internal("missing contact".into()));
    };
    let owner = first.read()?.owner.clone();
    assert!(owner.is_some_and(|o| o.ptr_eq(&copy)));
    Ok(())
}

/// A node behind an opaque field is embedded by value and never shares identity.
#[test]
fn opaque_field_is_isolated() -> graphportal::Result<()> {
    let root = customer("Acme", 1.0)?;
    let ann = contact("Ann")?;
    add_contact(&root, &ann)?;
    root.write()?.primary = Some(ann.clone());

    let payload = formatter().serialize(&root.to_node())?;
    let record = root_record(&payload)?;
    assert!(record.child("primary").is_none());
    assert!(record.value("primary").is_some());

    let copy = formatter().deserialize_as::<Customer>(&payload)?;
    let primary = copy.read()?.primary.clone();
    let Some(primary) = primary else {
        return Err(PortalError::Internal("primary lost".into()));
    };
    let walked = contacts_of(&copy)?.read()?.get(0).cloned();
    assert!(walked.is_some_and(|w| !w.ptr_eq(&primary)));
    assert_eq!(name_of(&primary)?, "Ann");
    Ok(())
}

/// Fields marked opaque on the registry are not walked either.
#[test]
fn registry_can_mark_fields_opaque() -> graphportal::Result<()> {
    let mut registry = TypeRegistry::new()
        .with::<Customer>()
        .with::<Contact>()
        .with::<ChildList<Contact>>();
    registry.mark_opaque("tests::Customer", "contacts");
    let formatter = GraphFormatter::new(Arc::new(registry));

    let payload = formatter.serialize(&acme()?.to_node())?;
    assert_eq!(payload.records.len(), 1);
    assert!(root_record(&payload)?.child("contacts").is_none());
    Ok(())
}

/// Dirty flags of field containers travel with the graph.
#[test]
fn dirty_flags_survive_roundtrip() -> graphportal::Result<()> {
    let root = acme()?;
    {
        let mut guard = root.write()?;
        guard.name.mark_clean();
        guard.contacts.mark_clean();
    }
    let list = contacts_of(&root)?;
    for item in list.read()?.iter() {
        item.write()?.name.mark_clean();
    }
    let first = list.read()?.get(0).cloned();
    if let Some(first) = first {
        first.write()?.name.set_value("Anne".to_string());
    }

    let copy = formatter().clone_graph(&root)?;
    let guard = copy.read()?;
    assert!(!guard.name.local_dirty());
    assert!(!guard.is_self_dirty());
    assert!(guard.contacts.is_dirty());
    assert!(guard.is_dirty());
    Ok(())
}

/// A child slot naming a record that does not exist is rejected.
#[test]
fn dangling_child_is_corrupt() -> graphportal::Result<()> {
    let mut payload = formatter().serialize(&acme()?.to_node())?;
    let root_id = payload.root;
    let Some(root) = payload.records.iter_mut().find(|r| r.reference_id() == root_id) else {
        return Err(PortalError::Internal("no root".into()));
    };
    root.add_child("contacts", ReferenceId::new(7), false);

    let result = formatter().deserialize(&payload);
    assert!(matches!(result, Err(PortalError::CorruptGraph(_))));
    Ok(())
}

/// An unknown type key cannot be materialized.
#[test]
fn unknown_type_is_corrupt() -> graphportal::Result<()> {
    let payload = formatter().serialize(&acme()?.to_node())?;
    let registry = Arc::new(TypeRegistry::new().with::<Customer>());
    let result = GraphFormatter::new(registry).deserialize(&payload);
    assert!(matches!(result, Err(PortalError::CorruptGraph(_))));
    Ok(())
}

/// A child slot pointing at a record of the wrong type is a type mismatch.
#[test]
fn wrong_child_type_is_mismatch() -> graphportal::Result<()> {
    let mut payload = formatter().serialize(&acme()?.to_node())?;
    let contact_id = payload
        .records
        .iter()
        .find(|r| r.type_key() == "tests::Contact")
        .map(|r| r.reference_id())
        .ok_or_else(|| PortalError::Internal("no contact record".into()))?;
    let root_id = payload.root;
    if let Some(root) = payload.records.iter_mut().find(|r| r.reference_id() == root_id) {
        root.add_child("contacts", contact_id, false);
    }

    let result = formatter().deserialize(&payload);
    assert!(matches!(result, Err(PortalError::TypeMismatch { .. })));
    Ok(())
}

/// Serializing a root of an unregistered type is an argument error.
#[test]
fn unregistered_root_is_rejected() -> graphportal::Result<()> {
    let formatter = GraphFormatter::new(Arc::new(TypeRegistry::new()));
    let result = formatter.serialize(&acme()?.to_node());
    assert!(matches!(result, Err(PortalError::Argument(_))));
    Ok(())
}

/// Framed bytes round trip, and a flipped byte is caught by the checksum.
#[test]
fn framed_bytes_roundtrip() -> graphportal::Result<()> {
    let formatter = formatter();
    let mut bytes = formatter.to_bytes(&acme()?.to_node())?;
    let copy = formatter.from_bytes_as::<Customer>(&bytes)?;
    assert_eq!(copy.read()?.balance, 42.5);

    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;
    assert!(formatter.from_bytes(&bytes).is_err());
    Ok(())
}

/// Each deserialization pass builds its own instances.
#[test]
fn passes_do_not_share_instances() -> graphportal::Result<()> {
    let formatter = formatter();
    let payload = formatter.serialize(&acme()?.to_node())?;
    let a = formatter.deserialize(&payload)?;
    let b = formatter.deserialize(&payload)?;
    assert!(!a.ptr_eq(&b));
    assert_eq!(a.type_key(), "tests::Customer");
    Ok(())
}

/// `deserialize_as` checks the root type.
#[test]
fn deserialize_as_checks_root_type() -> graphportal::Result<()> {
    let payload = formatter().serialize(&acme()?.to_node())?;
    let result = formatter().deserialize_as::<Contact>(&payload);
    assert!(matches!(result, Err(PortalError::TypeMismatch { .. })));
    Ok(())
}

/// A cycle reached through an opaque field fails the pass instead of recursing forever.
#[test]
fn opaque_cycle_is_serialization_error() -> graphportal::Result<()> {
    let root = customer("Acme", 1.0)?;
    let ann = contact("Ann")?;
    ann.write()?.owner = Some(root.clone());
    root.write()?.primary = Some(ann.clone());

    let result = formatter().serialize(&root.to_node());
    assert!(matches!(result, Err(PortalError::Serialization(_))));

    // The failed pass leaves nothing behind; the same value embeds once the cycle is gone.
    ann.write()?.owner = None;
    let copy = formatter().clone_graph(&root)?;
    let primary = copy.read()?.primary.clone();
    assert!(primary.is_some_and(|p| !p.ptr_eq(&ann)));
    Ok(())
}

/// One instance embedded twice by value (no cycle) is not mistaken for a cycle.
#[test]
fn opaque_shared_value_embeds_twice() -> graphportal::Result<()> {
    let list = Mobile::new(ChildList::<Contact>::new());
    let ann = contact("Ann")?;
    list.write()?.push(ann.clone());
    list.write()?.push(ann);
    let blob = graphportal::WireValue::opaque(&list)?;
    let copy: Mobile<ChildList<Contact>> = blob.decode_opaque("contacts")?;
    assert_eq!(copy.read()?.len(), 2);
    Ok(())
}

/// A long acyclic chain round trips in order.
#[test]
fn deep_chain_roundtrip() -> graphportal::Result<()> {
    let registry = Arc::new(TypeRegistry::new().with::<Link>());
    let formatter = GraphFormatter::new(registry);

    let mut head = Mobile::new(Link { index: 0, next: None });
    for index in 1..256 {
        head = Mobile::new(Link {
            index,
            next: Some(head),
        });
    }

    let copy = formatter.clone_graph(&head)?;
    let mut seen = Vec::new();
    let mut cursor = Some(copy);
    while let Some(link) = cursor {
        let guard = link.read()?;
        seen.push(guard.index);
        cursor = guard.next.clone();
    }
    assert_eq!(seen.len(), 256);
    assert_eq!(seen.first(), Some(&255));
    assert_eq!(seen.last(), Some(&0));
    Ok(())
}
