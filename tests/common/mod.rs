#![allow(dead_code)]

//! Business types shared by the integration tests.

use std::sync::Arc;

use graphportal::{
    ChildList, FieldData, GraphFormatter, LoadManager, Mobile, MobileObject, TrackStatus,
    TypeRegistry,
};
use serde::{Deserialize, Serialize};

#[derive(Default, Serialize, Deserialize, MobileObject)]
#[mobile(type_key = "tests::Customer", track_status)]
pub struct Customer {
    pub name: FieldData<String>,
    #[mobile(opaque)]
    pub balance: f64,
    pub contacts: FieldData<Mobile<ChildList<Contact>>>,
    #[mobile(opaque)]
    pub primary: Option<Mobile<Contact>>,
    pub is_new: bool,
    #[mobile(skip)]
    #[serde(skip)]
    pub loads: LoadManager,
}

impl TrackStatus for Customer {
    fn is_dirty(&self) -> bool {
        self.is_self_dirty() || self.contacts.is_dirty()
    }
    fn is_self_dirty(&self) -> bool {
        self.name.is_dirty()
    }
    fn is_new(&self) -> bool {
        self.is_new
    }
    fn is_deleted(&self) -> bool {
        false
    }
    fn is_child(&self) -> bool {
        false
    }
    fn is_valid(&self) -> bool {
        self.is_self_valid() && self.contacts.is_valid()
    }
    fn is_self_valid(&self) -> bool {
        self.name.value().is_some_and(|n| !n.is_empty())
    }
    fn is_busy(&self) -> bool {
        self.loads.is_loading()
    }
}

#[derive(Default, Serialize, Deserialize, MobileObject)]
#[mobile(type_key = "tests::Contact", track_status)]
pub struct Contact {
    pub name: FieldData<String>,
    pub owner: Option<Mobile<Customer>>,
}

impl TrackStatus for Contact {
    fn is_dirty(&self) -> bool {
        self.name.is_dirty()
    }
    fn is_self_dirty(&self) -> bool {
        self.name.is_dirty()
    }
    fn is_new(&self) -> bool {
        false
    }
    fn is_deleted(&self) -> bool {
        false
    }
    fn is_child(&self) -> bool {
        true
    }
    fn is_valid(&self) -> bool {
        true
    }
    fn is_self_valid(&self) -> bool {
        true
    }
    fn is_busy(&self) -> bool {
        false
    }
}

pub fn contact(name: &str) -> graphportal::Result<Mobile<Contact>> {
    Ok(Mobile::new(Contact {
        name: FieldData::with_value("Name", name.to_string(), true)?,
        owner: None,
    }))
}

pub fn customer_value(name: &str, balance: f64) -> graphportal::Result<Customer> {
    let contacts = Mobile::new(ChildList::<Contact>::new());
    Ok(Customer {
        name: FieldData::with_value("Name", name.to_string(), true)?,
        balance,
        contacts: FieldData::with_value("Contacts", contacts, true)?,
        primary: None,
        is_new: false,
        loads: LoadManager::new(),
    })
}

/// A customer with an empty contact list.
pub fn customer(name: &str, balance: f64) -> graphportal::Result<Mobile<Customer>> {
    customer_value(name, balance).map(Mobile::new)
}

/// "Acme" with balance 42.5 and two distinct contacts.
pub fn acme() -> graphportal::Result<Mobile<Customer>> {
    let root = customer("Acme", 42.5)?;
    add_contact(&root, &contact("Ann")?)?;
    add_contact(&root, &contact("Bob")?)?;
    Ok(root)
}

pub fn add_contact(root: &Mobile<Customer>, item: &Mobile<Contact>) -> graphportal::Result<()> {
    let guard = root.read()?;
    if let Some(list) = guard.contacts.value() {
        list.write()?.push(item.clone());
    }
    Ok(())
}

pub fn contacts_of(root: &Mobile<Customer>) -> graphportal::Result<Mobile<ChildList<Contact>>> {
    root.read()?
        .contacts
        .value()
        .cloned()
        .ok_or_else(|| graphportal::PortalError::Internal("customer has no contact list".into()))
}

pub fn name_of(contact: &Mobile<Contact>) -> graphportal::Result<String> {
    Ok(contact.read()?.name.value().cloned().unwrap_or_default())
}

pub fn registry() -> Arc<TypeRegistry> {
    Arc::new(
        TypeRegistry::new()
            .with::<Customer>()
            .with::<Contact>()
            .with::<ChildList<Contact>>(),
    )
}

pub fn formatter() -> GraphFormatter {
    GraphFormatter::new(registry())
}
