//! The application context that travels with every request.
//!
//! There is no ambient global: callers own a [`ContextHandle`] and the
//! dispatcher snapshots it by value when a request starts. Changes made after
//! that point do not affect the request.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

/// The identity a request runs as.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    name: String,
    roles: BTreeSet<String>,
    authenticated: bool,
}

impl Principal {
    /// Unauthenticated principal with no roles.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Authenticated principal holding `roles`.
    pub fn authenticated<I, R>(name: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<String>,
    {
        Self {
            name: name.into(),
            roles: roles.into_iter().map(Into::into).collect(),
            authenticated: true,
        }
    }

    /// User name. Empty for anonymous principals.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true if the principal was authenticated.
    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Returns true if the principal holds `role`.
    pub fn is_in_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// Roles held by the principal.
    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.roles.iter().map(String::as_str)
    }
}

/// Which side of the portal code is logically running on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LogicalLocation {
    /// Caller side.
    #[default]
    Client,
    /// Inside data access code.
    Server,
}

/// Values that flow from the caller to data access code.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicationContext {
    principal: Principal,
    client_context: BTreeMap<String, String>,
    culture: Option<String>,
    location: LogicalLocation,
}

impl ApplicationContext {
    /// Empty context with an anonymous principal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the principal.
    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.principal = principal;
        self
    }

    /// Sets the culture name, e.g. `"en-US"`.
    pub fn with_culture(mut self, culture: impl Into<String>) -> Self {
        self.culture = Some(culture.into());
        self
    }

    /// Adds a client context entry.
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.client_context.insert(key.into(), value.into());
        self
    }

    /// The current principal.
    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    /// Replaces the principal.
    pub fn set_principal(&mut self, principal: Principal) {
        self.principal = principal;
    }

    /// Client context entry for `key`.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.client_context.get(key).map(String::as_str)
    }

    /// Sets a client context entry.
    pub fn set_value(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.client_context.insert(key.into(), value.into());
    }

    /// Culture name, if one was set.
    pub fn culture(&self) -> Option<&str> {
        self.culture.as_deref()
    }

    /// Logical execution location.
    pub fn location(&self) -> LogicalLocation {
        self.location
    }

    pub(crate) fn enter_server(&mut self) {
        self.location = LogicalLocation::Server;
    }
}

/// Shared, process-wide handle to the current [`ApplicationContext`].
#[derive(Debug, Clone, Default)]
pub struct ContextHandle(Arc<RwLock<ApplicationContext>>);

impl ContextHandle {
    /// Creates a handle holding `context`.
    pub fn new(context: ApplicationContext) -> Self {
        Self(Arc::new(RwLock::new(context)))
    }

    /// Copy of the current context.
    pub fn snapshot(&self) -> ApplicationContext {
        self.0.read().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// Replaces the whole context.
    pub fn replace(&self, context: ApplicationContext) {
        *self.0.write().unwrap_or_else(|p| p.into_inner()) = context;
    }

    /// Edits the context in place.
    pub fn update(&self, edit: impl FnOnce(&mut ApplicationContext)) {
        edit(&mut self.0.write().unwrap_or_else(|p| p.into_inner()));
    }
}
