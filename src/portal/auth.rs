//! Authorization gate consulted before any work is done.

use std::collections::HashMap;

use super::context::Principal;
use super::operation::OperationKind;
use crate::visitor::MobileType;

/// Decides whether `principal` may run `operation` on `type_key`.
pub trait Authorizer: Send + Sync {
    /// Returns false to deny.
    fn is_authorized(&self, operation: OperationKind, type_key: &str, principal: &Principal) -> bool;
}

impl<F> Authorizer for F
where
    F: Fn(OperationKind, &str, &Principal) -> bool + Send + Sync,
{
    fn is_authorized(&self, operation: OperationKind, type_key: &str, principal: &Principal) -> bool {
        self(operation, type_key, principal)
    }
}

/// Allows everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn is_authorized(&self, _: OperationKind, _: &str, _: &Principal) -> bool {
        true
    }
}

/// A per-type, per-operation role check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleRule {
    /// Allowed if the principal holds at least one of the roles.
    IsInRole(Vec<String>),
    /// Allowed if the principal holds none of the roles.
    IsNotInRole(Vec<String>),
}

impl RoleRule {
    /// Evaluates the rule.
    pub fn allows(&self, principal: &Principal) -> bool {
        match self {
            Self::IsInRole(roles) => roles.iter().any(|r| principal.is_in_role(r)),
            Self::IsNotInRole(roles) => !roles.iter().any(|r| principal.is_in_role(r)),
        }
    }
}

/// Role-based authorizer.
///
/// Every rule registered for a (type, operation) pair must allow the
/// principal. A pair without rules is allowed.
///
/// ```rust,ignore
/// let auth = RoleAuthorizer::new()
///     .allow::<Customer>(OperationKind::Fetch, ["Clerk", "Admin"])
///     .deny::<Customer>(OperationKind::Delete, ["Guest"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RoleAuthorizer {
    rules: HashMap<(String, OperationKind), Vec<RoleRule>>,
}

fn roles<I, R>(roles: I) -> Vec<String>
where
    I: IntoIterator<Item = R>,
    R: Into<String>,
{
    roles.into_iter().map(Into::into).collect()
}

impl RoleAuthorizer {
    /// Creates an authorizer without rules.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a rule for `type_key` and `operation`.
    pub fn add_rule(&mut self, type_key: impl Into<String>, operation: OperationKind, rule: RoleRule) {
        self.rules
            .entry((type_key.into(), operation))
            .or_default()
            .push(rule);
    }

    /// Requires one of `allowed` for `operation` on `T`.
    pub fn allow<T>(
        mut self,
        operation: OperationKind,
        allowed: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self
    where
        T: MobileType,
    {
        self.add_rule(T::key(), operation, RoleRule::IsInRole(roles(allowed)));
        self
    }

    /// Forbids all of `denied` for `operation` on `T`.
    pub fn deny<T>(
        mut self,
        operation: OperationKind,
        denied: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self
    where
        T: MobileType,
    {
        self.add_rule(T::key(), operation, RoleRule::IsNotInRole(roles(denied)));
        self
    }
}

impl Authorizer for RoleAuthorizer {
    fn is_authorized(&self, operation: OperationKind, type_key: &str, principal: &Principal) -> bool {
        self.rules
            .get(&(type_key.to_string(), operation))
            .is_none_or(|rules| rules.iter().all(|rule| rule.allows(principal)))
    }
}
