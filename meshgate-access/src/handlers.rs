//! Static namespace handler table.
//!
//! Handlers attach behaviour to namespace patterns that plain inherited
//! grants cannot express: namespaces that need an explicit grant, and
//! field-level checks that depend on a sibling field's value.

use meshgate_core::{Namespace, NamespacePattern, Permissions};
use serde_json::{Map, Value};

use crate::grants::{PermissionEvaluator, RequesterIdentity};

/// Member list URL on an exchange LAN.
pub const MEMBER_LIST_URL_FIELD: &str = "ixf_ixp_member_list_url";
/// Visibility level governing [`MEMBER_LIST_URL_FIELD`].
pub const MEMBER_LIST_VISIBILITY_FIELD: &str = "ixf_ixp_member_list_url_visible";

const PUBLIC: &str = "public";
const PRIVATE: &str = "private";

/// Evaluator bound to one requester, handed to conditional handlers.
#[derive(Clone, Copy)]
pub struct PermissionCheck<'a> {
    evaluator: &'a dyn PermissionEvaluator,
    identity: &'a RequesterIdentity,
}

impl<'a> PermissionCheck<'a> {
    pub fn new(evaluator: &'a dyn PermissionEvaluator, identity: &'a RequesterIdentity) -> Self {
        Self {
            evaluator,
            identity,
        }
    }

    pub fn allows(&self, namespace: &Namespace, required: Permissions, explicit: bool) -> bool {
        self.evaluator
            .check(self.identity, namespace, required, explicit)
    }
}

/// Field-conditional logic run on an allowed object before its namespace
/// key is removed.
pub type ConditionalFn = fn(&PermissionCheck<'_>, &Namespace, &mut Map<String, Value>);

#[derive(Clone)]
pub struct NamespaceHandler {
    pub pattern: NamespacePattern,
    /// Only a grant naming the namespace exactly allows it.
    pub explicit: bool,
    pub conditional: Option<ConditionalFn>,
}

impl NamespaceHandler {
    pub fn explicit(pattern: &str) -> Self {
        Self {
            pattern: NamespacePattern::parse(pattern),
            explicit: true,
            conditional: None,
        }
    }

    pub fn conditional(pattern: &str, conditional: ConditionalFn) -> Self {
        Self {
            pattern: NamespacePattern::parse(pattern),
            explicit: false,
            conditional: Some(conditional),
        }
    }

    pub fn applies_to(&self, namespace: &Namespace) -> bool {
        self.pattern.matches_exactly(namespace)
    }
}

impl std::fmt::Debug for NamespaceHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamespaceHandler")
            .field("pattern", &self.pattern.to_string())
            .field("explicit", &self.explicit)
            .field("conditional", &self.conditional.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct HandlerTable {
    handlers: Vec<NamespaceHandler>,
}

impl HandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, handler: NamespaceHandler) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Handlers for the peering object graph.
    pub fn peering() -> Self {
        Self::new()
            .with(NamespaceHandler::explicit("org.*.network.*.poc_set.private"))
            .with(NamespaceHandler::explicit("org.*.network.*.poc_set.users"))
            .with(NamespaceHandler::conditional(
                "org.*.internetexchange.*.ixlan.*",
                member_list_url,
            ))
    }

    pub fn matching<'a>(
        &'a self,
        namespace: &'a Namespace,
    ) -> impl Iterator<Item = &'a NamespaceHandler> + 'a {
        self.handlers.iter().filter(move |h| h.applies_to(namespace))
    }

    pub fn requires_explicit(&self, namespace: &Namespace) -> bool {
        self.matching(namespace).any(|h| h.explicit)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Drop the member list URL unless the requester satisfies its visibility
/// level. Public is always visible; a missing level counts as private.
fn member_list_url(check: &PermissionCheck<'_>, ns: &Namespace, object: &mut Map<String, Value>) {
    if !object.contains_key(MEMBER_LIST_URL_FIELD) {
        return;
    }
    let level = object
        .get(MEMBER_LIST_VISIBILITY_FIELD)
        .and_then(Value::as_str)
        .filter(|v| !v.is_empty())
        .map_or_else(|| PRIVATE.to_string(), str::to_lowercase);
    if level == PUBLIC {
        return;
    }

    let field_ns = ns.join(MEMBER_LIST_URL_FIELD).join(&level);
    if !check.allows(&field_ns, Permissions::READ, true) {
        tracing::trace!(namespace = %field_ns, "Member list URL redacted");
        object.remove(MEMBER_LIST_URL_FIELD);
    }
}
